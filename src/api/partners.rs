//! Party, member and category endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::{
        category::{BookCategory, CategoryTree, CreateCategory},
        member::{CreateMember, LibraryMember},
        partner::{CreatePartner, Partner, PartnerDetails},
    },
    AppState,
};

use super::AuthenticatedUser;

#[utoipa::path(
    get,
    path = "/partners",
    tag = "partners",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Parties by name", body = Vec<Partner>)
    )
)]
pub async fn list_partners(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<Partner>>> {
    Ok(Json(state.services.partners.list().await?))
}

/// Get a party with its authored and published books
#[utoipa::path(
    get,
    path = "/partners/{id}",
    tag = "partners",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Partner ID")),
    responses(
        (status = 200, description = "Party details", body = PartnerDetails),
        (status = 404, description = "Partner not found")
    )
)]
pub async fn get_partner(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<PartnerDetails>> {
    Ok(Json(state.services.partners.get_details(id).await?))
}

#[utoipa::path(
    post,
    path = "/partners",
    tag = "partners",
    security(("bearer_auth" = [])),
    request_body = CreatePartner,
    responses(
        (status = 201, description = "Party created", body = Partner),
        (status = 400, description = "Invalid data")
    )
)]
pub async fn create_partner(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(partner): Json<CreatePartner>,
) -> AppResult<(StatusCode, Json<Partner>)> {
    claims.require_librarian()?;

    let created = state.services.partners.create(partner).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Library members", body = Vec<LibraryMember>)
    )
)]
pub async fn list_members(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<LibraryMember>>> {
    Ok(Json(state.services.partners.list_members().await?))
}

#[utoipa::path(
    get,
    path = "/members/{id}",
    tag = "members",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Member ID")),
    responses(
        (status = 200, description = "Library member", body = LibraryMember),
        (status = 404, description = "Member not found")
    )
)]
pub async fn get_member(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<LibraryMember>> {
    Ok(Json(state.services.partners.get_member(id).await?))
}

/// Enroll a party as library member
#[utoipa::path(
    post,
    path = "/members",
    tag = "members",
    security(("bearer_auth" = [])),
    request_body = CreateMember,
    responses(
        (status = 201, description = "Member enrolled", body = LibraryMember),
        (status = 404, description = "Partner not found"),
        (status = 409, description = "Party is already a member")
    )
)]
pub async fn create_member(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(member): Json<CreateMember>,
) -> AppResult<(StatusCode, Json<LibraryMember>)> {
    claims.require_librarian()?;

    let created = state.services.partners.create_member(member).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    get,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Book categories", body = Vec<BookCategory>)
    )
)]
pub async fn list_categories(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<BookCategory>>> {
    Ok(Json(state.services.catalog.list_categories().await?))
}

#[utoipa::path(
    get,
    path = "/categories/{id}",
    tag = "categories",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Category ID")),
    responses(
        (status = 200, description = "Category with its children", body = CategoryTree),
        (status = 404, description = "Category not found")
    )
)]
pub async fn get_category(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<CategoryTree>> {
    Ok(Json(state.services.catalog.get_category(id).await?))
}

/// Create a category and its children in one go
#[utoipa::path(
    post,
    path = "/categories",
    tag = "categories",
    security(("bearer_auth" = [])),
    request_body = CreateCategory,
    responses(
        (status = 201, description = "Created categories, parent first", body = Vec<BookCategory>),
        (status = 404, description = "Parent category not found")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(category): Json<CreateCategory>,
) -> AppResult<(StatusCode, Json<Vec<BookCategory>>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_category(category).await?;
    Ok((StatusCode::CREATED, Json(created)))
}
