//! Rental ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::rental::{CreateRental, Rental, RentalDetails, RentalQuery, ReturnRentals},
    AppState,
};

use super::AuthenticatedUser;

/// List rentals
#[utoipa::path(
    get,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(RentalQuery),
    responses(
        (status = 200, description = "Rentals, newest first", body = Vec<Rental>)
    )
)]
pub async fn list_rentals(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<RentalQuery>,
) -> AppResult<Json<Vec<Rental>>> {
    let rentals = state.services.rentals.list(&query).await?;
    Ok(Json(rentals))
}

/// Get a rental
#[utoipa::path(
    get,
    path = "/rentals/{id}",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental details", body = RentalDetails),
        (status = 404, description = "Rental not found")
    )
)]
pub async fn get_rental(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RentalDetails>> {
    let rental = state.services.rentals.get_details(id).await?;
    Ok(Json(rental))
}

/// Lend a book
#[utoipa::path(
    post,
    path = "/rentals",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = CreateRental,
    responses(
        (status = 201, description = "Rental opened", body = Rental),
        (status = 404, description = "Book or borrower not found"),
        (status = 409, description = "Book already has an ongoing rental"),
        (status = 422, description = "Book is not available")
    )
)]
pub async fn create_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(rental): Json<CreateRental>,
) -> AppResult<(StatusCode, Json<Rental>)> {
    claims.require_librarian()?;

    let created = state.services.rentals.create(rental).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Return the book of a single rental given in a list
#[utoipa::path(
    post,
    path = "/rentals/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    request_body = ReturnRentals,
    responses(
        (status = 200, description = "Rental closed", body = Rental),
        (status = 400, description = "Not exactly one rental"),
        (status = 422, description = "Book is already available")
    )
)]
pub async fn return_rentals(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ReturnRentals>,
) -> AppResult<Json<Rental>> {
    claims.require_librarian()?;

    let rental = state.services.rentals.book_return(&request.ids).await?;
    Ok(Json(rental))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/rentals/{id}/return",
    tag = "rentals",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Rental ID")),
    responses(
        (status = 200, description = "Rental closed", body = Rental),
        (status = 404, description = "Rental not found"),
        (status = 422, description = "Book is already available")
    )
)]
pub async fn return_rental(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Rental>> {
    claims.require_librarian()?;

    let rental = state.services.rentals.book_return(&[id]).await?;
    Ok(Json(rental))
}
