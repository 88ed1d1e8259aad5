//! Book catalog endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    error::AppResult,
    models::book::{Book, BookDetails, BookQuery, BookState, CreateBook, UpdateBook},
    AppState,
};

use super::AuthenticatedUser;

/// One page of search results
#[derive(Serialize, ToSchema)]
pub struct BookPage {
    pub items: Vec<Book>,
    /// Total number of matching books
    pub total: i64,
    pub page: i64,
    pub per_page: i64,
}

/// Target of a workflow move
#[derive(Deserialize, ToSchema)]
pub struct ChangeStateRequest {
    pub state: BookState,
}

#[derive(Deserialize, ToSchema)]
pub struct ArchiveRequest {
    pub ids: Vec<i32>,
}

#[derive(Deserialize, ToSchema)]
pub struct SetAgeRequest {
    /// Days since release
    pub age_days: i64,
}

/// Search books
#[utoipa::path(
    get,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    params(BookQuery),
    responses(
        (status = 200, description = "Matching books", body = BookPage),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Query(query): Query<BookQuery>,
) -> AppResult<Json<BookPage>> {
    let (items, total) = state.services.catalog.search_books(&query).await?;
    Ok(Json(BookPage {
        items,
        total,
        page: query.page.unwrap_or(1).max(1),
        per_page: query.per_page.unwrap_or(20).clamp(1, 200),
    }))
}

/// Get book details
#[utoipa::path(
    get,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book details", body = BookDetails),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<BookDetails>> {
    let book = state.services.catalog.get_book_details(id).await?;
    Ok(Json(book))
}

/// Create a book (starts as draft)
#[utoipa::path(
    post,
    path = "/books",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = CreateBook,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid data"),
        (status = 403, description = "Librarian rights required"),
        (status = 409, description = "Title already used")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(book): Json<CreateBook>,
) -> AppResult<(StatusCode, Json<Book>)> {
    claims.require_librarian()?;

    let created = state.services.catalog.create_book(book).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Update a book
#[utoipa::path(
    put,
    path = "/books/{id}",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = UpdateBook,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 400, description = "Invalid data"),
        (status = 404, description = "Book not found"),
        (status = 409, description = "Title already used")
    )
)]
pub async fn update_book(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(book): Json<UpdateBook>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;

    let updated = state.services.catalog.update_book(id, book).await?;
    Ok(Json(updated))
}

/// Move a book to another state
#[utoipa::path(
    post,
    path = "/books/{id}/state",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = ChangeStateRequest,
    responses(
        (status = 200, description = "State changed", body = Book),
        (status = 404, description = "Book not found"),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn change_state(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<ChangeStateRequest>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;

    let book = state.services.catalog.change_state(id, request.state).await?;
    Ok(Json(book))
}

#[utoipa::path(
    post,
    path = "/books/{id}/make-available",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book available", body = Book),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn make_available(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;
    Ok(Json(state.services.catalog.make_available(id).await?))
}

#[utoipa::path(
    post,
    path = "/books/{id}/make-borrowed",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book borrowed", body = Book),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn make_borrowed(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;
    Ok(Json(state.services.catalog.make_borrowed(id).await?))
}

#[utoipa::path(
    post,
    path = "/books/{id}/make-lost",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    responses(
        (status = 200, description = "Book lost", body = Book),
        (status = 422, description = "Transition not allowed")
    )
)]
pub async fn make_lost(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;
    Ok(Json(state.services.catalog.make_lost(id).await?))
}

/// Set a book's age, moving its release date
#[utoipa::path(
    put,
    path = "/books/{id}/age",
    tag = "books",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Book ID")),
    request_body = SetAgeRequest,
    responses(
        (status = 200, description = "Release date moved", body = Book),
        (status = 400, description = "Release date would be in the future")
    )
)]
pub async fn set_age_days(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(request): Json<SetAgeRequest>,
) -> AppResult<Json<Book>> {
    claims.require_librarian()?;

    let book = state.services.catalog.set_age_days(id, request.age_days).await?;
    Ok(Json(book))
}

/// Archive or restore books
#[utoipa::path(
    post,
    path = "/books/archive",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = ArchiveRequest,
    responses(
        (status = 200, description = "Archive flag flipped", body = Vec<Book>),
        (status = 404, description = "Book not found")
    )
)]
pub async fn toggle_archive(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(request): Json<ArchiveRequest>,
) -> AppResult<Json<Vec<Book>>> {
    claims.require_librarian()?;

    let books = state.services.catalog.toggle_archive(&request.ids).await?;
    Ok(Json(books))
}
