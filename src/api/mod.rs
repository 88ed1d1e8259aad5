//! HTTP handlers: the JSON API under `/api/v1` and the HTML listings

pub mod books;
pub mod health;
pub mod openapi;
pub mod pages;
pub mod partners;
pub mod rentals;
pub mod stages;

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts},
    routing::{get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{error::AppError, models::user::UserClaims, AppState};

/// Extractor for authenticated user from JWT token
pub struct AuthenticatedUser(pub UserClaims);

#[async_trait]
impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .ok_or_else(|| AppError::Authentication("Missing authorization header".to_string()))?;

        let claims = decode_bearer(auth_header, state)?;
        Ok(AuthenticatedUser(claims))
    }
}

/// Caller of a public route: a token is optional, but a present one must be valid
pub struct OptionalUser(pub Option<UserClaims>);

#[async_trait]
impl FromRequestParts<AppState> for OptionalUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        match parts.headers.get(AUTHORIZATION) {
            None => Ok(OptionalUser(None)),
            Some(value) => {
                let auth_header = value.to_str().map_err(|_| {
                    AppError::Authentication("Invalid authorization header format".to_string())
                })?;
                Ok(OptionalUser(Some(decode_bearer(auth_header, state)?)))
            }
        }
    }
}

fn decode_bearer(auth_header: &str, state: &AppState) -> Result<UserClaims, AppError> {
    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| AppError::Authentication("Invalid authorization header format".to_string()))?;

    UserClaims::from_token(token, &state.config.auth.jwt_secret)
        .map_err(|e| AppError::Authentication(e.to_string()))
}

/// Build the application router with all routes
pub fn router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_v1 = Router::new()
        // Health check
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        // Books
        .route("/books", get(books::list_books).post(books::create_book))
        .route("/books/archive", post(books::toggle_archive))
        .route("/books/:id", get(books::get_book).put(books::update_book))
        .route("/books/:id/state", post(books::change_state))
        .route("/books/:id/make-available", post(books::make_available))
        .route("/books/:id/make-borrowed", post(books::make_borrowed))
        .route("/books/:id/make-lost", post(books::make_lost))
        .route("/books/:id/age", put(books::set_age_days))
        // Rentals
        .route("/rentals", get(rentals::list_rentals).post(rentals::create_rental))
        .route("/rentals/return", post(rentals::return_rentals))
        .route("/rentals/:id", get(rentals::get_rental))
        .route("/rentals/:id/return", post(rentals::return_rental))
        // Stages
        .route("/stages", get(stages::list_stages).post(stages::create_stage))
        .route(
            "/stages/:id",
            get(stages::get_stage)
                .put(stages::update_stage)
                .delete(stages::delete_stage),
        )
        // Parties, members, categories
        .route("/partners", get(partners::list_partners).post(partners::create_partner))
        .route("/partners/:id", get(partners::get_partner))
        .route("/members", get(partners::list_members).post(partners::create_member))
        .route("/members/:id", get(partners::get_member))
        .route("/categories", get(partners::list_categories).post(partners::create_category))
        .route("/categories/:id", get(partners::get_category));

    let html = Router::new()
        .route("/books", get(pages::books))
        .route("/books/:id", get(pages::book_detail))
        .route("/my_library/all-books", get(pages::all_books))
        .route("/my_library/all-books/mark-mine", get(pages::all_books_mark_mine))
        .route("/my_library/all-books/mine", get(pages::all_books_mine))
        .route("/my_library/book_details", get(pages::book_details))
        .route("/my_library/book_details/:id", get(pages::book_details_in_path));

    Router::new()
        .nest("/api/v1", api_v1)
        .merge(html)
        .with_state(state)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
