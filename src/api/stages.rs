//! Rental stage endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::stage::{CreateStage, RentalStage, UpdateStage},
    AppState,
};

use super::AuthenticatedUser;

/// List stages in display order
#[utoipa::path(
    get,
    path = "/stages",
    tag = "stages",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Stages ordered by sequence then name", body = Vec<RentalStage>)
    )
)]
pub async fn list_stages(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
) -> AppResult<Json<Vec<RentalStage>>> {
    Ok(Json(state.services.stages.list().await?))
}

#[utoipa::path(
    get,
    path = "/stages/{id}",
    tag = "stages",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Stage ID")),
    responses(
        (status = 200, description = "Stage", body = RentalStage),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn get_stage(
    State(state): State<AppState>,
    AuthenticatedUser(_claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<Json<RentalStage>> {
    Ok(Json(state.services.stages.get(id).await?))
}

#[utoipa::path(
    post,
    path = "/stages",
    tag = "stages",
    security(("bearer_auth" = [])),
    request_body = CreateStage,
    responses(
        (status = 201, description = "Stage created", body = RentalStage),
        (status = 400, description = "Invalid data")
    )
)]
pub async fn create_stage(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(stage): Json<CreateStage>,
) -> AppResult<(StatusCode, Json<RentalStage>)> {
    claims.require_librarian()?;

    let created = state.services.stages.create(stage).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

#[utoipa::path(
    put,
    path = "/stages/{id}",
    tag = "stages",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Stage ID")),
    request_body = UpdateStage,
    responses(
        (status = 200, description = "Stage updated", body = RentalStage),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn update_stage(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
    Json(stage): Json<UpdateStage>,
) -> AppResult<Json<RentalStage>> {
    claims.require_librarian()?;

    let updated = state.services.stages.update(id, stage).await?;
    Ok(Json(updated))
}

#[utoipa::path(
    delete,
    path = "/stages/{id}",
    tag = "stages",
    security(("bearer_auth" = [])),
    params(("id" = i32, Path, description = "Stage ID")),
    responses(
        (status = 204, description = "Stage deleted"),
        (status = 404, description = "Stage not found")
    )
)]
pub async fn delete_stage(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    claims.require_librarian()?;

    state.services.stages.delete(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
