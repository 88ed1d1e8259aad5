//! Rental stages repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::BookState,
        stage::{CreateStage, RentalStage, UpdateStage},
    },
};

/// Rental stage persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StageRepository: Send + Sync {
    /// All stages ordered by sequence, then name
    async fn list(&self) -> AppResult<Vec<RentalStage>>;

    async fn get_by_id(&self, id: i32) -> AppResult<RentalStage>;

    async fn create(&self, stage: &CreateStage) -> AppResult<RentalStage>;

    async fn update(&self, id: i32, stage: &UpdateStage) -> AppResult<RentalStage>;

    /// Delete a stage; rentals in it keep no stage
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[derive(Clone)]
pub struct PgStageRepository {
    pool: Pool<Postgres>,
}

impl PgStageRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl StageRepository for PgStageRepository {
    async fn list(&self) -> AppResult<Vec<RentalStage>> {
        let stages = sqlx::query_as::<_, RentalStage>(
            "SELECT * FROM rental_stages ORDER BY sequence, name",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(stages)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<RentalStage> {
        sqlx::query_as::<_, RentalStage>("SELECT * FROM rental_stages WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", id)))
    }

    async fn create(&self, stage: &CreateStage) -> AppResult<RentalStage> {
        let row = sqlx::query_as::<_, RentalStage>(
            r#"
            INSERT INTO rental_stages (name, sequence, fold, book_state)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(&stage.name)
        .bind(stage.sequence)
        .bind(stage.fold)
        .bind(stage.book_state.unwrap_or(BookState::Available))
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update(&self, id: i32, stage: &UpdateStage) -> AppResult<RentalStage> {
        sqlx::query_as::<_, RentalStage>(
            r#"
            UPDATE rental_stages SET
                name = COALESCE($1, name),
                sequence = COALESCE($2, sequence),
                fold = COALESCE($3, fold),
                book_state = COALESCE($4, book_state)
            WHERE id = $5
            RETURNING *
            "#,
        )
        .bind(&stage.name)
        .bind(stage.sequence)
        .bind(stage.fold)
        .bind(stage.book_state)
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Stage {} not found", id)))
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let result = sqlx::query("DELETE FROM rental_stages WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Stage {} not found", id)));
        }
        Ok(())
    }
}
