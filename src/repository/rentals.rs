//! Rentals repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        book::StateChange,
        rental::{NewRental, Rental, RentalQuery},
    },
};

/// Rental persistence.
///
/// Opening and closing a rental also moves the book; both writes happen in one
/// unit of work.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait RentalRepository: Send + Sync {
    /// Get rental by ID
    async fn get_by_id(&self, id: i32) -> AppResult<Rental>;

    /// List rentals, newest first
    async fn list(&self, query: &RentalQuery) -> AppResult<Vec<Rental>>;

    /// Apply `change` to the book and insert the rental
    async fn open(
        &self,
        rental: &NewRental,
        change: &StateChange,
        now: DateTime<Utc>,
    ) -> AppResult<Rental>;

    /// Apply `change` to the book and mark the ongoing rental returned on `return_date`.
    ///
    /// A rental that is already returned is a conflict and nothing is written.
    async fn close(
        &self,
        id: i32,
        change: &StateChange,
        return_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Rental>;
}

#[derive(Clone)]
pub struct PgRentalRepository {
    pool: Pool<Postgres>,
}

impl PgRentalRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RentalRepository for PgRentalRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Rental> {
        sqlx::query_as::<_, Rental>("SELECT * FROM rentals WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Rental with id {} not found", id)))
    }

    async fn list(&self, query: &RentalQuery) -> AppResult<Vec<Rental>> {
        let rentals = sqlx::query_as::<_, Rental>(
            r#"
            SELECT * FROM rentals
            WHERE ($1::int4 IS NULL OR book_id = $1)
              AND ($2::int4 IS NULL OR borrower_id = $2)
              AND ($3::text IS NULL OR state = $3)
            ORDER BY rent_date DESC, id DESC
            "#,
        )
        .bind(query.book_id)
        .bind(query.borrower_id)
        .bind(query.state)
        .fetch_all(&self.pool)
        .await?;

        Ok(rentals)
    }

    async fn open(
        &self,
        rental: &NewRental,
        change: &StateChange,
        now: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let mut tx = self.pool.begin().await?;

        super::apply_state_change(&mut tx, change, now).await?;

        let created = sqlx::query_as::<_, Rental>(
            r#"
            INSERT INTO rentals (book_id, borrower_id, state, rent_date, stage_id)
            VALUES ($1, $2, 'ongoing', $3, $4)
            RETURNING *
            "#,
        )
        .bind(rental.book_id)
        .bind(rental.borrower_id)
        .bind(rental.rent_date)
        .bind(rental.stage_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, "Book already has an ongoing rental"))?;

        tx.commit().await?;
        Ok(created)
    }

    async fn close(
        &self,
        id: i32,
        change: &StateChange,
        return_date: NaiveDate,
        now: DateTime<Utc>,
    ) -> AppResult<Rental> {
        let mut tx = self.pool.begin().await?;

        super::apply_state_change(&mut tx, change, now).await?;

        let closed = sqlx::query_as::<_, Rental>(
            r#"
            UPDATE rentals SET state = 'returned', return_date = $1
            WHERE id = $2 AND state = 'ongoing'
            RETURNING *
            "#,
        )
        .bind(return_date)
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?;

        // Dropping `tx` rolls back the book change
        let closed = match closed {
            Some(rental) => rental,
            None => {
                let exists: Option<i32> = sqlx::query_scalar("SELECT id FROM rentals WHERE id = $1")
                    .bind(id)
                    .fetch_optional(&mut *tx)
                    .await?;
                return Err(match exists {
                    Some(_) => AppError::Conflict(format!("Rental {} was already returned", id)),
                    None => AppError::NotFound(format!("Rental with id {} not found", id)),
                });
            }
        };

        tx.commit().await?;
        Ok(closed)
    }
}
