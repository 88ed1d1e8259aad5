//! Repository layer for database operations.
//!
//! Each entity has an async store trait. [`Repository::new`] wires the
//! PostgreSQL implementations; [`Repository::in_memory`] wires
//! [`memory::MemoryStore`] for tests and local tooling.

pub mod books;
pub mod categories;
pub mod memory;
pub mod partners;
pub mod rentals;
pub mod stages;

use std::sync::Arc;

use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{is_allowed_transition, BookState, StateChange, TransitionError},
};

pub use books::{BookRepository, PgBookRepository};
pub use categories::{CategoryRepository, PgCategoryRepository};
pub use partners::{PartnerRepository, PgPartnerRepository};
pub use rentals::{PgRentalRepository, RentalRepository};
pub use stages::{PgStageRepository, StageRepository};

/// Main repository struct holding one store per entity
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookRepository>,
    pub rentals: Arc<dyn RentalRepository>,
    pub stages: Arc<dyn StageRepository>,
    pub partners: Arc<dyn PartnerRepository>,
    pub categories: Arc<dyn CategoryRepository>,
}

impl Repository {
    /// Create a new repository with the given database pool
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(PgBookRepository::new(pool.clone())),
            rentals: Arc::new(PgRentalRepository::new(pool.clone())),
            stages: Arc::new(PgStageRepository::new(pool.clone())),
            partners: Arc::new(PgPartnerRepository::new(pool.clone())),
            categories: Arc::new(PgCategoryRepository::new(pool)),
        }
    }

    /// Create a repository backed by a fresh in-memory store
    pub fn in_memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            books: store.clone(),
            rentals: store.clone(),
            stages: store.clone(),
            partners: store.clone(),
            categories: store,
        }
    }
}

/// Apply a state change as a compare-and-set on `books.state` inside `tx`.
///
/// When the book moved since it was read, the change is re-judged against the
/// stored state: a move the workflow now forbids is a transition error, anything
/// else a conflict.
pub(crate) async fn apply_state_change(
    tx: &mut sqlx::Transaction<'_, Postgres>,
    change: &StateChange,
    now: chrono::DateTime<chrono::Utc>,
) -> AppResult<()> {
    let result = sqlx::query(
        "UPDATE books SET state = $1, date_updated = $2 WHERE id = $3 AND state = $4",
    )
    .bind(change.to)
    .bind(now)
    .bind(change.book_id)
    .bind(change.from)
    .execute(&mut **tx)
    .await?;

    if result.rows_affected() == 1 {
        return Ok(());
    }

    let current: Option<BookState> = sqlx::query_scalar("SELECT state FROM books WHERE id = $1")
        .bind(change.book_id)
        .fetch_optional(&mut **tx)
        .await?;

    match current {
        Some(from) if is_allowed_transition(from, change.to) => Err(AppError::Conflict(format!(
            "Book {} was modified concurrently",
            change.book_id
        ))),
        Some(from) => Err(TransitionError { from, to: change.to }.into()),
        None => Err(AppError::NotFound(format!(
            "Book with id {} not found",
            change.book_id
        ))),
    }
}
