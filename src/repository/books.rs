//! Books repository for database operations

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::book::{Book, BookSearch, CompareOp, CreateBook, StateChange, UpdateBook},
};

/// Book persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookRepository: Send + Sync {
    /// Get book by ID; archived books included
    async fn get_by_id(&self, id: i32) -> AppResult<Book>;

    /// Search books; returns the requested page and the total match count
    async fn search(&self, search: &BookSearch) -> AppResult<(Vec<Book>, i64)>;

    /// Whether another book already uses this title
    async fn name_exists(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool>;

    /// Insert a book in `draft` state
    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book>;

    /// Apply a partial update
    async fn update(&self, id: i32, book: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book>;

    /// Persist a workflow-approved state change (compare-and-set on the old state)
    async fn set_state(&self, change: &StateChange, now: DateTime<Utc>) -> AppResult<()>;

    /// Set the archive flag of several books in one unit of work; all or nothing
    async fn set_active_many(&self, flags: &[(i32, bool)], now: DateTime<Utc>) -> AppResult<()>;

    async fn set_release_date(
        &self,
        id: i32,
        date_release: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> AppResult<()>;
}

const BOOK_COLUMNS: &str = r#"
    b.id, b.name, b.short_name, b.notes, b.description, b.state,
    b.date_release, b.date_updated, b.pages, b.out_of_print, b.reader_rating,
    b.cost_price, b.retail_price, b.currency, b.publisher_id, b.category_id, b.active,
    ARRAY(SELECT ba.partner_id FROM book_authors ba WHERE ba.book_id = b.id ORDER BY ba.partner_id) AS author_ids
"#;

#[derive(Clone)]
pub struct PgBookRepository {
    pool: Pool<Postgres>,
}

impl PgBookRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn replace_authors(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        book_id: i32,
        author_ids: &[i32],
    ) -> AppResult<()> {
        sqlx::query("DELETE FROM book_authors WHERE book_id = $1")
            .bind(book_id)
            .execute(&mut **tx)
            .await?;

        sqlx::query(
            "INSERT INTO book_authors (book_id, partner_id) SELECT $1, UNNEST($2::int4[]) ON CONFLICT DO NOTHING",
        )
        .bind(book_id)
        .bind(author_ids)
        .execute(&mut **tx)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl BookRepository for PgBookRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Book> {
        let query = format!("SELECT {} FROM books b WHERE b.id = $1", BOOK_COLUMNS);
        sqlx::query_as::<_, Book>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    async fn search(&self, search: &BookSearch) -> AppResult<(Vec<Book>, i64)> {
        // The release operator comes from a closed enum, never from user text.
        let release_op = search.release.map(|r| r.op).unwrap_or(CompareOp::Eq);
        let where_clause = format!(
            r#"
            WHERE ($1::text IS NULL OR b.name ILIKE '%' || $1 || '%')
              AND ($2::text IS NULL OR b.state = $2)
              AND ($3::int4 IS NULL OR EXISTS (
                    SELECT 1 FROM book_authors ba WHERE ba.book_id = b.id AND ba.partner_id = $3))
              AND ($4::int4 IS NULL OR b.publisher_id = $4)
              AND (NOT $5 OR b.active)
              AND ($6::date IS NULL OR b.date_release {} $6)
            "#,
            release_op.as_sql()
        );

        macro_rules! bind_search {
            ($builder:expr) => {
                $builder
                    .bind(&search.name)
                    .bind(search.state)
                    .bind(search.author_id)
                    .bind(search.publisher_id)
                    .bind(search.active_only)
                    .bind(search.release.map(|r| r.date))
            };
        }

        let count_query = format!("SELECT COUNT(*) FROM books b {}", where_clause);
        let total: i64 = bind_search!(sqlx::query_scalar(&count_query))
            .fetch_one(&self.pool)
            .await?;

        let limit = search
            .limit
            .map(|l| format!("LIMIT {}", l))
            .unwrap_or_default();
        let select_query = format!(
            "SELECT {} FROM books b {} ORDER BY b.date_release DESC NULLS LAST, b.name {} OFFSET {}",
            BOOK_COLUMNS, where_clause, limit, search.offset
        );
        let books = bind_search!(sqlx::query_as::<_, Book>(&select_query))
            .fetch_all(&self.pool)
            .await?;

        Ok((books, total))
    }

    async fn name_exists(&self, name: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM books WHERE name = $1 AND ($2::int4 IS NULL OR id <> $2))",
        )
        .bind(name)
        .bind(exclude_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }

    async fn create(&self, book: &CreateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO books (
                name, short_name, notes, description, state, date_release, date_updated,
                pages, out_of_print, reader_rating, cost_price, retail_price, currency,
                publisher_id, category_id, active
            )
            VALUES ($1, $2, $3, $4, 'draft', $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, TRUE)
            RETURNING id
            "#,
        )
        .bind(&book.name)
        .bind(&book.short_name)
        .bind(&book.notes)
        .bind(&book.description)
        .bind(book.date_release)
        .bind(now)
        .bind(book.pages)
        .bind(book.out_of_print.unwrap_or(false))
        .bind(book.reader_rating)
        .bind(book.cost_price)
        .bind(book.retail_price)
        .bind(&book.currency)
        .bind(book.publisher_id)
        .bind(book.category_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, "Book title must be unique"))?;

        Self::replace_authors(&mut tx, id, &book.author_ids).await?;
        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn update(&self, id: i32, book: &UpdateBook, now: DateTime<Utc>) -> AppResult<Book> {
        let mut tx = self.pool.begin().await?;

        let mut sets = vec!["date_updated = $1".to_string()];
        let mut idx = 2;

        macro_rules! add_field {
            ($field:expr, $name:expr) => {
                if $field.is_some() {
                    sets.push(format!("{} = ${}", $name, idx));
                    idx += 1;
                }
            };
        }

        add_field!(book.name, "name");
        add_field!(book.short_name, "short_name");
        add_field!(book.notes, "notes");
        add_field!(book.description, "description");
        add_field!(book.date_release, "date_release");
        add_field!(book.pages, "pages");
        add_field!(book.out_of_print, "out_of_print");
        add_field!(book.reader_rating, "reader_rating");
        add_field!(book.cost_price, "cost_price");
        add_field!(book.retail_price, "retail_price");
        add_field!(book.currency, "currency");
        add_field!(book.publisher_id, "publisher_id");
        add_field!(book.category_id, "category_id");

        let query = format!(
            "UPDATE books SET {} WHERE id = ${} RETURNING id",
            sets.join(", "),
            idx
        );

        let mut builder = sqlx::query_scalar::<_, i32>(&query).bind(now);

        macro_rules! bind_field {
            ($field:expr) => {
                if let Some(ref val) = $field {
                    builder = builder.bind(val);
                }
            };
        }

        bind_field!(book.name);
        bind_field!(book.short_name);
        bind_field!(book.notes);
        bind_field!(book.description);
        bind_field!(book.date_release);
        bind_field!(book.pages);
        bind_field!(book.out_of_print);
        bind_field!(book.reader_rating);
        bind_field!(book.cost_price);
        bind_field!(book.retail_price);
        bind_field!(book.currency);
        bind_field!(book.publisher_id);
        bind_field!(book.category_id);

        builder
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| AppError::from_write(e, "Book title must be unique"))?
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        if let Some(ref author_ids) = book.author_ids {
            Self::replace_authors(&mut tx, id, author_ids).await?;
        }
        tx.commit().await?;

        self.get_by_id(id).await
    }

    async fn set_state(&self, change: &StateChange, now: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;
        super::apply_state_change(&mut tx, change, now).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn set_active_many(&self, flags: &[(i32, bool)], now: DateTime<Utc>) -> AppResult<()> {
        let mut tx = self.pool.begin().await?;

        for &(id, active) in flags {
            let result =
                sqlx::query("UPDATE books SET active = $1, date_updated = $2 WHERE id = $3")
                    .bind(active)
                    .bind(now)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            if result.rows_affected() == 0 {
                return Err(AppError::NotFound(format!("Book with id {} not found", id)));
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn set_release_date(
        &self,
        id: i32,
        date_release: Option<NaiveDate>,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let result =
            sqlx::query("UPDATE books SET date_release = $1, date_updated = $2 WHERE id = $3")
                .bind(date_release)
                .bind(now)
                .bind(id)
                .execute(&self.pool)
                .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        Ok(())
    }
}
