//! Book categories repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::category::{BookCategory, CreateCategory},
};

/// Category persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CategoryRepository: Send + Sync {
    async fn list(&self) -> AppResult<Vec<BookCategory>>;

    async fn get_by_id(&self, id: i32) -> AppResult<BookCategory>;

    /// Direct children of a category
    async fn children(&self, id: i32) -> AppResult<Vec<BookCategory>>;

    /// Create a category and its children in one unit of work.
    ///
    /// Returns the created records, parent first.
    async fn create_tree(&self, category: &CreateCategory) -> AppResult<Vec<BookCategory>>;
}

#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn list(&self) -> AppResult<Vec<BookCategory>> {
        let rows = sqlx::query_as::<_, BookCategory>("SELECT * FROM book_categories ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    async fn get_by_id(&self, id: i32) -> AppResult<BookCategory> {
        sqlx::query_as::<_, BookCategory>("SELECT * FROM book_categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Category {} not found", id)))
    }

    async fn children(&self, id: i32) -> AppResult<Vec<BookCategory>> {
        let rows = sqlx::query_as::<_, BookCategory>(
            "SELECT * FROM book_categories WHERE parent_id = $1 ORDER BY name",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn create_tree(&self, category: &CreateCategory) -> AppResult<Vec<BookCategory>> {
        let mut tx = self.pool.begin().await?;
        let mut created = Vec::new();

        // Breadth-first so every parent row exists before its children.
        let mut pending = vec![(category, category.parent_id)];
        while !pending.is_empty() {
            let mut next = Vec::new();
            for (node, parent_id) in pending {
                let row = sqlx::query_as::<_, BookCategory>(
                    r#"
                    INSERT INTO book_categories (name, description, parent_id)
                    VALUES ($1, $2, $3)
                    RETURNING *
                    "#,
                )
                .bind(&node.name)
                .bind(&node.description)
                .bind(parent_id)
                .fetch_one(&mut *tx)
                .await?;

                next.extend(node.children.iter().map(|child| (child, Some(row.id))));
                created.push(row);
            }
            pending = next;
        }

        tx.commit().await?;
        Ok(created)
    }
}
