//! Parties and library members repository

use async_trait::async_trait;
use sqlx::{Pool, Postgres};

use crate::{
    error::{AppError, AppResult},
    models::{
        member::{CreateMember, LibraryMember},
        partner::{CreatePartner, Partner},
    },
};

/// Party and member persistence
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<Partner>;

    /// Parties among `ids`, in no particular order; unknown ids are skipped
    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Partner>>;

    async fn list(&self) -> AppResult<Vec<Partner>>;

    async fn create(&self, partner: &CreatePartner) -> AppResult<Partner>;

    /// IDs of books the party authored
    async fn authored_book_ids(&self, id: i32) -> AppResult<Vec<i32>>;

    /// IDs of books the party published
    async fn published_book_ids(&self, id: i32) -> AppResult<Vec<i32>>;

    async fn list_members(&self) -> AppResult<Vec<LibraryMember>>;

    async fn get_member(&self, id: i32) -> AppResult<LibraryMember>;

    /// Create a member, creating its party first when `partner_id` is not set
    async fn create_member(&self, member: &CreateMember) -> AppResult<LibraryMember>;
}

const MEMBER_SELECT: &str = r#"
    SELECT m.id, m.partner_id, p.name, m.date_start, m.date_end,
           m.member_number, m.date_of_birth
    FROM library_members m
    JOIN partners p ON p.id = m.partner_id
"#;

#[derive(Clone)]
pub struct PgPartnerRepository {
    pool: Pool<Postgres>,
}

impl PgPartnerRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PartnerRepository for PgPartnerRepository {
    async fn get_by_id(&self, id: i32) -> AppResult<Partner> {
        sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Partner with id {} not found", id)))
    }

    async fn get_many(&self, ids: &[i32]) -> AppResult<Vec<Partner>> {
        let partners = sqlx::query_as::<_, Partner>("SELECT * FROM partners WHERE id = ANY($1)")
            .bind(ids)
            .fetch_all(&self.pool)
            .await?;
        Ok(partners)
    }

    async fn list(&self) -> AppResult<Vec<Partner>> {
        let partners = sqlx::query_as::<_, Partner>("SELECT * FROM partners ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(partners)
    }

    async fn create(&self, partner: &CreatePartner) -> AppResult<Partner> {
        let row = sqlx::query_as::<_, Partner>(
            "INSERT INTO partners (name, email, city) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(&partner.name)
        .bind(&partner.email)
        .bind(&partner.city)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn authored_book_ids(&self, id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT book_id FROM book_authors WHERE partner_id = $1 ORDER BY book_id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn published_book_ids(&self, id: i32) -> AppResult<Vec<i32>> {
        let ids = sqlx::query_scalar::<_, i32>(
            "SELECT id FROM books WHERE publisher_id = $1 ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;
        Ok(ids)
    }

    async fn list_members(&self) -> AppResult<Vec<LibraryMember>> {
        let query = format!("{} ORDER BY p.name", MEMBER_SELECT);
        let members = sqlx::query_as::<_, LibraryMember>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(members)
    }

    async fn get_member(&self, id: i32) -> AppResult<LibraryMember> {
        let query = format!("{} WHERE m.id = $1", MEMBER_SELECT);
        sqlx::query_as::<_, LibraryMember>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Member {} not found", id)))
    }

    async fn create_member(&self, member: &CreateMember) -> AppResult<LibraryMember> {
        let mut tx = self.pool.begin().await?;

        let partner_id = match (member.partner_id, &member.partner) {
            (Some(id), _) => id,
            (None, Some(partner)) => {
                sqlx::query_scalar::<_, i32>(
                    "INSERT INTO partners (name, email, city) VALUES ($1, $2, $3) RETURNING id",
                )
                .bind(&partner.name)
                .bind(&partner.email)
                .bind(&partner.city)
                .fetch_one(&mut *tx)
                .await?
            }
            (None, None) => {
                return Err(AppError::Validation(
                    "partner_id or partner is required".to_string(),
                ))
            }
        };

        let id = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO library_members (partner_id, date_start, date_end, member_number, date_of_birth)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id
            "#,
        )
        .bind(partner_id)
        .bind(member.date_start)
        .bind(member.date_end)
        .bind(&member.member_number)
        .bind(member.date_of_birth)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| AppError::from_write(e, "Party is already a member"))?;

        tx.commit().await?;
        self.get_member(id).await
    }
}
