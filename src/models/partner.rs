//! Party model: authors, publishers and borrowers

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Party record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Partner {
    pub id: i32,
    pub name: String,
    pub email: Option<String>,
    pub city: Option<String>,
}

/// Short party reference used inside other records
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct PartnerShort {
    pub id: i32,
    pub name: String,
}

impl From<&Partner> for PartnerShort {
    fn from(p: &Partner) -> Self {
        Self {
            id: p.id,
            name: p.name.clone(),
        }
    }
}

/// Create party request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreatePartner {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub city: Option<String>,
}

/// Party with its book relations
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PartnerDetails {
    #[serde(flatten)]
    pub partner: Partner,
    pub authored_book_ids: Vec<i32>,
    pub published_book_ids: Vec<i32>,
    /// Number of authored books
    pub count_books: i64,
}
