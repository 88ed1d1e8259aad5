//! Book category model

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

/// Book category record from database
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct BookCategory {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
}

/// Create category request; children are created under the new category
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateCategory {
    #[validate(length(min = 1, message = "Category name is required"))]
    pub name: String,
    pub description: Option<String>,
    pub parent_id: Option<i32>,
    #[serde(default)]
    #[validate(nested)]
    pub children: Vec<CreateCategory>,
}

/// Category with its direct children
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct CategoryTree {
    #[serde(flatten)]
    pub category: BookCategory,
    pub children: Vec<BookCategory>,
}
