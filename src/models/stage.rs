//! Rental stage model.
//!
//! Stages are kanban-style labels for rentals. They carry a suggested book
//! state but nothing enforces it against the book.

use std::cmp::Ordering;

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::book::BookState;
use crate::error::{AppError, AppResult};

/// Rental stage record from database
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow, ToSchema)]
pub struct RentalStage {
    pub id: i32,
    pub name: String,
    pub sequence: i32,
    /// Rendered collapsed in stage columns
    pub fold: bool,
    /// Suggested book state for rentals in this stage
    pub book_state: BookState,
}

impl RentalStage {
    /// Display order: `sequence`, then `name`
    pub fn display_order(a: &RentalStage, b: &RentalStage) -> Ordering {
        a.sequence
            .cmp(&b.sequence)
            .then_with(|| a.name.cmp(&b.name))
    }
}

/// Stage assigned to new rentals: the first one in display order
pub fn default_stage(stages: &[RentalStage]) -> Option<&RentalStage> {
    stages.iter().min_by(|a, b| RentalStage::display_order(a, b))
}

/// Stages may suggest any state but `draft`
pub fn check_stage_book_state(state: BookState) -> AppResult<()> {
    if state == BookState::Draft {
        return Err(AppError::Validation(
            "Stage book state must be available, borrowed or lost".to_string(),
        ));
    }
    Ok(())
}

/// Create stage request
#[derive(Debug, Clone, Deserialize, Validate, ToSchema)]
pub struct CreateStage {
    #[validate(length(min = 1, message = "Stage name is required"))]
    pub name: String,
    #[serde(default)]
    pub sequence: i32,
    #[serde(default)]
    pub fold: bool,
    pub book_state: Option<BookState>,
}

/// Update stage request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateStage {
    #[validate(length(min = 1, message = "Stage name is required"))]
    pub name: Option<String>,
    pub sequence: Option<i32>,
    pub fold: Option<bool>,
    pub book_state: Option<BookState>,
}
