//! Rental (borrow event) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::BookState;
use super::partner::PartnerShort;
use super::stage::RentalStage;

/// Rental status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum RentalState {
    Ongoing,
    Returned,
}

super::text_enum!(RentalState {
    Ongoing => "ongoing",
    Returned => "returned",
});

impl Default for RentalState {
    fn default() -> Self {
        RentalState::Ongoing
    }
}

/// Rental record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Rental {
    pub id: i32,
    pub book_id: i32,
    /// Borrowing party
    pub borrower_id: i32,
    pub state: RentalState,
    pub rent_date: NaiveDate,
    /// Set when the book comes back
    pub return_date: Option<NaiveDate>,
    pub stage_id: Option<i32>,
}

/// Create rental request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateRental {
    pub book_id: i32,
    pub borrower_id: i32,
    /// Defaults to today
    pub rent_date: Option<NaiveDate>,
    /// Defaults to the first stage by sequence
    pub stage_id: Option<i32>,
}

/// Rental ready to be stored, defaults resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRental {
    pub book_id: i32,
    pub borrower_id: i32,
    pub rent_date: NaiveDate,
    pub stage_id: Option<i32>,
}

/// Return request; must name exactly one rental
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct ReturnRentals {
    pub ids: Vec<i32>,
}

/// Rental listing filters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
pub struct RentalQuery {
    pub book_id: Option<i32>,
    pub borrower_id: Option<i32>,
    pub state: Option<RentalState>,
}

/// Rental with its book, borrower and stage resolved
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RentalDetails {
    #[serde(flatten)]
    pub rental: Rental,
    pub book_name: String,
    pub book_state: BookState,
    pub borrower: PartnerShort,
    pub stage: Option<RentalStage>,
}
