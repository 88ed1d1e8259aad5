//! Library member model (a party enrolled in the library)

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;
use validator::Validate;

use super::partner::CreatePartner;

/// Library member record, joined with its party name
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct LibraryMember {
    pub id: i32,
    pub partner_id: i32,
    pub name: String,
    /// Member since
    pub date_start: Option<NaiveDate>,
    /// Termination date
    pub date_end: Option<NaiveDate>,
    pub member_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}

/// Create member request.
///
/// Either links an existing party (`partner_id`) or creates one from `partner`.
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateMember {
    pub partner_id: Option<i32>,
    #[validate(nested)]
    pub partner: Option<CreatePartner>,
    pub date_start: Option<NaiveDate>,
    pub date_end: Option<NaiveDate>,
    pub member_number: Option<String>,
    pub date_of_birth: Option<NaiveDate>,
}
