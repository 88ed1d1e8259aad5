//! Book model, lifecycle workflow and related types.
//!
//! A book's circulation status moves through a small state machine whose
//! edges are listed in [`ALLOWED_TRANSITIONS`]. Every status change, whether
//! requested explicitly or caused by a rental, goes through
//! [`Book::change_state`].

use chrono::{DateTime, Duration, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use thiserror::Error;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use super::partner::PartnerShort;
use crate::error::{AppError, AppResult};

/// Book circulation status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum BookState {
    Draft,
    Available,
    Borrowed,
    Lost,
}

super::text_enum!(BookState {
    Draft => "draft",
    Available => "available",
    Borrowed => "borrowed",
    Lost => "lost",
});

impl BookState {
    /// Human readable label
    pub fn label(&self) -> &'static str {
        match self {
            BookState::Draft => "Not Available",
            BookState::Available => "Available",
            BookState::Borrowed => "Borrowed",
            BookState::Lost => "Lost",
        }
    }
}

impl Default for BookState {
    fn default() -> Self {
        BookState::Draft
    }
}

/// Every permitted (old, new) status pair.
pub const ALLOWED_TRANSITIONS: &[(BookState, BookState)] = &[
    (BookState::Draft, BookState::Available),
    (BookState::Available, BookState::Borrowed),
    (BookState::Borrowed, BookState::Available),
    (BookState::Available, BookState::Lost),
    (BookState::Borrowed, BookState::Lost),
    (BookState::Lost, BookState::Available),
];

/// Whether a book may move from `old_state` to `new_state`
pub fn is_allowed_transition(old_state: BookState, new_state: BookState) -> bool {
    ALLOWED_TRANSITIONS.contains(&(old_state, new_state))
}

/// A status change rejected by the workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("Moving from {from} to {to} is not allowed")]
pub struct TransitionError {
    pub from: BookState,
    pub to: BookState,
}

/// A validated status change, ready to be persisted.
///
/// Stores apply it as a compare-and-set: the write only happens if the book is
/// still in `from`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StateChange {
    pub book_id: i32,
    pub from: BookState,
    pub to: BookState,
}

/// Book record from database
#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Book {
    pub id: i32,
    /// Title (unique)
    pub name: String,
    pub short_name: Option<String>,
    /// Internal notes
    pub notes: Option<String>,
    pub description: Option<String>,
    pub state: BookState,
    pub date_release: Option<NaiveDate>,
    /// Last write timestamp
    pub date_updated: Option<DateTime<Utc>>,
    pub pages: Option<i32>,
    pub out_of_print: bool,
    pub reader_rating: Option<f64>,
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    /// ISO 4217 code of `retail_price`
    pub currency: Option<String>,
    pub publisher_id: Option<i32>,
    pub category_id: Option<i32>,
    /// False once archived
    pub active: bool,
    pub author_ids: Vec<i32>,
}

impl Book {
    /// Move to `new_state` if the workflow allows it, leaving the book untouched otherwise.
    pub fn change_state(&mut self, new_state: BookState) -> Result<(), TransitionError> {
        if is_allowed_transition(self.state, new_state) {
            self.state = new_state;
            Ok(())
        } else {
            Err(TransitionError {
                from: self.state,
                to: new_state,
            })
        }
    }

    pub fn make_available(&mut self) -> Result<(), TransitionError> {
        self.change_state(BookState::Available)
    }

    pub fn make_borrowed(&mut self) -> Result<(), TransitionError> {
        self.change_state(BookState::Borrowed)
    }

    pub fn make_lost(&mut self) -> Result<(), TransitionError> {
        self.change_state(BookState::Lost)
    }

    /// Title followed by the release date, e.g. `Dune (1965-08-01)`
    pub fn display_name(&self) -> String {
        match self.date_release {
            Some(date) => format!("{} ({})", self.name, date.format("%Y-%m-%d")),
            None => format!("{} (None)", self.name),
        }
    }

    /// Days elapsed since release; 0 when the release date is unknown
    pub fn age_days(&self, today: NaiveDate) -> i64 {
        self.date_release
            .map(|date| (today - date).num_days())
            .unwrap_or(0)
    }

    /// Inverse of [`Book::age_days`]: moves the release date so the book is `days` old.
    ///
    /// Books without a release date are left untouched.
    pub fn set_age_days(&mut self, days: i64, today: NaiveDate) {
        if self.date_release.is_some() {
            self.date_release = Some(today - Duration::days(days));
        }
    }
}

/// Reject release dates after `today`
pub fn check_release_date(date_release: Option<NaiveDate>, today: NaiveDate) -> AppResult<()> {
    match date_release {
        Some(date) if date > today => Err(AppError::Validation(
            "Release date must be in the past".to_string(),
        )),
        _ => Ok(()),
    }
}

/// Comparison operator accepted by computed-field filters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Gt,
    Ge,
    Lt,
    Le,
    Eq,
}

impl CompareOp {
    /// Operator to use on the release date when filtering on age
    pub fn flipped(self) -> Self {
        match self {
            CompareOp::Gt => CompareOp::Lt,
            CompareOp::Ge => CompareOp::Le,
            CompareOp::Lt => CompareOp::Gt,
            CompareOp::Le => CompareOp::Ge,
            CompareOp::Eq => CompareOp::Eq,
        }
    }

    pub fn as_sql(self) -> &'static str {
        match self {
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Eq => "=",
        }
    }

    pub fn matches<T: PartialOrd>(self, left: &T, right: &T) -> bool {
        match self {
            CompareOp::Gt => left > right,
            CompareOp::Ge => left >= right,
            CompareOp::Lt => left < right,
            CompareOp::Le => left <= right,
            CompareOp::Eq => left == right,
        }
    }
}

/// Filter on the computed `age_days` field
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeFilter {
    pub op: CompareOp,
    pub days: i64,
}

impl AgeFilter {
    /// Translate to an equivalent filter on `date_release`.
    ///
    /// A book older than N days was released before `today - N`.
    pub fn to_release_filter(self, today: NaiveDate) -> ReleaseFilter {
        ReleaseFilter {
            op: self.op.flipped(),
            date: today - Duration::days(self.days),
        }
    }
}

/// Filter on `date_release`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReleaseFilter {
    pub op: CompareOp,
    pub date: NaiveDate,
}

impl ReleaseFilter {
    /// Books without a release date never match
    pub fn matches(&self, date_release: Option<NaiveDate>) -> bool {
        date_release
            .map(|d| self.op.matches(&d, &self.date))
            .unwrap_or(false)
    }
}

/// Book search query parameters
#[derive(Debug, Default, Deserialize, IntoParams, ToSchema)]
pub struct BookQuery {
    /// Case-insensitive title substring
    pub name: Option<String>,
    pub state: Option<BookState>,
    pub author_id: Option<i32>,
    pub publisher_id: Option<i32>,
    /// Include archived books (default: false)
    pub include_archived: Option<bool>,
    /// Operator applied to `age_days`
    pub age_op: Option<CompareOp>,
    pub age_days: Option<i64>,
    pub page: Option<i64>,
    pub per_page: Option<i64>,
}

/// Resolved search passed to the store
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookSearch {
    pub name: Option<String>,
    pub state: Option<BookState>,
    pub author_id: Option<i32>,
    pub publisher_id: Option<i32>,
    pub active_only: bool,
    pub release: Option<ReleaseFilter>,
    pub limit: Option<i64>,
    pub offset: i64,
}

impl BookSearch {
    /// Every active book, no paging
    pub fn all_active() -> Self {
        Self {
            active_only: true,
            ..Default::default()
        }
    }
}

/// Create book request
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct CreateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub name: String,
    pub short_name: Option<String>,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub date_release: Option<NaiveDate>,
    #[validate(range(min = 1, message = "No of pages must be positive"))]
    pub pages: Option<i32>,
    pub out_of_print: Option<bool>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub reader_rating: Option<f64>,
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,
    #[serde(default)]
    pub author_ids: Vec<i32>,
    pub publisher_id: Option<i32>,
    pub category_id: Option<i32>,
}

/// Update book request (state changes go through the workflow endpoints)
#[derive(Debug, Clone, Default, Deserialize, Validate, ToSchema)]
pub struct UpdateBook {
    #[validate(length(min = 1, message = "Title is required"))]
    pub name: Option<String>,
    pub short_name: Option<String>,
    pub notes: Option<String>,
    pub description: Option<String>,
    pub date_release: Option<NaiveDate>,
    #[validate(range(min = 1, message = "No of pages must be positive"))]
    pub pages: Option<i32>,
    pub out_of_print: Option<bool>,
    #[validate(range(min = 0.0, max = 5.0))]
    pub reader_rating: Option<f64>,
    pub cost_price: Option<Decimal>,
    pub retail_price: Option<Decimal>,
    #[validate(length(equal = 3, message = "Currency must be an ISO 4217 code"))]
    pub currency: Option<String>,
    pub author_ids: Option<Vec<i32>>,
    pub publisher_id: Option<i32>,
    pub category_id: Option<i32>,
}

/// Book with resolved relations and computed fields, for display
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct BookDetails {
    #[serde(flatten)]
    pub book: Book,
    pub display_name: String,
    pub age_days: i64,
    pub authors: Vec<PartnerShort>,
    pub publisher: Option<PartnerShort>,
    pub publisher_city: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_STATES: [BookState; 4] = [
        BookState::Draft,
        BookState::Available,
        BookState::Borrowed,
        BookState::Lost,
    ];

    fn book(state: BookState) -> Book {
        Book {
            id: 1,
            name: "Dune".to_string(),
            short_name: None,
            notes: None,
            description: None,
            state,
            date_release: NaiveDate::from_ymd_opt(1965, 8, 1),
            date_updated: None,
            pages: Some(412),
            out_of_print: false,
            reader_rating: None,
            cost_price: None,
            retail_price: None,
            currency: None,
            publisher_id: None,
            category_id: None,
            active: true,
            author_ids: vec![],
        }
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_allowed_transitions_succeed() {
        for &(from, to) in ALLOWED_TRANSITIONS {
            let mut b = book(from);
            assert!(b.change_state(to).is_ok(), "{from} -> {to}");
            assert_eq!(b.state, to);
        }
    }

    #[test]
    fn test_disallowed_transitions_leave_state() {
        for from in ALL_STATES {
            for to in ALL_STATES {
                if is_allowed_transition(from, to) {
                    continue;
                }
                let mut b = book(from);
                let err = b.change_state(to).unwrap_err();
                assert_eq!(err, TransitionError { from, to });
                assert_eq!(b.state, from);
            }
        }
    }

    #[test]
    fn test_same_state_is_not_a_transition() {
        for state in ALL_STATES {
            assert!(!is_allowed_transition(state, state));
        }
    }

    #[test]
    fn test_every_state_reachable_from_available() {
        let mut b = book(BookState::Available);
        assert!(b.make_lost().is_ok());
        assert!(b.make_available().is_ok());
        assert!(b.make_borrowed().is_ok());
        assert!(b.make_lost().is_ok());
        assert_eq!(b.state, BookState::Lost);
    }

    #[test]
    fn test_draft_cannot_be_borrowed() {
        let mut b = book(BookState::Draft);
        let err = b.make_borrowed().unwrap_err();
        assert_eq!(err.to_string(), "Moving from draft to borrowed is not allowed");
        assert_eq!(b.state, BookState::Draft);
    }

    #[test]
    fn test_display_name() {
        let mut b = book(BookState::Draft);
        assert_eq!(b.display_name(), "Dune (1965-08-01)");
        b.date_release = None;
        assert_eq!(b.display_name(), "Dune (None)");
    }

    #[test]
    fn test_age_days_and_inverse() {
        let today = date(2024, 1, 11);
        let mut b = book(BookState::Available);
        b.date_release = Some(date(2024, 1, 1));
        assert_eq!(b.age_days(today), 10);

        b.set_age_days(30, today);
        assert_eq!(b.date_release, Some(date(2023, 12, 12)));
        assert_eq!(b.age_days(today), 30);

        b.date_release = None;
        assert_eq!(b.age_days(today), 0);
        b.set_age_days(5, today);
        assert_eq!(b.date_release, None);
    }

    #[test]
    fn test_age_filter_flips_operator() {
        let today = date(2024, 1, 11);
        let filter = AgeFilter { op: CompareOp::Gt, days: 10 }.to_release_filter(today);
        assert_eq!(filter.op, CompareOp::Lt);
        assert_eq!(filter.date, date(2024, 1, 1));

        assert!(filter.matches(Some(date(2023, 12, 31))));
        assert!(!filter.matches(Some(date(2024, 1, 1))));
        assert!(!filter.matches(None));

        let exact = AgeFilter { op: CompareOp::Eq, days: 10 }.to_release_filter(today);
        assert_eq!(exact.op, CompareOp::Eq);
        assert!(exact.matches(Some(date(2024, 1, 1))));
    }

    #[test]
    fn test_release_date_check() {
        let today = date(2024, 1, 11);
        assert!(check_release_date(Some(today), today).is_ok());
        assert!(check_release_date(None, today).is_ok());
        assert!(matches!(
            check_release_date(Some(date(2024, 1, 12)), today),
            Err(AppError::Validation(_))
        ));
    }

    #[test]
    fn test_create_book_validation() {
        let ok = CreateBook {
            name: "Dune".to_string(),
            pages: Some(1),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());

        let zero_pages = CreateBook {
            name: "Dune".to_string(),
            pages: Some(0),
            ..Default::default()
        };
        assert!(zero_pages.validate().is_err());

        let no_title = CreateBook::default();
        assert!(no_title.validate().is_err());
    }

    #[test]
    fn test_state_text_roundtrip() {
        for state in ALL_STATES {
            assert_eq!(state.as_str().parse::<BookState>(), Ok(state));
        }
        assert!("returned".parse::<BookState>().is_err());
    }
}
