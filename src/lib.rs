//! Shelfmark library inventory server
//!
//! Tracks a library's books through their lifecycle (draft, available,
//! borrowed, lost), records rentals against borrowers, and serves both a
//! REST JSON API and plain HTML listings.

use std::sync::Arc;

pub mod api;
pub mod clock;
pub mod config;
pub mod error;
pub mod models;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<services::Services>,
}
