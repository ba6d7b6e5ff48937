//! Library lending server
//!
//! REST JSON API over a book catalog and a borrowing ledger: members borrow
//! copies of a book within a lending window, staff record their return.

use std::sync::Arc;

pub mod api;
pub mod config;
pub mod error;
pub mod models;
pub mod policy;
pub mod repository;
pub mod services;

pub use config::AppConfig;
pub use error::{AppError, AppResult};

use repository::Repository;
use services::Services;

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub services: Arc<Services>,
}

impl AppState {
    /// Wire services over the given storage and create the bootstrap
    /// staff account when one is configured.
    pub async fn build(config: AppConfig, repository: Repository) -> AppResult<Self> {
        let services = Services::new(repository, &config);
        services.users.ensure_admin(&config.bootstrap).await?;

        Ok(Self {
            config: Arc::new(config),
            services: Arc::new(services),
        })
    }
}
