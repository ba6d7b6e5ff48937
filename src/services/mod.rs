//! Business logic services

pub mod borrowings;
pub mod catalog;
pub mod users;

use crate::{config::AppConfig, repository::Repository};

/// Container for all services
#[derive(Clone)]
pub struct Services {
    pub catalog: catalog::CatalogService,
    pub borrowings: borrowings::BorrowingsService,
    pub users: users::UsersService,
}

impl Services {
    /// Create all services with the given repository
    pub fn new(repository: Repository, config: &AppConfig) -> Self {
        Self {
            catalog: catalog::CatalogService::new(repository.books.clone()),
            borrowings: borrowings::BorrowingsService::new(
                repository.borrowings.clone(),
                repository.books.clone(),
                borrowings::LendingWindow::new(&config.lending),
            ),
            users: users::UsersService::new(repository.users, config.auth.clone()),
        }
    }
}
