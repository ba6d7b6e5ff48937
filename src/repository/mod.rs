//! Repository layer: storage traits and their backends

pub mod books;
pub mod borrowings;
pub mod memory;
pub mod users;

use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{Pool, Postgres};

use crate::{
    error::AppResult,
    models::{
        book::{Book, BookInput},
        borrowing::{BorrowingDetails, BorrowingFilter, NewBorrowing},
        user::{NewUser, User, UserChanges},
    },
};

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BookStore: Send + Sync {
    async fn list(&self) -> AppResult<Vec<Book>>;
    async fn get(&self, id: i32) -> AppResult<Book>;
    async fn create(&self, book: &BookInput) -> AppResult<Book>;
    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book>;
    /// Removes the book and, by cascade, its borrowings
    async fn delete(&self, id: i32) -> AppResult<()>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait BorrowingStore: Send + Sync {
    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<BorrowingDetails>>;
    async fn get(&self, id: i32) -> AppResult<BorrowingDetails>;
    /// Takes one copy out of inventory and records the loan, atomically.
    /// Fails with a validation error when no copy is left.
    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<BorrowingDetails>;
    /// Sets the return date and puts the copy back, atomically.
    /// Fails with a conflict when the borrowing was already returned.
    async fn mark_returned(&self, id: i32, on: NaiveDate) -> AppResult<BorrowingDetails>;
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UserStore: Send + Sync {
    async fn get_by_id(&self, id: i32) -> AppResult<User>;
    /// Case-insensitive lookup
    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>>;
    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool>;
    async fn create(&self, user: &NewUser) -> AppResult<User>;
    async fn update(&self, id: i32, changes: &UserChanges) -> AppResult<User>;
}

/// Main repository struct holding one store per aggregate
#[derive(Clone)]
pub struct Repository {
    pub books: Arc<dyn BookStore>,
    pub borrowings: Arc<dyn BorrowingStore>,
    pub users: Arc<dyn UserStore>,
}

impl Repository {
    /// PostgreSQL-backed repository sharing one connection pool
    pub fn postgres(pool: Pool<Postgres>) -> Self {
        Self {
            books: Arc::new(books::BooksRepository::new(pool.clone())),
            borrowings: Arc::new(borrowings::BorrowingsRepository::new(pool.clone())),
            users: Arc::new(users::UsersRepository::new(pool)),
        }
    }

    /// In-process repository; all stores share the same tables
    pub fn memory() -> Self {
        let store = Arc::new(memory::MemoryStore::default());
        Self {
            books: store.clone(),
            borrowings: store.clone(),
            users: store,
        }
    }
}
