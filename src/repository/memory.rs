//! In-process storage backend.
//!
//! All tables live behind one async mutex, so every operation (including the
//! two-row borrow and return mutations) sees and leaves a consistent state.

use std::collections::BTreeMap;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use tokio::sync::Mutex;

use super::{BookStore, BorrowingStore, UserStore};
use crate::{
    error::{AppError, AppResult},
    models::{
        book::{Book, BookInput},
        borrowing::{Borrowing, BorrowingDetails, BorrowingFilter, NewBorrowing, OUT_OF_STOCK},
        user::{NewUser, User, UserChanges},
    },
};

#[derive(Default)]
struct Tables {
    books: BTreeMap<i32, Book>,
    borrowings: BTreeMap<i32, Borrowing>,
    users: BTreeMap<i32, User>,
    last_book_id: i32,
    last_borrowing_id: i32,
    last_user_id: i32,
}

impl Tables {
    fn book(&self, id: i32) -> AppResult<&Book> {
        self.books
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))
    }

    fn details(&self, borrowing: &Borrowing) -> AppResult<BorrowingDetails> {
        let book = self.book(borrowing.book_id)?.clone();
        Ok(borrowing.clone().with_book(book))
    }

    fn email_taken(&self, email: &str, exclude_id: Option<i32>) -> bool {
        self.users
            .values()
            .any(|u| u.email.eq_ignore_ascii_case(email) && Some(u.id) != exclude_id)
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

#[async_trait]
impl BookStore for MemoryStore {
    async fn list(&self) -> AppResult<Vec<Book>> {
        let tables = self.tables.lock().await;
        Ok(tables.books.values().cloned().collect())
    }

    async fn get(&self, id: i32) -> AppResult<Book> {
        let tables = self.tables.lock().await;
        tables.book(id).cloned()
    }

    async fn create(&self, book: &BookInput) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;
        tables.last_book_id += 1;
        let created = Book {
            id: tables.last_book_id,
            title: book.title.clone(),
            author: book.author.clone(),
            cover: book.cover,
            inventory: book.inventory,
            daily_fee: book.daily_fee,
        };
        tables.books.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, book: &BookInput) -> AppResult<Book> {
        let mut tables = self.tables.lock().await;
        let existing = tables
            .books
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", id)))?;

        existing.title = book.title.clone();
        existing.author = book.author.clone();
        existing.cover = book.cover;
        existing.inventory = book.inventory;
        existing.daily_fee = book.daily_fee;
        Ok(existing.clone())
    }

    async fn delete(&self, id: i32) -> AppResult<()> {
        let mut tables = self.tables.lock().await;
        if tables.books.remove(&id).is_none() {
            return Err(AppError::NotFound(format!("Book with id {} not found", id)));
        }
        tables.borrowings.retain(|_, b| b.book_id != id);
        Ok(())
    }
}

#[async_trait]
impl BorrowingStore for MemoryStore {
    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<BorrowingDetails>> {
        let tables = self.tables.lock().await;
        tables
            .borrowings
            .values()
            .filter(|b| filter.matches(b))
            .map(|b| tables.details(b))
            .collect()
    }

    async fn get(&self, id: i32) -> AppResult<BorrowingDetails> {
        let tables = self.tables.lock().await;
        let borrowing = tables
            .borrowings
            .get(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))?;
        tables.details(borrowing)
    }

    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<BorrowingDetails> {
        let mut tables = self.tables.lock().await;

        let book = tables
            .books
            .get_mut(&borrowing.book_id)
            .ok_or_else(|| AppError::NotFound(format!("Book with id {} not found", borrowing.book_id)))?;
        if book.inventory <= 0 {
            return Err(AppError::Validation(OUT_OF_STOCK.to_string()));
        }
        book.inventory -= 1;

        tables.last_borrowing_id += 1;
        let created = Borrowing {
            id: tables.last_borrowing_id,
            borrow_date: borrowing.borrow_date,
            expected_return_date: borrowing.expected_return_date,
            actual_return_date: None,
            book_id: borrowing.book_id,
            user_id: borrowing.user_id,
        };
        tables.borrowings.insert(created.id, created.clone());
        tables.details(&created)
    }

    async fn mark_returned(&self, id: i32, on: NaiveDate) -> AppResult<BorrowingDetails> {
        let mut tables = self.tables.lock().await;

        let borrowing = tables
            .borrowings
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))?;
        borrowing.mark_returned(on)?;
        let returned = borrowing.clone();

        if let Some(book) = tables.books.get_mut(&returned.book_id) {
            book.inventory += 1;
        }
        tables.details(&returned)
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn get_by_id(&self, id: i32) -> AppResult<User> {
        let tables = self.tables.lock().await;
        tables
            .users
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))
    }

    async fn get_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let tables = self.tables.lock().await;
        Ok(tables
            .users
            .values()
            .find(|u| u.email.eq_ignore_ascii_case(email))
            .cloned())
    }

    async fn email_exists(&self, email: &str, exclude_id: Option<i32>) -> AppResult<bool> {
        let tables = self.tables.lock().await;
        Ok(tables.email_taken(email, exclude_id))
    }

    async fn create(&self, user: &NewUser) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        // Mirrors the unique index on LOWER(email)
        if tables.email_taken(&user.email, None) {
            return Err(AppError::Validation(
                "user with this email already exists.".to_string(),
            ));
        }

        tables.last_user_id += 1;
        let created = User {
            id: tables.last_user_id,
            email: user.email.clone(),
            password: user.password_hash.clone(),
            is_staff: user.is_staff,
            date_joined: Utc::now(),
        };
        tables.users.insert(created.id, created.clone());
        Ok(created)
    }

    async fn update(&self, id: i32, changes: &UserChanges) -> AppResult<User> {
        let mut tables = self.tables.lock().await;
        let user = tables
            .users
            .get_mut(&id)
            .ok_or_else(|| AppError::NotFound(format!("User with id {} not found", id)))?;

        if let Some(ref email) = changes.email {
            user.email = email.clone();
        }
        if let Some(ref hash) = changes.password_hash {
            user.password = hash.clone();
        }
        Ok(user.clone())
    }
}
