//! Borrowing lifecycle service

use std::sync::Arc;

use chrono::{Duration, NaiveDate, Utc};

use crate::{
    config::LendingConfig,
    error::{AppError, AppResult},
    models::borrowing::{BorrowingDetails, BorrowingQuery, CreateBorrowing, NewBorrowing, OUT_OF_STOCK},
    policy::AccessPolicy,
    repository::{BookStore, BorrowingStore},
};

/// Allowed range of expected return dates, in days after the borrow date
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LendingWindow {
    pub min_days: i64,
    pub max_days: i64,
}

impl LendingWindow {
    pub fn new(config: &LendingConfig) -> Self {
        Self {
            min_days: config.min_days,
            max_days: config.max_days,
        }
    }

    pub fn earliest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.min_days)
    }

    pub fn latest(&self, today: NaiveDate) -> NaiveDate {
        today + Duration::days(self.max_days)
    }

    pub fn check(&self, today: NaiveDate, expected_return_date: NaiveDate) -> AppResult<()> {
        let earliest = self.earliest(today);
        if expected_return_date < earliest {
            return Err(AppError::Validation(format!(
                "Ensure expected_return_date is greater than or equal to {}.",
                earliest
            )));
        }
        let latest = self.latest(today);
        if expected_return_date > latest {
            return Err(AppError::Validation(format!(
                "Ensure expected_return_date is less than or equal to {}.",
                latest
            )));
        }
        Ok(())
    }
}

impl Default for LendingWindow {
    fn default() -> Self {
        Self::new(&LendingConfig::default())
    }
}

#[derive(Clone)]
pub struct BorrowingsService {
    borrowings: Arc<dyn BorrowingStore>,
    books: Arc<dyn BookStore>,
    window: LendingWindow,
}

impl BorrowingsService {
    pub fn new(
        borrowings: Arc<dyn BorrowingStore>,
        books: Arc<dyn BookStore>,
        window: LendingWindow,
    ) -> Self {
        Self {
            borrowings,
            books,
            window,
        }
    }

    fn today() -> NaiveDate {
        Utc::now().date_naive()
    }

    /// List the borrowings visible to the caller
    pub async fn list(
        &self,
        policy: &AccessPolicy,
        query: &BorrowingQuery,
    ) -> AppResult<Vec<BorrowingDetails>> {
        let filter = policy.scope(query)?;
        self.borrowings.list(&filter).await
    }

    /// Get one borrowing; rows owned by someone else are reported as missing
    pub async fn get(&self, policy: &AccessPolicy, id: i32) -> AppResult<BorrowingDetails> {
        let borrowing = self.borrowings.get(id).await?;
        if !policy.can_see(&borrowing) {
            return Err(AppError::NotFound(format!("Borrowing with id {} not found", id)));
        }
        Ok(borrowing)
    }

    /// Borrow a book on behalf of the caller
    pub async fn create(
        &self,
        policy: &AccessPolicy,
        request: CreateBorrowing,
    ) -> AppResult<BorrowingDetails> {
        self.create_on(Self::today(), policy, request).await
    }

    pub async fn create_on(
        &self,
        today: NaiveDate,
        policy: &AccessPolicy,
        request: CreateBorrowing,
    ) -> AppResult<BorrowingDetails> {
        let user_id = policy.user_id()?;

        let book = self.books.get(request.book).await?;
        if book.inventory <= 0 {
            return Err(AppError::Validation(OUT_OF_STOCK.to_string()));
        }
        self.window.check(today, request.expected_return_date)?;

        let created = self
            .borrowings
            .create(&NewBorrowing {
                book_id: book.id,
                user_id,
                borrow_date: today,
                expected_return_date: request.expected_return_date,
            })
            .await?;

        tracing::info!(
            borrowing_id = created.id,
            book_id = created.book.id,
            user_id,
            inventory = created.book.inventory,
            "Book borrowed"
        );
        Ok(created)
    }

    /// Return a borrowing. A second return is always rejected.
    pub async fn return_borrowing(
        &self,
        policy: &AccessPolicy,
        id: i32,
    ) -> AppResult<BorrowingDetails> {
        self.return_on(Self::today(), policy, id).await
    }

    pub async fn return_on(
        &self,
        today: NaiveDate,
        policy: &AccessPolicy,
        id: i32,
    ) -> AppResult<BorrowingDetails> {
        // Ownership check before the state change
        self.get(policy, id).await?;

        let returned = self.borrowings.mark_returned(id, today).await?;

        tracing::info!(
            borrowing_id = returned.id,
            book_id = returned.book.id,
            user_id = returned.user,
            inventory = returned.book.inventory,
            "Book returned"
        );
        Ok(returned)
    }
}
