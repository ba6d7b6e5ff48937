//! Borrowing (loan ledger entry) model and related types

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::{IntoParams, ToSchema};

use super::book::{Book, Cover};
use crate::error::{AppError, AppResult};

pub const OUT_OF_STOCK: &str = "Book is out of stock.";
pub const ALREADY_RETURNED: &str = "Borrowing has already been returned.";

/// Lifecycle state of a borrowing. `Returned` is terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BorrowingStatus {
    Active,
    Returned,
}

/// Ledger row as stored
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
pub struct Borrowing {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book_id: i32,
    pub user_id: i32,
}

impl Borrowing {
    pub fn status(&self) -> BorrowingStatus {
        if self.actual_return_date.is_some() {
            BorrowingStatus::Returned
        } else {
            BorrowingStatus::Active
        }
    }

    pub fn is_active(&self) -> bool {
        self.status() == BorrowingStatus::Active
    }

    /// ACTIVE -> RETURNED. Any other transition is rejected.
    pub fn mark_returned(&mut self, on: NaiveDate) -> AppResult<()> {
        match self.status() {
            BorrowingStatus::Returned => Err(AppError::Conflict(ALREADY_RETURNED.to_string())),
            BorrowingStatus::Active => {
                self.actual_return_date = Some(on);
                Ok(())
            }
        }
    }

    pub fn with_book(self, book: Book) -> BorrowingDetails {
        BorrowingDetails {
            id: self.id,
            borrow_date: self.borrow_date,
            expected_return_date: self.expected_return_date,
            actual_return_date: self.actual_return_date,
            is_active: self.actual_return_date.is_none(),
            book,
            user: self.user_id,
        }
    }
}

/// Borrowing with its book, as returned by the API
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct BorrowingDetails {
    pub id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
    pub actual_return_date: Option<NaiveDate>,
    pub book: Book,
    /// Owner user ID
    pub user: i32,
    pub is_active: bool,
}

/// Flat row for ledger queries joined with books
#[derive(Debug, Clone, FromRow)]
pub struct BorrowingDetailsRow {
    id: i32,
    borrow_date: NaiveDate,
    expected_return_date: NaiveDate,
    actual_return_date: Option<NaiveDate>,
    user_id: i32,
    book_id: i32,
    book_title: String,
    book_author: String,
    book_cover: Cover,
    book_inventory: i32,
    book_daily_fee: rust_decimal::Decimal,
}

impl From<BorrowingDetailsRow> for BorrowingDetails {
    fn from(row: BorrowingDetailsRow) -> Self {
        BorrowingDetails {
            id: row.id,
            borrow_date: row.borrow_date,
            expected_return_date: row.expected_return_date,
            actual_return_date: row.actual_return_date,
            is_active: row.actual_return_date.is_none(),
            book: Book {
                id: row.book_id,
                title: row.book_title,
                author: row.book_author,
                cover: row.book_cover,
                inventory: row.book_inventory,
                daily_fee: row.book_daily_fee,
            },
            user: row.user_id,
        }
    }
}

/// Create borrowing request
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct CreateBorrowing {
    /// Book ID
    pub book: i32,
    /// Date the book is due back (YYYY-MM-DD)
    pub expected_return_date: NaiveDate,
}

/// Validated insert for the ledger
#[derive(Debug, Clone, PartialEq)]
pub struct NewBorrowing {
    pub book_id: i32,
    pub user_id: i32,
    pub borrow_date: NaiveDate,
    pub expected_return_date: NaiveDate,
}

/// Borrowing list query parameters
#[derive(Debug, Clone, Default, Deserialize, IntoParams, ToSchema)]
#[into_params(parameter_in = Query)]
pub struct BorrowingQuery {
    /// Restrict to one owner (staff only)
    pub user_id: Option<String>,
    /// `true` for active borrowings, `false` for returned ones (staff only)
    pub is_active: Option<String>,
}

/// Effective list filter, after ownership scoping
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BorrowingFilter {
    pub user_id: Option<i32>,
    pub active: Option<bool>,
}

impl BorrowingFilter {
    pub fn matches(&self, borrowing: &Borrowing) -> bool {
        self.user_id.map_or(true, |id| borrowing.user_id == id)
            && self.active.map_or(true, |active| borrowing.is_active() == active)
    }
}

/// Parse the `user_id` query filter. An empty value means "no filter".
pub fn parse_user_filter(raw: Option<&str>) -> AppResult<Option<i32>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    raw.parse()
        .map(Some)
        .map_err(|_| AppError::Validation(format!("Invalid user_id value: {}", raw)))
}

/// Parse the `is_active` query flag. An empty value means "no filter".
pub fn parse_active_flag(raw: Option<&str>) -> AppResult<Option<bool>> {
    let Some(raw) = raw.map(str::trim).filter(|s| !s.is_empty()) else {
        return Ok(None);
    };
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(Some(true)),
        "false" | "0" | "no" => Ok(Some(false)),
        _ => Err(AppError::Validation(format!("Invalid is_active value: {}", raw))),
    }
}
