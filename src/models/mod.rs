//! Data models for the lending server

pub mod book;
pub mod borrowing;
pub mod user;

// Re-export commonly used types
pub use book::{Book, BookShort, Cover};
pub use borrowing::{Borrowing, BorrowingDetails};
pub use user::{User, UserClaims};
