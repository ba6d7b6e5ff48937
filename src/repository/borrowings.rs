//! Borrowings repository for database operations
//!
//! Both state changes run in a single transaction. The inventory decrement is
//! conditional (`inventory > 0`), so the row lock taken by the UPDATE is what
//! serializes concurrent borrows of the last copy.

use async_trait::async_trait;
use chrono::NaiveDate;
use sqlx::{PgExecutor, Pool, Postgres};

use super::BorrowingStore;
use crate::{
    error::{AppError, AppResult},
    models::borrowing::{
        BorrowingDetails, BorrowingDetailsRow, BorrowingFilter, NewBorrowing, ALREADY_RETURNED,
        OUT_OF_STOCK,
    },
};

const DETAILS_SELECT: &str = r#"
    SELECT br.id, br.borrow_date, br.expected_return_date, br.actual_return_date, br.user_id,
           b.id AS book_id, b.title AS book_title, b.author AS book_author,
           b.cover AS book_cover, b.inventory AS book_inventory, b.daily_fee AS book_daily_fee
    FROM borrowings br
    JOIN books b ON b.id = br.book_id
"#;

#[derive(Clone)]
pub struct BorrowingsRepository {
    pool: Pool<Postgres>,
}

impl BorrowingsRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_details<'e, E>(executor: E, id: i32) -> AppResult<BorrowingDetails>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, BorrowingDetailsRow>(&format!("{} WHERE br.id = $1", DETAILS_SELECT))
            .bind(id)
            .fetch_optional(executor)
            .await?
            .map(BorrowingDetails::from)
            .ok_or_else(|| AppError::NotFound(format!("Borrowing with id {} not found", id)))
    }
}

#[async_trait]
impl BorrowingStore for BorrowingsRepository {
    async fn list(&self, filter: &BorrowingFilter) -> AppResult<Vec<BorrowingDetails>> {
        let rows = sqlx::query_as::<_, BorrowingDetailsRow>(&format!(
            r#"{}
            WHERE ($1::INTEGER IS NULL OR br.user_id = $1)
              AND ($2::BOOLEAN IS NULL OR (br.actual_return_date IS NULL) = $2)
            ORDER BY br.id
            "#,
            DETAILS_SELECT
        ))
        .bind(filter.user_id)
        .bind(filter.active)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(BorrowingDetails::from).collect())
    }

    async fn get(&self, id: i32) -> AppResult<BorrowingDetails> {
        Self::fetch_details(&self.pool, id).await
    }

    async fn create(&self, borrowing: &NewBorrowing) -> AppResult<BorrowingDetails> {
        let mut tx = self.pool.begin().await?;

        let decremented: Option<i32> = sqlx::query_scalar(
            "UPDATE books SET inventory = inventory - 1 WHERE id = $1 AND inventory > 0 RETURNING id",
        )
        .bind(borrowing.book_id)
        .fetch_optional(&mut *tx)
        .await?;

        if decremented.is_none() {
            let exists: bool = sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM books WHERE id = $1)")
                .bind(borrowing.book_id)
                .fetch_one(&mut *tx)
                .await?;

            return Err(if exists {
                AppError::Validation(OUT_OF_STOCK.to_string())
            } else {
                AppError::NotFound(format!("Book with id {} not found", borrowing.book_id))
            });
        }

        let id: i32 = sqlx::query_scalar(
            r#"
            INSERT INTO borrowings (borrow_date, expected_return_date, book_id, user_id)
            VALUES ($1, $2, $3, $4)
            RETURNING id
            "#,
        )
        .bind(borrowing.borrow_date)
        .bind(borrowing.expected_return_date)
        .bind(borrowing.book_id)
        .bind(borrowing.user_id)
        .fetch_one(&mut *tx)
        .await?;

        let details = Self::fetch_details(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(details)
    }

    async fn mark_returned(&self, id: i32, on: NaiveDate) -> AppResult<BorrowingDetails> {
        let mut tx = self.pool.begin().await?;

        let book_id: Option<i32> = sqlx::query_scalar(
            r#"
            UPDATE borrowings SET actual_return_date = $2
            WHERE id = $1 AND actual_return_date IS NULL
            RETURNING book_id
            "#,
        )
        .bind(id)
        .bind(on)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(book_id) = book_id else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM borrowings WHERE id = $1)")
                    .bind(id)
                    .fetch_one(&mut *tx)
                    .await?;

            return Err(if exists {
                AppError::Conflict(ALREADY_RETURNED.to_string())
            } else {
                AppError::NotFound(format!("Borrowing with id {} not found", id))
            });
        };

        sqlx::query("UPDATE books SET inventory = inventory + 1 WHERE id = $1")
            .bind(book_id)
            .execute(&mut *tx)
            .await?;

        let details = Self::fetch_details(&mut *tx, id).await?;
        tx.commit().await?;

        Ok(details)
    }
}
