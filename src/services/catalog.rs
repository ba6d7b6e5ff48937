//! Catalog management service

use std::sync::Arc;

use validator::Validate;

use crate::{
    error::AppResult,
    models::book::{Book, BookInput, BookPatch, BookShort},
    repository::BookStore,
};

#[derive(Clone)]
pub struct CatalogService {
    books: Arc<dyn BookStore>,
}

impl CatalogService {
    pub fn new(books: Arc<dyn BookStore>) -> Self {
        Self { books }
    }

    pub async fn list_books(&self) -> AppResult<Vec<BookShort>> {
        let books = self.books.list().await?;
        Ok(books.into_iter().map(BookShort::from).collect())
    }

    pub async fn get_book(&self, id: i32) -> AppResult<Book> {
        self.books.get(id).await
    }

    pub async fn create_book(&self, book: BookInput) -> AppResult<Book> {
        book.validate()?;
        let created = self.books.create(&book.normalized()).await?;
        tracing::info!(book_id = created.id, "Book added to catalog");
        Ok(created)
    }

    /// Full replacement (PUT)
    pub async fn replace_book(&self, id: i32, book: BookInput) -> AppResult<Book> {
        book.validate()?;
        self.books.update(id, &book.normalized()).await
    }

    /// Partial update (PATCH)
    pub async fn patch_book(&self, id: i32, patch: BookPatch) -> AppResult<Book> {
        patch.validate()?;
        let current = self.books.get(id).await?;
        self.books.update(id, &patch.apply(&current).normalized()).await
    }

    pub async fn delete_book(&self, id: i32) -> AppResult<()> {
        self.books.delete(id).await?;
        tracing::info!(book_id = id, "Book removed from catalog");
        Ok(())
    }
}
