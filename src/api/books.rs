//! Book (catalog) endpoints

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::book::{Book, BookInput, BookPatch, BookShort},
    policy::Capability,
    AppState,
};

use super::{json_body, Caller, JsonBody};

/// List all books
#[utoipa::path(
    get,
    path = "/books/",
    tag = "books",
    responses(
        (status = 200, description = "List of books", body = Vec<BookShort>)
    )
)]
pub async fn list_books(
    State(state): State<AppState>,
    Caller(policy): Caller,
) -> AppResult<Json<Vec<BookShort>>> {
    policy.require(Capability::ReadCatalog)?;

    let books = state.services.catalog.list_books().await?;
    Ok(Json(books))
}

/// Get book details by ID
#[utoipa::path(
    get,
    path = "/books/{id}/",
    tag = "books",
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 200, description = "Book details", body = Book),
        (status = 404, description = "Book not found")
    )
)]
pub async fn get_book(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
) -> AppResult<Json<Book>> {
    policy.require(Capability::ReadCatalog)?;

    let book = state.services.catalog.get_book(id).await?;
    Ok(Json(book))
}

/// Add a book to the catalog
#[utoipa::path(
    post,
    path = "/books/",
    tag = "books",
    security(("bearer_auth" = [])),
    request_body = BookInput,
    responses(
        (status = 201, description = "Book created", body = Book),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Staff privileges required")
    )
)]
pub async fn create_book(
    State(state): State<AppState>,
    Caller(policy): Caller,
    book: JsonBody<BookInput>,
) -> AppResult<(StatusCode, Json<Book>)> {
    policy.require(Capability::WriteCatalog)?;

    let created = state.services.catalog.create_book(json_body(book)?).await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Replace a book
#[utoipa::path(
    put,
    path = "/books/{id}/",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookInput,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn replace_book(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
    book: JsonBody<BookInput>,
) -> AppResult<Json<Book>> {
    policy.require(Capability::WriteCatalog)?;

    let updated = state.services.catalog.replace_book(id, json_body(book)?).await?;
    Ok(Json(updated))
}

/// Partially update a book
#[utoipa::path(
    patch,
    path = "/books/{id}/",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    request_body = BookPatch,
    responses(
        (status = 200, description = "Book updated", body = Book),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn patch_book(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
    patch: JsonBody<BookPatch>,
) -> AppResult<Json<Book>> {
    policy.require(Capability::WriteCatalog)?;

    let updated = state.services.catalog.patch_book(id, json_body(patch)?).await?;
    Ok(Json(updated))
}

/// Delete a book and its borrowings
#[utoipa::path(
    delete,
    path = "/books/{id}/",
    tag = "books",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Book ID")
    ),
    responses(
        (status = 204, description = "Book deleted"),
        (status = 403, description = "Staff privileges required"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn delete_book(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
) -> AppResult<StatusCode> {
    policy.require(Capability::WriteCatalog)?;

    state.services.catalog.delete_book(id).await?;
    Ok(StatusCode::NO_CONTENT)
}
