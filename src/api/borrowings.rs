//! Borrowing ledger endpoints

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};

use crate::{
    error::AppResult,
    models::borrowing::{BorrowingDetails, BorrowingQuery, CreateBorrowing},
    policy::Capability,
    AppState,
};

use super::{json_body, Caller, JsonBody};

/// List borrowings. Non-staff callers only ever see their own.
#[utoipa::path(
    get,
    path = "/borrowings/",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(BorrowingQuery),
    responses(
        (status = 200, description = "Borrowings visible to the caller", body = Vec<BorrowingDetails>),
        (status = 400, description = "Invalid filter"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn list_borrowings(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Query(query): Query<BorrowingQuery>,
) -> AppResult<Json<Vec<BorrowingDetails>>> {
    policy.require(Capability::ReadBorrowings)?;

    let borrowings = state.services.borrowings.list(&policy, &query).await?;
    Ok(Json(borrowings))
}

/// Get borrowing details by ID
#[utoipa::path(
    get,
    path = "/borrowings/{id}/",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Borrowing details", body = BorrowingDetails),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn get_borrowing(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingDetails>> {
    policy.require(Capability::ReadBorrowings)?;

    let borrowing = state.services.borrowings.get(&policy, id).await?;
    Ok(Json(borrowing))
}

/// Borrow a book
#[utoipa::path(
    post,
    path = "/borrowings/",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    request_body = CreateBorrowing,
    responses(
        (status = 201, description = "Borrowing created", body = BorrowingDetails),
        (status = 400, description = "Book out of stock or return date outside the lending window"),
        (status = 401, description = "Not authenticated"),
        (status = 404, description = "Book not found")
    )
)]
pub async fn create_borrowing(
    State(state): State<AppState>,
    Caller(policy): Caller,
    request: JsonBody<CreateBorrowing>,
) -> AppResult<(StatusCode, Json<BorrowingDetails>)> {
    policy.require(Capability::CreateBorrowing)?;

    let created = state
        .services
        .borrowings
        .create(&policy, json_body(request)?)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Return a borrowed book
#[utoipa::path(
    post,
    path = "/borrowings/{id}/return/",
    tag = "borrowings",
    security(("bearer_auth" = [])),
    params(
        ("id" = i32, Path, description = "Borrowing ID")
    ),
    responses(
        (status = 200, description = "Book returned", body = BorrowingDetails),
        (status = 400, description = "Borrowing has already been returned"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Not allowed to return borrowings"),
        (status = 404, description = "Borrowing not found")
    )
)]
pub async fn return_borrowing(
    State(state): State<AppState>,
    Caller(policy): Caller,
    Path(id): Path<i32>,
) -> AppResult<Json<BorrowingDetails>> {
    policy.require(Capability::ReturnBorrowing)?;

    let returned = state
        .services
        .borrowings
        .return_borrowing(&policy, id)
        .await?;
    Ok(Json(returned))
}
