//! API handlers for the lending REST endpoints

pub mod books;
pub mod borrowings;
pub mod health;
pub mod openapi;
pub mod users;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequestParts},
    http::request::Parts,
    routing::{get, post},
    Json, RequestPartsExt, Router,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use tower_http::{
    cors::{Any, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    error::{AppError, AppResult},
    models::user::TokenKind,
    policy::AccessPolicy,
    AppState,
};

/// Access policy of the caller, resolved from the bearer token.
/// Requests without a bearer token are anonymous; a bad token is a 401.
pub struct Caller(pub AccessPolicy);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let bearer = parts
            .extract::<Option<TypedHeader<Authorization<Bearer>>>>()
            .await
            .map_err(|_| AppError::Authentication("Invalid authorization header".to_string()))?;

        let Some(TypedHeader(Authorization(bearer))) = bearer else {
            return Ok(Caller(AccessPolicy::anonymous()));
        };

        let claims = state
            .services
            .users
            .decode(bearer.token(), TokenKind::Access)?;

        Ok(Caller(AccessPolicy::for_claims(&claims, &state.config.lending)))
    }
}

/// JSON body whose rejection is reported only after the access check,
/// so an anonymous caller gets 401 even when the body is malformed.
pub type JsonBody<T> = Result<Json<T>, JsonRejection>;

pub fn json_body<T>(body: JsonBody<T>) -> AppResult<T> {
    body.map(|Json(value)| value)
        .map_err(|rejection| AppError::Validation(rejection.body_text()))
}

/// Create the application router with all routes
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api = Router::new()
        // Catalog
        .route("/books/", get(books::list_books).post(books::create_book))
        .route(
            "/books/:id/",
            get(books::get_book)
                .put(books::replace_book)
                .patch(books::patch_book)
                .delete(books::delete_book),
        )
        // Borrowing ledger
        .route(
            "/borrowings/",
            get(borrowings::list_borrowings).post(borrowings::create_borrowing),
        )
        .route("/borrowings/:id/", get(borrowings::get_borrowing))
        .route("/borrowings/:id/return/", post(borrowings::return_borrowing))
        // Accounts
        .route("/users/", post(users::register))
        .route(
            "/users/me/",
            get(users::me).put(users::update_me).patch(users::update_me),
        )
        .route("/users/token/", post(users::issue_token))
        .route("/users/token/refresh/", post(users::refresh_token))
        .route("/users/token/verify/", post(users::verify_token))
        .with_state(state.clone());

    let health = Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .with_state(state);

    Router::new()
        .nest("/api", api)
        .merge(health)
        .merge(openapi::create_openapi_router())
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
