//! OpenAPI documentation

use axum::Router;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use crate::api::{books, borrowings, health, users};

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Library Lending API",
        version = "0.3.0",
        description = "Book catalog, borrowing ledger and loan lifecycle"
    ),
    servers(
        (url = "/api", description = "API")
    ),
    paths(
        // Books
        books::list_books,
        books::get_book,
        books::create_book,
        books::replace_book,
        books::patch_book,
        books::delete_book,
        // Borrowings
        borrowings::list_borrowings,
        borrowings::get_borrowing,
        borrowings::create_borrowing,
        borrowings::return_borrowing,
        // Users
        users::register,
        users::me,
        users::update_me,
        users::issue_token,
        users::refresh_token,
        users::verify_token,
        // Health
        health::health_check,
        health::readiness_check,
    ),
    components(
        schemas(
            // Books
            crate::models::book::Book,
            crate::models::book::BookShort,
            crate::models::book::BookInput,
            crate::models::book::BookPatch,
            crate::models::book::Cover,
            // Borrowings
            crate::models::borrowing::BorrowingDetails,
            crate::models::borrowing::CreateBorrowing,
            // Users
            crate::models::user::User,
            crate::models::user::RegisterUser,
            crate::models::user::UpdateProfile,
            crate::models::user::TokenRequest,
            crate::models::user::TokenPair,
            crate::models::user::RefreshRequest,
            crate::models::user::AccessToken,
            crate::models::user::VerifyRequest,
            // Health
            health::HealthResponse,
            health::ReadinessResponse,
            // Errors
            crate::error::ErrorResponse,
        )
    ),
    modifiers(&BearerAuth),
    tags(
        (name = "books", description = "Book catalog"),
        (name = "borrowings", description = "Borrowing ledger and lifecycle"),
        (name = "users", description = "Accounts"),
        (name = "auth", description = "Token issuance"),
        (name = "health", description = "Health check endpoints")
    )
)]
pub struct ApiDoc;

/// Create the OpenAPI documentation router
pub fn create_openapi_router() -> Router {
    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
}
