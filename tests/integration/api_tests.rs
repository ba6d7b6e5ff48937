//! API integration tests, run against the in-memory backend

use axum::{
    body::{to_bytes, Body},
    http::{header, Method, Request, StatusCode},
    Router,
};
use chrono::{Duration, Utc};
use serde_json::{json, Value};
use tower::ServiceExt;

use lending_server::{
    api::create_router,
    config::{AppConfig, BootstrapConfig, StorageBackend},
    repository::Repository,
    AppState,
};

const ADMIN_EMAIL: &str = "admin@library.test";
const ADMIN_PASSWORD: &str = "admin-secret";

async fn app_with(configure: impl FnOnce(&mut AppConfig)) -> Router {
    let mut config = AppConfig::default();
    config.database.backend = StorageBackend::Memory;
    config.bootstrap = BootstrapConfig {
        admin_email: Some(ADMIN_EMAIL.to_string()),
        admin_password: Some(ADMIN_PASSWORD.to_string()),
    };
    configure(&mut config);

    let state = AppState::build(config, Repository::memory())
        .await
        .expect("Failed to build state");
    create_router(state)
}

async fn app() -> Router {
    app_with(|_| {}).await
}

async fn send(
    app: &Router,
    method: Method,
    uri: &str,
    token: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut request = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        request = request.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    let request = match body {
        Some(body) => request
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string())),
        None => request.body(Body::empty()),
    }
    .unwrap();

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

async fn login(app: &Router, email: &str, password: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users/token/",
        None,
        Some(json!({ "email": email, "password": password })),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "login failed: {}", body);
    body["access"].as_str().expect("No access token").to_string()
}

async fn admin_token(app: &Router) -> String {
    login(app, ADMIN_EMAIL, ADMIN_PASSWORD).await
}

async fn member_token(app: &Router, email: &str) -> String {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/users/",
        None,
        Some(json!({ "email": email, "password": "reader-pass" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "registration failed: {}", body);
    login(app, email, "reader-pass").await
}

async fn create_book(app: &Router, token: &str, inventory: i32) -> Value {
    let (status, body) = send(
        app,
        Method::POST,
        "/api/books/",
        Some(token),
        Some(json!({
            "title": "Dune",
            "author": "Frank Herbert",
            "cover": "HARD",
            "inventory": inventory,
            "daily_fee": "0.50"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "book creation failed: {}", body);
    body
}

fn in_days(days: i64) -> String {
    (Utc::now().date_naive() + Duration::days(days)).to_string()
}

async fn borrow(app: &Router, token: &str, book_id: i64, days: i64) -> (StatusCode, Value) {
    send(
        app,
        Method::POST,
        "/api/borrowings/",
        Some(token),
        Some(json!({ "book": book_id, "expected_return_date": in_days(days) })),
    )
    .await
}

async fn inventory_of(app: &Router, book_id: i64) -> i64 {
    let (status, body) = send(app, Method::GET, &format!("/api/books/{}/", book_id), None, None).await;
    assert_eq!(status, StatusCode::OK);
    body["inventory"].as_i64().unwrap()
}

#[tokio::test]
async fn test_health_check() {
    let app = app().await;

    let (status, body) = send(&app, Method::GET, "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "healthy");

    let (status, body) = send(&app, Method::GET, "/ready", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["storage"], "memory");
}

#[tokio::test]
async fn test_catalog_is_public_but_writes_are_staff_only() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;

    let book = create_book(&app, &admin, 3).await;
    assert_eq!(book["daily_fee"], "0.50");

    let (status, body) = send(&app, Method::GET, "/api/books/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let books = body.as_array().unwrap();
    assert_eq!(books.len(), 1);
    assert!(books[0].get("daily_fee").is_none());

    let new_book = json!({
        "title": "Emma",
        "author": "Jane Austen",
        "cover": "SOFT",
        "inventory": 1,
        "daily_fee": "1.00"
    });
    let (status, _) = send(&app, Method::POST, "/api/books/", None, Some(new_book.clone())).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = send(&app, Method::POST, "/api/books/", Some(&member), Some(new_book)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // Malformed body from an anonymous caller still reports the missing credentials
    let (status, _) = send(&app, Method::POST, "/api/books/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_book_patch_and_delete() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let id = create_book(&app, &admin, 3).await["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/books/{}/", id),
        Some(&admin),
        Some(json!({ "inventory": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["inventory"], 7);
    assert_eq!(body["title"], "Dune");

    let (status, _) = send(
        &app,
        Method::PATCH,
        &format!("/api/books/{}/", id),
        Some(&admin),
        Some(json!({ "inventory": -1 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, Method::DELETE, &format!("/api/books/{}/", id), Some(&admin), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = send(&app, Method::GET, &format!("/api/books/{}/", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_borrow_and_return_lifecycle() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;
    let book_id = create_book(&app, &admin, 2).await["id"].as_i64().unwrap();

    let (status, borrowing) = borrow(&app, &member, book_id, 10).await;
    assert_eq!(status, StatusCode::CREATED, "{}", borrowing);
    assert_eq!(borrowing["is_active"], true);
    assert_eq!(borrowing["borrow_date"], in_days(0));
    assert_eq!(borrowing["actual_return_date"], Value::Null);
    assert_eq!(borrowing["book"]["id"], book_id);
    assert_eq!(inventory_of(&app, book_id).await, 1);

    let borrowing_id = borrowing["id"].as_i64().unwrap();
    let return_uri = format!("/api/borrowings/{}/return/", borrowing_id);

    // Members cannot record returns
    let (status, _) = send(&app, Method::POST, &return_uri, Some(&member), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(inventory_of(&app, book_id).await, 1);

    let (status, returned) = send(&app, Method::POST, &return_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK, "{}", returned);
    assert_eq!(returned["is_active"], false);
    assert_eq!(returned["actual_return_date"], in_days(0));
    assert_eq!(inventory_of(&app, book_id).await, 2);

    let (status, body) = send(&app, Method::POST, &return_uri, Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Borrowing has already been returned.");
    assert_eq!(inventory_of(&app, book_id).await, 2);
}

#[tokio::test]
async fn test_members_may_return_when_enabled() {
    let app = app_with(|config| config.lending.members_may_return = true).await;
    let admin = admin_token(&app).await;
    let owner = member_token(&app, "owner@library.test").await;
    let other = member_token(&app, "other@library.test").await;
    let book_id = create_book(&app, &admin, 1).await["id"].as_i64().unwrap();

    let (_, borrowing) = borrow(&app, &owner, book_id, 5).await;
    let return_uri = format!("/api/borrowings/{}/return/", borrowing["id"]);

    let (status, _) = send(&app, Method::POST, &return_uri, Some(&other), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, Method::POST, &return_uri, Some(&owner), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(inventory_of(&app, book_id).await, 1);
}

#[tokio::test]
async fn test_out_of_stock() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;
    let book_id = create_book(&app, &admin, 0).await["id"].as_i64().unwrap();

    let (status, body) = borrow(&app, &member, book_id, 5).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["detail"], "Book is out of stock.");
    assert_eq!(inventory_of(&app, book_id).await, 0);

    let (status, body) = send(&app, Method::GET, "/api/borrowings/", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_lending_window() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;
    let book_id = create_book(&app, &admin, 5).await["id"].as_i64().unwrap();

    let (status, _) = borrow(&app, &member, book_id, 0).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = borrow(&app, &member, book_id, 31).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(inventory_of(&app, book_id).await, 5);

    let (status, _) = borrow(&app, &member, book_id, 1).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, _) = borrow(&app, &member, book_id, 30).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(inventory_of(&app, book_id).await, 3);
}

#[tokio::test]
async fn test_borrowing_unknown_book() {
    let app = app().await;
    let member = member_token(&app, "reader@library.test").await;

    let (status, body) = borrow(&app, &member, 999, 5).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "NoSuchEntity");
}

#[tokio::test]
async fn test_borrowing_visibility() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let alice = member_token(&app, "alice@library.test").await;
    let bob = member_token(&app, "bob@library.test").await;
    let book_id = create_book(&app, &admin, 5).await["id"].as_i64().unwrap();

    let (_, alice_loan) = borrow(&app, &alice, book_id, 5).await;
    let (_, bob_loan) = borrow(&app, &bob, book_id, 5).await;
    let bob_id = bob_loan["user"].as_i64().unwrap();

    let (status, _) = send(&app, Method::GET, "/api/borrowings/", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // A member's filter on another user is ignored
    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/borrowings/?user_id={}", bob_id),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], alice_loan["id"]);

    let (status, _) = send(
        &app,
        Method::GET,
        &format!("/api/borrowings/{}/", bob_loan["id"]),
        Some(&alice),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/borrowings/?user_id={}", bob_id),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], bob_loan["id"]);

    let (status, body) = send(&app, Method::GET, "/api/borrowings/", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_staff_is_active_filter() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;
    let book_id = create_book(&app, &admin, 5).await["id"].as_i64().unwrap();

    let (_, first) = borrow(&app, &member, book_id, 5).await;
    let (_, second) = borrow(&app, &member, book_id, 5).await;
    let (status, _) = send(
        &app,
        Method::POST,
        &format!("/api/borrowings/{}/return/", first["id"]),
        Some(&admin),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(&app, Method::GET, "/api/borrowings/?is_active=true", Some(&admin), None).await;
    let active = body.as_array().unwrap();
    assert_eq!(active.len(), 1);
    assert_eq!(active[0]["id"], second["id"]);

    let (_, body) = send(&app, Method::GET, "/api/borrowings/?is_active=false", Some(&admin), None).await;
    let returned = body.as_array().unwrap();
    assert_eq!(returned.len(), 1);
    assert_eq!(returned[0]["id"], first["id"]);

    let (status, _) = send(&app, Method::GET, "/api/borrowings/?is_active=maybe", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_authentication() {
    let app = app().await;
    member_token(&app, "reader@library.test").await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/token/",
        None,
        Some(json!({ "email": "reader@library.test", "password": "wrong" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body["detail"].is_string());

    let (status, _) = send(&app, Method::GET, "/api/users/me/", Some("not-a-token"), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Duplicate registration
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users/",
        None,
        Some(json!({ "email": "reader@library.test", "password": "another" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_token_refresh_and_profile() {
    let app = app().await;
    member_token(&app, "reader@library.test").await;

    let (_, pair) = send(
        &app,
        Method::POST,
        "/api/users/token/",
        None,
        Some(json!({ "email": "reader@library.test", "password": "reader-pass" })),
    )
    .await;
    let refresh = pair["refresh"].as_str().unwrap();

    // A refresh token is not accepted as an access token
    let (status, _) = send(&app, Method::GET, "/api/users/me/", Some(refresh), None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/users/token/refresh/",
        None,
        Some(json!({ "refresh": refresh })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let access = body["access"].as_str().unwrap().to_string();

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/users/token/verify/",
        None,
        Some(json!({ "token": access })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, me) = send(&app, Method::GET, "/api/users/me/", Some(&access), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "reader@library.test");
    assert_eq!(me["is_staff"], false);
    assert!(me.get("password").is_none());

    let (status, me) = send(
        &app,
        Method::PATCH,
        "/api/users/me/",
        Some(&access),
        Some(json!({ "email": "renamed@library.test" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(me["email"], "renamed@library.test");

    login(&app, "renamed@library.test", "reader-pass").await;
}

#[tokio::test]
async fn test_user_filter_is_parsed_after_access_check() {
    let app = app().await;
    let admin = admin_token(&app).await;
    let member = member_token(&app, "reader@library.test").await;
    let book_id = create_book(&app, &admin, 5).await["id"].as_i64().unwrap();
    let (_, own) = borrow(&app, &member, book_id, 5).await;
    borrow(&app, &admin, book_id, 5).await;

    let (status, _) = send(&app, Method::GET, "/api/borrowings/?user_id=abc", None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Ignored for members, even when malformed
    let (status, body) = send(&app, Method::GET, "/api/borrowings/?user_id=abc", Some(&member), None).await;
    assert_eq!(status, StatusCode::OK);
    let listed = body.as_array().unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0]["id"], own["id"]);

    let (status, body) = send(&app, Method::GET, "/api/borrowings/?user_id=", Some(&admin), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 2);

    let (status, body) = send(&app, Method::GET, "/api/borrowings/?user_id=abc", Some(&admin), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "BadValue");
}

#[tokio::test]
async fn test_daily_fee_has_two_decimals() {
    let app = app().await;
    let admin = admin_token(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/books/",
        Some(&admin),
        Some(json!({
            "title": "Emma",
            "author": "Jane Austen",
            "cover": "SOFT",
            "inventory": 1,
            "daily_fee": 4
        })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{}", body);
    assert_eq!(body["daily_fee"], "4.00");

    let (status, body) = send(
        &app,
        Method::PATCH,
        &format!("/api/books/{}/", body["id"]),
        Some(&admin),
        Some(json!({ "daily_fee": "4.5" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["daily_fee"], "4.50");
}

#[tokio::test]
async fn test_malformed_account_bodies_use_error_shape() {
    let app = app().await;

    for uri in [
        "/api/users/",
        "/api/users/token/",
        "/api/users/token/refresh/",
        "/api/users/token/verify/",
    ] {
        let (status, body) = send(&app, Method::POST, uri, None, Some(json!({ "unexpected": 1 }))).await;
        assert!(status.is_client_error(), "{}: {}", uri, status);
        assert_eq!(body["error"], "BadValue", "{}", uri);
        assert!(body["detail"].is_string(), "{}", uri);
    }
}
