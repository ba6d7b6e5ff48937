//! Account and token endpoints

use axum::{extract::State, http::StatusCode, Json};

use crate::{
    error::AppResult,
    models::user::{
        AccessToken, RefreshRequest, RegisterUser, TokenPair, TokenRequest, UpdateProfile, User,
        VerifyRequest,
    },
    policy::Capability,
    AppState,
};

use super::{json_body, Caller, JsonBody};

/// Register a new account
#[utoipa::path(
    post,
    path = "/users/",
    tag = "users",
    request_body = RegisterUser,
    responses(
        (status = 201, description = "User created", body = User),
        (status = 400, description = "Invalid input or email already registered")
    )
)]
pub async fn register(
    State(state): State<AppState>,
    request: JsonBody<RegisterUser>,
) -> AppResult<(StatusCode, Json<User>)> {
    let user = state.services.users.register(json_body(request)?).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Get own profile
#[utoipa::path(
    get,
    path = "/users/me/",
    tag = "users",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user", body = User),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(State(state): State<AppState>, Caller(policy): Caller) -> AppResult<Json<User>> {
    policy.require(Capability::ManageProfile)?;

    let user = state.services.users.get_by_id(policy.user_id()?).await?;
    Ok(Json(user))
}

/// Update own profile (email, password)
#[utoipa::path(
    put,
    path = "/users/me/",
    tag = "users",
    security(("bearer_auth" = [])),
    request_body = UpdateProfile,
    responses(
        (status = 200, description = "Profile updated", body = User),
        (status = 400, description = "Invalid input"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn update_me(
    State(state): State<AppState>,
    Caller(policy): Caller,
    profile: JsonBody<UpdateProfile>,
) -> AppResult<Json<User>> {
    policy.require(Capability::ManageProfile)?;

    let updated = state
        .services
        .users
        .update_profile(policy.user_id()?, json_body(profile)?)
        .await?;
    Ok(Json(updated))
}

/// Obtain an access/refresh token pair
#[utoipa::path(
    post,
    path = "/users/token/",
    tag = "auth",
    request_body = TokenRequest,
    responses(
        (status = 200, description = "Token pair", body = TokenPair),
        (status = 401, description = "Invalid credentials")
    )
)]
pub async fn issue_token(
    State(state): State<AppState>,
    request: JsonBody<TokenRequest>,
) -> AppResult<Json<TokenPair>> {
    let request = json_body(request)?;
    let pair = state
        .services
        .users
        .issue_tokens(&request.email, &request.password)
        .await?;
    Ok(Json(pair))
}

/// Exchange a refresh token for a new access token
#[utoipa::path(
    post,
    path = "/users/token/refresh/",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "New access token", body = AccessToken),
        (status = 401, description = "Invalid or expired refresh token")
    )
)]
pub async fn refresh_token(
    State(state): State<AppState>,
    request: JsonBody<RefreshRequest>,
) -> AppResult<Json<AccessToken>> {
    let request = json_body(request)?;
    let access = state.services.users.refresh(&request.refresh).await?;
    Ok(Json(AccessToken { access }))
}

/// Check that a token is valid
#[utoipa::path(
    post,
    path = "/users/token/verify/",
    tag = "auth",
    request_body = VerifyRequest,
    responses(
        (status = 200, description = "Token is valid"),
        (status = 401, description = "Invalid or expired token")
    )
)]
pub async fn verify_token(
    State(state): State<AppState>,
    request: JsonBody<VerifyRequest>,
) -> AppResult<Json<serde_json::Value>> {
    let request = json_body(request)?;
    state.services.users.verify(&request.token)?;
    Ok(Json(serde_json::json!({})))
}
