//! Account and token service

use std::sync::Arc;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use chrono::Duration;
use validator::Validate;

use crate::{
    config::{AuthConfig, BootstrapConfig},
    error::{AppError, AppResult},
    models::user::{
        NewUser, RegisterUser, TokenKind, TokenPair, UpdateProfile, User, UserChanges, UserClaims,
    },
    repository::UserStore,
};

const DUPLICATE_EMAIL: &str = "user with this email already exists.";

#[derive(Clone)]
pub struct UsersService {
    users: Arc<dyn UserStore>,
    config: AuthConfig,
}

impl UsersService {
    pub fn new(users: Arc<dyn UserStore>, config: AuthConfig) -> Self {
        Self { users, config }
    }

    /// Register a new (non-staff) account
    pub async fn register(&self, request: RegisterUser) -> AppResult<User> {
        request.validate()?;

        if self.users.email_exists(&request.email, None).await? {
            return Err(AppError::Validation(DUPLICATE_EMAIL.to_string()));
        }

        let user = self
            .users
            .create(&NewUser {
                email: request.email,
                password_hash: self.hash_password(&request.password)?,
                is_staff: false,
            })
            .await?;

        tracing::info!(user_id = user.id, "User registered");
        Ok(user)
    }

    /// Create the configured staff account if it does not exist yet
    pub async fn ensure_admin(&self, bootstrap: &BootstrapConfig) -> AppResult<()> {
        let (Some(email), Some(password)) = (&bootstrap.admin_email, &bootstrap.admin_password)
        else {
            return Ok(());
        };

        if self.users.get_by_email(email).await?.is_some() {
            return Ok(());
        }

        let admin = self
            .users
            .create(&NewUser {
                email: email.clone(),
                password_hash: self.hash_password(password)?,
                is_staff: true,
            })
            .await?;

        tracing::info!(user_id = admin.id, "Bootstrap admin account created");
        Ok(())
    }

    pub async fn get_by_id(&self, id: i32) -> AppResult<User> {
        self.users.get_by_id(id).await
    }

    pub async fn update_profile(&self, user_id: i32, profile: UpdateProfile) -> AppResult<User> {
        profile.validate()?;

        if let Some(ref email) = profile.email {
            if self.users.email_exists(email, Some(user_id)).await? {
                return Err(AppError::Validation(DUPLICATE_EMAIL.to_string()));
            }
        }

        let password_hash = match profile.password {
            Some(ref password) => Some(self.hash_password(password)?),
            None => None,
        };

        self.users
            .update(
                user_id,
                &UserChanges {
                    email: profile.email,
                    password_hash,
                },
            )
            .await
    }

    /// Check credentials and issue an access/refresh token pair
    pub async fn issue_tokens(&self, email: &str, password: &str) -> AppResult<TokenPair> {
        let user = self
            .users
            .get_by_email(email)
            .await?
            .ok_or_else(|| AppError::Authentication("Invalid email or password".to_string()))?;

        if !self.verify_password(&user, password)? {
            return Err(AppError::Authentication("Invalid email or password".to_string()));
        }

        Ok(TokenPair {
            access: self.sign(&user, TokenKind::Access)?,
            refresh: self.sign(&user, TokenKind::Refresh)?,
        })
    }

    /// Exchange a refresh token for a fresh access token
    pub async fn refresh(&self, refresh_token: &str) -> AppResult<String> {
        let claims = self.decode(refresh_token, TokenKind::Refresh)?;
        // Picks up is_staff changes made since the refresh token was issued
        let user = self
            .users
            .get_by_id(claims.user_id)
            .await
            .map_err(|e| match e {
                AppError::NotFound(_) => AppError::Authentication("User not found".to_string()),
                other => other,
            })?;
        self.sign(&user, TokenKind::Access)
    }

    /// Validate a token of the given kind
    pub fn decode(&self, token: &str, kind: TokenKind) -> AppResult<UserClaims> {
        let claims = UserClaims::from_token(token, &self.config.jwt_secret)
            .map_err(|e| AppError::Authentication(e.to_string()))?;
        if claims.kind != kind {
            return Err(AppError::Authentication("Token has wrong type".to_string()));
        }
        Ok(claims)
    }

    /// Validate a token of either kind
    pub fn verify(&self, token: &str) -> AppResult<()> {
        UserClaims::from_token(token, &self.config.jwt_secret)
            .map(|_| ())
            .map_err(|e| AppError::Authentication(e.to_string()))
    }

    fn sign(&self, user: &User, kind: TokenKind) -> AppResult<String> {
        let lifetime = match kind {
            TokenKind::Access => Duration::minutes(self.config.access_token_minutes),
            TokenKind::Refresh => Duration::hours(self.config.refresh_token_hours),
        };
        UserClaims::new(user, kind, lifetime)
            .create_token(&self.config.jwt_secret)
            .map_err(|e| AppError::Internal(format!("Failed to create token: {}", e)))
    }

    /// Verify user password
    fn verify_password(&self, user: &User, password: &str) -> AppResult<bool> {
        let parsed_hash = PasswordHash::new(&user.password)
            .map_err(|_| AppError::Internal("Invalid password hash".to_string()))?;
        Ok(Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_ok())
    }

    /// Hash a password using Argon2
    pub fn hash_password(&self, password: &str) -> AppResult<String> {
        let salt = SaltString::generate(&mut OsRng);
        let hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| AppError::Internal(format!("Failed to hash password: {}", e)))?;
        Ok(hash.to_string())
    }
}
