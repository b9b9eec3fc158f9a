//! User service
//!
//! Accounts, sign-in and session validation. There is no public
//! registration: the first administrator is seeded from configuration and
//! further accounts are created by administrators.

use anyhow::Context;
use std::sync::Arc;
use uuid::Uuid;

use crate::config::AdminSeedConfig;
use crate::db::repositories::{SessionRepository, UserRepository};
use crate::models::{CreateUserInput, Session, User, UserRole};
use crate::services::password::{hash_password, verify_password, MIN_PASSWORD_LEN};
use crate::services::ServiceError;

/// Default session lifetime in days
pub const DEFAULT_SESSION_DAYS: i64 = 7;

const INVALID_CREDENTIALS: &str = "Invalid username or password";

pub struct UserService {
    user_repo: Arc<dyn UserRepository>,
    session_repo: Arc<dyn SessionRepository>,
    session_days: i64,
}

impl UserService {
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        session_repo: Arc<dyn SessionRepository>,
        session_days: i64,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            session_days,
        }
    }

    /// Check credentials and open a new session
    pub async fn login(&self, username: &str, password: &str) -> Result<(Session, User), ServiceError> {
        let user = self
            .user_repo
            .get_by_username(username.trim())
            .await?
            .ok_or_else(|| ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()))?;

        if !verify_password(password, &user.password_hash).context("Failed to verify password")? {
            tracing::info!(user_id = user.id, "Rejected login");
            return Err(ServiceError::Unauthorized(INVALID_CREDENTIALS.to_string()));
        }

        let session = Session::new(Uuid::new_v4().simple().to_string(), user.id, self.session_days);
        let session = self.session_repo.create(&session).await?;
        tracing::info!(user_id = user.id, "User signed in");
        Ok((session, user))
    }

    /// User behind a session token; `None` when the token is unknown or
    /// expired. Expired sessions are deleted on sight.
    pub async fn validate_session(&self, token: &str) -> Result<Option<User>, ServiceError> {
        let Some(session) = self.session_repo.get_by_id(token).await? else {
            return Ok(None);
        };

        if session.is_expired() {
            self.session_repo.delete(token).await?;
            return Ok(None);
        }

        Ok(self.user_repo.get_by_id(session.user_id).await?)
    }

    pub async fn logout(&self, token: &str) -> Result<(), ServiceError> {
        self.session_repo.delete(token).await?;
        Ok(())
    }

    pub async fn create_user(&self, input: CreateUserInput) -> Result<User, ServiceError> {
        let username = input.username.trim();
        let email = input.email.trim();
        if username.is_empty() || username.len() > 50 {
            return Err(ServiceError::validation("Username must be 1-50 characters"));
        }
        if !email.contains('@') || email.len() > 255 {
            return Err(ServiceError::validation("Invalid email address"));
        }
        if input.password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ServiceError::validation(format!(
                "Password must be at least {} characters",
                MIN_PASSWORD_LEN
            )));
        }
        if self.user_repo.get_by_username(username).await?.is_some() {
            return Err(ServiceError::Conflict(format!(
                "Username '{}' is already taken",
                username
            )));
        }

        let password_hash = hash_password(&input.password)?;
        let now = chrono::Utc::now();
        let user = self
            .user_repo
            .create(&User {
                id: 0,
                username: username.to_string(),
                email: email.to_string(),
                password_hash,
                role: input.role,
                created_at: now,
                updated_at: now,
            })
            .await?;
        Ok(user)
    }

    /// Create the configured administrator if the user table is empty.
    /// Returns the new account, or `None` when users already exist.
    pub async fn seed_admin(&self, seed: &AdminSeedConfig) -> Result<Option<User>, ServiceError> {
        if self.user_repo.count().await? > 0 {
            return Ok(None);
        }
        let admin = self
            .create_user(CreateUserInput {
                username: seed.username.clone(),
                email: seed.email.clone(),
                password: seed.password.clone(),
                role: UserRole::Admin,
            })
            .await?;
        tracing::info!(username = %admin.username, "Seeded administrator account");
        Ok(Some(admin))
    }

    pub async fn cleanup_expired_sessions(&self) -> Result<u64, ServiceError> {
        Ok(self.session_repo.delete_expired().await?)
    }
}
