//! User repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::sql;
use crate::db::DynDatabasePool;
use crate::models::{User, UserRole};
use crate::sql_values;

const USER_COLUMNS: &str = "id, username, email, password_hash, role, created_at, updated_at";

/// User repository trait
#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Insert a user; `id` and timestamps of the argument are ignored
    async fn create(&self, user: &User) -> Result<User>;

    async fn get_by_id(&self, id: i64) -> Result<Option<User>>;

    async fn get_by_username(&self, username: &str) -> Result<Option<User>>;

    async fn count(&self) -> Result<i64>;
}

/// SQLx-based user repository
pub struct SqlxUserRepository {
    pool: DynDatabasePool,
}

impl SqlxUserRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    /// Create a boxed repository for use with dependency injection
    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn UserRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = anyhow::Error;

    fn try_from(row: UserRow) -> Result<Self> {
        Ok(User {
            id: row.id,
            username: row.username,
            email: row.email,
            password_hash: row.password_hash,
            role: row.role.parse::<UserRole>()?,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl UserRepository for SqlxUserRepository {
    async fn create(&self, user: &User) -> Result<User> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO users (username, email, password_hash, role, created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?)",
            &sql_values![
                user.username.as_str(),
                user.email.as_str(),
                user.password_hash.as_str(),
                user.role.as_str(),
                now,
                now
            ],
        )
        .await
        .context("Failed to create user")?;

        Ok(User {
            id: result.last_insert_id,
            created_at: now,
            updated_at: now,
            ..user.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM users WHERE id = ?", USER_COLUMNS),
            &sql_values![id],
        )
        .await
        .context("Failed to get user by ID")?;
        row.map(User::try_from).transpose()
    }

    async fn get_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM users WHERE username = ?", USER_COLUMNS),
            &sql_values![username],
        )
        .await
        .context("Failed to get user by username")?;
        row.map(User::try_from).transpose()
    }

    async fn count(&self) -> Result<i64> {
        sql::fetch_scalar(&self.pool, "SELECT COUNT(*) FROM users", &[])
            .await
            .context("Failed to count users")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;

    fn new_user(username: &str, role: UserRole) -> User {
        User {
            id: 0,
            username: username.to_string(),
            email: format!("{}@example.edu", username),
            password_hash: "hash".to_string(),
            role,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_and_get_user() {
        let repo = SqlxUserRepository::new(migrated_pool().await);

        let created = repo
            .create(&new_user("dean", UserRole::Admin))
            .await
            .expect("Failed to create user");
        assert!(created.id > 0);

        let found = repo
            .get_by_id(created.id)
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(found.username, "dean");
        assert_eq!(found.role, UserRole::Admin);

        let by_name = repo
            .get_by_username("dean")
            .await
            .expect("Failed to get user")
            .expect("User not found");
        assert_eq!(by_name.id, created.id);
    }

    #[tokio::test]
    async fn test_missing_user() {
        let repo = SqlxUserRepository::new(migrated_pool().await);
        assert!(repo.get_by_id(999).await.unwrap().is_none());
        assert!(repo.get_by_username("nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let repo = SqlxUserRepository::new(migrated_pool().await);
        repo.create(&new_user("dup", UserRole::Author)).await.unwrap();
        assert!(repo.create(&new_user("dup", UserRole::Author)).await.is_err());
        assert_eq!(repo.count().await.unwrap(), 1);
    }
}
