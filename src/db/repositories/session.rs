//! Session repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use crate::db::sql;
use crate::db::DynDatabasePool;
use crate::models::Session;
use crate::sql_values;

/// Session repository trait
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session>;

    /// Get session by its token
    async fn get_by_id(&self, id: &str) -> Result<Option<Session>>;

    async fn delete(&self, id: &str) -> Result<()>;

    /// Delete expired sessions, returning how many were removed
    async fn delete_expired(&self) -> Result<u64>;
}

/// SQLx-based session repository
pub struct SqlxSessionRepository {
    pool: DynDatabasePool,
}

impl SqlxSessionRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SessionRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    id: String,
    user_id: i64,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl From<SessionRow> for Session {
    fn from(row: SessionRow) -> Self {
        Session {
            id: row.id,
            user_id: row.user_id,
            expires_at: row.expires_at,
            created_at: row.created_at,
        }
    }
}

#[async_trait]
impl SessionRepository for SqlxSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session> {
        sql::execute(
            &self.pool,
            "INSERT INTO sessions (id, user_id, expires_at, created_at) VALUES (?, ?, ?, ?)",
            &sql_values![
                session.id.as_str(),
                session.user_id,
                session.expires_at,
                session.created_at
            ],
        )
        .await
        .context("Failed to create session")?;

        Ok(session.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<Session>> {
        let row: Option<SessionRow> = sql::fetch_optional(
            &self.pool,
            "SELECT id, user_id, expires_at, created_at FROM sessions WHERE id = ?",
            &sql_values![id],
        )
        .await
        .context("Failed to get session by ID")?;
        Ok(row.map(Session::from))
    }

    async fn delete(&self, id: &str) -> Result<()> {
        sql::execute(&self.pool, "DELETE FROM sessions WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete session")?;
        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64> {
        let result = sql::execute(
            &self.pool,
            "DELETE FROM sessions WHERE expires_at < ?",
            &sql_values![Utc::now()],
        )
        .await
        .context("Failed to delete expired sessions")?;
        Ok(result.rows_affected)
    }
}
