//! Service error type
//!
//! One error enum for every resource service. The API layer maps each
//! variant to an HTTP status.

use crate::db::sql::is_unique_violation;
use crate::db::QueryError;
use crate::ids::InvalidIdError;
use crate::services::storage::StorageError;

#[derive(Debug, thiserror::Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Validation(String),

    /// No usable session
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Permission(String),

    /// Duplicate slug or key
    #[error("{0}")]
    Conflict(String),

    /// The row is still referenced elsewhere
    #[error("{0}")]
    DependencyInUse(String),

    #[error(transparent)]
    InvalidId(#[from] InvalidIdError),

    #[error("Internal error: {0:#}")]
    Internal(anyhow::Error),
}

impl ServiceError {
    pub fn not_found(what: &str) -> Self {
        ServiceError::NotFound(format!("{} not found", what))
    }

    pub fn validation(message: impl Into<String>) -> Self {
        ServiceError::Validation(message.into())
    }

    /// Convert a repository error, reporting a unique-key violation as
    /// `Conflict(message)`.
    pub fn or_conflict(err: anyhow::Error, message: impl Into<String>) -> Self {
        if is_unique_violation(&err) {
            ServiceError::Conflict(message.into())
        } else {
            ServiceError::Internal(err)
        }
    }
}

impl From<anyhow::Error> for ServiceError {
    fn from(err: anyhow::Error) -> Self {
        ServiceError::or_conflict(err, "Resource already exists")
    }
}

impl From<QueryError> for ServiceError {
    fn from(err: QueryError) -> Self {
        match err {
            QueryError::Validation(message) => ServiceError::Validation(message),
            QueryError::InvalidId(err) => ServiceError::InvalidId(err),
        }
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::UnsupportedType(_) | StorageError::TooLarge { .. } | StorageError::Empty => {
                ServiceError::Validation(err.to_string())
            }
            StorageError::InvalidPath(_) | StorageError::Io(_) => {
                ServiceError::Internal(anyhow::Error::new(err))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_storage_errors_split_by_cause() {
        let err: ServiceError = StorageError::UnsupportedType("text/x-shellscript".into()).into();
        assert!(matches!(err, ServiceError::Validation(_)));

        let err: ServiceError = StorageError::TooLarge { size: 20, max: 10 }.into();
        assert!(matches!(err, ServiceError::Validation(_)));

        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let err: ServiceError = StorageError::Io(io).into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[tokio::test]
    async fn test_unique_violation_becomes_conflict() {
        let pool = crate::db::create_test_pool().await.unwrap();
        pool.execute("CREATE TABLE tags (name TEXT NOT NULL UNIQUE)").await.unwrap();
        let insert = "INSERT INTO tags (name) VALUES (?)";
        crate::db::sql::execute(&pool, insert, &crate::sql_values!["alumni"]).await.unwrap();

        let err = crate::db::sql::execute(&pool, insert, &crate::sql_values!["alumni"])
            .await
            .context("Failed to create tag")
            .unwrap_err();
        let err = ServiceError::or_conflict(err, "Tag 'alumni' already exists");
        assert!(matches!(err, ServiceError::Conflict(m) if m == "Tag 'alumni' already exists"));

        let err: ServiceError = anyhow::anyhow!("connection reset").into();
        assert!(matches!(err, ServiceError::Internal(_)));
    }

    #[test]
    fn test_query_errors_keep_their_kind() {
        let err: ServiceError = QueryError::Validation("bad sort".into()).into();
        assert!(matches!(err, ServiceError::Validation(m) if m == "bad sort"));

        let err: ServiceError = QueryError::InvalidId(InvalidIdError).into();
        assert!(matches!(err, ServiceError::InvalidId(_)));
    }
}
