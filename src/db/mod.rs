//! Database layer
//!
//! Supports SQLite (default, single-file deployment) and MySQL, selected by
//! configuration. The rest of the crate only sees [`DynDatabasePool`] and the
//! repository traits.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! pool.ping().await?;
//! ```

pub mod migrations;
pub mod pool;
pub mod query;
pub mod repositories;
pub mod sql;

pub use pool::{
    create_pool, create_test_pool, DatabasePool, DynDatabasePool, MysqlDatabase, SqliteDatabase,
};
pub use query::{FilterField, FilterKind, ListQuery, QueryConfig, QueryError, SortOrder};
