//! Dynamic SQL execution over either backend
//!
//! Repositories render SQL with `?` placeholders (accepted by both SQLite and
//! MySQL) plus a list of [`SqlValue`]s, and hand both to the helpers here,
//! which pick the concrete pool from the driver and bind the values.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::{
    mysql::{MySqlArguments, MySqlRow},
    sqlite::{SqliteArguments, SqliteRow},
    Arguments, FromRow, MySql, MySqlPool, Sqlite, SqlitePool,
};

use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A value bound to a `?` placeholder
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    Int(i64),
    Text(String),
    Bool(bool),
    Timestamp(DateTime<Utc>),
    NullableText(Option<String>),
    NullableInt(Option<i64>),
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl From<DateTime<Utc>> for SqlValue {
    fn from(v: DateTime<Utc>) -> Self {
        SqlValue::Timestamp(v)
    }
}

impl From<Option<String>> for SqlValue {
    fn from(v: Option<String>) -> Self {
        SqlValue::NullableText(v)
    }
}

impl From<Option<i64>> for SqlValue {
    fn from(v: Option<i64>) -> Self {
        SqlValue::NullableInt(v)
    }
}

/// Build a `Vec<SqlValue>` from heterogeneous values
#[macro_export]
macro_rules! sql_values {
    ($($value:expr),* $(,)?) => {
        vec![$($crate::db::sql::SqlValue::from($value)),*]
    };
}

/// Whether `err` was caused by a `UNIQUE` constraint violation
pub fn is_unique_violation(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(
            cause.downcast_ref::<sqlx::Error>(),
            Some(sqlx::Error::Database(db)) if db.is_unique_violation()
        )
    })
}

/// Outcome of a statement that returns no rows
#[derive(Debug, Clone, Copy)]
pub struct ExecResult {
    pub rows_affected: u64,
    pub last_insert_id: i64,
}

/// Label/count pair returned by `GROUP BY` aggregates
#[derive(Debug, Clone, PartialEq, Eq, FromRow)]
pub struct GroupCount {
    pub label: String,
    pub count: i64,
}

fn sqlite_args<'q>(values: &[SqlValue]) -> SqliteArguments<'q> {
    let mut args = SqliteArguments::default();
    for value in values {
        match value.clone() {
            SqlValue::Int(v) => args.add(v),
            SqlValue::Text(v) => args.add(v),
            SqlValue::Bool(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::NullableText(v) => args.add(v),
            SqlValue::NullableInt(v) => args.add(v),
        }
    }
    args
}

fn mysql_args(values: &[SqlValue]) -> MySqlArguments {
    let mut args = MySqlArguments::default();
    for value in values {
        match value.clone() {
            SqlValue::Int(v) => args.add(v),
            SqlValue::Text(v) => args.add(v),
            SqlValue::Bool(v) => args.add(v),
            SqlValue::Timestamp(v) => args.add(v),
            SqlValue::NullableText(v) => args.add(v),
            SqlValue::NullableInt(v) => args.add(v),
        }
    }
    args
}

fn sqlite(pool: &DynDatabasePool) -> Result<&SqlitePool> {
    pool.as_sqlite().context("driver is sqlite but no sqlite pool is available")
}

fn mysql(pool: &DynDatabasePool) -> Result<&MySqlPool> {
    pool.as_mysql().context("driver is mysql but no mysql pool is available")
}

/// Run a statement and report affected rows and the generated key
pub async fn execute(pool: &DynDatabasePool, sql: &str, values: &[SqlValue]) -> Result<ExecResult> {
    match pool.driver() {
        DatabaseDriver::Sqlite => {
            let result = sqlx::query_with(sql, sqlite_args(values))
                .execute(sqlite(pool)?)
                .await?;
            Ok(ExecResult {
                rows_affected: result.rows_affected(),
                last_insert_id: result.last_insert_rowid(),
            })
        }
        DatabaseDriver::Mysql => {
            let result = sqlx::query_with(sql, mysql_args(values))
                .execute(mysql(pool)?)
                .await?;
            Ok(ExecResult {
                rows_affected: result.rows_affected(),
                last_insert_id: result.last_insert_id() as i64,
            })
        }
    }
}

/// Fetch every row, mapped through `FromRow`
pub async fn fetch_all<T>(pool: &DynDatabasePool, sql: &str, values: &[SqlValue]) -> Result<Vec<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let rows = match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query_as_with::<Sqlite, T, _>(sql, sqlite_args(values))
                .fetch_all(sqlite(pool)?)
                .await?
        }
        DatabaseDriver::Mysql => {
            sqlx::query_as_with::<MySql, T, _>(sql, mysql_args(values))
                .fetch_all(mysql(pool)?)
                .await?
        }
    };
    Ok(rows)
}

/// Fetch at most one row
pub async fn fetch_optional<T>(
    pool: &DynDatabasePool,
    sql: &str,
    values: &[SqlValue],
) -> Result<Option<T>>
where
    T: for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
{
    let row = match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query_as_with::<Sqlite, T, _>(sql, sqlite_args(values))
                .fetch_optional(sqlite(pool)?)
                .await?
        }
        DatabaseDriver::Mysql => {
            sqlx::query_as_with::<MySql, T, _>(sql, mysql_args(values))
                .fetch_optional(mysql(pool)?)
                .await?
        }
    };
    Ok(row)
}

/// Fetch the first column of the first row (`COUNT(*)`, `SUM(..)`, ...)
pub async fn fetch_scalar<T>(pool: &DynDatabasePool, sql: &str, values: &[SqlValue]) -> Result<T>
where
    (T,): for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow>,
    T: Send + Unpin,
{
    let value = match pool.driver() {
        DatabaseDriver::Sqlite => {
            sqlx::query_scalar_with::<Sqlite, T, _>(sql, sqlite_args(values))
                .fetch_one(sqlite(pool)?)
                .await?
        }
        DatabaseDriver::Mysql => {
            sqlx::query_scalar_with::<MySql, T, _>(sql, mysql_args(values))
                .fetch_one(mysql(pool)?)
                .await?
        }
    };
    Ok(value)
}

/// An open transaction on either backend. Dropping it without
/// [`commit`](Self::commit) rolls back.
pub enum DbTransaction {
    Sqlite(sqlx::Transaction<'static, Sqlite>),
    Mysql(sqlx::Transaction<'static, MySql>),
}

/// Start a transaction
pub async fn begin(pool: &DynDatabasePool) -> Result<DbTransaction> {
    match pool.driver() {
        DatabaseDriver::Sqlite => Ok(DbTransaction::Sqlite(
            sqlite(pool)?.begin().await.context("Failed to begin transaction")?,
        )),
        DatabaseDriver::Mysql => Ok(DbTransaction::Mysql(
            mysql(pool)?.begin().await.context("Failed to begin transaction")?,
        )),
    }
}

impl DbTransaction {
    pub async fn execute(&mut self, sql: &str, values: &[SqlValue]) -> Result<ExecResult> {
        match self {
            DbTransaction::Sqlite(tx) => {
                let result = sqlx::query_with(sql, sqlite_args(values))
                    .execute(&mut **tx)
                    .await?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: result.last_insert_rowid(),
                })
            }
            DbTransaction::Mysql(tx) => {
                let result = sqlx::query_with(sql, mysql_args(values))
                    .execute(&mut **tx)
                    .await?;
                Ok(ExecResult {
                    rows_affected: result.rows_affected(),
                    last_insert_id: result.last_insert_id() as i64,
                })
            }
        }
    }

    pub async fn commit(self) -> Result<()> {
        match self {
            DbTransaction::Sqlite(tx) => tx.commit().await?,
            DbTransaction::Mysql(tx) => tx.commit().await?,
        }
        Ok(())
    }
}

/// Render `?, ?, ?` for an `IN (...)` list of `n` values
pub fn placeholders(n: usize) -> String {
    vec!["?"; n].join(", ")
}

/// `SUM(expr)` as a 64-bit integer, 0 when no rows match
pub fn sum_i64(driver: DatabaseDriver, expr: &str) -> String {
    match driver {
        DatabaseDriver::Sqlite => format!("COALESCE(SUM({}), 0)", expr),
        DatabaseDriver::Mysql => format!("CAST(COALESCE(SUM({}), 0) AS SIGNED)", expr),
    }
}

/// `AVG(expr)` as a double, NULL when no rows match
pub fn avg_f64(driver: DatabaseDriver, expr: &str) -> String {
    match driver {
        DatabaseDriver::Sqlite => format!("AVG({})", expr),
        DatabaseDriver::Mysql => format!("CAST(AVG({}) AS DOUBLE)", expr),
    }
}

/// `expr` rendered as text, for grouping numeric columns under string labels
pub fn as_text(driver: DatabaseDriver, expr: &str) -> String {
    match driver {
        DatabaseDriver::Sqlite => format!("CAST({} AS TEXT)", expr),
        DatabaseDriver::Mysql => format!("CAST({} AS CHAR)", expr),
    }
}
