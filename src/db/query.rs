//! Filterable, paginated list queries
//!
//! Every resource listing goes through [`ListQuery`]. A static
//! [`QueryConfig`] per resource names the table, the sortable columns, the
//! exact-match filters and the free-text search columns. [`ListQuery::parse`]
//! is the validation boundary: it turns raw query-string values into typed
//! predicates, so rendering only ever emits column names taken from the
//! config and every user-supplied value is bound as a parameter.
//!
//! Free-text search runs against a `search_text` column that repositories
//! fill with [`fold_search_text`] on every write. Both sides of the match
//! are folded in Rust, so non-ASCII text matches case-insensitively on
//! SQLite as well as MySQL.

use anyhow::Result;
use sqlx::{mysql::MySqlRow, sqlite::SqliteRow, FromRow};
use std::collections::HashMap;

use super::sql::{self, SqlValue};
use super::DynDatabasePool;
use crate::ids::{IdCodec, InvalidIdError};
use crate::models::PaginatedResult;

/// Hard upper bound for any page size
pub const MAX_LIMIT: u32 = 100;

/// Escape character used in `LIKE` patterns
const LIKE_ESCAPE: char = '!';

/// Column holding the folded searchable fields of a row
pub const SEARCH_COLUMN: &str = "search_text";

/// Separates fields inside `search_text` so a match cannot span two of them
const SEARCH_SEPARATOR: char = '\u{1f}';

/// Sort direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortOrder {
    Asc,
    Desc,
}

impl SortOrder {
    pub fn as_sql(self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        if raw.eq_ignore_ascii_case("asc") {
            Some(SortOrder::Asc)
        } else if raw.eq_ignore_ascii_case("desc") {
            Some(SortOrder::Desc)
        } else {
            None
        }
    }
}

/// How a filter parameter is coerced before it reaches SQL
#[derive(Debug, Clone, Copy)]
pub enum FilterKind {
    /// Free text, compared verbatim
    Text,
    /// One of a fixed set of values
    Enum(&'static [&'static str]),
    /// Signed integer
    Int,
    /// Exactly `true` or `false`
    Bool,
    /// Public identifier, decoded through the codec
    EncodedId,
}

/// An exact-match filter: query parameter `param` constrains `column`
#[derive(Debug)]
pub struct FilterField {
    pub param: &'static str,
    pub column: &'static str,
    pub kind: FilterKind,
}

/// Static per-resource listing configuration
#[derive(Debug)]
pub struct QueryConfig {
    pub table: &'static str,
    /// Select list used for the bounded fetch
    pub columns: &'static str,
    /// `(sortBy value, column)` pairs
    pub sort_columns: &'static [(&'static str, &'static str)],
    /// Column sorted on when `sortBy` is absent
    pub default_sort: &'static str,
    pub default_order: SortOrder,
    pub default_limit: u32,
    pub max_limit: u32,
    pub filters: &'static [FilterField],
    /// Columns folded into `search_text`; empty disables free-text search
    pub search_columns: &'static [&'static str],
}

/// Rejected list parameters
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    InvalidId(#[from] InvalidIdError),
}

/// A single condition in the `WHERE` clause
#[derive(Debug, Clone, PartialEq)]
pub enum Predicate {
    /// `column = ?`
    Eq(&'static str, SqlValue),
    /// Case-insensitive substring match against a folded search column
    Contains(&'static str, String),
}

impl Predicate {
    fn render(&self, clauses: &mut Vec<String>, values: &mut Vec<SqlValue>) {
        match self {
            Predicate::Eq(column, value) => {
                clauses.push(format!("{} = ?", column));
                values.push(value.clone());
            }
            Predicate::Contains(column, needle) => {
                let pattern = format!("%{}%", escape_like(&fold(needle)));
                clauses.push(format!("{} LIKE ? ESCAPE '{}'", column, LIKE_ESCAPE));
                values.push(SqlValue::Text(pattern));
            }
        }
    }
}

fn fold(text: &str) -> String {
    text.chars()
        .filter(|c| *c != SEARCH_SEPARATOR)
        .flat_map(char::to_lowercase)
        .collect()
}

/// Build the `search_text` value for a row from its searchable fields.
pub fn fold_search_text<'a>(fields: impl IntoIterator<Item = Option<&'a str>>) -> String {
    let folded: Vec<String> = fields.into_iter().flatten().map(fold).collect();
    folded.join(&SEARCH_SEPARATOR.to_string())
}

/// Escape `LIKE` wildcards and the escape character itself
pub fn escape_like(raw: &str) -> String {
    let mut escaped = String::with_capacity(raw.len());
    for c in raw.chars() {
        if c == LIKE_ESCAPE || c == '%' || c == '_' {
            escaped.push(LIKE_ESCAPE);
        }
        escaped.push(c);
    }
    escaped
}

/// A validated listing request
#[derive(Debug, Clone)]
pub struct ListQuery {
    config: &'static QueryConfig,
    pub page: u32,
    pub limit: u32,
    pub sort_by: &'static str,
    pub sort_order: SortOrder,
    search: Option<String>,
    filters: Vec<Predicate>,
    narrowing: Vec<Predicate>,
}

/// First present, non-blank value among `names`
fn param<'a>(params: &'a HashMap<String, String>, names: &[&str]) -> Option<&'a str> {
    names
        .iter()
        .filter_map(|name| params.get(*name))
        .map(|value| value.trim())
        .find(|value| !value.is_empty())
}

impl FilterKind {
    fn coerce(self, name: &str, raw: &str, codec: &IdCodec) -> Result<SqlValue, QueryError> {
        match self {
            FilterKind::Text => Ok(SqlValue::Text(raw.to_string())),
            FilterKind::Enum(allowed) => {
                if allowed.contains(&raw) {
                    Ok(SqlValue::Text(raw.to_string()))
                } else {
                    Err(QueryError::Validation(format!(
                        "{} must be one of: {}",
                        name,
                        allowed.join(", ")
                    )))
                }
            }
            FilterKind::Int => raw
                .parse::<i64>()
                .map(SqlValue::Int)
                .map_err(|_| QueryError::Validation(format!("{} must be an integer", name))),
            FilterKind::Bool => match raw {
                "true" => Ok(SqlValue::Bool(true)),
                "false" => Ok(SqlValue::Bool(false)),
                _ => Err(QueryError::Validation(format!(
                    "{} must be 'true' or 'false'",
                    name
                ))),
            },
            FilterKind::EncodedId => Ok(SqlValue::Int(codec.decode(raw)?)),
        }
    }
}

impl ListQuery {
    /// Validate raw query-string values against `config`.
    pub fn parse(
        params: &HashMap<String, String>,
        config: &'static QueryConfig,
        codec: &IdCodec,
    ) -> Result<Self, QueryError> {
        let page = param(params, &["page"])
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(1)
            .clamp(1, i64::from(u32::MAX)) as u32;

        let max_limit = config.max_limit.clamp(1, MAX_LIMIT);
        let limit = param(params, &["limit"])
            .and_then(|raw| raw.parse::<i64>().ok())
            .unwrap_or(i64::from(config.default_limit))
            .clamp(1, i64::from(max_limit)) as u32;

        let sort_by = match param(params, &["sortBy", "sort_by"]) {
            None => config.default_sort,
            Some(raw) => config
                .sort_columns
                .iter()
                .find(|(name, _)| *name == raw)
                .map(|(_, column)| *column)
                .ok_or_else(|| {
                    let names: Vec<&str> = config.sort_columns.iter().map(|(name, _)| *name).collect();
                    QueryError::Validation(format!("sortBy must be one of: {}", names.join(", ")))
                })?,
        };

        let sort_order = match param(params, &["sortOrder", "sort_order"]) {
            None => config.default_order,
            Some(raw) => SortOrder::parse(raw).ok_or_else(|| {
                QueryError::Validation("sortOrder must be 'asc' or 'desc'".to_string())
            })?,
        };

        let mut filters = Vec::new();
        for field in config.filters {
            if let Some(raw) = param(params, &[field.param]) {
                let value = field.kind.coerce(field.param, raw, codec)?;
                filters.push(Predicate::Eq(field.column, value));
            }
        }

        let search = param(params, &["query"]).map(str::to_string);
        if let Some(needle) = &search {
            if !config.search_columns.is_empty() {
                filters.push(Predicate::Contains(SEARCH_COLUMN, needle.clone()));
            }
        }

        Ok(Self {
            config,
            page,
            limit,
            sort_by,
            sort_order,
            search,
            filters,
            narrowing: Vec::new(),
        })
    }

    /// Defaults only: first page, default sort, no filters
    pub fn defaults(config: &'static QueryConfig) -> Self {
        Self {
            config,
            page: 1,
            limit: config.default_limit.clamp(1, MAX_LIMIT),
            sort_by: config.default_sort,
            sort_order: config.default_order,
            search: None,
            filters: Vec::new(),
            narrowing: Vec::new(),
        }
    }

    /// Free-text search term, if one was given
    pub fn search(&self) -> Option<&str> {
        self.search.as_deref()
    }

    /// AND a mandatory `column = value` condition. Narrowing clauses are
    /// rendered after every caller-supplied filter.
    pub fn narrow(&mut self, column: &'static str, value: impl Into<SqlValue>) {
        self.narrowing.push(Predicate::Eq(column, value.into()));
    }

    /// Caller-supplied predicates followed by narrowing predicates
    pub fn predicates(&self) -> impl Iterator<Item = &Predicate> {
        self.filters.iter().chain(self.narrowing.iter())
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.limit)
    }

    fn render_where(&self) -> (String, Vec<SqlValue>) {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        for predicate in self.predicates() {
            predicate.render(&mut clauses, &mut values);
        }
        if clauses.is_empty() {
            (String::new(), values)
        } else {
            (format!(" WHERE {}", clauses.join(" AND ")), values)
        }
    }

    /// `SELECT COUNT(*)` over the filtered set
    pub fn count_sql(&self) -> (String, Vec<SqlValue>) {
        let (where_clause, values) = self.render_where();
        (
            format!("SELECT COUNT(*) FROM {}{}", self.config.table, where_clause),
            values,
        )
    }

    /// Bounded, ordered fetch with `id` as the tiebreak
    pub fn fetch_sql(&self) -> (String, Vec<SqlValue>) {
        let (where_clause, mut values) = self.render_where();
        let direction = self.sort_order.as_sql();
        let sql = format!(
            "SELECT {} FROM {}{} ORDER BY {} {}, id {} LIMIT ? OFFSET ?",
            self.config.columns, self.config.table, where_clause, self.sort_by, direction, direction
        );
        values.push(SqlValue::Int(i64::from(self.limit)));
        values.push(SqlValue::Int(self.offset()));
        (sql, values)
    }

    /// Run count and fetch concurrently from the same rendered filter.
    pub async fn execute<T>(&self, pool: &DynDatabasePool) -> Result<PaginatedResult<T>>
    where
        T: for<'r> FromRow<'r, SqliteRow> + for<'r> FromRow<'r, MySqlRow> + Send + Unpin,
    {
        let (count_sql, count_values) = self.count_sql();
        let (fetch_sql, fetch_values) = self.fetch_sql();

        let (total, items) = tokio::try_join!(
            sql::fetch_scalar::<i64>(pool, &count_sql, &count_values),
            sql::fetch_all::<T>(pool, &fetch_sql, &fetch_values),
        )?;

        Ok(PaginatedResult::new(items, total, self.page, self.limit))
    }
}
