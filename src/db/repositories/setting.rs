//! Settings repository
//!
//! The key is stored as `setting_key`; `key` is reserved in MySQL.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::group_map;
use crate::db::query::{
    fold_search_text, FilterField, FilterKind, ListQuery, QueryConfig, SortOrder, MAX_LIMIT,
};
use crate::db::sql::{self, GroupCount, SqlValue};
use crate::db::DynDatabasePool;
use crate::models::{PaginatedResult, Setting, SettingStats, SettingValueType};
use crate::sql_values;

const SETTING_COLUMNS: &str = "id, setting_key, value, value_type, group_name, description, \
     is_public, file_path, created_at, updated_at";

static SETTING_FILTERS: &[FilterField] = &[
    FilterField {
        param: "group",
        column: "group_name",
        kind: FilterKind::Text,
    },
    FilterField {
        param: "value_type",
        column: "value_type",
        kind: FilterKind::Enum(SettingValueType::ALL),
    },
    FilterField {
        param: "is_public",
        column: "is_public",
        kind: FilterKind::Bool,
    },
];

/// Listing configuration for settings
pub static SETTING_QUERY: QueryConfig = QueryConfig {
    table: "settings",
    columns: SETTING_COLUMNS,
    sort_columns: &[
        ("key", "setting_key"),
        ("group_name", "group_name"),
        ("updated_at", "updated_at"),
    ],
    default_sort: "setting_key",
    default_order: SortOrder::Asc,
    default_limit: 50,
    max_limit: MAX_LIMIT,
    filters: SETTING_FILTERS,
    search_columns: &["setting_key", "description", "value"],
};

/// Settings repository trait
#[async_trait]
pub trait SettingRepository: Send + Sync {
    async fn create(&self, setting: &Setting) -> Result<Setting>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Setting>>;

    async fn get_by_key(&self, key: &str) -> Result<Option<Setting>>;

    /// Settings matching any of `keys`; unknown keys are simply absent
    async fn get_by_keys(&self, keys: &[String]) -> Result<Vec<Setting>>;

    async fn key_exists(&self, key: &str) -> Result<bool>;

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Setting>>;

    async fn update(&self, setting: &Setting) -> Result<Setting>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Write the `value` of every setting in one transaction
    async fn update_values(&self, settings: &[Setting]) -> Result<u64>;

    async fn stats(&self) -> Result<SettingStats>;
}

/// SQLx-based settings repository
pub struct SqlxSettingRepository {
    pool: DynDatabasePool,
}

impl SqlxSettingRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn SettingRepository> {
        Arc::new(Self::new(pool))
    }
}

fn search_text(setting: &Setting) -> String {
    fold_search_text([
        Some(setting.key.as_str()),
        setting.description.as_deref(),
        Some(setting.value.as_str()),
    ])
}

#[derive(sqlx::FromRow)]
struct SettingRow {
    id: i64,
    setting_key: String,
    value: String,
    value_type: String,
    group_name: String,
    description: Option<String>,
    is_public: bool,
    file_path: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<SettingRow> for Setting {
    type Error = anyhow::Error;

    fn try_from(row: SettingRow) -> Result<Self> {
        Ok(Setting {
            id: row.id,
            key: row.setting_key,
            value: row.value,
            value_type: row.value_type.parse()?,
            group_name: row.group_name,
            description: row.description,
            is_public: row.is_public,
            file_path: row.file_path,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl SettingRepository for SqlxSettingRepository {
    async fn create(&self, setting: &Setting) -> Result<Setting> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO settings (setting_key, value, value_type, group_name, description, \
             is_public, file_path, created_at, updated_at, search_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &sql_values![
                setting.key.as_str(),
                setting.value.as_str(),
                setting.value_type.as_str(),
                setting.group_name.as_str(),
                setting.description.clone(),
                setting.is_public,
                setting.file_path.clone(),
                now,
                now,
                search_text(setting)
            ],
        )
        .await
        .context("Failed to create setting")?;

        Ok(Setting {
            id: result.last_insert_id,
            created_at: now,
            updated_at: now,
            ..setting.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Setting>> {
        let row: Option<SettingRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM settings WHERE id = ?", SETTING_COLUMNS),
            &sql_values![id],
        )
        .await
        .context("Failed to get setting by ID")?;
        row.map(Setting::try_from).transpose()
    }

    async fn get_by_key(&self, key: &str) -> Result<Option<Setting>> {
        let row: Option<SettingRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM settings WHERE setting_key = ?", SETTING_COLUMNS),
            &sql_values![key],
        )
        .await
        .context("Failed to get setting by key")?;
        row.map(Setting::try_from).transpose()
    }

    async fn get_by_keys(&self, keys: &[String]) -> Result<Vec<Setting>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<SqlValue> = keys.iter().map(|k| k.as_str().into()).collect();
        let rows: Vec<SettingRow> = sql::fetch_all(
            &self.pool,
            &format!(
                "SELECT {} FROM settings WHERE setting_key IN ({})",
                SETTING_COLUMNS,
                sql::placeholders(keys.len())
            ),
            &values,
        )
        .await
        .context("Failed to get settings by key")?;
        rows.into_iter().map(Setting::try_from).collect()
    }

    async fn key_exists(&self, key: &str) -> Result<bool> {
        let count: i64 = sql::fetch_scalar(
            &self.pool,
            "SELECT COUNT(*) FROM settings WHERE setting_key = ?",
            &sql_values![key],
        )
        .await
        .context("Failed to check setting key")?;
        Ok(count > 0)
    }

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Setting>> {
        query
            .execute::<SettingRow>(&self.pool)
            .await
            .context("Failed to list settings")?
            .try_map(Setting::try_from)
    }

    async fn update(&self, setting: &Setting) -> Result<Setting> {
        let now = Utc::now();
        sql::execute(
            &self.pool,
            "UPDATE settings SET value = ?, value_type = ?, group_name = ?, description = ?, \
             is_public = ?, file_path = ?, updated_at = ?, search_text = ? WHERE id = ?",
            &sql_values![
                setting.value.as_str(),
                setting.value_type.as_str(),
                setting.group_name.as_str(),
                setting.description.clone(),
                setting.is_public,
                setting.file_path.clone(),
                now,
                search_text(setting),
                setting.id
            ],
        )
        .await
        .context("Failed to update setting")?;

        Ok(Setting {
            updated_at: now,
            ..setting.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sql::execute(&self.pool, "DELETE FROM settings WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete setting")?;
        Ok(result.rows_affected > 0)
    }

    async fn update_values(&self, settings: &[Setting]) -> Result<u64> {
        let now = Utc::now();
        let mut tx = sql::begin(&self.pool).await?;
        let mut updated = 0;
        for setting in settings {
            updated += tx
                .execute(
                    "UPDATE settings SET value = ?, updated_at = ?, search_text = ? WHERE id = ?",
                    &sql_values![setting.value.as_str(), now, search_text(setting), setting.id],
                )
                .await
                .context("Failed to update setting value")?
                .rows_affected;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn stats(&self) -> Result<SettingStats> {
        let public_values = sql_values![true];

        let (total, public, by_group) = tokio::try_join!(
            sql::fetch_scalar::<i64>(&self.pool, "SELECT COUNT(*) FROM settings", &[]),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM settings WHERE is_public = ?",
                &public_values,
            ),
            sql::fetch_all::<GroupCount>(
                &self.pool,
                "SELECT group_name AS label, COUNT(*) AS count FROM settings GROUP BY group_name",
                &[],
            ),
        )
        .context("Failed to compute setting stats")?;

        Ok(SettingStats {
            total,
            public,
            by_group: group_map(by_group),
        })
    }
}
