//! Partner repository

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::sync::Arc;

use super::group_map;
use crate::db::query::{
    fold_search_text, FilterField, FilterKind, ListQuery, QueryConfig, SortOrder, MAX_LIMIT,
};
use crate::db::sql::{self, GroupCount};
use crate::db::DynDatabasePool;
use crate::models::{PaginatedResult, Partner, PartnerCategory, PartnerStats};
use crate::sql_values;

const PARTNER_COLUMNS: &str = "id, name, slug, description, website_url, category, logo_path, \
     is_active, display_order, created_by, created_at, updated_at";

static PARTNER_FILTERS: &[FilterField] = &[
    FilterField {
        param: "category",
        column: "category",
        kind: FilterKind::Enum(PartnerCategory::ALL),
    },
    FilterField {
        param: "is_active",
        column: "is_active",
        kind: FilterKind::Bool,
    },
];

/// Listing configuration for partners
pub static PARTNER_QUERY: QueryConfig = QueryConfig {
    table: "partners",
    columns: PARTNER_COLUMNS,
    sort_columns: &[
        ("display_order", "display_order"),
        ("name", "name"),
        ("created_at", "created_at"),
    ],
    default_sort: "display_order",
    default_order: SortOrder::Asc,
    default_limit: 12,
    max_limit: MAX_LIMIT,
    filters: PARTNER_FILTERS,
    search_columns: &["name", "description"],
};

/// Partner repository trait
#[async_trait]
pub trait PartnerRepository: Send + Sync {
    async fn create(&self, partner: &Partner) -> Result<Partner>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>>;

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Partner>>;

    /// Whether another partner (other than `exclude_id`) already uses `slug`
    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool>;

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Partner>>;

    async fn update(&self, partner: &Partner) -> Result<Partner>;

    async fn delete(&self, id: i64) -> Result<bool>;

    async fn stats(&self) -> Result<PartnerStats>;
}

/// SQLx-based partner repository
pub struct SqlxPartnerRepository {
    pool: DynDatabasePool,
}

impl SqlxPartnerRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn PartnerRepository> {
        Arc::new(Self::new(pool))
    }

    async fn fetch_one_where(&self, clause: &str, value: sql::SqlValue) -> Result<Option<Partner>> {
        let row: Option<PartnerRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM partners WHERE {}", PARTNER_COLUMNS, clause),
            &[value],
        )
        .await?;
        row.map(Partner::try_from).transpose()
    }
}

fn search_text(partner: &Partner) -> String {
    fold_search_text([Some(partner.name.as_str()), partner.description.as_deref()])
}

#[derive(sqlx::FromRow)]
struct PartnerRow {
    id: i64,
    name: String,
    slug: String,
    description: Option<String>,
    website_url: Option<String>,
    category: String,
    logo_path: Option<String>,
    is_active: bool,
    display_order: i64,
    created_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<PartnerRow> for Partner {
    type Error = anyhow::Error;

    fn try_from(row: PartnerRow) -> Result<Self> {
        Ok(Partner {
            id: row.id,
            name: row.name,
            slug: row.slug,
            description: row.description,
            website_url: row.website_url,
            category: row.category.parse()?,
            logo_path: row.logo_path,
            is_active: row.is_active,
            display_order: row.display_order,
            created_by: row.created_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl PartnerRepository for SqlxPartnerRepository {
    async fn create(&self, partner: &Partner) -> Result<Partner> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO partners (name, slug, description, website_url, category, logo_path, \
             is_active, display_order, created_by, created_at, updated_at, search_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &sql_values![
                partner.name.as_str(),
                partner.slug.as_str(),
                partner.description.clone(),
                partner.website_url.clone(),
                partner.category.as_str(),
                partner.logo_path.clone(),
                partner.is_active,
                partner.display_order,
                partner.created_by,
                now,
                now,
                search_text(partner)
            ],
        )
        .await
        .context("Failed to create partner")?;

        Ok(Partner {
            id: result.last_insert_id,
            created_at: now,
            updated_at: now,
            ..partner.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Partner>> {
        self.fetch_one_where("id = ?", id.into())
            .await
            .context("Failed to get partner by ID")
    }

    async fn get_by_slug(&self, slug: &str) -> Result<Option<Partner>> {
        self.fetch_one_where("slug = ?", slug.into())
            .await
            .context("Failed to get partner by slug")
    }

    async fn slug_exists(&self, slug: &str, exclude_id: Option<i64>) -> Result<bool> {
        let count: i64 = sql::fetch_scalar(
            &self.pool,
            "SELECT COUNT(*) FROM partners WHERE slug = ? AND id <> ?",
            &sql_values![slug, exclude_id.unwrap_or(0)],
        )
        .await
        .context("Failed to check partner slug")?;
        Ok(count > 0)
    }

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Partner>> {
        query
            .execute::<PartnerRow>(&self.pool)
            .await
            .context("Failed to list partners")?
            .try_map(Partner::try_from)
    }

    async fn update(&self, partner: &Partner) -> Result<Partner> {
        let now = Utc::now();
        sql::execute(
            &self.pool,
            "UPDATE partners SET name = ?, slug = ?, description = ?, website_url = ?, category = ?, \
             logo_path = ?, is_active = ?, display_order = ?, updated_at = ?, search_text = ? \
             WHERE id = ?",
            &sql_values![
                partner.name.as_str(),
                partner.slug.as_str(),
                partner.description.clone(),
                partner.website_url.clone(),
                partner.category.as_str(),
                partner.logo_path.clone(),
                partner.is_active,
                partner.display_order,
                now,
                search_text(partner),
                partner.id
            ],
        )
        .await
        .context("Failed to update partner")?;

        Ok(Partner {
            updated_at: now,
            ..partner.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sql::execute(&self.pool, "DELETE FROM partners WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete partner")?;
        Ok(result.rows_affected > 0)
    }

    async fn stats(&self) -> Result<PartnerStats> {
        let active_values = sql_values![true];

        let (total, active, by_category) = tokio::try_join!(
            sql::fetch_scalar::<i64>(&self.pool, "SELECT COUNT(*) FROM partners", &[]),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM partners WHERE is_active = ?",
                &active_values,
            ),
            sql::fetch_all::<GroupCount>(
                &self.pool,
                "SELECT category AS label, COUNT(*) AS count FROM partners GROUP BY category",
                &[],
            ),
        )
        .context("Failed to compute partner stats")?;

        Ok(PartnerStats {
            total,
            active,
            by_category: group_map(by_category),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::models::UserRole;

    fn partner(name: &str, slug: &str, category: PartnerCategory, order: i64, owner: i64) -> Partner {
        Partner {
            id: 0,
            name: name.to_string(),
            slug: slug.to_string(),
            description: None,
            website_url: None,
            category,
            logo_path: None,
            is_active: true,
            display_order: order,
            created_by: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_slug_lookup_and_uniqueness() {
        let pool = migrated_pool().await;
        let admin = insert_user(&pool, "admin", UserRole::Admin).await;
        let repo = SqlxPartnerRepository::new(pool);

        let created = repo
            .create(&partner("Acme Labs", "acme-labs", PartnerCategory::Industry, 1, admin))
            .await
            .unwrap();

        let by_slug = repo.get_by_slug("acme-labs").await.unwrap().expect("partner");
        assert_eq!(by_slug.id, created.id);
        assert!(repo.get_by_slug("nope").await.unwrap().is_none());

        assert!(repo.slug_exists("acme-labs", None).await.unwrap());
        assert!(!repo.slug_exists("acme-labs", Some(created.id)).await.unwrap());
        assert!(!repo.slug_exists("other", None).await.unwrap());

        let duplicate = repo
            .create(&partner("Acme", "acme-labs", PartnerCategory::Other, 2, admin))
            .await;
        assert!(duplicate.is_err());
    }

    #[tokio::test]
    async fn test_default_order_and_stats() {
        let pool = migrated_pool().await;
        let admin = insert_user(&pool, "admin", UserRole::Admin).await;
        let repo = SqlxPartnerRepository::new(pool);

        repo.create(&partner("Second", "second", PartnerCategory::Academic, 2, admin))
            .await
            .unwrap();
        let mut first = repo
            .create(&partner("First", "first", PartnerCategory::Academic, 1, admin))
            .await
            .unwrap();
        first.is_active = false;
        repo.update(&first).await.unwrap();

        let listed = repo.list(&ListQuery::defaults(&PARTNER_QUERY)).await.unwrap();
        let names: Vec<_> = listed.items.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec!["First", "Second"]);
        assert_eq!(listed.limit, 12);

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 1);
        assert_eq!(stats.by_category.get("academic"), Some(&2));
    }
}
