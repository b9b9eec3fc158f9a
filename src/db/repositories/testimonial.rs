//! Testimonial repository

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
use crate::models::{PaginatedResult, Testimonial, TestimonialStats};
use crate::sql_values;

const TESTIMONIAL_COLUMNS: &str = "id, author_name, author_title, organization, content, rating, \
     photo_path, media_id, is_published, is_featured, display_order, submitted_by, created_at, updated_at";

static TESTIMONIAL_FILTERS: &[FilterField] = &[
    FilterField {
        param: "is_published",
        column: "is_published",
        kind: FilterKind::Bool,
    },
    FilterField {
        param: "is_featured",
        column: "is_featured",
        kind: FilterKind::Bool,
    },
    FilterField {
        param: "rating",
        column: "rating",
        kind: FilterKind::Int,
    },
    FilterField {
        param: "media_id",
        column: "media_id",
        kind: FilterKind::EncodedId,
    },
];

/// Listing configuration for testimonials
pub static TESTIMONIAL_QUERY: QueryConfig = QueryConfig {
    table: "testimonials",
    columns: TESTIMONIAL_COLUMNS,
    sort_columns: &[
        ("display_order", "display_order"),
        ("created_at", "created_at"),
        ("rating", "rating"),
        ("author_name", "author_name"),
    ],
    default_sort: "display_order",
    default_order: SortOrder::Asc,
    default_limit: 10,
    max_limit: MAX_LIMIT,
    filters: TESTIMONIAL_FILTERS,
    search_columns: &["author_name", "organization", "content"],
};

/// Testimonial repository trait
#[async_trait]
pub trait TestimonialRepository: Send + Sync {
    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Testimonial>>;

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Testimonial>>;

    async fn update(&self, testimonial: &Testimonial) -> Result<Testimonial>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Set `is_published` on all `ids` in one transaction
    async fn set_published_many(&self, ids: &[i64], is_published: bool) -> Result<u64>;

    async fn stats(&self) -> Result<TestimonialStats>;
}

/// SQLx-based testimonial repository
pub struct SqlxTestimonialRepository {
    pool: DynDatabasePool,
}

impl SqlxTestimonialRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn TestimonialRepository> {
        Arc::new(Self::new(pool))
    }
}

fn search_text(testimonial: &Testimonial) -> String {
    fold_search_text([
        Some(testimonial.author_name.as_str()),
        testimonial.organization.as_deref(),
        Some(testimonial.content.as_str()),
    ])
}

#[derive(sqlx::FromRow)]
struct TestimonialRow {
    id: i64,
    author_name: String,
    author_title: Option<String>,
    organization: Option<String>,
    content: String,
    rating: i64,
    photo_path: Option<String>,
    media_id: Option<i64>,
    is_published: bool,
    is_featured: bool,
    display_order: i64,
    submitted_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TestimonialRow> for Testimonial {
    fn from(row: TestimonialRow) -> Self {
        Testimonial {
            id: row.id,
            author_name: row.author_name,
            author_title: row.author_title,
            organization: row.organization,
            content: row.content,
            rating: row.rating,
            photo_path: row.photo_path,
            media_id: row.media_id,
            is_published: row.is_published,
            is_featured: row.is_featured,
            display_order: row.display_order,
            submitted_by: row.submitted_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[async_trait]
impl TestimonialRepository for SqlxTestimonialRepository {
    async fn create(&self, testimonial: &Testimonial) -> Result<Testimonial> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO testimonials (author_name, author_title, organization, content, rating, \
             photo_path, media_id, is_published, is_featured, display_order, submitted_by, \
             created_at, updated_at, search_text) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &sql_values![
                testimonial.author_name.as_str(),
                testimonial.author_title.clone(),
                testimonial.organization.clone(),
                testimonial.content.as_str(),
                testimonial.rating,
                testimonial.photo_path.clone(),
                testimonial.media_id,
                testimonial.is_published,
                testimonial.is_featured,
                testimonial.display_order,
                testimonial.submitted_by,
                now,
                now,
                search_text(testimonial)
            ],
        )
        .await
        .context("Failed to create testimonial")?;

        Ok(Testimonial {
            id: result.last_insert_id,
            created_at: now,
            updated_at: now,
            ..testimonial.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Testimonial>> {
        let row: Option<TestimonialRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM testimonials WHERE id = ?", TESTIMONIAL_COLUMNS),
            &sql_values![id],
        )
        .await
        .context("Failed to get testimonial by ID")?;
        Ok(row.map(Testimonial::from))
    }

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Testimonial>> {
        Ok(query
            .execute::<TestimonialRow>(&self.pool)
            .await
            .context("Failed to list testimonials")?
            .map(Testimonial::from))
    }

    async fn update(&self, testimonial: &Testimonial) -> Result<Testimonial> {
        let now = Utc::now();
        sql::execute(
            &self.pool,
            "UPDATE testimonials SET author_name = ?, author_title = ?, organization = ?, \
             content = ?, rating = ?, photo_path = ?, media_id = ?, is_published = ?, \
             is_featured = ?, display_order = ?, updated_at = ?, search_text = ? WHERE id = ?",
            &sql_values![
                testimonial.author_name.as_str(),
                testimonial.author_title.clone(),
                testimonial.organization.clone(),
                testimonial.content.as_str(),
                testimonial.rating,
                testimonial.photo_path.clone(),
                testimonial.media_id,
                testimonial.is_published,
                testimonial.is_featured,
                testimonial.display_order,
                now,
                search_text(testimonial),
                testimonial.id
            ],
        )
        .await
        .context("Failed to update testimonial")?;

        Ok(Testimonial {
            updated_at: now,
            ..testimonial.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sql::execute(&self.pool, "DELETE FROM testimonials WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete testimonial")?;
        Ok(result.rows_affected > 0)
    }

    async fn set_published_many(&self, ids: &[i64], is_published: bool) -> Result<u64> {
        let now = Utc::now();
        let mut tx = sql::begin(&self.pool).await?;
        let mut updated = 0;
        for id in ids {
            updated += tx
                .execute(
                    "UPDATE testimonials SET is_published = ?, updated_at = ? WHERE id = ?",
                    &sql_values![is_published, now, *id],
                )
                .await
                .context("Failed to publish testimonial")?
                .rows_affected;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn stats(&self) -> Result<TestimonialStats> {
        let driver = self.pool.driver();
        let average_sql = format!("SELECT {} FROM testimonials", sql::avg_f64(driver, "rating"));
        let rating_label = sql::as_text(driver, "rating");
        let by_rating_sql = format!(
            "SELECT {} AS label, COUNT(*) AS count FROM testimonials GROUP BY rating",
            rating_label
        );
        let flag = sql_values![true];

        let (total, published, featured, average_rating, by_rating) = tokio::try_join!(
            sql::fetch_scalar::<i64>(&self.pool, "SELECT COUNT(*) FROM testimonials", &[]),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM testimonials WHERE is_published = ?",
                &flag,
            ),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM testimonials WHERE is_featured = ?",
                &flag,
            ),
            sql::fetch_scalar::<Option<f64>>(&self.pool, &average_sql, &[]),
            sql::fetch_all::<GroupCount>(&self.pool, &by_rating_sql, &[]),
        )
        .context("Failed to compute testimonial stats")?;

        Ok(TestimonialStats {
            total,
            published,
            featured,
            average_rating,
            by_rating: group_map(by_rating),
        })
    }
}
