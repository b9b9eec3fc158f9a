//! Media asset repository

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
use crate::models::{MediaAsset, MediaStats, MediaType, PaginatedResult};
use crate::sql_values;

const MEDIA_COLUMNS: &str = "id, title, description, alt_text, original_name, file_path, mime_type, \
     media_type, size_bytes, is_public, uploaded_by, created_at, updated_at";

static MEDIA_FILTERS: &[FilterField] = &[
    FilterField {
        param: "media_type",
        column: "media_type",
        kind: FilterKind::Enum(MediaType::ALL),
    },
    FilterField {
        param: "is_public",
        column: "is_public",
        kind: FilterKind::Bool,
    },
    FilterField {
        param: "uploaded_by",
        column: "uploaded_by",
        kind: FilterKind::EncodedId,
    },
];

/// Listing configuration for media assets
pub static MEDIA_QUERY: QueryConfig = QueryConfig {
    table: "media_assets",
    columns: MEDIA_COLUMNS,
    sort_columns: &[
        ("created_at", "created_at"),
        ("title", "title"),
        ("size_bytes", "size_bytes"),
        ("media_type", "media_type"),
    ],
    default_sort: "created_at",
    default_order: SortOrder::Desc,
    default_limit: 20,
    max_limit: MAX_LIMIT,
    filters: MEDIA_FILTERS,
    search_columns: &["title", "description", "alt_text", "original_name"],
};

/// Media repository trait
#[async_trait]
pub trait MediaRepository: Send + Sync {
    /// Insert an asset; `id` and timestamps of the argument are ignored
    async fn create(&self, media: &MediaAsset) -> Result<MediaAsset>;

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>>;

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<MediaAsset>>;

    /// Persist metadata and file fields
    async fn update(&self, media: &MediaAsset) -> Result<MediaAsset>;

    async fn delete(&self, id: i64) -> Result<bool>;

    /// Delete, in one transaction, every asset in `ids` that no testimonial
    /// references. Returns the ids actually deleted.
    async fn delete_unreferenced(&self, ids: &[i64]) -> Result<Vec<i64>>;

    /// Number of testimonials pointing at the asset
    async fn reference_count(&self, id: i64) -> Result<i64>;

    async fn stats(&self) -> Result<MediaStats>;
}

/// SQLx-based media repository
pub struct SqlxMediaRepository {
    pool: DynDatabasePool,
}

impl SqlxMediaRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn MediaRepository> {
        Arc::new(Self::new(pool))
    }
}

fn search_text(media: &MediaAsset) -> String {
    fold_search_text([
        Some(media.title.as_str()),
        media.description.as_deref(),
        media.alt_text.as_deref(),
        Some(media.original_name.as_str()),
    ])
}

#[derive(sqlx::FromRow)]
struct MediaRow {
    id: i64,
    title: String,
    description: Option<String>,
    alt_text: Option<String>,
    original_name: String,
    file_path: String,
    mime_type: String,
    media_type: String,
    size_bytes: i64,
    is_public: bool,
    uploaded_by: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<MediaRow> for MediaAsset {
    type Error = anyhow::Error;

    fn try_from(row: MediaRow) -> Result<Self> {
        Ok(MediaAsset {
            id: row.id,
            title: row.title,
            description: row.description,
            alt_text: row.alt_text,
            original_name: row.original_name,
            file_path: row.file_path,
            mime_type: row.mime_type,
            media_type: row.media_type.parse()?,
            size_bytes: row.size_bytes,
            is_public: row.is_public,
            uploaded_by: row.uploaded_by,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl MediaRepository for SqlxMediaRepository {
    async fn create(&self, media: &MediaAsset) -> Result<MediaAsset> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO media_assets (title, description, alt_text, original_name, file_path, \
             mime_type, media_type, size_bytes, is_public, uploaded_by, created_at, updated_at, \
             search_text) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &sql_values![
                media.title.as_str(),
                media.description.clone(),
                media.alt_text.clone(),
                media.original_name.as_str(),
                media.file_path.as_str(),
                media.mime_type.as_str(),
                media.media_type.as_str(),
                media.size_bytes,
                media.is_public,
                media.uploaded_by,
                now,
                now,
                search_text(media)
            ],
        )
        .await
        .context("Failed to create media asset")?;

        Ok(MediaAsset {
            id: result.last_insert_id,
            created_at: now,
            updated_at: now,
            ..media.clone()
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<MediaAsset>> {
        let row: Option<MediaRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM media_assets WHERE id = ?", MEDIA_COLUMNS),
            &sql_values![id],
        )
        .await
        .context("Failed to get media asset by ID")?;
        row.map(MediaAsset::try_from).transpose()
    }

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<MediaAsset>> {
        query
            .execute::<MediaRow>(&self.pool)
            .await
            .context("Failed to list media assets")?
            .try_map(MediaAsset::try_from)
    }

    async fn update(&self, media: &MediaAsset) -> Result<MediaAsset> {
        let now = Utc::now();
        sql::execute(
            &self.pool,
            "UPDATE media_assets SET title = ?, description = ?, alt_text = ?, original_name = ?, \
             file_path = ?, mime_type = ?, media_type = ?, size_bytes = ?, is_public = ?, \
             updated_at = ?, search_text = ? WHERE id = ?",
            &sql_values![
                media.title.as_str(),
                media.description.clone(),
                media.alt_text.clone(),
                media.original_name.as_str(),
                media.file_path.as_str(),
                media.mime_type.as_str(),
                media.media_type.as_str(),
                media.size_bytes,
                media.is_public,
                now,
                search_text(media),
                media.id
            ],
        )
        .await
        .context("Failed to update media asset")?;

        Ok(MediaAsset {
            updated_at: now,
            ..media.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sql::execute(&self.pool, "DELETE FROM media_assets WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete media asset")?;
        Ok(result.rows_affected > 0)
    }

    async fn delete_unreferenced(&self, ids: &[i64]) -> Result<Vec<i64>> {
        let mut tx = sql::begin(&self.pool).await?;
        let mut deleted = Vec::with_capacity(ids.len());
        for id in ids {
            let result = tx
                .execute(
                    "DELETE FROM media_assets WHERE id = ? \
                     AND NOT EXISTS (SELECT 1 FROM testimonials WHERE media_id = ?)",
                    &sql_values![*id, *id],
                )
                .await
                .context("Failed to delete media asset")?;
            if result.rows_affected > 0 {
                deleted.push(*id);
            }
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn reference_count(&self, id: i64) -> Result<i64> {
        sql::fetch_scalar(
            &self.pool,
            "SELECT COUNT(*) FROM testimonials WHERE media_id = ?",
            &sql_values![id],
        )
        .await
        .context("Failed to count media references")
    }

    async fn stats(&self) -> Result<MediaStats> {
        let driver = self.pool.driver();
        let bytes_sql = format!("SELECT {} FROM media_assets", sql::sum_i64(driver, "size_bytes"));

        let (total, total_bytes, by_type) = tokio::try_join!(
            sql::fetch_scalar::<i64>(&self.pool, "SELECT COUNT(*) FROM media_assets", &[]),
            sql::fetch_scalar::<i64>(&self.pool, &bytes_sql, &[]),
            sql::fetch_all::<GroupCount>(
                &self.pool,
                "SELECT media_type AS label, COUNT(*) AS count FROM media_assets GROUP BY media_type",
                &[],
            ),
        )
        .context("Failed to compute media stats")?;

        Ok(MediaStats {
            total,
            total_bytes,
            by_type: group_map(by_type),
        })
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::testimonial::tests::testimonial;
    use crate::db::repositories::testimonial::{SqlxTestimonialRepository, TestimonialRepository};
    use crate::ids::IdCodec;
    use crate::models::UserRole;
    use std::collections::HashMap;

    pub(crate) fn asset(title: &str, mime: &str, size: i64, is_public: bool, owner: i64) -> MediaAsset {
        MediaAsset {
            id: 0,
            title: title.to_string(),
            description: None,
            alt_text: None,
            original_name: format!("{}.bin", title),
            file_path: format!("{}.bin", title),
            mime_type: mime.to_string(),
            media_type: MediaType::from_mime(mime),
            size_bytes: size,
            is_public,
            uploaded_by: owner,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_create_get_update() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "uploader", UserRole::Author).await;
        let repo = SqlxMediaRepository::new(pool);

        let created = repo.create(&asset("campus", "image/png", 1024, true, owner)).await.unwrap();
        let mut found = repo.get_by_id(created.id).await.unwrap().expect("asset");
        assert_eq!(found.media_type, MediaType::Image);
        assert_eq!(found.uploaded_by, owner);

        found.title = "Main campus".to_string();
        found.is_public = false;
        repo.update(&found).await.unwrap();
        let reloaded = repo.get_by_id(created.id).await.unwrap().unwrap();
        assert_eq!(reloaded.title, "Main campus");
        assert!(!reloaded.is_public);
    }

    #[tokio::test]
    async fn test_list_by_owner_and_type() {
        let pool = migrated_pool().await;
        let alice = insert_user(&pool, "alice", UserRole::Author).await;
        let bob = insert_user(&pool, "bob", UserRole::Author).await;
        let repo = SqlxMediaRepository::new(pool);

        repo.create(&asset("a1", "image/png", 10, true, alice)).await.unwrap();
        repo.create(&asset("a2", "application/pdf", 20, true, alice)).await.unwrap();
        repo.create(&asset("b1", "image/jpeg", 30, false, bob)).await.unwrap();

        let codec = IdCodec::new(b"media-repo-test-secret").unwrap();
        let params: HashMap<String, String> = [
            ("uploaded_by".to_string(), codec.encode(alice)),
            ("media_type".to_string(), "image".to_string()),
        ]
        .into_iter()
        .collect();
        let query = ListQuery::parse(&params, &MEDIA_QUERY, &codec).unwrap();
        let result = repo.list(&query).await.unwrap();
        assert_eq!(result.total, 1);
        assert_eq!(result.items[0].title, "a1");
    }

    #[tokio::test]
    async fn test_stats_and_delete_unreferenced() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "uploader", UserRole::Author).await;
        let repo = SqlxMediaRepository::new(pool);

        let empty = repo.stats().await.unwrap();
        assert_eq!(empty.total, 0);
        assert_eq!(empty.total_bytes, 0);

        let a = repo.create(&asset("a", "image/png", 100, true, owner)).await.unwrap();
        let b = repo.create(&asset("b", "video/mp4", 250, true, owner)).await.unwrap();

        let stats = repo.stats().await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.total_bytes, 350);
        assert_eq!(stats.by_type.get("video"), Some(&1));

        assert_eq!(repo.reference_count(a.id).await.unwrap(), 0);
        assert_eq!(repo.delete_unreferenced(&[a.id, b.id]).await.unwrap(), vec![a.id, b.id]);
        assert_eq!(repo.stats().await.unwrap().total, 0);
    }

    #[tokio::test]
    async fn test_delete_unreferenced_keeps_referenced_assets() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "uploader", UserRole::Author).await;
        let repo = SqlxMediaRepository::new(pool.clone());

        let used = repo.create(&asset("used", "image/png", 10, true, owner)).await.unwrap();
        let spare = repo.create(&asset("spare", "image/png", 10, true, owner)).await.unwrap();

        // Reference appears after any service-level check would have run
        let mut quote = testimonial("Ana", 5, true, owner);
        quote.media_id = Some(used.id);
        SqlxTestimonialRepository::new(pool).create(&quote).await.unwrap();

        let deleted = repo.delete_unreferenced(&[used.id, spare.id]).await.unwrap();
        assert_eq!(deleted, vec![spare.id]);
        assert!(repo.get_by_id(used.id).await.unwrap().is_some());
        assert!(repo.get_by_id(spare.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_search_matches_accented_titles() {
        let pool = migrated_pool().await;
        let owner = insert_user(&pool, "uploader", UserRole::Author).await;
        let repo = SqlxMediaRepository::new(pool);
        let mut created = repo.create(&asset("Plain", "image/png", 10, true, owner)).await.unwrap();
        created.title = "Façade Été".to_string();
        repo.update(&created).await.unwrap();

        let codec = IdCodec::new(b"media-repo-test-secret").unwrap();
        let params: HashMap<String, String> =
            [("query".to_string(), "FAÇADE".to_string())].into_iter().collect();
        let query = ListQuery::parse(&params, &MEDIA_QUERY, &codec).unwrap();
        assert_eq!(repo.list(&query).await.unwrap().total, 1);
    }
}
