//! Media library service
//!
//! Anonymous callers only ever see public assets. Authors manage the
//! assets they uploaded; administrators manage all of them.

use std::sync::Arc;

use crate::db::repositories::MediaRepository;
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{
    CreateMediaInput, MediaAsset, MediaStats, MediaType, PaginatedResult, UpdateMediaInput, User,
};
use crate::services::access::ensure_can_modify;
use crate::services::bulk::{self, BulkDeleteResult, BulkItemError};
use crate::services::storage::{remove_quietly, FileStorage, UploadedFile};
use crate::services::validate;
use crate::services::ServiceError;

const MEDIA_FOLDER: &str = "media";

const IN_USE_BY_TESTIMONIAL: &str = "Media is used by a testimonial";

pub struct MediaService {
    repo: Arc<dyn MediaRepository>,
    storage: Arc<dyn FileStorage>,
    codec: Arc<IdCodec>,
}

impl MediaService {
    pub fn new(repo: Arc<dyn MediaRepository>, storage: Arc<dyn FileStorage>, codec: Arc<IdCodec>) -> Self {
        Self { repo, storage, codec }
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        mut query: ListQuery,
    ) -> Result<PaginatedResult<MediaAsset>, ServiceError> {
        if viewer.is_none() {
            query.narrow("is_public", true);
        }
        Ok(self.repo.list(&query).await?)
    }

    /// Hidden assets look exactly like missing ones to anonymous callers
    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<MediaAsset, ServiceError> {
        let media = self.load(id).await?;
        if viewer.is_none() && !media.is_public {
            return Err(ServiceError::not_found("Media"));
        }
        Ok(media)
    }

    pub async fn stats(&self) -> Result<MediaStats, ServiceError> {
        Ok(self.repo.stats().await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreateMediaInput,
        file: UploadedFile,
    ) -> Result<MediaAsset, ServiceError> {
        let title = match input.title.trim() {
            "" => validate::required_text("title", &file.original_name, 255)?,
            title => validate::required_text("title", title, 255)?,
        };
        let description = validate::optional_text("description", input.description.as_deref(), 2000)?;
        let alt_text = validate::optional_text("alt_text", input.alt_text.as_deref(), 255)?;

        let stored = self.storage.store(&file, MEDIA_FOLDER).await?;
        let media = MediaAsset {
            id: 0,
            title,
            description,
            alt_text,
            original_name: file.original_name.clone(),
            file_path: stored.path.clone(),
            mime_type: stored.mime_type.clone(),
            media_type: MediaType::from_mime(&stored.mime_type),
            size_bytes: stored.size as i64,
            is_public: input.is_public.unwrap_or(true),
            uploaded_by: actor.id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        match self.repo.create(&media).await {
            Ok(created) => {
                tracing::info!(media_id = created.id, user_id = actor.id, "Media uploaded");
                Ok(created)
            }
            Err(e) => {
                remove_quietly(self.storage.as_ref(), &stored.path).await;
                Err(e.into())
            }
        }
    }

    /// Update metadata, optionally replacing the file
    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateMediaInput,
        file: Option<UploadedFile>,
    ) -> Result<MediaAsset, ServiceError> {
        let mut media = self.load(id).await?;
        ensure_can_modify(actor, media.uploaded_by)?;

        if let Some(title) = input.title.as_deref() {
            media.title = validate::required_text("title", title, 255)?;
        }
        if input.description.is_some() {
            media.description = validate::optional_text("description", input.description.as_deref(), 2000)?;
        }
        if input.alt_text.is_some() {
            media.alt_text = validate::optional_text("alt_text", input.alt_text.as_deref(), 255)?;
        }
        if let Some(is_public) = input.is_public {
            media.is_public = is_public;
        }

        let mut replaced = None;
        if let Some(file) = file {
            let stored = self.storage.store(&file, MEDIA_FOLDER).await?;
            replaced = Some(std::mem::replace(&mut media.file_path, stored.path));
            media.original_name = file.original_name;
            media.media_type = MediaType::from_mime(&stored.mime_type);
            media.mime_type = stored.mime_type;
            media.size_bytes = stored.size as i64;
        }

        match self.repo.update(&media).await {
            Ok(updated) => {
                if let Some(old) = replaced {
                    remove_quietly(self.storage.as_ref(), &old).await;
                }
                Ok(updated)
            }
            Err(e) => {
                if replaced.is_some() {
                    remove_quietly(self.storage.as_ref(), &media.file_path).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        let media = self.deletable(actor, id).await?;
        self.repo.delete(media.id).await?;
        remove_quietly(self.storage.as_ref(), &media.file_path).await;
        tracing::info!(media_id = media.id, user_id = actor.id, "Media deleted");
        Ok(())
    }

    /// Delete every permitted asset in one transaction and report the rest
    pub async fn bulk_delete(&self, actor: &User, tokens: &[String]) -> Result<BulkDeleteResult, ServiceError> {
        bulk::check_batch(tokens)?;
        let (decoded, mut errors) = bulk::decode_ids(&self.codec, tokens);

        let mut doomed = Vec::with_capacity(decoded.len());
        for (token, id) in decoded {
            match self.deletable(actor, id).await {
                Ok(media) => doomed.push((token, media)),
                Err(ServiceError::Internal(e)) => return Err(ServiceError::Internal(e)),
                Err(e) => errors.push(BulkItemError::new(token, e.to_string())),
            }
        }

        // References are checked again inside the delete transaction
        let ids: Vec<i64> = doomed.iter().map(|(_, m)| m.id).collect();
        let deleted = if ids.is_empty() {
            Vec::new()
        } else {
            self.repo.delete_unreferenced(&ids).await?
        };
        for (token, media) in doomed {
            if deleted.contains(&media.id) {
                remove_quietly(self.storage.as_ref(), &media.file_path).await;
            } else {
                errors.push(BulkItemError::new(token, IN_USE_BY_TESTIMONIAL));
            }
        }
        let deleted_count = deleted.len() as u64;

        tracing::info!(deleted_count, skipped = errors.len(), user_id = actor.id, "Bulk media delete");
        Ok(BulkDeleteResult {
            deleted_count,
            errors,
        })
    }

    /// Absolute URL of a stored asset
    pub fn url_for(&self, media: &MediaAsset) -> String {
        self.storage.url_for(&media.file_path)
    }

    pub async fn exists(&self, id: i64) -> Result<bool, ServiceError> {
        Ok(self.repo.get_by_id(id).await?.is_some())
    }

    async fn load(&self, id: i64) -> Result<MediaAsset, ServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Media"))
    }

    /// Load an asset `actor` may delete: owned (or admin) and unreferenced
    async fn deletable(&self, actor: &User, id: i64) -> Result<MediaAsset, ServiceError> {
        let media = self.load(id).await?;
        ensure_can_modify(actor, media.uploaded_by)?;
        let references = self.repo.reference_count(media.id).await?;
        if references > 0 {
            return Err(ServiceError::DependencyInUse(format!(
                "Media is used by {} testimonial(s)",
                references
            )));
        }
        Ok(media)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::db::query::tests::codec;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::testimonial::tests::testimonial;
    use crate::db::repositories::{SqlxMediaRepository, SqlxTestimonialRepository, TestimonialRepository, MEDIA_QUERY};
    use crate::db::DynDatabasePool;
    use crate::models::UserRole;
    use crate::services::access::tests::actor;
    use crate::services::storage::tests::{local_storage, png};
    use crate::services::storage::LocalFileStorage;
    use tempfile::TempDir;

    pub(crate) struct Fixture {
        pub pool: DynDatabasePool,
        pub service: MediaService,
        pub storage: Arc<LocalFileStorage>,
        _dir: TempDir,
    }

    pub(crate) async fn fixture() -> Fixture {
        let pool = migrated_pool().await;
        let (dir, storage) = local_storage();
        let storage = Arc::new(storage);
        let service = MediaService::new(
            SqlxMediaRepository::boxed(pool.clone()),
            storage.clone(),
            Arc::new(codec()),
        );
        Fixture {
            pool,
            service,
            storage,
            _dir: dir,
        }
    }

    fn titled(title: &str, is_public: bool) -> CreateMediaInput {
        CreateMediaInput {
            title: title.to_string(),
            is_public: Some(is_public),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_stores_file_and_derives_type() {
        let fx = fixture().await;
        let owner = insert_user(&fx.pool, "writer", UserRole::Author).await;
        let author = actor(owner, UserRole::Author);

        let media = fx.service.create(&author, CreateMediaInput::default(), png("campus.png")).await.unwrap();
        assert_eq!(media.title, "campus.png");
        assert_eq!(media.media_type, MediaType::Image);
        assert_eq!(media.uploaded_by, owner);
        assert!(media.is_public);
        assert!(fx.storage.root().join(&media.file_path).exists());
        assert!(fx.service.url_for(&media).ends_with(&format!("/uploads/{}", media.file_path)));
    }

    #[tokio::test]
    async fn test_anonymous_sees_only_public() {
        let fx = fixture().await;
        let owner = insert_user(&fx.pool, "writer", UserRole::Author).await;
        let author = actor(owner, UserRole::Author);

        let public = fx.service.create(&author, titled("open", true), png("a.png")).await.unwrap();
        let hidden = fx.service.create(&author, titled("draft", false), png("b.png")).await.unwrap();

        let anonymous = fx.service.list(None, ListQuery::defaults(&MEDIA_QUERY)).await.unwrap();
        assert_eq!(anonymous.total, 1);
        assert_eq!(anonymous.items[0].id, public.id);

        let signed_in = fx.service.list(Some(&author), ListQuery::defaults(&MEDIA_QUERY)).await.unwrap();
        assert_eq!(signed_in.total, 2);

        assert!(matches!(fx.service.get(None, hidden.id).await, Err(ServiceError::NotFound(_))));
        assert!(fx.service.get(Some(&author), hidden.id).await.is_ok());
    }

    #[tokio::test]
    async fn test_replace_file_removes_old_one() {
        let fx = fixture().await;
        let owner = insert_user(&fx.pool, "writer", UserRole::Author).await;
        let author = actor(owner, UserRole::Author);
        let media = fx.service.create(&author, titled("logo", true), png("v1.png")).await.unwrap();
        let old_path = fx.storage.root().join(&media.file_path);

        let updated = fx
            .service
            .update(&author, media.id, UpdateMediaInput::default(), Some(png("v2.png")))
            .await
            .unwrap();
        assert_ne!(updated.file_path, media.file_path);
        assert_eq!(updated.original_name, "v2.png");
        assert!(!old_path.exists());
        assert!(fx.storage.root().join(&updated.file_path).exists());
    }

    #[tokio::test]
    async fn test_only_owner_or_admin_may_modify() {
        let fx = fixture().await;
        let owner_id = insert_user(&fx.pool, "owner", UserRole::Author).await;
        let other_id = insert_user(&fx.pool, "other", UserRole::Author).await;
        let owner = actor(owner_id, UserRole::Author);
        let other = actor(other_id, UserRole::Author);
        let admin = actor(999, UserRole::Admin);

        let media = fx.service.create(&owner, titled("mine", true), png("a.png")).await.unwrap();
        let edit = UpdateMediaInput {
            title: Some("theirs".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            fx.service.update(&other, media.id, edit.clone(), None).await,
            Err(ServiceError::Permission(_))
        ));
        assert!(matches!(fx.service.delete(&other, media.id).await, Err(ServiceError::Permission(_))));
        assert_eq!(fx.service.update(&admin, media.id, edit, None).await.unwrap().title, "theirs");
        fx.service.delete(&admin, media.id).await.unwrap();
    }

    #[tokio::test]
    async fn test_delete_blocked_while_referenced() {
        let fx = fixture().await;
        let owner = insert_user(&fx.pool, "writer", UserRole::Author).await;
        let author = actor(owner, UserRole::Author);
        let media = fx.service.create(&author, titled("portrait", true), png("p.png")).await.unwrap();

        let mut quote = testimonial("Ana", 5, true, owner);
        quote.media_id = Some(media.id);
        SqlxTestimonialRepository::new(fx.pool.clone()).create(&quote).await.unwrap();

        assert!(matches!(
            fx.service.delete(&author, media.id).await,
            Err(ServiceError::DependencyInUse(_))
        ));
        assert!(fx.storage.root().join(&media.file_path).exists());
    }

    #[tokio::test]
    async fn test_bulk_delete_mixed_ownership() {
        let fx = fixture().await;
        let mine_id = insert_user(&fx.pool, "mine", UserRole::Author).await;
        let theirs_id = insert_user(&fx.pool, "theirs", UserRole::Author).await;
        let me = actor(mine_id, UserRole::Author);
        let them = actor(theirs_id, UserRole::Author);
        let codec = codec();

        let mut tokens = Vec::new();
        for i in 0..2 {
            let m = fx.service.create(&me, titled(&format!("m{}", i), true), png("m.png")).await.unwrap();
            tokens.push(codec.encode(m.id));
        }
        for i in 0..3 {
            let m = fx.service.create(&them, titled(&format!("t{}", i), true), png("t.png")).await.unwrap();
            tokens.push(codec.encode(m.id));
        }

        let result = fx.service.bulk_delete(&me, &tokens).await.unwrap();
        assert_eq!(result.deleted_count, 2);
        assert_eq!(result.errors.len(), 3);
        assert!(result.errors.iter().all(|e| tokens[2..].contains(&e.id)));

        let remaining = fx.service.list(Some(&me), ListQuery::defaults(&MEDIA_QUERY)).await.unwrap();
        assert_eq!(remaining.total, 3);
    }
}
