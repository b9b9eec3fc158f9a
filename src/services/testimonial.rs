//! Testimonial service
//!
//! Authors may submit and edit their own quotes, but only administrators
//! decide what gets published, featured or reordered. An author's edit
//! takes a published quote offline until an administrator publishes it
//! again.

use std::sync::Arc;

use crate::db::repositories::{MediaRepository, TestimonialRepository};
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{
    CreateTestimonialInput, PaginatedResult, Testimonial, TestimonialStats, UpdateTestimonialInput,
    User, MAX_RATING, MIN_RATING,
};
use crate::services::access::{ensure_admin, ensure_can_modify};
use crate::services::bulk::{self, BulkItemError, BulkUpdateResult};
use crate::services::storage::{remove_quietly, FileStorage, UploadedFile};
use crate::services::validate;
use crate::services::ServiceError;

const PHOTO_FOLDER: &str = "testimonials";
const DEFAULT_RATING: i64 = 5;

pub struct TestimonialService {
    repo: Arc<dyn TestimonialRepository>,
    media: Arc<dyn MediaRepository>,
    storage: Arc<dyn FileStorage>,
    codec: Arc<IdCodec>,
}

fn check_rating(rating: i64) -> Result<i64, ServiceError> {
    if !(MIN_RATING..=MAX_RATING).contains(&rating) {
        return Err(ServiceError::Validation(format!(
            "rating must be between {} and {}",
            MIN_RATING, MAX_RATING
        )));
    }
    Ok(rating)
}

impl TestimonialService {
    pub fn new(
        repo: Arc<dyn TestimonialRepository>,
        media: Arc<dyn MediaRepository>,
        storage: Arc<dyn FileStorage>,
        codec: Arc<IdCodec>,
    ) -> Self {
        Self {
            repo,
            media,
            storage,
            codec,
        }
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        mut query: ListQuery,
    ) -> Result<PaginatedResult<Testimonial>, ServiceError> {
        if viewer.is_none() {
            query.narrow("is_published", true);
        }
        Ok(self.repo.list(&query).await?)
    }

    pub async fn get(&self, viewer: Option<&User>, id: i64) -> Result<Testimonial, ServiceError> {
        let testimonial = self.load(id).await?;
        if viewer.is_none() && !testimonial.is_published {
            return Err(ServiceError::not_found("Testimonial"));
        }
        Ok(testimonial)
    }

    pub async fn stats(&self) -> Result<TestimonialStats, ServiceError> {
        Ok(self.repo.stats().await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreateTestimonialInput,
        photo: Option<UploadedFile>,
    ) -> Result<Testimonial, ServiceError> {
        let moderated = actor.is_admin();
        let mut testimonial = Testimonial {
            id: 0,
            author_name: validate::required_text("author_name", &input.author_name, 100)?,
            author_title: validate::optional_text("author_title", input.author_title.as_deref(), 100)?,
            organization: validate::optional_text("organization", input.organization.as_deref(), 150)?,
            content: validate::required_text("content", &input.content, 2000)?,
            rating: check_rating(input.rating.unwrap_or(DEFAULT_RATING))?,
            photo_path: None,
            media_id: input.media_id,
            is_published: moderated && input.is_published.unwrap_or(false),
            is_featured: moderated && input.is_featured.unwrap_or(false),
            display_order: if moderated { input.display_order.unwrap_or(0) } else { 0 },
            submitted_by: actor.id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        self.check_media(testimonial.media_id).await?;

        if let Some(photo) = photo {
            testimonial.photo_path = Some(self.storage.store(&photo, PHOTO_FOLDER).await?.path);
        }

        match self.repo.create(&testimonial).await {
            Ok(created) => {
                tracing::info!(testimonial_id = created.id, user_id = actor.id, "Testimonial created");
                Ok(created)
            }
            Err(e) => {
                if let Some(path) = &testimonial.photo_path {
                    remove_quietly(self.storage.as_ref(), path).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateTestimonialInput,
        photo: Option<UploadedFile>,
    ) -> Result<Testimonial, ServiceError> {
        let mut testimonial = self.load(id).await?;
        ensure_can_modify(actor, testimonial.submitted_by)?;
        if input.touches_moderation() && !actor.is_admin() {
            return Err(ServiceError::Permission(
                "Only administrators can publish, feature or reorder testimonials".to_string(),
            ));
        }

        if let Some(name) = input.author_name.as_deref() {
            testimonial.author_name = validate::required_text("author_name", name, 100)?;
        }
        if input.author_title.is_some() {
            testimonial.author_title = validate::optional_text("author_title", input.author_title.as_deref(), 100)?;
        }
        if input.organization.is_some() {
            testimonial.organization = validate::optional_text("organization", input.organization.as_deref(), 150)?;
        }
        if let Some(content) = input.content.as_deref() {
            testimonial.content = validate::required_text("content", content, 2000)?;
        }
        if let Some(rating) = input.rating {
            testimonial.rating = check_rating(rating)?;
        }
        if input.media_id.is_some() {
            self.check_media(input.media_id).await?;
            testimonial.media_id = input.media_id;
        }
        if let Some(is_published) = input.is_published {
            testimonial.is_published = is_published;
        }
        if let Some(is_featured) = input.is_featured {
            testimonial.is_featured = is_featured;
        }
        if let Some(display_order) = input.display_order {
            testimonial.display_order = display_order;
        }

        let mut replaced = None;
        if let Some(photo) = photo {
            let stored = self.storage.store(&photo, PHOTO_FOLDER).await?;
            replaced = Some(std::mem::replace(&mut testimonial.photo_path, Some(stored.path)));
        }

        // An author's edit goes back to moderation
        if !actor.is_admin() && (testimonial.is_published || testimonial.is_featured) {
            testimonial.is_published = false;
            testimonial.is_featured = false;
            tracing::info!(
                testimonial_id = testimonial.id,
                user_id = actor.id,
                "Edited testimonial withdrawn for moderation"
            );
        }

        match self.repo.update(&testimonial).await {
            Ok(updated) => {
                if let Some(Some(old)) = replaced {
                    remove_quietly(self.storage.as_ref(), &old).await;
                }
                Ok(updated)
            }
            Err(e) => {
                if let (Some(_), Some(new)) = (&replaced, &testimonial.photo_path) {
                    remove_quietly(self.storage.as_ref(), new).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        let testimonial = self.load(id).await?;
        ensure_can_modify(actor, testimonial.submitted_by)?;
        self.repo.delete(testimonial.id).await?;
        if let Some(path) = &testimonial.photo_path {
            remove_quietly(self.storage.as_ref(), path).await;
        }
        tracing::info!(testimonial_id = testimonial.id, user_id = actor.id, "Testimonial deleted");
        Ok(())
    }

    /// Publish or unpublish a batch of testimonials
    pub async fn bulk_publish(
        &self,
        actor: &User,
        tokens: &[String],
        is_published: bool,
    ) -> Result<BulkUpdateResult, ServiceError> {
        ensure_admin(actor)?;
        bulk::check_batch(tokens)?;
        let (decoded, mut errors) = bulk::decode_ids(&self.codec, tokens);

        let mut ids = Vec::with_capacity(decoded.len());
        for (token, id) in decoded {
            match self.repo.get_by_id(id).await? {
                Some(_) => ids.push(id),
                None => errors.push(BulkItemError::new(token, "Resource not found")),
            }
        }

        let updated_count = if ids.is_empty() {
            0
        } else {
            self.repo.set_published_many(&ids, is_published).await?
        };
        tracing::info!(updated_count, is_published, skipped = errors.len(), "Bulk testimonial publish");
        Ok(BulkUpdateResult {
            updated_count,
            errors,
        })
    }

    pub fn photo_url(&self, testimonial: &Testimonial) -> Option<String> {
        testimonial
            .photo_path
            .as_deref()
            .map(|path| self.storage.url_for(path))
    }

    async fn load(&self, id: i64) -> Result<Testimonial, ServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Testimonial"))
    }

    async fn check_media(&self, media_id: Option<i64>) -> Result<(), ServiceError> {
        if let Some(media_id) = media_id {
            if self.media.get_by_id(media_id).await?.is_none() {
                return Err(ServiceError::validation("media_id does not refer to an existing media asset"));
            }
        }
        Ok(())
    }
}
