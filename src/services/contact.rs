//! Contact inquiry service
//!
//! Anyone may submit an inquiry; everything else is administrator-only.

use chrono::{Duration, Utc};
use std::sync::Arc;

use crate::db::repositories::ContactRepository;
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{
    Contact, ContactStats, ContactStatus, CreateContactInput, PaginatedResult, UpdateContactInput,
    User,
};
use crate::services::access::ensure_admin;
use crate::services::bulk::{self, BulkDeleteResult, BulkItemError, BulkUpdateResult};
use crate::services::validate;
use crate::services::ServiceError;

const STATS_WINDOW_DAYS: i64 = 30;

pub struct ContactService {
    repo: Arc<dyn ContactRepository>,
    codec: Arc<IdCodec>,
}

impl ContactService {
    pub fn new(repo: Arc<dyn ContactRepository>, codec: Arc<IdCodec>) -> Self {
        Self { repo, codec }
    }

    /// Store a contact-form submission
    pub async fn submit(&self, input: CreateContactInput) -> Result<Contact, ServiceError> {
        let input = CreateContactInput {
            name: validate::required_text("name", &input.name, 100)?,
            email: validate::email("email", &input.email)?,
            phone: validate::optional_text("phone", input.phone.as_deref(), 30)?,
            subject: validate::required_text("subject", &input.subject, 200)?,
            message: validate::required_text("message", &input.message, 5000)?,
        };
        let contact = self.repo.create(&input).await?;
        tracing::info!(contact_id = contact.id, "Contact inquiry received");
        Ok(contact)
    }

    pub async fn list(&self, actor: &User, query: &ListQuery) -> Result<PaginatedResult<Contact>, ServiceError> {
        ensure_admin(actor)?;
        Ok(self.repo.list(query).await?)
    }

    pub async fn get(&self, actor: &User, id: i64) -> Result<Contact, ServiceError> {
        ensure_admin(actor)?;
        self.load(id).await
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateContactInput,
    ) -> Result<Contact, ServiceError> {
        ensure_admin(actor)?;
        let mut contact = self.load(id).await?;
        if let Some(status) = input.status {
            contact.status = status;
        }
        if let Some(is_read) = input.is_read {
            contact.is_read = is_read;
        }
        if input.admin_notes.is_some() {
            contact.admin_notes = validate::optional_text("admin_notes", input.admin_notes.as_deref(), 5000)?;
        }
        Ok(self.repo.update(&contact).await?)
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        ensure_admin(actor)?;
        if !self.repo.delete(id).await? {
            return Err(ServiceError::not_found("Contact"));
        }
        Ok(())
    }

    pub async fn bulk_delete(&self, actor: &User, tokens: &[String]) -> Result<BulkDeleteResult, ServiceError> {
        ensure_admin(actor)?;
        let (ids, errors) = self.resolve_batch(tokens).await?;
        let deleted_count = if ids.is_empty() {
            0
        } else {
            self.repo.delete_many(&ids).await?
        };
        tracing::info!(deleted_count, skipped = errors.len(), "Bulk contact delete");
        Ok(BulkDeleteResult {
            deleted_count,
            errors,
        })
    }

    pub async fn bulk_status(
        &self,
        actor: &User,
        tokens: &[String],
        status: ContactStatus,
    ) -> Result<BulkUpdateResult, ServiceError> {
        ensure_admin(actor)?;
        let (ids, errors) = self.resolve_batch(tokens).await?;
        let updated_count = if ids.is_empty() {
            0
        } else {
            self.repo.update_status_many(&ids, status).await?
        };
        Ok(BulkUpdateResult {
            updated_count,
            errors,
        })
    }

    pub async fn stats(&self, actor: &User) -> Result<ContactStats, ServiceError> {
        ensure_admin(actor)?;
        let since = Utc::now() - Duration::days(STATS_WINDOW_DAYS);
        Ok(self.repo.stats(since).await?)
    }

    async fn load(&self, id: i64) -> Result<Contact, ServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Contact"))
    }

    /// Decoded ids that exist, plus an error for every token that does not
    /// resolve to a row
    async fn resolve_batch(&self, tokens: &[String]) -> Result<(Vec<i64>, Vec<BulkItemError>), ServiceError> {
        bulk::check_batch(tokens)?;
        let (decoded, mut errors) = bulk::decode_ids(&self.codec, tokens);
        let ids: Vec<i64> = decoded.iter().map(|(_, id)| *id).collect();
        let existing = self.repo.existing_ids(&ids).await?;

        let mut found = Vec::with_capacity(existing.len());
        for (token, id) in decoded {
            if existing.contains(&id) {
                found.push(id);
            } else {
                errors.push(BulkItemError::new(token, "Resource not found"));
            }
        }
        Ok((found, errors))
    }
}
