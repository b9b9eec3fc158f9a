//! Partner directory service

use std::sync::Arc;

use crate::db::repositories::PartnerRepository;
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{
    CreatePartnerInput, PaginatedResult, Partner, PartnerStats, UpdatePartnerInput, User,
};
use crate::services::access::ensure_admin;
use crate::services::slug::{generate_slug, is_valid_slug};
use crate::services::storage::{remove_quietly, FileStorage, UploadedFile};
use crate::services::validate;
use crate::services::ServiceError;

const LOGO_FOLDER: &str = "partners";

pub struct PartnerService {
    repo: Arc<dyn PartnerRepository>,
    storage: Arc<dyn FileStorage>,
    codec: Arc<IdCodec>,
}

impl PartnerService {
    pub fn new(repo: Arc<dyn PartnerRepository>, storage: Arc<dyn FileStorage>, codec: Arc<IdCodec>) -> Self {
        Self { repo, storage, codec }
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        mut query: ListQuery,
    ) -> Result<PaginatedResult<Partner>, ServiceError> {
        if viewer.is_none() {
            query.narrow("is_active", true);
        }
        Ok(self.repo.list(&query).await?)
    }

    /// Look up by encoded id first, then by slug. Inactive partners are
    /// hidden from anonymous callers.
    pub async fn get(&self, viewer: Option<&User>, id_or_slug: &str) -> Result<Partner, ServiceError> {
        let by_id = match self.codec.decode_lenient(id_or_slug) {
            Some(id) => self.repo.get_by_id(id).await?,
            None => None,
        };
        let partner = match by_id {
            Some(partner) => Some(partner),
            None => self.repo.get_by_slug(id_or_slug).await?,
        };

        match partner {
            Some(partner) if viewer.is_some() || partner.is_active => Ok(partner),
            _ => Err(ServiceError::not_found("Partner")),
        }
    }

    pub async fn stats(&self, actor: &User) -> Result<PartnerStats, ServiceError> {
        ensure_admin(actor)?;
        Ok(self.repo.stats().await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreatePartnerInput,
        logo: Option<UploadedFile>,
    ) -> Result<Partner, ServiceError> {
        ensure_admin(actor)?;
        let name = validate::required_text("name", &input.name, 150)?;
        let slug = self.claim_slug(input.slug.as_deref(), &name, None).await?;

        let mut partner = Partner {
            id: 0,
            name,
            slug,
            description: validate::optional_text("description", input.description.as_deref(), 2000)?,
            website_url: validate::optional_url("website_url", input.website_url.as_deref())?,
            category: input.category.unwrap_or_default(),
            logo_path: None,
            is_active: input.is_active.unwrap_or(true),
            display_order: input.display_order.unwrap_or(0),
            created_by: actor.id,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };

        if let Some(logo) = logo {
            partner.logo_path = Some(self.storage.store(&logo, LOGO_FOLDER).await?.path);
        }

        match self.repo.create(&partner).await {
            Ok(created) => {
                tracing::info!(partner_id = created.id, slug = %created.slug, "Partner created");
                Ok(created)
            }
            Err(e) => {
                if let Some(path) = &partner.logo_path {
                    remove_quietly(self.storage.as_ref(), path).await;
                }
                Err(ServiceError::or_conflict(e, slug_in_use(&partner.slug)))
            }
        }
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdatePartnerInput,
        logo: Option<UploadedFile>,
    ) -> Result<Partner, ServiceError> {
        ensure_admin(actor)?;
        let mut partner = self.load(id).await?;

        if let Some(name) = input.name.as_deref() {
            partner.name = validate::required_text("name", name, 150)?;
        }
        if let Some(slug) = input.slug.as_deref() {
            partner.slug = self.claim_slug(Some(slug), &partner.name, Some(partner.id)).await?;
        }
        if input.description.is_some() {
            partner.description = validate::optional_text("description", input.description.as_deref(), 2000)?;
        }
        if input.website_url.is_some() {
            partner.website_url = validate::optional_url("website_url", input.website_url.as_deref())?;
        }
        if let Some(category) = input.category {
            partner.category = category;
        }
        if let Some(is_active) = input.is_active {
            partner.is_active = is_active;
        }
        if let Some(display_order) = input.display_order {
            partner.display_order = display_order;
        }

        let mut replaced = None;
        if let Some(logo) = logo {
            let stored = self.storage.store(&logo, LOGO_FOLDER).await?;
            replaced = Some(std::mem::replace(&mut partner.logo_path, Some(stored.path)));
        }

        match self.repo.update(&partner).await {
            Ok(updated) => {
                if let Some(Some(old)) = replaced {
                    remove_quietly(self.storage.as_ref(), &old).await;
                }
                Ok(updated)
            }
            Err(e) => {
                if let (Some(_), Some(new)) = (&replaced, &partner.logo_path) {
                    remove_quietly(self.storage.as_ref(), new).await;
                }
                Err(ServiceError::or_conflict(e, slug_in_use(&partner.slug)))
            }
        }
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        ensure_admin(actor)?;
        let partner = self.load(id).await?;
        self.repo.delete(partner.id).await?;
        if let Some(path) = &partner.logo_path {
            remove_quietly(self.storage.as_ref(), path).await;
        }
        tracing::info!(partner_id = partner.id, "Partner deleted");
        Ok(())
    }

    pub fn logo_url(&self, partner: &Partner) -> Option<String> {
        partner.logo_path.as_deref().map(|path| self.storage.url_for(path))
    }

    async fn load(&self, id: i64) -> Result<Partner, ServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Partner"))
    }

    /// Use the requested slug (or one derived from `name`) if no other
    /// partner holds it
    async fn claim_slug(
        &self,
        requested: Option<&str>,
        name: &str,
        exclude_id: Option<i64>,
    ) -> Result<String, ServiceError> {
        let slug = match requested.map(str::trim) {
            Some(slug) if !slug.is_empty() => {
                if !is_valid_slug(slug) {
                    return Err(ServiceError::validation(
                        "slug may contain only lowercase letters, digits and single hyphens",
                    ));
                }
                slug.to_string()
            }
            _ => generate_slug(name),
        };
        if slug.is_empty() {
            return Err(ServiceError::validation("name must contain letters or digits"));
        }
        if self.repo.slug_exists(&slug, exclude_id).await? {
            return Err(ServiceError::Conflict(slug_in_use(&slug)));
        }
        Ok(slug)
    }
}

fn slug_in_use(slug: &str) -> String {
    format!("Slug '{}' is already in use", slug)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::tests::codec;
    use crate::db::repositories::test_support::{insert_user, migrated_pool};
    use crate::db::repositories::{SqlxPartnerRepository, PARTNER_QUERY};
    use crate::models::{PartnerCategory, UserRole};
    use crate::services::access::tests::actor;
    use crate::services::storage::tests::{local_storage, png};
    use crate::services::storage::LocalFileStorage;
    use std::collections::HashMap;
    use tempfile::TempDir;

    async fn setup() -> (PartnerService, User, Arc<LocalFileStorage>, TempDir) {
        let pool = migrated_pool().await;
        let admin_id = insert_user(&pool, "admin", UserRole::Admin).await;
        let (dir, storage) = local_storage();
        let storage = Arc::new(storage);
        let service = PartnerService::new(
            SqlxPartnerRepository::boxed(pool),
            storage.clone(),
            Arc::new(codec()),
        );
        (service, actor(admin_id, UserRole::Admin), storage, dir)
    }

    fn named(name: &str) -> CreatePartnerInput {
        CreatePartnerInput {
            name: name.to_string(),
            category: Some(PartnerCategory::Academic),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_generates_slug_and_rejects_duplicates() {
        let (service, admin, _storage, _dir) = setup().await;

        let partner = service.create(&admin, named("Lyon Institute of Art"), None).await.unwrap();
        assert_eq!(partner.slug, "lyon-institute-of-art");
        assert!(partner.is_active);

        assert!(matches!(
            service.create(&admin, named("Lyon  Institute of Art!"), None).await,
            Err(ServiceError::Conflict(_))
        ));

        let bad_slug = CreatePartnerInput {
            slug: Some("Not A Slug".to_string()),
            ..named("Other")
        };
        assert!(matches!(service.create(&admin, bad_slug, None).await, Err(ServiceError::Validation(_))));
    }

    #[tokio::test]
    async fn test_concurrent_creates_with_same_slug_conflict() {
        let (service, admin, _storage, _dir) = setup().await;

        let (a, b) = tokio::join!(
            service.create(&admin, named("Acme"), None),
            service.create(&admin, named("Acme"), None),
        );
        let (created, rejected) = if a.is_ok() { (a, b) } else { (b, a) };
        assert_eq!(created.unwrap().slug, "acme");
        assert!(matches!(rejected, Err(ServiceError::Conflict(m)) if m == "Slug 'acme' is already in use"));
    }

    #[tokio::test]
    async fn test_search_matches_accented_names() {
        let (service, admin, _storage, _dir) = setup().await;
        service.create(&admin, named("École Normale"), None).await.unwrap();
        let codec = codec();

        for needle in ["École", "école", "ÉCOLE", "normale"] {
            let params: HashMap<String, String> =
                [("query".to_string(), needle.to_string())].into_iter().collect();
            let query = ListQuery::parse(&params, &PARTNER_QUERY, &codec).unwrap();
            let result = service.list(None, query).await.unwrap();
            assert_eq!(result.total, 1, "query {}", needle);
        }
    }

    #[tokio::test]
    async fn test_authors_cannot_manage_partners() {
        let (service, _admin, _storage, _dir) = setup().await;
        let author = actor(5, UserRole::Author);
        assert!(matches!(
            service.create(&author, named("Acme"), None).await,
            Err(ServiceError::Permission(_))
        ));
    }

    #[tokio::test]
    async fn test_get_by_id_or_slug_and_visibility() {
        let (service, admin, _storage, _dir) = setup().await;
        let codec = codec();
        let partner = service
            .create(
                &admin,
                CreatePartnerInput {
                    is_active: Some(false),
                    ..named("Acme Labs")
                },
                None,
            )
            .await
            .unwrap();

        let by_token = service.get(Some(&admin), &codec.encode(partner.id)).await.unwrap();
        assert_eq!(by_token.id, partner.id);
        let by_slug = service.get(Some(&admin), "acme-labs").await.unwrap();
        assert_eq!(by_slug.id, partner.id);

        assert!(matches!(service.get(None, "acme-labs").await, Err(ServiceError::NotFound(_))));
        assert!(matches!(service.get(Some(&admin), "missing").await, Err(ServiceError::NotFound(_))));

        let anonymous = service.list(None, ListQuery::defaults(&PARTNER_QUERY)).await.unwrap();
        assert_eq!(anonymous.total, 0);
    }

    #[tokio::test]
    async fn test_logo_replacement_and_delete_cleanup() {
        let (service, admin, storage, _dir) = setup().await;
        let partner = service.create(&admin, named("Acme"), Some(png("v1.png"))).await.unwrap();
        let first = storage.root().join(partner.logo_path.as_deref().unwrap());
        assert!(first.exists());
        assert!(service.logo_url(&partner).unwrap().contains("/uploads/partners/"));

        let updated = service
            .update(&admin, partner.id, UpdatePartnerInput::default(), Some(png("v2.png")))
            .await
            .unwrap();
        let second = storage.root().join(updated.logo_path.as_deref().unwrap());
        assert!(!first.exists());
        assert!(second.exists());

        service.delete(&admin, partner.id).await.unwrap();
        assert!(!second.exists());
    }

    #[tokio::test]
    async fn test_update_slug_conflict() {
        let (service, admin, _storage, _dir) = setup().await;
        service.create(&admin, named("Alpha"), None).await.unwrap();
        let beta = service.create(&admin, named("Beta"), None).await.unwrap();

        let rename = UpdatePartnerInput {
            slug: Some("alpha".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            service.update(&admin, beta.id, rename, None).await,
            Err(ServiceError::Conflict(_))
        ));

        let keep = UpdatePartnerInput {
            slug: Some("beta".to_string()),
            display_order: Some(3),
            ..Default::default()
        };
        assert_eq!(service.update(&admin, beta.id, keep, None).await.unwrap().display_order, 3);
    }
}
