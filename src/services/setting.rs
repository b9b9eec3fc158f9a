//! Site settings service
//!
//! Settings are typed: a value must parse as its declared type before it
//! is stored. `file` settings keep the uploaded file's storage path as
//! their value.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::db::repositories::SettingRepository;
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{
    BulkSettingItem, CreateSettingInput, PaginatedResult, Setting, SettingStats, SettingValueType,
    UpdateSettingInput, User,
};
use crate::services::access::ensure_admin;
use crate::services::storage::{remove_quietly, FileStorage, UploadedFile};
use crate::services::validate;
use crate::services::ServiceError;

const SETTINGS_FOLDER: &str = "settings";
const DEFAULT_GROUP: &str = "general";

/// Largest number of entries in one bulk update
pub const MAX_BULK_SETTINGS: usize = 200;

pub struct SettingService {
    repo: Arc<dyn SettingRepository>,
    storage: Arc<dyn FileStorage>,
    codec: Arc<IdCodec>,
}

fn check_key(key: &str) -> Result<String, ServiceError> {
    let key = validate::required_text("key", key, 100)?;
    let valid = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'));
    if !valid {
        return Err(ServiceError::validation(
            "key may contain only letters, digits, '.', '_' and '-'",
        ));
    }
    Ok(key)
}

fn check_value(key: &str, value_type: SettingValueType, value: &str) -> Result<(), ServiceError> {
    value_type
        .check(value)
        .map_err(|reason| ServiceError::Validation(format!("{}: {}", key, reason)))
}

impl SettingService {
    pub fn new(repo: Arc<dyn SettingRepository>, storage: Arc<dyn FileStorage>, codec: Arc<IdCodec>) -> Self {
        Self { repo, storage, codec }
    }

    pub async fn list(
        &self,
        viewer: Option<&User>,
        mut query: ListQuery,
    ) -> Result<PaginatedResult<Setting>, ServiceError> {
        if viewer.is_none() {
            query.narrow("is_public", true);
        }
        Ok(self.repo.list(&query).await?)
    }

    /// Look up by encoded id first, then by key. Private settings are
    /// hidden from anonymous callers.
    pub async fn get(&self, viewer: Option<&User>, id_or_key: &str) -> Result<Setting, ServiceError> {
        let by_id = match self.codec.decode_lenient(id_or_key) {
            Some(id) => self.repo.get_by_id(id).await?,
            None => None,
        };
        let setting = match by_id {
            Some(setting) => Some(setting),
            None => self.repo.get_by_key(id_or_key).await?,
        };

        match setting {
            Some(setting) if viewer.is_some() || setting.is_public => Ok(setting),
            _ => Err(ServiceError::not_found("Setting")),
        }
    }

    pub async fn stats(&self, actor: &User) -> Result<SettingStats, ServiceError> {
        ensure_admin(actor)?;
        Ok(self.repo.stats().await?)
    }

    pub async fn create(
        &self,
        actor: &User,
        input: CreateSettingInput,
        file: Option<UploadedFile>,
    ) -> Result<Setting, ServiceError> {
        ensure_admin(actor)?;
        let key = check_key(&input.key)?;
        let group_name = validate::optional_text("group_name", input.group_name.as_deref(), 50)?
            .unwrap_or_else(|| DEFAULT_GROUP.to_string());
        let description = validate::optional_text("description", input.description.as_deref(), 500)?;

        if input.value_type == SettingValueType::File && file.is_none() {
            return Err(ServiceError::validation("file is required for file settings"));
        }
        if input.value_type != SettingValueType::File {
            check_value(&key, input.value_type, &input.value)?;
        }
        if self.repo.key_exists(&key).await? {
            return Err(ServiceError::Conflict(key_in_use(&key)));
        }

        let mut setting = Setting {
            id: 0,
            key,
            value: input.value,
            value_type: input.value_type,
            group_name,
            description,
            is_public: input.is_public.unwrap_or(false),
            file_path: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        if let Some(file) = file.filter(|_| setting.value_type == SettingValueType::File) {
            let stored = self.storage.store(&file, SETTINGS_FOLDER).await?;
            setting.value = stored.path.clone();
            setting.file_path = Some(stored.path);
        }

        match self.repo.create(&setting).await {
            Ok(created) => {
                tracing::info!(key = %created.key, "Setting created");
                Ok(created)
            }
            Err(e) => {
                if let Some(path) = &setting.file_path {
                    remove_quietly(self.storage.as_ref(), path).await;
                }
                Err(ServiceError::or_conflict(e, key_in_use(&setting.key)))
            }
        }
    }

    pub async fn update(
        &self,
        actor: &User,
        id: i64,
        input: UpdateSettingInput,
        file: Option<UploadedFile>,
    ) -> Result<Setting, ServiceError> {
        ensure_admin(actor)?;
        let mut setting = self.load(id).await?;
        let previous_file = setting.file_path.clone();

        if let Some(value_type) = input.value_type {
            setting.value_type = value_type;
        }
        if let Some(value) = input.value {
            setting.value = value;
        }
        if let Some(group) = input.group_name.as_deref() {
            setting.group_name = validate::required_text("group_name", group, 50)?;
        }
        if input.description.is_some() {
            setting.description = validate::optional_text("description", input.description.as_deref(), 500)?;
        }
        if let Some(is_public) = input.is_public {
            setting.is_public = is_public;
        }

        let mut stored_path = None;
        if setting.value_type == SettingValueType::File {
            match file {
                Some(file) => {
                    let stored = self.storage.store(&file, SETTINGS_FOLDER).await?;
                    setting.value = stored.path.clone();
                    setting.file_path = Some(stored.path.clone());
                    stored_path = Some(stored.path);
                }
                None if setting.file_path.is_none() => {
                    return Err(ServiceError::validation("file is required for file settings"));
                }
                None => {
                    setting.value = setting.file_path.clone().unwrap_or_default();
                }
            }
        } else {
            check_value(&setting.key, setting.value_type, &setting.value)?;
            setting.file_path = None;
        }

        match self.repo.update(&setting).await {
            Ok(updated) => {
                if let Some(old) = previous_file.filter(|old| updated.file_path.as_ref() != Some(old)) {
                    remove_quietly(self.storage.as_ref(), &old).await;
                }
                Ok(updated)
            }
            Err(e) => {
                if let Some(path) = &stored_path {
                    remove_quietly(self.storage.as_ref(), path).await;
                }
                Err(e.into())
            }
        }
    }

    pub async fn delete(&self, actor: &User, id: i64) -> Result<(), ServiceError> {
        ensure_admin(actor)?;
        let setting = self.load(id).await?;
        self.repo.delete(setting.id).await?;
        if let Some(path) = &setting.file_path {
            remove_quietly(self.storage.as_ref(), path).await;
        }
        tracing::info!(key = %setting.key, "Setting deleted");
        Ok(())
    }

    /// Write several values at once. Either every item is valid and all of
    /// them are written in one transaction, or nothing is written.
    pub async fn bulk_update(&self, actor: &User, items: Vec<BulkSettingItem>) -> Result<Vec<Setting>, ServiceError> {
        ensure_admin(actor)?;
        if items.is_empty() {
            return Err(ServiceError::validation("items must not be empty"));
        }
        if items.len() > MAX_BULK_SETTINGS {
            return Err(ServiceError::Validation(format!(
                "At most {} settings may be updated at once",
                MAX_BULK_SETTINGS
            )));
        }

        // later entries for the same key win
        let mut wanted: BTreeMap<String, String> = BTreeMap::new();
        for item in items {
            wanted.insert(item.key.trim().to_string(), item.value);
        }

        let keys: Vec<String> = wanted.keys().cloned().collect();
        let found: HashMap<String, Setting> = self
            .repo
            .get_by_keys(&keys)
            .await?
            .into_iter()
            .map(|s| (s.key.clone(), s))
            .collect();

        let missing: Vec<&str> = keys
            .iter()
            .filter(|k| !found.contains_key(*k))
            .map(String::as_str)
            .collect();
        if !missing.is_empty() {
            return Err(ServiceError::NotFound(format!(
                "Unknown setting key(s): {}",
                missing.join(", ")
            )));
        }

        let mut updated = Vec::with_capacity(wanted.len());
        for (key, value) in wanted {
            let Some(setting) = found.get(&key) else {
                continue;
            };
            if setting.value_type == SettingValueType::File {
                return Err(ServiceError::Validation(format!(
                    "{}: file settings must be updated with an upload",
                    key
                )));
            }
            check_value(&key, setting.value_type, &value)?;
            updated.push(Setting {
                value,
                ..setting.clone()
            });
        }

        self.repo.update_values(&updated).await?;
        tracing::info!(count = updated.len(), "Bulk settings update");
        Ok(updated)
    }

    /// Absolute URL for a `file` setting
    pub fn file_url(&self, setting: &Setting) -> Option<String> {
        setting.file_path.as_deref().map(|path| self.storage.url_for(path))
    }

    async fn load(&self, id: i64) -> Result<Setting, ServiceError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| ServiceError::not_found("Setting"))
    }
}

fn key_in_use(key: &str) -> String {
    format!("Setting '{}' already exists", key)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::tests::codec;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::db::repositories::{SqlxSettingRepository, SETTING_QUERY};
    use crate::models::UserRole;
    use crate::services::access::tests::actor;
    use crate::services::storage::tests::{local_storage, png};
    use crate::services::storage::LocalFileStorage;
    use tempfile::TempDir;

    async fn setup() -> (SettingService, Arc<LocalFileStorage>, TempDir) {
        let pool = migrated_pool().await;
        let (dir, storage) = local_storage();
        let storage = Arc::new(storage);
        let service = SettingService::new(
            SqlxSettingRepository::boxed(pool),
            storage.clone(),
            Arc::new(codec()),
        );
        (service, storage, dir)
    }

    fn admin() -> User {
        actor(1, UserRole::Admin)
    }

    fn typed(key: &str, value: &str, value_type: SettingValueType, is_public: bool) -> CreateSettingInput {
        CreateSettingInput {
            key: key.to_string(),
            value: value.to_string(),
            value_type,
            is_public: Some(is_public),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_checks_type_and_duplicates() {
        let (service, _storage, _dir) = setup().await;
        let admin = admin();

        let created = service
            .create(&admin, typed("site.title", "Atrium", SettingValueType::String, true), None)
            .await
            .unwrap();
        assert_eq!(created.group_name, "general");

        assert!(matches!(
            service
                .create(&admin, typed("site.title", "Again", SettingValueType::String, true), None)
                .await,
            Err(ServiceError::Conflict(_))
        ));
        assert!(matches!(
            service
                .create(&admin, typed("limits.max", "lots", SettingValueType::Number, false), None)
                .await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service
                .create(&admin, typed("bad key", "x", SettingValueType::String, false), None)
                .await,
            Err(ServiceError::Validation(_))
        ));
        assert!(matches!(
            service
                .create(&admin, typed("site.logo", "", SettingValueType::File, true), None)
                .await,
            Err(ServiceError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_creates_with_same_key_conflict() {
        let (service, _storage, _dir) = setup().await;
        let admin = admin();

        let (a, b) = tokio::join!(
            service.create(&admin, typed("site.motto", "Lux", SettingValueType::String, true), None),
            service.create(&admin, typed("site.motto", "Lux", SettingValueType::String, true), None),
        );
        assert_eq!(a.is_ok() as u8 + b.is_ok() as u8, 1);
        let rejected = if a.is_ok() { b } else { a };
        assert!(matches!(rejected, Err(ServiceError::Conflict(m)) if m == "Setting 'site.motto' already exists"));
    }

    #[tokio::test]
    async fn test_file_setting_lifecycle() {
        let (service, storage, _dir) = setup().await;
        let admin = admin();

        let logo = service
            .create(&admin, typed("site.logo", "", SettingValueType::File, true), Some(png("logo.png")))
            .await
            .unwrap();
        let first = logo.file_path.clone().unwrap();
        assert_eq!(logo.value, first);
        assert!(storage.root().join(&first).exists());
        assert!(service.file_url(&logo).unwrap().ends_with(&first));

        let replaced = service
            .update(&admin, logo.id, UpdateSettingInput::default(), Some(png("logo2.png")))
            .await
            .unwrap();
        assert!(!storage.root().join(&first).exists());

        service.delete(&admin, replaced.id).await.unwrap();
        assert!(!storage.root().join(replaced.file_path.unwrap()).exists());
    }

    #[tokio::test]
    async fn test_lookup_by_key_and_visibility() {
        let (service, _storage, _dir) = setup().await;
        let admin = admin();
        service
            .create(&admin, typed("site.title", "Atrium", SettingValueType::String, true), None)
            .await
            .unwrap();
        let secret = service
            .create(&admin, typed("mail.password", "hunter22", SettingValueType::String, false), None)
            .await
            .unwrap();

        assert_eq!(service.get(None, "site.title").await.unwrap().value, "Atrium");
        assert!(matches!(service.get(None, "mail.password").await, Err(ServiceError::NotFound(_))));
        let by_token = service.get(Some(&admin), &codec().encode(secret.id)).await.unwrap();
        assert_eq!(by_token.key, "mail.password");

        let anonymous = service.list(None, ListQuery::defaults(&SETTING_QUERY)).await.unwrap();
        assert_eq!(anonymous.total, 1);
    }

    #[tokio::test]
    async fn test_bulk_update_is_all_or_nothing() {
        let (service, _storage, _dir) = setup().await;
        let admin = admin();
        service
            .create(&admin, typed("site.title", "Atrium", SettingValueType::String, true), None)
            .await
            .unwrap();
        service
            .create(&admin, typed("limits.max", "10", SettingValueType::Number, false), None)
            .await
            .unwrap();

        let item = |key: &str, value: &str| BulkSettingItem {
            key: key.to_string(),
            value: value.to_string(),
        };

        let unknown = service
            .bulk_update(&admin, vec![item("site.title", "Changed"), item("nope", "x")])
            .await;
        assert!(matches!(unknown, Err(ServiceError::NotFound(_))));

        let mistyped = service
            .bulk_update(&admin, vec![item("site.title", "Changed"), item("limits.max", "many")])
            .await;
        assert!(matches!(mistyped, Err(ServiceError::Validation(_))));
        assert_eq!(service.get(None, "site.title").await.unwrap().value, "Atrium");

        let updated = service
            .bulk_update(&admin, vec![item("site.title", "Changed"), item("limits.max", "25")])
            .await
            .unwrap();
        assert_eq!(updated.len(), 2);
        assert_eq!(service.get(Some(&admin), "limits.max").await.unwrap().value, "25");
        assert_eq!(service.get(None, "site.title").await.unwrap().value, "Changed");
    }
}
