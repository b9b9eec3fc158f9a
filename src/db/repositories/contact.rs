//! Contact inquiry repository

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
use crate::models::{Contact, ContactStats, ContactStatus, CreateContactInput, PaginatedResult};
use crate::sql_values;

const CONTACT_COLUMNS: &str =
    "id, name, email, phone, subject, message, status, is_read, admin_notes, created_at, updated_at";

static CONTACT_FILTERS: &[FilterField] = &[
    FilterField {
        param: "status",
        column: "status",
        kind: FilterKind::Enum(ContactStatus::ALL),
    },
    FilterField {
        param: "is_read",
        column: "is_read",
        kind: FilterKind::Bool,
    },
];

/// Listing configuration for contact inquiries
pub static CONTACT_QUERY: QueryConfig = QueryConfig {
    table: "contacts",
    columns: CONTACT_COLUMNS,
    sort_columns: &[
        ("created_at", "created_at"),
        ("updated_at", "updated_at"),
        ("name", "name"),
        ("status", "status"),
    ],
    default_sort: "created_at",
    default_order: SortOrder::Desc,
    default_limit: 20,
    max_limit: MAX_LIMIT,
    filters: CONTACT_FILTERS,
    search_columns: &["name", "email", "subject", "message"],
};

/// Contact repository trait
#[async_trait]
pub trait ContactRepository: Send + Sync {
    async fn create(&self, input: &CreateContactInput) -> Result<Contact>;

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>>;

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Contact>>;

    /// Persist status, read flag and notes
    async fn update(&self, contact: &Contact) -> Result<Contact>;

    /// Returns false when nothing was deleted
    async fn delete(&self, id: i64) -> Result<bool>;

    /// The subset of `ids` that exist
    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>>;

    /// Delete all `ids` in one transaction
    async fn delete_many(&self, ids: &[i64]) -> Result<u64>;

    /// Set the status of all `ids` in one transaction
    async fn update_status_many(&self, ids: &[i64], status: ContactStatus) -> Result<u64>;

    /// Inbox summary; `since` bounds the "recent" count
    async fn stats(&self, since: DateTime<Utc>) -> Result<ContactStats>;
}

/// SQLx-based contact repository
pub struct SqlxContactRepository {
    pool: DynDatabasePool,
}

impl SqlxContactRepository {
    pub fn new(pool: DynDatabasePool) -> Self {
        Self { pool }
    }

    pub fn boxed(pool: DynDatabasePool) -> Arc<dyn ContactRepository> {
        Arc::new(Self::new(pool))
    }
}

#[derive(sqlx::FromRow)]
struct ContactRow {
    id: i64,
    name: String,
    email: String,
    phone: Option<String>,
    subject: String,
    message: String,
    status: String,
    is_read: bool,
    admin_notes: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<ContactRow> for Contact {
    type Error = anyhow::Error;

    fn try_from(row: ContactRow) -> Result<Self> {
        Ok(Contact {
            id: row.id,
            name: row.name,
            email: row.email,
            phone: row.phone,
            subject: row.subject,
            message: row.message,
            status: row.status.parse()?,
            is_read: row.is_read,
            admin_notes: row.admin_notes,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[async_trait]
impl ContactRepository for SqlxContactRepository {
    async fn create(&self, input: &CreateContactInput) -> Result<Contact> {
        let now = Utc::now();
        let result = sql::execute(
            &self.pool,
            "INSERT INTO contacts (name, email, phone, subject, message, status, is_read, \
             created_at, updated_at, search_text) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
            &sql_values![
                input.name.as_str(),
                input.email.as_str(),
                input.phone.clone(),
                input.subject.as_str(),
                input.message.as_str(),
                ContactStatus::New.as_str(),
                false,
                now,
                now,
                fold_search_text([
                    Some(input.name.as_str()),
                    Some(input.email.as_str()),
                    Some(input.subject.as_str()),
                    Some(input.message.as_str()),
                ])
            ],
        )
        .await
        .context("Failed to create contact")?;

        Ok(Contact {
            id: result.last_insert_id,
            name: input.name.clone(),
            email: input.email.clone(),
            phone: input.phone.clone(),
            subject: input.subject.clone(),
            message: input.message.clone(),
            status: ContactStatus::New,
            is_read: false,
            admin_notes: None,
            created_at: now,
            updated_at: now,
        })
    }

    async fn get_by_id(&self, id: i64) -> Result<Option<Contact>> {
        let row: Option<ContactRow> = sql::fetch_optional(
            &self.pool,
            &format!("SELECT {} FROM contacts WHERE id = ?", CONTACT_COLUMNS),
            &sql_values![id],
        )
        .await
        .context("Failed to get contact by ID")?;
        row.map(Contact::try_from).transpose()
    }

    async fn list(&self, query: &ListQuery) -> Result<PaginatedResult<Contact>> {
        query
            .execute::<ContactRow>(&self.pool)
            .await
            .context("Failed to list contacts")?
            .try_map(Contact::try_from)
    }

    async fn update(&self, contact: &Contact) -> Result<Contact> {
        let now = Utc::now();
        sql::execute(
            &self.pool,
            "UPDATE contacts SET status = ?, is_read = ?, admin_notes = ?, updated_at = ? WHERE id = ?",
            &sql_values![
                contact.status.as_str(),
                contact.is_read,
                contact.admin_notes.clone(),
                now,
                contact.id
            ],
        )
        .await
        .context("Failed to update contact")?;

        Ok(Contact {
            updated_at: now,
            ..contact.clone()
        })
    }

    async fn delete(&self, id: i64) -> Result<bool> {
        let result = sql::execute(&self.pool, "DELETE FROM contacts WHERE id = ?", &sql_values![id])
            .await
            .context("Failed to delete contact")?;
        Ok(result.rows_affected > 0)
    }

    async fn existing_ids(&self, ids: &[i64]) -> Result<Vec<i64>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let values: Vec<sql::SqlValue> = ids.iter().map(|id| (*id).into()).collect();
        sql::fetch_all::<(i64,)>(
            &self.pool,
            &format!("SELECT id FROM contacts WHERE id IN ({})", sql::placeholders(ids.len())),
            &values,
        )
        .await
        .map(|rows| rows.into_iter().map(|(id,)| id).collect())
        .context("Failed to look up contacts")
    }

    async fn delete_many(&self, ids: &[i64]) -> Result<u64> {
        let mut tx = sql::begin(&self.pool).await?;
        let mut deleted = 0;
        for id in ids {
            deleted += tx
                .execute("DELETE FROM contacts WHERE id = ?", &sql_values![*id])
                .await
                .context("Failed to delete contact")?
                .rows_affected;
        }
        tx.commit().await?;
        Ok(deleted)
    }

    async fn update_status_many(&self, ids: &[i64], status: ContactStatus) -> Result<u64> {
        let now = Utc::now();
        let mut tx = sql::begin(&self.pool).await?;
        let mut updated = 0;
        for id in ids {
            updated += tx
                .execute(
                    "UPDATE contacts SET status = ?, updated_at = ? WHERE id = ?",
                    &sql_values![status.as_str(), now, *id],
                )
                .await
                .context("Failed to update contact status")?
                .rows_affected;
        }
        tx.commit().await?;
        Ok(updated)
    }

    async fn stats(&self, since: DateTime<Utc>) -> Result<ContactStats> {
        let unread_values = sql_values![false];
        let recent_values = sql_values![since];

        let (total, unread, by_status, last_30_days) = tokio::try_join!(
            sql::fetch_scalar::<i64>(&self.pool, "SELECT COUNT(*) FROM contacts", &[]),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM contacts WHERE is_read = ?",
                &unread_values,
            ),
            sql::fetch_all::<GroupCount>(
                &self.pool,
                "SELECT status AS label, COUNT(*) AS count FROM contacts GROUP BY status",
                &[],
            ),
            sql::fetch_scalar::<i64>(
                &self.pool,
                "SELECT COUNT(*) FROM contacts WHERE created_at >= ?",
                &recent_values,
            ),
        )
        .context("Failed to compute contact stats")?;

        Ok(ContactStats {
            total,
            unread,
            by_status: group_map(by_status),
            last_30_days,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::repositories::test_support::migrated_pool;
    use crate::ids::IdCodec;
    use chrono::Duration;
    use std::collections::HashMap;

    fn input(name: &str, subject: &str) -> CreateContactInput {
        CreateContactInput {
            name: name.to_string(),
            email: format!("{}@example.org", name.to_lowercase()),
            phone: None,
            subject: subject.to_string(),
            message: "Hello there".to_string(),
        }
    }

    fn list_query(pairs: &[(&str, &str)]) -> ListQuery {
        let params: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        let codec = IdCodec::new(b"contact-repo-test-secret").unwrap();
        ListQuery::parse(&params, &CONTACT_QUERY, &codec).unwrap()
    }

    #[tokio::test]
    async fn test_create_and_get() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let created = repo.create(&input("Ada", "Admissions")).await.unwrap();

        let found = repo.get_by_id(created.id).await.unwrap().expect("contact");
        assert_eq!(found.name, "Ada");
        assert_eq!(found.status, ContactStatus::New);
        assert!(!found.is_read);
        assert!(repo.get_by_id(created.id + 100).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_list_filters_and_search() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let first = repo.create(&input("Ada", "Admissions")).await.unwrap();
        repo.create(&input("Grace", "Research visit")).await.unwrap();
        repo.create(&input("Linus", "Admissions deadline")).await.unwrap();

        let mut read = first.clone();
        read.is_read = true;
        repo.update(&read).await.unwrap();

        let all = repo.list(&list_query(&[])).await.unwrap();
        assert_eq!(all.total, 3);

        let unread = repo.list(&list_query(&[("is_read", "false")])).await.unwrap();
        assert_eq!(unread.total, 2);

        let admissions = repo
            .list(&list_query(&[("query", "admissions"), ("sortBy", "name"), ("sortOrder", "asc")]))
            .await
            .unwrap();
        let names: Vec<_> = admissions.items.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["Ada", "Linus"]);
    }

    #[tokio::test]
    async fn test_update_persists_triage_fields() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let mut contact = repo.create(&input("Ada", "Admissions")).await.unwrap();
        contact.status = ContactStatus::InProgress;
        contact.admin_notes = Some("Called back".to_string());
        repo.update(&contact).await.unwrap();

        let found = repo.get_by_id(contact.id).await.unwrap().unwrap();
        assert_eq!(found.status, ContactStatus::InProgress);
        assert_eq!(found.admin_notes.as_deref(), Some("Called back"));
    }

    #[tokio::test]
    async fn test_bulk_operations() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let a = repo.create(&input("A", "One")).await.unwrap();
        let b = repo.create(&input("B", "Two")).await.unwrap();
        let c = repo.create(&input("C", "Three")).await.unwrap();

        let existing = repo.existing_ids(&[a.id, b.id, 999]).await.unwrap();
        assert_eq!(existing.len(), 2);

        let updated = repo
            .update_status_many(&[a.id, b.id], ContactStatus::Resolved)
            .await
            .unwrap();
        assert_eq!(updated, 2);
        assert_eq!(
            repo.get_by_id(b.id).await.unwrap().unwrap().status,
            ContactStatus::Resolved
        );

        assert_eq!(repo.delete_many(&[a.id, c.id]).await.unwrap(), 2);
        assert!(repo.get_by_id(a.id).await.unwrap().is_none());
        assert!(repo.get_by_id(b.id).await.unwrap().is_some());
        assert!(!repo.delete(a.id).await.unwrap());
    }

    #[tokio::test]
    async fn test_stats() {
        let repo = SqlxContactRepository::new(migrated_pool().await);
        let a = repo.create(&input("A", "One")).await.unwrap();
        repo.create(&input("B", "Two")).await.unwrap();
        repo.update_status_many(&[a.id], ContactStatus::Archived).await.unwrap();

        let stats = repo.stats(Utc::now() - Duration::days(30)).await.unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.unread, 2);
        assert_eq!(stats.by_status.get("archived"), Some(&1));
        assert_eq!(stats.by_status.get("new"), Some(&1));
        assert_eq!(stats.last_30_days, 2);

        let future = repo.stats(Utc::now() + Duration::days(1)).await.unwrap();
        assert_eq!(future.last_30_days, 0);
    }
}
