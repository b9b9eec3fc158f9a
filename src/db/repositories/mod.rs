//! Database repositories
//!
//! One repository per entity. Each exposes an `async_trait` interface that
//! services depend on as `Arc<dyn ...Repository>` and an SQLx implementation
//! that works on both backends.

pub mod contact;
pub mod media;
pub mod partner;
pub mod session;
pub mod setting;
pub mod testimonial;
pub mod user;

pub use contact::{ContactRepository, SqlxContactRepository, CONTACT_QUERY};
pub use media::{MediaRepository, SqlxMediaRepository, MEDIA_QUERY};
pub use partner::{PartnerRepository, SqlxPartnerRepository, PARTNER_QUERY};
pub use session::{SessionRepository, SqlxSessionRepository};
pub use setting::{SettingRepository, SqlxSettingRepository, SETTING_QUERY};
pub use testimonial::{SqlxTestimonialRepository, TestimonialRepository, TESTIMONIAL_QUERY};
pub use user::{SqlxUserRepository, UserRepository};

use std::collections::BTreeMap;

use crate::db::sql::GroupCount;

/// Collapse `GROUP BY` rows into a label -> count map
pub(crate) fn group_map(groups: Vec<GroupCount>) -> BTreeMap<String, i64> {
    groups.into_iter().map(|g| (g.label, g.count)).collect()
}

#[cfg(test)]
pub(crate) mod test_support {
    use chrono::Utc;

    use crate::db::{create_test_pool, migrations, sql, DynDatabasePool};
    use crate::models::UserRole;

    /// In-memory pool with every migration applied
    pub async fn migrated_pool() -> DynDatabasePool {
        let pool = create_test_pool().await.expect("Failed to create test pool");
        migrations::run_migrations(&pool)
            .await
            .expect("Failed to run migrations");
        pool
    }

    /// Insert a bare user row and return its id
    pub async fn insert_user(pool: &DynDatabasePool, username: &str, role: UserRole) -> i64 {
        sql::execute(
            pool,
            "INSERT INTO users (username, email, password_hash, role, created_at, updated_at) \
             VALUES (?, ?, 'x', ?, ?, ?)",
            &crate::sql_values![
                username,
                format!("{}@example.edu", username),
                role.as_str(),
                Utc::now(),
                Utc::now()
            ],
        )
        .await
        .expect("Failed to insert user")
        .last_insert_id
    }
}
