//! Database migrations
//!
//! Migrations are embedded in the binary as SQL strings with one variant per
//! backend, applied in version order and recorded in `_migrations`.
//!
//! ```ignore
//! let pool = create_pool(&config.database).await?;
//! migrations::run_migrations(&pool).await?;
//! ```

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};

use super::sql;
use super::DynDatabasePool;
use crate::config::DatabaseDriver;

/// A database migration with SQL for both SQLite and MySQL
#[derive(Debug, Clone)]
pub struct Migration {
    /// Migration version number (must be unique and sequential)
    pub version: i32,
    /// Human-readable migration name
    pub name: &'static str,
    /// SQL statements for SQLite
    pub up_sqlite: &'static str,
    /// SQL statements for MySQL
    pub up_mysql: &'static str,
}

/// Migration record stored in the database
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct MigrationRecord {
    pub version: i64,
    pub name: String,
    pub applied_at: DateTime<Utc>,
}

/// All migrations, in application order.
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "create_users",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'author',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            );
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS users (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                username VARCHAR(50) NOT NULL UNIQUE,
                email VARCHAR(255) NOT NULL UNIQUE,
                password_hash VARCHAR(255) NOT NULL,
                role VARCHAR(20) NOT NULL DEFAULT 'author',
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 2,
        name: "create_sessions",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id INTEGER NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            );
            CREATE INDEX IF NOT EXISTS idx_sessions_user_id ON sessions(user_id);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS sessions (
                id VARCHAR(64) PRIMARY KEY,
                user_id BIGINT NOT NULL,
                expires_at TIMESTAMP NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                INDEX idx_sessions_user_id (user_id),
                FOREIGN KEY (user_id) REFERENCES users(id) ON DELETE CASCADE
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 3,
        name: "create_contacts",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL,
                phone VARCHAR(30),
                subject VARCHAR(200) NOT NULL,
                message TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'new',
                is_read BOOLEAN NOT NULL DEFAULT 0,
                admin_notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_contacts_status ON contacts(status);
            CREATE INDEX IF NOT EXISTS idx_contacts_created_at ON contacts(created_at);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS contacts (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(100) NOT NULL,
                email VARCHAR(255) NOT NULL,
                phone VARCHAR(30),
                subject VARCHAR(200) NOT NULL,
                message TEXT NOT NULL,
                status VARCHAR(20) NOT NULL DEFAULT 'new',
                is_read BOOLEAN NOT NULL DEFAULT FALSE,
                admin_notes TEXT,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL,
                INDEX idx_contacts_status (status),
                INDEX idx_contacts_created_at (created_at)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 4,
        name: "create_media_assets",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS media_assets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                alt_text VARCHAR(255),
                original_name VARCHAR(255) NOT NULL,
                file_path VARCHAR(255) NOT NULL,
                mime_type VARCHAR(100) NOT NULL,
                media_type VARCHAR(20) NOT NULL,
                size_bytes INTEGER NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT 1,
                uploaded_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_media_uploaded_by ON media_assets(uploaded_by);
            CREATE INDEX IF NOT EXISTS idx_media_type ON media_assets(media_type);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS media_assets (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                title VARCHAR(200) NOT NULL,
                description TEXT,
                alt_text VARCHAR(255),
                original_name VARCHAR(255) NOT NULL,
                file_path VARCHAR(255) NOT NULL,
                mime_type VARCHAR(100) NOT NULL,
                media_type VARCHAR(20) NOT NULL,
                size_bytes BIGINT NOT NULL,
                is_public BOOLEAN NOT NULL DEFAULT TRUE,
                uploaded_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL,
                INDEX idx_media_uploaded_by (uploaded_by),
                INDEX idx_media_type (media_type),
                FOREIGN KEY (uploaded_by) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 5,
        name: "create_partners",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS partners (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(150) NOT NULL UNIQUE,
                description TEXT,
                website_url VARCHAR(255),
                category VARCHAR(20) NOT NULL DEFAULT 'other',
                logo_path VARCHAR(255),
                is_active BOOLEAN NOT NULL DEFAULT 1,
                display_order INTEGER NOT NULL DEFAULT 0,
                created_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL DEFAULT '',
                FOREIGN KEY (created_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_partners_category ON partners(category);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS partners (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                name VARCHAR(150) NOT NULL,
                slug VARCHAR(150) NOT NULL UNIQUE,
                description TEXT,
                website_url VARCHAR(255),
                category VARCHAR(20) NOT NULL DEFAULT 'other',
                logo_path VARCHAR(255),
                is_active BOOLEAN NOT NULL DEFAULT TRUE,
                display_order BIGINT NOT NULL DEFAULT 0,
                created_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL,
                INDEX idx_partners_category (category),
                FOREIGN KEY (created_by) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 6,
        name: "create_settings",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS settings (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                setting_key VARCHAR(100) NOT NULL UNIQUE,
                value TEXT NOT NULL,
                value_type VARCHAR(20) NOT NULL DEFAULT 'string',
                group_name VARCHAR(50) NOT NULL DEFAULT 'general',
                description TEXT,
                is_public BOOLEAN NOT NULL DEFAULT 0,
                file_path VARCHAR(255),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL DEFAULT ''
            );
            CREATE INDEX IF NOT EXISTS idx_settings_group ON settings(group_name);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS settings (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                setting_key VARCHAR(100) NOT NULL UNIQUE,
                value TEXT NOT NULL,
                value_type VARCHAR(20) NOT NULL DEFAULT 'string',
                group_name VARCHAR(50) NOT NULL DEFAULT 'general',
                description TEXT,
                is_public BOOLEAN NOT NULL DEFAULT FALSE,
                file_path VARCHAR(255),
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL,
                INDEX idx_settings_group (group_name)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
    Migration {
        version: 7,
        name: "create_testimonials",
        up_sqlite: r#"
            CREATE TABLE IF NOT EXISTS testimonials (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                author_name VARCHAR(100) NOT NULL,
                author_title VARCHAR(150),
                organization VARCHAR(150),
                content TEXT NOT NULL,
                rating INTEGER NOT NULL DEFAULT 5,
                photo_path VARCHAR(255),
                media_id INTEGER,
                is_published BOOLEAN NOT NULL DEFAULT 0,
                is_featured BOOLEAN NOT NULL DEFAULT 0,
                display_order INTEGER NOT NULL DEFAULT 0,
                submitted_by INTEGER NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL DEFAULT '',
                CHECK (rating BETWEEN 1 AND 5),
                FOREIGN KEY (media_id) REFERENCES media_assets(id),
                FOREIGN KEY (submitted_by) REFERENCES users(id)
            );
            CREATE INDEX IF NOT EXISTS idx_testimonials_media ON testimonials(media_id);
            CREATE INDEX IF NOT EXISTS idx_testimonials_published ON testimonials(is_published);
        "#,
        up_mysql: r#"
            CREATE TABLE IF NOT EXISTS testimonials (
                id BIGINT PRIMARY KEY AUTO_INCREMENT,
                author_name VARCHAR(100) NOT NULL,
                author_title VARCHAR(150),
                organization VARCHAR(150),
                content TEXT NOT NULL,
                rating BIGINT NOT NULL DEFAULT 5,
                photo_path VARCHAR(255),
                media_id BIGINT,
                is_published BOOLEAN NOT NULL DEFAULT FALSE,
                is_featured BOOLEAN NOT NULL DEFAULT FALSE,
                display_order BIGINT NOT NULL DEFAULT 0,
                submitted_by BIGINT NOT NULL,
                created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                updated_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
                search_text TEXT NOT NULL,
                CHECK (rating BETWEEN 1 AND 5),
                INDEX idx_testimonials_media (media_id),
                INDEX idx_testimonials_published (is_published),
                FOREIGN KEY (media_id) REFERENCES media_assets(id),
                FOREIGN KEY (submitted_by) REFERENCES users(id)
            ) ENGINE=InnoDB DEFAULT CHARSET=utf8mb4;
        "#,
    },
];

/// Run all pending migrations, returning how many were applied.
pub async fn run_migrations(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;

    let applied = get_applied_migrations(pool).await?;
    let applied_versions: Vec<i32> = applied.iter().map(|m| m.version as i32).collect();

    let mut count = 0;

    for migration in MIGRATIONS {
        if !applied_versions.contains(&migration.version) {
            tracing::info!(
                version = migration.version,
                name = migration.name,
                "Applying migration"
            );
            apply_migration(pool, migration)
                .await
                .with_context(|| format!("Failed to apply migration: {}", migration.name))?;
            count += 1;
        }
    }

    if count > 0 {
        tracing::info!("Applied {} migration(s)", count);
    } else {
        tracing::debug!("No pending migrations");
    }

    Ok(count)
}

/// Create the migrations tracking table if it doesn't exist
async fn create_migrations_table(pool: &DynDatabasePool) -> Result<()> {
    let sql = match pool.driver() {
        DatabaseDriver::Sqlite => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version INTEGER PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
        DatabaseDriver::Mysql => {
            r#"
            CREATE TABLE IF NOT EXISTS _migrations (
                version BIGINT PRIMARY KEY,
                name VARCHAR(255) NOT NULL UNIQUE,
                applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#
        }
    };

    pool.execute(sql).await?;
    Ok(())
}

async fn get_applied_migrations(pool: &DynDatabasePool) -> Result<Vec<MigrationRecord>> {
    sql::fetch_all(
        pool,
        "SELECT version, name, applied_at FROM _migrations ORDER BY version",
        &[],
    )
    .await
}

/// Apply a single migration and record it, all in one transaction
async fn apply_migration(pool: &DynDatabasePool, migration: &Migration) -> Result<()> {
    let up = match pool.driver() {
        DatabaseDriver::Sqlite => migration.up_sqlite,
        DatabaseDriver::Mysql => migration.up_mysql,
    };

    let mut tx = sql::begin(pool).await?;
    for statement in split_sql_statements(up) {
        tx.execute(statement, &[])
            .await
            .with_context(|| format!("Failed to execute: {}", truncate_sql(statement)))?;
    }
    tx.execute(
        "INSERT INTO _migrations (version, name) VALUES (?, ?)",
        &crate::sql_values![i64::from(migration.version), migration.name],
    )
    .await?;
    tx.commit().await
}

/// Truncate SQL for error messages
fn truncate_sql(sql: &str) -> String {
    match sql.char_indices().nth(100) {
        Some((idx, _)) => format!("{}...", &sql[..idx]),
        None => sql.to_string(),
    }
}

/// Split SQL into individual statements, skipping comment-only fragments
fn split_sql_statements(sql: &str) -> Vec<&str> {
    sql.split(';')
        .map(str::trim)
        .filter(|stmt| !stmt.is_empty() && !is_comment_only(stmt))
        .collect()
}

/// Check if a string contains only SQL comments
fn is_comment_only(s: &str) -> bool {
    s.lines()
        .map(str::trim)
        .all(|line| line.is_empty() || line.starts_with("--"))
}

/// Get pending migrations count
pub async fn pending_count(pool: &DynDatabasePool) -> Result<usize> {
    create_migrations_table(pool).await?;
    let applied = get_applied_migrations(pool).await?;
    Ok(MIGRATIONS.len().saturating_sub(applied.len()))
}
