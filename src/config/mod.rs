//! Configuration management
//!
//! Configuration is loaded from `config.yml` and then overridden by
//! `ATRIUM_*` environment variables. Missing optional values are filled with
//! defaults, so an absent or empty file yields a runnable development setup.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::ids::MIN_SECRET_LEN;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Upload configuration
    #[serde(default)]
    pub upload: UploadConfig,
    /// Identifier and session secrets
    #[serde(default)]
    pub security: SecurityConfig,
    /// Initial administrator, created when the user table is empty
    #[serde(default)]
    pub admin: Option<AdminSeedConfig>,
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind to
    #[serde(default = "default_host")]
    pub host: String,
    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origin (for cookie-based auth)
    #[serde(default = "default_cors_origin")]
    pub cors_origin: String,
    /// Include internal error details in 500 responses (development only)
    #[serde(default)]
    pub expose_errors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origin: default_cors_origin(),
            expose_errors: false,
        }
    }
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_cors_origin() -> String {
    "http://localhost:3000".to_string()
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Database driver (sqlite or mysql)
    #[serde(default)]
    pub driver: DatabaseDriver,
    /// Database connection URL
    #[serde(default = "default_database_url")]
    pub url: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            driver: DatabaseDriver::default(),
            url: default_database_url(),
        }
    }
}

fn default_database_url() -> String {
    "data/atrium.db".to_string()
}

/// Database driver type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseDriver {
    /// SQLite (default)
    #[default]
    Sqlite,
    /// MySQL
    Mysql,
}

/// Upload configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Upload directory path
    #[serde(default = "default_upload_path")]
    pub path: PathBuf,
    /// Base URL prepended to `/uploads/<file>` when building absolute URLs
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
    /// Maximum file size in bytes (default: 10MB)
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    /// Allowed MIME types
    #[serde(default = "default_allowed_types")]
    pub allowed_types: Vec<String>,
}

impl Default for UploadConfig {
    fn default() -> Self {
        Self {
            path: default_upload_path(),
            public_base_url: default_public_base_url(),
            max_file_size: default_max_file_size(),
            allowed_types: default_allowed_types(),
        }
    }
}

fn default_upload_path() -> PathBuf {
    PathBuf::from("uploads")
}

fn default_public_base_url() -> String {
    "http://localhost:8080".to_string()
}

fn default_max_file_size() -> u64 {
    10 * 1024 * 1024 // 10MB
}

fn default_allowed_types() -> Vec<String> {
    [
        "image/jpeg",
        "image/png",
        "image/gif",
        "image/webp",
        "image/svg+xml",
        "application/pdf",
        "video/mp4",
        "video/webm",
        "audio/mpeg",
        "audio/ogg",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

impl UploadConfig {
    /// Check if a MIME type is allowed
    pub fn is_type_allowed(&self, mime_type: &str) -> bool {
        self.allowed_types.iter().any(|t| t == mime_type)
    }

    /// Get file extension for a MIME type
    pub fn get_extension(&self, mime_type: &str) -> &'static str {
        match mime_type {
            "image/jpeg" => "jpg",
            "image/png" => "png",
            "image/gif" => "gif",
            "image/webp" => "webp",
            "image/svg+xml" => "svg",
            "application/pdf" => "pdf",
            "video/mp4" => "mp4",
            "video/webm" => "webm",
            "audio/mpeg" => "mp3",
            "audio/ogg" => "ogg",
            _ => "bin",
        }
    }
}

/// Secrets
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityConfig {
    /// Key for the public identifier codec. Changing it invalidates every
    /// id previously handed out.
    #[serde(default = "default_id_secret")]
    pub id_secret: String,
    /// Session lifetime in days
    #[serde(default = "default_session_days")]
    pub session_days: i64,
}

impl Default for SecurityConfig {
    fn default() -> Self {
        Self {
            id_secret: default_id_secret(),
            session_days: default_session_days(),
        }
    }
}

/// Development-only secret; startup warns when it is still in use
pub const DEFAULT_ID_SECRET: &str = "atrium-development-id-secret";

fn default_id_secret() -> String {
    DEFAULT_ID_SECRET.to_string()
}

fn default_session_days() -> i64 {
    7
}

/// Credentials for the bootstrap administrator
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminSeedConfig {
    pub username: String,
    pub email: String,
    pub password: String,
}

/// Error type for configuration parsing
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {source}")]
    FileRead {
        path: String,
        source: std::io::Error,
    },
    #[error("Failed to parse config file '{path}': {message}")]
    ParseError {
        path: String,
        message: String,
    },
    #[error("Invalid configuration: {0}")]
    ValidationError(String),
}

impl Config {
    /// Load configuration from file
    ///
    /// If the file doesn't exist, returns default configuration.
    /// If the file exists but is invalid YAML, returns an error with details.
    pub fn load(path: &std::path::Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            source: e,
        })?;

        if content.trim().is_empty() {
            return Ok(Self::default());
        }

        let config: Config = serde_yaml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            message: format_yaml_error(&e),
        })?;

        Ok(config)
    }

    /// Load configuration from file with environment variable overrides,
    /// then validate it.
    ///
    /// Environment variables follow the pattern `ATRIUM_<SECTION>_<FIELD>`,
    /// e.g. `ATRIUM_SERVER_PORT` or `ATRIUM_DATABASE_URL`.
    pub fn load_with_env(path: &std::path::Path) -> Result<Self, ConfigError> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Reject configurations the server cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.security.id_secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::ValidationError(format!(
                "security.id_secret must be at least {} bytes",
                MIN_SECRET_LEN
            )));
        }
        if self.security.session_days <= 0 {
            return Err(ConfigError::ValidationError(
                "security.session_days must be positive".to_string(),
            ));
        }
        if self.upload.max_file_size == 0 {
            return Err(ConfigError::ValidationError(
                "upload.max_file_size must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Whether the development identifier secret is still configured
    pub fn uses_default_secret(&self) -> bool {
        self.security.id_secret == DEFAULT_ID_SECRET
    }

    /// Apply environment variable overrides to the configuration
    fn apply_env_overrides(&mut self) {
        // Server configuration
        if let Ok(host) = std::env::var("ATRIUM_SERVER_HOST") {
            self.server.host = host;
        }
        if let Ok(port) = std::env::var("ATRIUM_SERVER_PORT") {
            if let Ok(port) = port.parse::<u16>() {
                self.server.port = port;
            }
        }
        if let Ok(cors_origin) = std::env::var("ATRIUM_SERVER_CORS_ORIGIN") {
            self.server.cors_origin = cors_origin;
        }
        if let Ok(expose) = std::env::var("ATRIUM_SERVER_EXPOSE_ERRORS") {
            match expose.to_lowercase().as_str() {
                "true" | "1" => self.server.expose_errors = true,
                "false" | "0" => self.server.expose_errors = false,
                _ => {}
            }
        }

        // Database configuration
        if let Ok(driver) = std::env::var("ATRIUM_DATABASE_DRIVER") {
            match driver.to_lowercase().as_str() {
                "sqlite" => self.database.driver = DatabaseDriver::Sqlite,
                "mysql" => self.database.driver = DatabaseDriver::Mysql,
                _ => {} // Ignore invalid values
            }
        }
        if let Ok(url) = std::env::var("ATRIUM_DATABASE_URL") {
            self.database.url = url;
        }

        // Upload configuration
        if let Ok(path) = std::env::var("ATRIUM_UPLOAD_PATH") {
            self.upload.path = PathBuf::from(path);
        }
        if let Ok(base) = std::env::var("ATRIUM_UPLOAD_PUBLIC_BASE_URL") {
            self.upload.public_base_url = base;
        }

        // Security
        if let Ok(secret) = std::env::var("ATRIUM_ID_SECRET") {
            self.security.id_secret = secret;
        }

        // Admin seed: all three must be present
        if let (Ok(username), Ok(password), Ok(email)) = (
            std::env::var("ATRIUM_ADMIN_USERNAME"),
            std::env::var("ATRIUM_ADMIN_PASSWORD"),
            std::env::var("ATRIUM_ADMIN_EMAIL"),
        ) {
            self.admin = Some(AdminSeedConfig {
                username,
                email,
                password,
            });
        }
    }
}

/// Format YAML parsing error with location and context
fn format_yaml_error(e: &serde_yaml::Error) -> String {
    if let Some(location) = e.location() {
        format!(
            "at line {}, column {}: {}",
            location.line(),
            location.column(),
            e
        )
    } else {
        e.to_string()
    }
}

// Shared mutex for all config tests that modify environment variables.
#[cfg(test)]
static CONFIG_ENV_MUTEX: std::sync::Mutex<()> = std::sync::Mutex::new(());

#[cfg(test)]
const ENV_KEYS: &[&str] = &[
    "ATRIUM_SERVER_HOST",
    "ATRIUM_SERVER_PORT",
    "ATRIUM_SERVER_CORS_ORIGIN",
    "ATRIUM_SERVER_EXPOSE_ERRORS",
    "ATRIUM_DATABASE_DRIVER",
    "ATRIUM_DATABASE_URL",
    "ATRIUM_UPLOAD_PATH",
    "ATRIUM_UPLOAD_PUBLIC_BASE_URL",
    "ATRIUM_ID_SECRET",
    "ATRIUM_ADMIN_USERNAME",
    "ATRIUM_ADMIN_PASSWORD",
    "ATRIUM_ADMIN_EMAIL",
];

#[cfg(test)]
fn clear_env() {
    for key in ENV_KEYS {
        std::env::remove_var(key);
    }
}
