//! Site setting model
//!
//! Settings are typed key/value pairs grouped for the admin UI. Public
//! settings are readable without signing in.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Setting {
    pub id: i64,
    pub key: String,
    pub value: String,
    pub value_type: SettingValueType,
    pub group_name: String,
    pub description: Option<String>,
    pub is_public: bool,
    /// Uploaded file backing a `file` setting
    pub file_path: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// How a setting's value is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum SettingValueType {
    #[default]
    String,
    Number,
    Boolean,
    Json,
    File,
}

impl SettingValueType {
    pub const ALL: &'static [&'static str] = &["string", "number", "boolean", "json", "file"];

    pub fn as_str(self) -> &'static str {
        match self {
            SettingValueType::String => "string",
            SettingValueType::Number => "number",
            SettingValueType::Boolean => "boolean",
            SettingValueType::Json => "json",
            SettingValueType::File => "file",
        }
    }

    /// Check that `value` is well-formed for this type
    pub fn check(self, value: &str) -> Result<(), String> {
        match self {
            SettingValueType::String | SettingValueType::File => Ok(()),
            SettingValueType::Number => value
                .trim()
                .parse::<f64>()
                .ok()
                .filter(|n| n.is_finite())
                .map(|_| ())
                .ok_or_else(|| format!("'{}' is not a number", value)),
            SettingValueType::Boolean => match value {
                "true" | "false" => Ok(()),
                _ => Err("boolean settings must be 'true' or 'false'".to_string()),
            },
            SettingValueType::Json => serde_json::from_str::<serde_json::Value>(value)
                .map(|_| ())
                .map_err(|e| format!("invalid JSON: {}", e)),
        }
    }
}

impl fmt::Display for SettingValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SettingValueType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "string" => Ok(SettingValueType::String),
            "number" => Ok(SettingValueType::Number),
            "boolean" => Ok(SettingValueType::Boolean),
            "json" => Ok(SettingValueType::Json),
            "file" => Ok(SettingValueType::File),
            _ => Err(anyhow::anyhow!("Invalid setting type: {}", s)),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CreateSettingInput {
    pub key: String,
    pub value: String,
    pub value_type: SettingValueType,
    pub group_name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateSettingInput {
    pub value: Option<String>,
    pub value_type: Option<SettingValueType>,
    pub group_name: Option<String>,
    pub description: Option<String>,
    pub is_public: Option<bool>,
}

/// One entry of a bulk value update
#[derive(Debug, Clone, Deserialize)]
pub struct BulkSettingItem {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct SettingStats {
    pub total: i64,
    pub public: i64,
    pub by_group: BTreeMap<String, i64>,
}
