//! Contact inquiry model
//!
//! Inquiries are submitted anonymously through the public contact form and
//! triaged by administrators.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A message submitted through the contact form
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: ContactStatus,
    pub is_read: bool,
    pub admin_notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Triage state of an inquiry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ContactStatus {
    #[default]
    New,
    InProgress,
    Resolved,
    Archived,
}

impl ContactStatus {
    /// Every status, as stored
    pub const ALL: &'static [&'static str] = &["new", "in_progress", "resolved", "archived"];

    pub fn as_str(self) -> &'static str {
        match self {
            ContactStatus::New => "new",
            ContactStatus::InProgress => "in_progress",
            ContactStatus::Resolved => "resolved",
            ContactStatus::Archived => "archived",
        }
    }
}

impl fmt::Display for ContactStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContactStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "new" => Ok(ContactStatus::New),
            "in_progress" => Ok(ContactStatus::InProgress),
            "resolved" => Ok(ContactStatus::Resolved),
            "archived" => Ok(ContactStatus::Archived),
            _ => Err(anyhow::anyhow!("Invalid contact status: {}", s)),
        }
    }
}

/// Contact form submission
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactInput {
    pub name: String,
    pub email: String,
    #[serde(default)]
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
}

/// Administrative update; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContactInput {
    pub status: Option<ContactStatus>,
    pub is_read: Option<bool>,
    pub admin_notes: Option<String>,
}

/// Inbox summary
#[derive(Debug, Clone, Serialize)]
pub struct ContactStats {
    pub total: i64,
    pub unread: i64,
    pub by_status: BTreeMap<String, i64>,
    pub last_30_days: i64,
}
