//! Partner model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// A partner organization shown on the site
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Partner {
    pub id: i64,
    pub name: String,
    /// URL-friendly unique name
    pub slug: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub category: PartnerCategory,
    pub logo_path: Option<String>,
    pub is_active: bool,
    pub display_order: i64,
    pub created_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PartnerCategory {
    Academic,
    Industry,
    Government,
    Nonprofit,
    #[default]
    Other,
}

impl PartnerCategory {
    pub const ALL: &'static [&'static str] =
        &["academic", "industry", "government", "nonprofit", "other"];

    pub fn as_str(self) -> &'static str {
        match self {
            PartnerCategory::Academic => "academic",
            PartnerCategory::Industry => "industry",
            PartnerCategory::Government => "government",
            PartnerCategory::Nonprofit => "nonprofit",
            PartnerCategory::Other => "other",
        }
    }
}

impl fmt::Display for PartnerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PartnerCategory {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "academic" => Ok(PartnerCategory::Academic),
            "industry" => Ok(PartnerCategory::Industry),
            "government" => Ok(PartnerCategory::Government),
            "nonprofit" => Ok(PartnerCategory::Nonprofit),
            "other" => Ok(PartnerCategory::Other),
            _ => Err(anyhow::anyhow!("Invalid partner category: {}", s)),
        }
    }
}

/// Input for creating a partner. The slug is derived from the name when
/// not given.
#[derive(Debug, Clone, Default)]
pub struct CreatePartnerInput {
    pub name: String,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub category: Option<PartnerCategory>,
    pub is_active: Option<bool>,
    pub display_order: Option<i64>,
}

/// Partial update; absent fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdatePartnerInput {
    pub name: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub category: Option<PartnerCategory>,
    pub is_active: Option<bool>,
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PartnerStats {
    pub total: i64,
    pub active: i64,
    pub by_category: BTreeMap<String, i64>,
}
