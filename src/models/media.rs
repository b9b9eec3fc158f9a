//! Media asset model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// An uploaded file with descriptive metadata
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MediaAsset {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub original_name: String,
    /// Path relative to the upload root
    pub file_path: String,
    pub mime_type: String,
    pub media_type: MediaType,
    pub size_bytes: i64,
    pub is_public: bool,
    /// Owning user
    pub uploaded_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Coarse media category, derived from the MIME type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Image,
    Video,
    Document,
    Audio,
    Other,
}

impl MediaType {
    pub const ALL: &'static [&'static str] = &["image", "video", "document", "audio", "other"];

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Image => "image",
            MediaType::Video => "video",
            MediaType::Document => "document",
            MediaType::Audio => "audio",
            MediaType::Other => "other",
        }
    }

    pub fn from_mime(mime: &str) -> Self {
        let mime = mime.to_ascii_lowercase();
        if mime.starts_with("image/") {
            MediaType::Image
        } else if mime.starts_with("video/") {
            MediaType::Video
        } else if mime.starts_with("audio/") {
            MediaType::Audio
        } else if mime == "application/pdf"
            || mime.starts_with("text/")
            || mime.starts_with("application/msword")
            || mime.starts_with("application/vnd.")
        {
            MediaType::Document
        } else {
            MediaType::Other
        }
    }
}

impl fmt::Display for MediaType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MediaType {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "image" => Ok(MediaType::Image),
            "video" => Ok(MediaType::Video),
            "document" => Ok(MediaType::Document),
            "audio" => Ok(MediaType::Audio),
            "other" => Ok(MediaType::Other),
            _ => Err(anyhow::anyhow!("Invalid media type: {}", s)),
        }
    }
}

/// Metadata supplied with a new upload
#[derive(Debug, Clone, Default)]
pub struct CreateMediaInput {
    pub title: String,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub is_public: Option<bool>,
}

/// Metadata changes; absent fields are left unchanged
#[derive(Debug, Clone, Default)]
pub struct UpdateMediaInput {
    pub title: Option<String>,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub is_public: Option<bool>,
}

/// Library summary
#[derive(Debug, Clone, Serialize)]
pub struct MediaStats {
    pub total: i64,
    pub total_bytes: i64,
    pub by_type: BTreeMap<String, i64>,
}
