//! Testimonial model

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Lowest accepted rating
pub const MIN_RATING: i64 = 1;
/// Highest accepted rating
pub const MAX_RATING: i64 = 5;

/// A quote from a student, alumnus or partner
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Testimonial {
    pub id: i64,
    pub author_name: String,
    pub author_title: Option<String>,
    pub organization: Option<String>,
    pub content: String,
    /// 1..=5
    pub rating: i64,
    pub photo_path: Option<String>,
    /// Media asset shown alongside the quote
    pub media_id: Option<i64>,
    pub is_published: bool,
    pub is_featured: bool,
    pub display_order: i64,
    /// Owning user
    pub submitted_by: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub struct CreateTestimonialInput {
    pub author_name: String,
    pub author_title: Option<String>,
    pub organization: Option<String>,
    pub content: String,
    pub rating: Option<i64>,
    pub media_id: Option<i64>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i64>,
}

#[derive(Debug, Clone, Default)]
pub struct UpdateTestimonialInput {
    pub author_name: Option<String>,
    pub author_title: Option<String>,
    pub organization: Option<String>,
    pub content: Option<String>,
    pub rating: Option<i64>,
    pub media_id: Option<i64>,
    pub is_published: Option<bool>,
    pub is_featured: Option<bool>,
    pub display_order: Option<i64>,
}

impl UpdateTestimonialInput {
    /// Whether the update touches fields reserved for administrators
    pub fn touches_moderation(&self) -> bool {
        self.is_published.is_some() || self.is_featured.is_some() || self.display_order.is_some()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct TestimonialStats {
    pub total: i64,
    pub published: i64,
    pub featured: i64,
    pub average_rating: Option<f64>,
    pub by_rating: BTreeMap<String, i64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_touches_moderation() {
        assert!(!UpdateTestimonialInput::default().touches_moderation());
        let update = UpdateTestimonialInput {
            content: Some("Great".to_string()),
            ..Default::default()
        };
        assert!(!update.touches_moderation());
        let update = UpdateTestimonialInput {
            is_featured: Some(true),
            ..Default::default()
        };
        assert!(update.touches_moderation());
    }
}
