//! Shared API response types
//!
//! Every endpoint answers with the same envelope:
//! `{success, message, data?, meta?}`. Row ids and foreign keys leave the
//! server only in encoded form, so each resource has its own response DTO.

use axum::{http::StatusCode, Json};
use serde::Serialize;

use crate::ids::IdCodec;
use crate::models::{
    Contact, MediaAsset, PaginatedResult, Partner, Setting, Testimonial, User,
};
use crate::services::{
    MediaService, PartnerService, SettingService, TestimonialService,
};

// ============================================================================
// Envelope
// ============================================================================

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub meta: Option<PageMeta>,
}

/// Pagination block of a list response
#[derive(Debug, Serialize)]
pub struct PageMeta {
    pub total: i64,
    pub page: u32,
    pub limit: u32,
    #[serde(rename = "totalPages")]
    pub total_pages: u32,
}

pub fn ok<T: Serialize>(message: impl Into<String>, data: T) -> Json<ApiResponse<T>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: Some(data),
        meta: None,
    })
}

pub fn created<T: Serialize>(message: impl Into<String>, data: T) -> (StatusCode, Json<ApiResponse<T>>) {
    (StatusCode::CREATED, ok(message, data))
}

/// Envelope without a payload
pub fn done(message: impl Into<String>) -> Json<ApiResponse<()>> {
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: None,
        meta: None,
    })
}

pub fn page<T: Serialize>(message: impl Into<String>, result: PaginatedResult<T>) -> Json<ApiResponse<Vec<T>>> {
    let meta = PageMeta {
        total: result.total,
        page: result.page,
        limit: result.limit,
        total_pages: result.total_pages(),
    };
    Json(ApiResponse {
        success: true,
        message: message.into(),
        data: Some(result.items),
        meta: Some(meta),
    })
}

// ============================================================================
// Resource DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: String,
    pub username: String,
    pub email: String,
    pub role: String,
    pub created_at: String,
}

impl UserResponse {
    pub fn new(user: User, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(user.id),
            username: user.username,
            email: user.email,
            role: user.role.to_string(),
            created_at: user.created_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ContactResponse {
    pub id: String,
    pub name: String,
    pub email: String,
    pub phone: Option<String>,
    pub subject: String,
    pub message: String,
    pub status: String,
    pub is_read: bool,
    pub admin_notes: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

impl ContactResponse {
    pub fn new(contact: Contact, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(contact.id),
            name: contact.name,
            email: contact.email,
            phone: contact.phone,
            subject: contact.subject,
            message: contact.message,
            status: contact.status.as_str().to_string(),
            is_read: contact.is_read,
            admin_notes: contact.admin_notes,
            created_at: contact.created_at.to_rfc3339(),
            updated_at: contact.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct MediaResponse {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub alt_text: Option<String>,
    pub original_name: String,
    pub url: String,
    pub mime_type: String,
    pub media_type: String,
    pub size_bytes: i64,
    pub is_public: bool,
    pub uploaded_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl MediaResponse {
    pub fn new(media: MediaAsset, service: &MediaService, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(media.id),
            url: service.url_for(&media),
            title: media.title,
            description: media.description,
            alt_text: media.alt_text,
            original_name: media.original_name,
            mime_type: media.mime_type,
            media_type: media.media_type.as_str().to_string(),
            size_bytes: media.size_bytes,
            is_public: media.is_public,
            uploaded_by: codec.encode(media.uploaded_by),
            created_at: media.created_at.to_rfc3339(),
            updated_at: media.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PartnerResponse {
    pub id: String,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub website_url: Option<String>,
    pub category: String,
    pub logo_url: Option<String>,
    pub is_active: bool,
    pub display_order: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PartnerResponse {
    pub fn new(partner: Partner, service: &PartnerService, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(partner.id),
            logo_url: service.logo_url(&partner),
            name: partner.name,
            slug: partner.slug,
            description: partner.description,
            website_url: partner.website_url,
            category: partner.category.as_str().to_string(),
            is_active: partner.is_active,
            display_order: partner.display_order,
            created_at: partner.created_at.to_rfc3339(),
            updated_at: partner.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct SettingResponse {
    pub id: String,
    pub key: String,
    pub value: String,
    pub value_type: String,
    pub group_name: String,
    pub description: Option<String>,
    pub is_public: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
    pub updated_at: String,
}

impl SettingResponse {
    pub fn new(setting: Setting, service: &SettingService, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(setting.id),
            file_url: service.file_url(&setting),
            key: setting.key,
            value: setting.value,
            value_type: setting.value_type.as_str().to_string(),
            group_name: setting.group_name,
            description: setting.description,
            is_public: setting.is_public,
            updated_at: setting.updated_at.to_rfc3339(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct TestimonialResponse {
    pub id: String,
    pub author_name: String,
    pub author_title: Option<String>,
    pub organization: Option<String>,
    pub content: String,
    pub rating: i64,
    pub photo_url: Option<String>,
    pub media_id: Option<String>,
    pub is_published: bool,
    pub is_featured: bool,
    pub display_order: i64,
    pub submitted_by: String,
    pub created_at: String,
    pub updated_at: String,
}

impl TestimonialResponse {
    pub fn new(testimonial: Testimonial, service: &TestimonialService, codec: &IdCodec) -> Self {
        Self {
            id: codec.encode(testimonial.id),
            photo_url: service.photo_url(&testimonial),
            author_name: testimonial.author_name,
            author_title: testimonial.author_title,
            organization: testimonial.organization,
            content: testimonial.content,
            rating: testimonial.rating,
            media_id: testimonial.media_id.map(|id| codec.encode(id)),
            is_published: testimonial.is_published,
            is_featured: testimonial.is_featured,
            display_order: testimonial.display_order,
            submitted_by: codec.encode(testimonial.submitted_by),
            created_at: testimonial.created_at.to_rfc3339(),
            updated_at: testimonial.updated_at.to_rfc3339(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::query::tests::codec;

    #[test]
    fn test_page_envelope_uses_camel_case_total_pages() {
        let result = PaginatedResult::new(vec![1, 2, 3], 25, 3, 10);
        let Json(body) = page("ok", result);
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["meta"]["totalPages"], 3);
        assert_eq!(json["meta"]["total"], 25);
        assert_eq!(json["data"].as_array().unwrap().len(), 3);
    }

    #[test]
    fn test_done_omits_data() {
        let Json(body) = done("Deleted");
        let json = serde_json::to_value(&body).unwrap();
        assert!(json.get("data").is_none());
        assert!(json.get("meta").is_none());
    }

    #[test]
    fn test_contact_ids_are_encoded() {
        let codec = codec();
        let contact = Contact {
            id: 42,
            name: "Ada".into(),
            email: "ada@example.org".into(),
            phone: None,
            subject: "Hi".into(),
            message: "Hello".into(),
            status: Default::default(),
            is_read: false,
            admin_notes: None,
            created_at: chrono::Utc::now(),
            updated_at: chrono::Utc::now(),
        };
        let response = ContactResponse::new(contact, &codec);
        assert_ne!(response.id, "42");
        assert_eq!(codec.decode(&response.id), Ok(42));
        assert_eq!(response.status, "new");
    }
}
