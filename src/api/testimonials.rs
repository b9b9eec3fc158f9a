//! Testimonial endpoints
//!
//! Create and update take multipart forms with an optional `photo` part.
//! `media_id` is an encoded media id.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::common::{list_query, path_id, search_query, MultipartForm};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{created, done, ok, page, TestimonialResponse};
use crate::db::repositories::TESTIMONIAL_QUERY;
use crate::db::ListQuery;
use crate::ids::IdCodec;
use crate::models::{CreateTestimonialInput, UpdateTestimonialInput};

#[derive(Debug, Deserialize)]
pub struct BulkPublishRequest {
    pub ids: Vec<String>,
    pub is_published: bool,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_testimonials).post(create_testimonial))
        .route("/search", get(search_testimonials))
        .route("/stats", get(testimonial_stats))
        .route("/bulk-publish", post(bulk_publish))
        .route(
            "/{id}",
            get(get_testimonial)
                .put(update_testimonial)
                .patch(update_testimonial)
                .delete(delete_testimonial),
        )
}

/// `media_id` form field. A token that does not decode cannot name an
/// existing asset, so it is a validation error like any dangling reference.
fn media_id(form: &MultipartForm, codec: &IdCodec) -> Result<Option<i64>, ApiError> {
    match form.text("media_id").as_deref().map(str::trim) {
        None | Some("") => Ok(None),
        Some(token) => codec.decode(token).map(Some).map_err(|_| {
            ApiError::validation_error("media_id does not refer to an existing media asset")
        }),
    }
}

async fn respond_page(
    state: &AppState,
    viewer: &Viewer,
    query: ListQuery,
    message: &str,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.testimonial_service.list(viewer.user(), query).await?;
    Ok(page(
        message,
        result.map(|t| TestimonialResponse::new(t, &state.testimonial_service, &state.codec)),
    ))
}

async fn list_testimonials(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &TESTIMONIAL_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Testimonials retrieved").await
}

async fn search_testimonials(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search_query(&params, &TESTIMONIAL_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Search results").await
}

async fn testimonial_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok("Testimonial statistics", state.testimonial_service.stats().await?))
}

async fn get_testimonial(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let testimonial = state.testimonial_service.get(viewer.user(), id).await?;
    Ok(ok(
        "Testimonial retrieved",
        TestimonialResponse::new(testimonial, &state.testimonial_service, &state.codec),
    ))
}

async fn create_testimonial(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let photo = form.take_file("photo");
    let input = CreateTestimonialInput {
        author_name: form.required("author_name")?,
        author_title: form.text("author_title"),
        organization: form.text("organization"),
        content: form.required("content")?,
        rating: form.parsed("rating")?,
        media_id: media_id(&form, &state.codec)?,
        is_published: form.flag("is_published")?,
        is_featured: form.flag("is_featured")?,
        display_order: form.parsed("display_order")?,
    };

    let testimonial = state.testimonial_service.create(&user.0, input, photo).await?;
    Ok(created(
        "Testimonial created",
        TestimonialResponse::new(testimonial, &state.testimonial_service, &state.codec),
    ))
}

async fn update_testimonial(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let photo = form.take_file("photo");
    let input = UpdateTestimonialInput {
        author_name: form.text("author_name"),
        author_title: form.text("author_title"),
        organization: form.text("organization"),
        content: form.text("content"),
        rating: form.parsed("rating")?,
        media_id: media_id(&form, &state.codec)?,
        is_published: form.flag("is_published")?,
        is_featured: form.flag("is_featured")?,
        display_order: form.parsed("display_order")?,
    };

    let testimonial = state
        .testimonial_service
        .update(&user.0, id, input, photo)
        .await?;
    Ok(ok(
        "Testimonial updated",
        TestimonialResponse::new(testimonial, &state.testimonial_service, &state.codec),
    ))
}

async fn delete_testimonial(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    state.testimonial_service.delete(&user.0, id).await?;
    Ok(done("Testimonial deleted"))
}

async fn bulk_publish(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkPublishRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .testimonial_service
        .bulk_publish(&user.0, &body.ids, body.is_published)
        .await?;
    Ok(ok(format!("{} testimonial(s) updated", result.updated_count), result))
}
