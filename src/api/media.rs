//! Media library endpoints
//!
//! Uploads are multipart forms with a `file` part plus text fields
//! `title`, `description`, `alt_text` and `is_public`.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use std::collections::HashMap;

use crate::api::common::{list_query, path_id, search_query, BulkIdsRequest, MultipartForm};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{created, done, ok, page, MediaResponse};
use crate::db::repositories::MEDIA_QUERY;
use crate::db::ListQuery;
use crate::models::{CreateMediaInput, UpdateMediaInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_media).post(upload_media))
        .route("/search", get(search_media))
        .route("/stats", get(media_stats))
        .route("/bulk-delete", post(bulk_delete))
        .route(
            "/{id}",
            get(get_media).put(update_media).patch(update_media).delete(delete_media),
        )
}

async fn respond_page(
    state: &AppState,
    viewer: &Viewer,
    query: ListQuery,
    message: &str,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.media_service.list(viewer.user(), query).await?;
    Ok(page(
        message,
        result.map(|m| MediaResponse::new(m, &state.media_service, &state.codec)),
    ))
}

async fn list_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &MEDIA_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Media retrieved").await
}

async fn search_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search_query(&params, &MEDIA_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Search results").await
}

async fn media_stats(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok("Media statistics", state.media_service.stats().await?))
}

async fn get_media(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let media = state.media_service.get(viewer.user(), id).await?;
    Ok(ok(
        "Media retrieved",
        MediaResponse::new(media, &state.media_service, &state.codec),
    ))
}

async fn upload_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form
        .take_file("file")
        .ok_or_else(|| ApiError::validation_error("file is required"))?;
    let input = CreateMediaInput {
        title: form.text("title").unwrap_or_default(),
        description: form.text("description"),
        alt_text: form.text("alt_text"),
        is_public: form.flag("is_public")?,
    };

    let media = state.media_service.create(&user.0, input, file).await?;
    Ok(created(
        "Media uploaded",
        MediaResponse::new(media, &state.media_service, &state.codec),
    ))
}

async fn update_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file("file");
    let input = UpdateMediaInput {
        title: form.text("title"),
        description: form.text("description"),
        alt_text: form.text("alt_text"),
        is_public: form.flag("is_public")?,
    };

    let media = state.media_service.update(&user.0, id, input, file).await?;
    Ok(ok(
        "Media updated",
        MediaResponse::new(media, &state.media_service, &state.codec),
    ))
}

async fn delete_media(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    state.media_service.delete(&user.0, id).await?;
    Ok(done("Media deleted"))
}

async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.media_service.bulk_delete(&user.0, &body.ids).await?;
    Ok(ok(format!("{} media item(s) deleted", result.deleted_count), result))
}
