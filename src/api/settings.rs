//! Site settings endpoints
//!
//! `GET /{id_or_key}` accepts an encoded id or a setting key. `PUT /bulk`
//! takes `{items: [{key, value}]}` and writes everything or nothing.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::{get, put},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::common::{list_query, path_id, search_query, MultipartForm};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{created, done, ok, page, SettingResponse};
use crate::db::repositories::SETTING_QUERY;
use crate::db::ListQuery;
use crate::models::{BulkSettingItem, CreateSettingInput, SettingValueType, UpdateSettingInput};

#[derive(Debug, Deserialize)]
pub struct BulkSettingsRequest {
    pub items: Vec<BulkSettingItem>,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_settings).post(create_setting))
        .route("/search", get(search_settings))
        .route("/stats", get(setting_stats))
        .route("/bulk", put(bulk_update))
        .route(
            "/{id}",
            get(get_setting)
                .put(update_setting)
                .patch(update_setting)
                .delete(delete_setting),
        )
}

async fn respond_page(
    state: &AppState,
    viewer: &Viewer,
    query: ListQuery,
    message: &str,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.setting_service.list(viewer.user(), query).await?;
    Ok(page(
        message,
        result.map(|s| SettingResponse::new(s, &state.setting_service, &state.codec)),
    ))
}

async fn list_settings(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &SETTING_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Settings retrieved").await
}

async fn search_settings(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search_query(&params, &SETTING_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Search results").await
}

async fn setting_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok("Setting statistics", state.setting_service.stats(&user.0).await?))
}

async fn get_setting(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id_or_key): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let setting = state.setting_service.get(viewer.user(), &id_or_key).await?;
    Ok(ok(
        "Setting retrieved",
        SettingResponse::new(setting, &state.setting_service, &state.codec),
    ))
}

async fn create_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file("file");
    let input = CreateSettingInput {
        key: form.required("key")?,
        value: form.text("value").unwrap_or_default(),
        value_type: form
            .parsed::<SettingValueType>("value_type")?
            .unwrap_or_default(),
        group_name: form.text("group_name"),
        description: form.text("description"),
        is_public: form.flag("is_public")?,
    };

    let setting = state.setting_service.create(&user.0, input, file).await?;
    Ok(created(
        "Setting created",
        SettingResponse::new(setting, &state.setting_service, &state.codec),
    ))
}

async fn update_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let file = form.take_file("file");
    let input = UpdateSettingInput {
        value: form.text("value"),
        value_type: form.parsed::<SettingValueType>("value_type")?,
        group_name: form.text("group_name"),
        description: form.text("description"),
        is_public: form.flag("is_public")?,
    };

    let setting = state.setting_service.update(&user.0, id, input, file).await?;
    Ok(ok(
        "Setting updated",
        SettingResponse::new(setting, &state.setting_service, &state.codec),
    ))
}

async fn delete_setting(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    state.setting_service.delete(&user.0, id).await?;
    Ok(done("Setting deleted"))
}

async fn bulk_update(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkSettingsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let updated = state.setting_service.bulk_update(&user.0, body.items).await?;
    let count = updated.len();
    let data: Vec<SettingResponse> = updated
        .into_iter()
        .map(|s| SettingResponse::new(s, &state.setting_service, &state.codec))
        .collect();
    Ok(ok(format!("{} setting(s) updated", count), data))
}
