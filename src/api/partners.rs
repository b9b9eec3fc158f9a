//! Partner directory endpoints
//!
//! `GET /{id_or_slug}` accepts either an encoded id or a slug. Create and
//! update take multipart forms with an optional `logo` part.

use axum::{
    extract::{Multipart, Path, Query, State},
    response::IntoResponse,
    routing::get,
    Router,
};
use std::collections::HashMap;

use crate::api::common::{list_query, path_id, search_query, MultipartForm};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser, Viewer};
use crate::api::responses::{created, done, ok, page, PartnerResponse};
use crate::db::repositories::PARTNER_QUERY;
use crate::db::ListQuery;
use crate::models::{CreatePartnerInput, PartnerCategory, UpdatePartnerInput};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_partners).post(create_partner))
        .route("/search", get(search_partners))
        .route("/stats", get(partner_stats))
        .route(
            "/{id}",
            get(get_partner)
                .put(update_partner)
                .patch(update_partner)
                .delete(delete_partner),
        )
}

async fn respond_page(
    state: &AppState,
    viewer: &Viewer,
    query: ListQuery,
    message: &str,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.partner_service.list(viewer.user(), query).await?;
    Ok(page(
        message,
        result.map(|p| PartnerResponse::new(p, &state.partner_service, &state.codec)),
    ))
}

async fn list_partners(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &PARTNER_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Partners retrieved").await
}

async fn search_partners(
    State(state): State<AppState>,
    viewer: Viewer,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search_query(&params, &PARTNER_QUERY, &state.codec)?;
    respond_page(&state, &viewer, query, "Search results").await
}

async fn partner_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    Ok(ok("Partner statistics", state.partner_service.stats(&user.0).await?))
}

async fn get_partner(
    State(state): State<AppState>,
    viewer: Viewer,
    Path(id_or_slug): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let partner = state.partner_service.get(viewer.user(), &id_or_slug).await?;
    Ok(ok(
        "Partner retrieved",
        PartnerResponse::new(partner, &state.partner_service, &state.codec),
    ))
}

async fn create_partner(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let mut form = MultipartForm::read(multipart).await?;
    let logo = form.take_file("logo");
    let input = CreatePartnerInput {
        name: form.required("name")?,
        slug: form.text("slug"),
        description: form.text("description"),
        website_url: form.text("website_url"),
        category: form.parsed::<PartnerCategory>("category")?,
        is_active: form.flag("is_active")?,
        display_order: form.parsed("display_order")?,
    };

    let partner = state.partner_service.create(&user.0, input, logo).await?;
    Ok(created(
        "Partner created",
        PartnerResponse::new(partner, &state.partner_service, &state.codec),
    ))
}

async fn update_partner(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    multipart: Multipart,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let mut form = MultipartForm::read(multipart).await?;
    let logo = form.take_file("logo");
    let input = UpdatePartnerInput {
        name: form.text("name"),
        slug: form.text("slug"),
        description: form.text("description"),
        website_url: form.text("website_url"),
        category: form.parsed::<PartnerCategory>("category")?,
        is_active: form.flag("is_active")?,
        display_order: form.parsed("display_order")?,
    };

    let partner = state.partner_service.update(&user.0, id, input, logo).await?;
    Ok(ok(
        "Partner updated",
        PartnerResponse::new(partner, &state.partner_service, &state.codec),
    ))
}

async fn delete_partner(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    state.partner_service.delete(&user.0, id).await?;
    Ok(done("Partner deleted"))
}
