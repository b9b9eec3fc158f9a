//! Contact inquiry endpoints
//!
//! - POST /api/v1/contacts - Submit the contact form (public)
//! - GET /api/v1/contacts, /search, /stats - Inbox (admin)
//! - GET|PATCH|DELETE /api/v1/contacts/{id} (admin)
//! - POST /api/v1/contacts/bulk-delete, /bulk-status (admin)

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use std::collections::HashMap;

use crate::api::common::{list_query, path_id, search_query, BulkIdsRequest};
use crate::api::middleware::{ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{created, done, ok, page, ContactResponse};
use crate::db::repositories::CONTACT_QUERY;
use crate::models::{ContactStatus, CreateContactInput, UpdateContactInput};

#[derive(Debug, Deserialize)]
pub struct BulkStatusRequest {
    pub ids: Vec<String>,
    pub status: ContactStatus,
}

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_contacts).post(submit_contact))
        .route("/search", get(search_contacts))
        .route("/stats", get(contact_stats))
        .route("/bulk-delete", post(bulk_delete))
        .route("/bulk-status", post(bulk_status))
        .route("/{id}", get(get_contact).patch(update_contact).delete(delete_contact))
}

async fn submit_contact(
    State(state): State<AppState>,
    Json(body): Json<CreateContactInput>,
) -> Result<impl IntoResponse, ApiError> {
    let contact = state.contact_service.submit(body).await?;
    Ok(created(
        "Thank you, your message has been received",
        ContactResponse::new(contact, &state.codec),
    ))
}

async fn list_contacts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = list_query(&params, &CONTACT_QUERY, &state.codec)?;
    let result = state.contact_service.list(&user.0, &query).await?;
    Ok(page(
        "Contacts retrieved",
        result.map(|c| ContactResponse::new(c, &state.codec)),
    ))
}

async fn search_contacts(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Query(params): Query<HashMap<String, String>>,
) -> Result<impl IntoResponse, ApiError> {
    let query = search_query(&params, &CONTACT_QUERY, &state.codec)?;
    let result = state.contact_service.list(&user.0, &query).await?;
    Ok(page(
        "Search results",
        result.map(|c| ContactResponse::new(c, &state.codec)),
    ))
}

async fn contact_stats(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Result<impl IntoResponse, ApiError> {
    let stats = state.contact_service.stats(&user.0).await?;
    Ok(ok("Contact statistics", stats))
}

async fn get_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let contact = state.contact_service.get(&user.0, id).await?;
    Ok(ok("Contact retrieved", ContactResponse::new(contact, &state.codec)))
}

async fn update_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
    Json(body): Json<UpdateContactInput>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    let contact = state.contact_service.update(&user.0, id, body).await?;
    Ok(ok("Contact updated", ContactResponse::new(contact, &state.codec)))
}

async fn delete_contact(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = path_id(&state.codec, &id)?;
    state.contact_service.delete(&user.0, id).await?;
    Ok(done("Contact deleted"))
}

async fn bulk_delete(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkIdsRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state.contact_service.bulk_delete(&user.0, &body.ids).await?;
    Ok(ok(format!("{} contact(s) deleted", result.deleted_count), result))
}

async fn bulk_status(
    State(state): State<AppState>,
    user: AuthenticatedUser,
    Json(body): Json<BulkStatusRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let result = state
        .contact_service
        .bulk_status(&user.0, &body.ids, body.status)
        .await?;
    Ok(ok(format!("{} contact(s) updated", result.updated_count), result))
}
