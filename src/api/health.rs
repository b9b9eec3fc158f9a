//! GET /api/v1/health - database reachability probe

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Router};
use serde::Serialize;

use crate::api::middleware::{ApiError, AppState};
use crate::api::responses::ok;
use crate::config::DatabaseDriver;

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub database: DatabaseDriver,
    pub version: &'static str,
}

pub fn router() -> Router<AppState> {
    Router::new().route("/", get(health))
}

async fn health(State(state): State<AppState>) -> Result<impl IntoResponse, ApiError> {
    if let Err(e) = state.pool.ping().await {
        tracing::error!(error = ?e, "Health check failed");
        return Err(ApiError::new(StatusCode::SERVICE_UNAVAILABLE, "Database unavailable"));
    }
    Ok(ok(
        "Service healthy",
        HealthResponse {
            status: "ok",
            database: state.pool.driver(),
            version: env!("CARGO_PKG_VERSION"),
        },
    ))
}
