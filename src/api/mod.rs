//! API layer - HTTP handlers and routing
//!
//! Everything lives under `/api/v1`:
//! - `/auth` sign-in and session
//! - `/health` database probe
//! - `/contacts`, `/media`, `/partners`, `/settings`, `/testimonials`
//!
//! Uploaded files are served from `/uploads`.

pub mod auth;
pub mod common;
pub mod contacts;
pub mod health;
pub mod media;
pub mod middleware;
pub mod partners;
pub mod responses;
pub mod settings;
pub mod testimonials;

use anyhow::Context;
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderValue, Method},
    middleware as axum_middleware,
    Router,
};
use tower_http::{cors::CorsLayer, services::ServeDir, trace::TraceLayer};

pub use middleware::{ApiError, AppState, AuthenticatedUser, Viewer};

/// Multipart overhead allowed on top of the largest accepted file
const FORM_OVERHEAD_BYTES: usize = 64 * 1024;

/// Build the `/api/v1` router
pub fn build_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/health", health::router())
        .nest("/contacts", contacts::router())
        .nest("/media", media::router())
        .nest("/partners", partners::router())
        .nest("/settings", settings::router())
        .nest("/testimonials", testimonials::router())
        .layer(axum_middleware::from_fn_with_state(
            state,
            middleware::optional_auth,
        ))
}

/// Build the complete router with middleware
pub fn build_router(state: AppState) -> anyhow::Result<Router> {
    let origin = state
        .config
        .server
        .cors_origin
        .parse::<HeaderValue>()
        .with_context(|| format!("Invalid server.cors_origin '{}'", state.config.server.cors_origin))?;

    // Cookie sessions need credentials, which rules out a wildcard origin
    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::PATCH,
            Method::DELETE,
        ])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION, header::COOKIE])
        .allow_credentials(true);

    let body_limit = usize::try_from(state.config.upload.max_file_size)
        .unwrap_or(usize::MAX)
        .saturating_add(FORM_OVERHEAD_BYTES);
    let uploads = ServeDir::new(&state.config.upload.path);

    Ok(Router::new()
        .nest("/api/v1", build_api_router(state.clone()))
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}
