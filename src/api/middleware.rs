//! API middleware
//!
//! Contains:
//! - Application state shared by every handler
//! - Session resolution (bearer token or `session` cookie)
//! - The `AuthenticatedUser` and `Viewer` extractors
//! - `ApiError`, the HTTP face of `ServiceError`

use anyhow::Context;
use axum::{
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use once_cell::sync::OnceCell;
use serde::Serialize;
use std::convert::Infallible;
use std::sync::Arc;

use crate::config::Config;
use crate::db::repositories::{
    SqlxContactRepository, SqlxMediaRepository, SqlxPartnerRepository, SqlxSessionRepository,
    SqlxSettingRepository, SqlxTestimonialRepository, SqlxUserRepository,
};
use crate::db::DynDatabasePool;
use crate::ids::IdCodec;
use crate::models::User;
use crate::services::{
    ContactService, FileStorage, LocalFileStorage, MediaService, PartnerService, ServiceError,
    SettingService, TestimonialService, UserService,
};

/// Whether 500 responses carry the underlying error text
static EXPOSE_ERRORS: OnceCell<bool> = OnceCell::new();

/// Enable or disable internal error details in responses. Only the first
/// call has any effect.
pub fn set_expose_errors(expose: bool) {
    let _ = EXPOSE_ERRORS.set(expose);
}

fn expose_errors() -> bool {
    EXPOSE_ERRORS.get().copied().unwrap_or(false)
}

/// Application state containing shared services
#[derive(Clone)]
pub struct AppState {
    pub pool: DynDatabasePool,
    pub config: Arc<Config>,
    pub codec: Arc<IdCodec>,
    pub storage: Arc<dyn FileStorage>,
    pub user_service: Arc<UserService>,
    pub contact_service: Arc<ContactService>,
    pub media_service: Arc<MediaService>,
    pub partner_service: Arc<PartnerService>,
    pub setting_service: Arc<SettingService>,
    pub testimonial_service: Arc<TestimonialService>,
}

impl AppState {
    /// Wire repositories, storage and services on top of `pool`
    pub fn new(pool: DynDatabasePool, config: Config) -> anyhow::Result<Self> {
        let codec = Arc::new(
            IdCodec::new(config.security.id_secret.as_bytes()).context("Invalid security.id_secret")?,
        );
        let storage: Arc<dyn FileStorage> = Arc::new(LocalFileStorage::new(config.upload.clone()));
        let media_repo = SqlxMediaRepository::boxed(pool.clone());

        let user_service = Arc::new(UserService::new(
            SqlxUserRepository::boxed(pool.clone()),
            SqlxSessionRepository::boxed(pool.clone()),
            config.security.session_days,
        ));
        let contact_service = Arc::new(ContactService::new(
            SqlxContactRepository::boxed(pool.clone()),
            codec.clone(),
        ));
        let media_service = Arc::new(MediaService::new(
            media_repo.clone(),
            storage.clone(),
            codec.clone(),
        ));
        let partner_service = Arc::new(PartnerService::new(
            SqlxPartnerRepository::boxed(pool.clone()),
            storage.clone(),
            codec.clone(),
        ));
        let setting_service = Arc::new(SettingService::new(
            SqlxSettingRepository::boxed(pool.clone()),
            storage.clone(),
            codec.clone(),
        ));
        let testimonial_service = Arc::new(TestimonialService::new(
            SqlxTestimonialRepository::boxed(pool.clone()),
            media_repo,
            storage.clone(),
            codec.clone(),
        ));

        Ok(Self {
            pool,
            config: Arc::new(config),
            codec,
            storage,
            user_service,
            contact_service,
            media_service,
            partner_service,
            setting_service,
            testimonial_service,
        })
    }
}

/// Authenticated user extracted from request
#[derive(Debug, Clone)]
pub struct AuthenticatedUser(pub User);

/// The caller, if signed in. Never rejects.
#[derive(Debug, Clone)]
pub struct Viewer(pub Option<User>);

impl Viewer {
    pub fn user(&self) -> Option<&User> {
        self.0.as_ref()
    }
}

/// Error body; shares its shape with the success envelope
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

/// An error response
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
    pub detail: Option<String>,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
            detail: None,
        }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self::new(StatusCode::UNAUTHORIZED, message)
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        Self::new(StatusCode::FORBIDDEN, message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND, message)
    }

    pub fn validation_error(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self::new(StatusCode::CONFLICT, message)
    }

    /// Logs the cause; the response only names it in development
    pub fn internal_error(cause: &anyhow::Error) -> Self {
        tracing::error!(error = ?cause, "Request failed");
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            message: "Internal server error".to_string(),
            detail: expose_errors().then(|| format!("{:#}", cause)),
        }
    }
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::NotFound(message) => ApiError::not_found(message),
            ServiceError::InvalidId(_) => ApiError::not_found("Resource not found"),
            ServiceError::Validation(message) => ApiError::validation_error(message),
            ServiceError::Unauthorized(message) => ApiError::unauthorized(message),
            ServiceError::Permission(message) => ApiError::forbidden(message),
            ServiceError::Conflict(message) => ApiError::conflict(message),
            ServiceError::DependencyInUse(message) => ApiError::validation_error(message),
            ServiceError::Internal(cause) => ApiError::internal_error(&cause),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message,
            error: self.detail,
        };
        (self.status, Json(body)).into_response()
    }
}

/// Session token from the `Authorization: Bearer` header or the `session`
/// cookie
pub fn extract_session_token(headers: &HeaderMap) -> Option<String> {
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        if let Ok(auth_str) = auth_header.to_str() {
            if let Some(token) = auth_str.strip_prefix("Bearer ") {
                return Some(token.trim().to_string());
            }
        }
    }

    if let Some(cookie_header) = headers.get(header::COOKIE) {
        if let Ok(cookie_str) = cookie_header.to_str() {
            for cookie in cookie_str.split(';') {
                let cookie = cookie.trim();
                if let Some(token) = cookie.strip_prefix("session=") {
                    if !token.is_empty() {
                        return Some(token.to_string());
                    }
                }
            }
        }
    }

    None
}

/// Resolve the session, if any, and attach the user to the request.
/// Unknown or expired tokens make the request anonymous.
pub async fn optional_auth(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    if let Some(token) = extract_session_token(request.headers()) {
        if let Some(user) = state.user_service.validate_session(&token).await? {
            request.extensions_mut().insert(AuthenticatedUser(user));
        }
    }
    Ok(next.run(request).await)
}

impl<S> FromRequestParts<S> for AuthenticatedUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AuthenticatedUser>()
            .cloned()
            .ok_or_else(|| ApiError::unauthorized("Authentication required"))
    }
}

impl<S> FromRequestParts<S> for Viewer
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Viewer(
            parts.extensions.get::<AuthenticatedUser>().map(|u| u.0.clone()),
        ))
    }
}
