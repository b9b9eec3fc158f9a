//! Authentication API endpoints
//!
//! - POST /api/v1/auth/login - Sign in, returns the session token and sets
//!   the `session` cookie
//! - POST /api/v1/auth/logout - End the current session
//! - GET /api/v1/auth/me - Current user

use axum::{
    extract::State,
    http::{header, HeaderMap, HeaderValue},
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde::{Deserialize, Serialize};

use crate::api::middleware::{extract_session_token, ApiError, AppState, AuthenticatedUser};
use crate::api::responses::{done, ok, ApiResponse, UserResponse};

/// Request body for user login
#[derive(Debug, Deserialize)]
pub struct LoginRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: String,
    pub user: UserResponse,
}

/// Build the auth router
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/login", post(login))
        .route("/logout", post(logout))
        .route("/me", get(get_current_user))
}

/// POST /api/v1/auth/login
async fn login(
    State(state): State<AppState>,
    Json(body): Json<LoginRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let (session, user) = state.user_service.login(&body.username, &body.password).await?;

    let cookie = format!(
        "session={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        session.id,
        state.config.security.session_days * 24 * 60 * 60
    );
    let mut headers = HeaderMap::new();
    headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_str(&cookie).map_err(|e| ApiError::internal_error(&anyhow::Error::new(e)))?,
    );

    let response = LoginResponse {
        token: session.id,
        expires_at: session.expires_at.to_rfc3339(),
        user: UserResponse::new(user, &state.codec),
    };
    Ok((headers, ok("Signed in", response)))
}

/// POST /api/v1/auth/logout
async fn logout(
    State(state): State<AppState>,
    _user: AuthenticatedUser,
    headers: HeaderMap,
) -> Result<impl IntoResponse, ApiError> {
    let token = extract_session_token(&headers)
        .ok_or_else(|| ApiError::unauthorized("Missing authentication token"))?;
    state.user_service.logout(&token).await?;

    // Clear the session cookie
    let mut response_headers = HeaderMap::new();
    response_headers.insert(
        header::SET_COOKIE,
        HeaderValue::from_static("session=; Path=/; HttpOnly; SameSite=Lax; Max-Age=0"),
    );
    Ok((response_headers, done("Signed out")))
}

/// GET /api/v1/auth/me
async fn get_current_user(
    State(state): State<AppState>,
    user: AuthenticatedUser,
) -> Json<ApiResponse<UserResponse>> {
    ok("Current user", UserResponse::new(user.0, &state.codec))
}
