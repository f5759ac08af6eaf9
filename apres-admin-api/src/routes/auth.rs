/// Authentication endpoints
///
/// # Endpoints
///
/// - `POST /api/login` - Exchange username and password for a token
/// - `POST /api/signup` - Create a regular account
/// - `GET /api/validate-token` - Check a bearer token

use crate::{app::AppState, error::ApiResult, extract::JsonBody};
use apres_admin_shared::{
    auth::middleware::authenticate,
    models::user::User,
    services::accounts::{LoginRequest, LoginResponse, SignupRequest},
};
use axum::{extract::State, http::HeaderMap, http::StatusCode, Json};
use serde::{Deserialize, Serialize};

/// Login with username and password
///
/// # Endpoint
///
/// ```text
/// POST /api/login
/// Content-Type: application/json
///
/// { "username": "patrol", "password": "Sn0w!fall" }
/// ```
///
/// # Response
///
/// ```json
/// { "token": "eyJ...", "role": "admin" }
/// ```
///
/// The token is valid for one hour. `role` is informational; the server only
/// trusts the role inside the verified token.
///
/// # Errors
///
/// - `400 Bad Request`: Missing username or password
/// - `401 Unauthorized`: Invalid credentials
pub async fn login(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    Ok(Json(state.accounts.login(req).await?))
}

/// Create a `user`-role account
///
/// # Errors
///
/// - `400 Bad Request`: Validation failed or password too weak
/// - `409 Conflict`: Email or username already taken
pub async fn signup(
    State(state): State<AppState>,
    JsonBody(req): JsonBody<SignupRequest>,
) -> ApiResult<(StatusCode, Json<User>)> {
    let user = state.accounts.signup(req).await?;
    Ok((StatusCode::CREATED, Json(user)))
}

/// Token validation response
#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateTokenResponse {
    pub valid: bool,
}

/// Runs the auth gate and reports the outcome without echoing the identity
///
/// # Errors
///
/// - `401 Unauthorized`: No bearer token
/// - `403 Forbidden`: Token invalid or expired
pub async fn validate_token(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> ApiResult<Json<ValidateTokenResponse>> {
    authenticate(&headers, &state.tokens)?;
    Ok(Json(ValidateTokenResponse { valid: true }))
}
