/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; the service and auth errors of
/// the shared crate convert into it with `?`.
///
/// Internal failures are logged here and never exposed: the client always
/// sees the same generic 500 body.
///
/// # Example
///
/// ```no_run
/// use apres_admin_api::{app::AppState, error::ApiResult};
/// use apres_admin_shared::models::state::State as UsState;
/// use axum::{extract::State, Json};
///
/// async fn handler(State(state): State<AppState>) -> ApiResult<Json<Vec<UsState>>> {
///     Ok(Json(state.hierarchy.list_states().await?))
/// }
/// ```

use apres_admin_shared::{
    auth::{authorization::AuthzError, jwt::JwtError, middleware::GateError},
    services::{accounts::AccountError, hierarchy::HierarchyError, FieldError},
    store::StoreError,
};
use axum::{
    extract::rejection::{JsonRejection, PathRejection, QueryRejection},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Validation error detail
pub type ValidationErrorDetail = FieldError;

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400), e.g. a body that is not JSON
    BadRequest(String),

    /// Unauthorized (401), no credentials or bad credentials
    Unauthorized(String),

    /// Forbidden (403), invalid token or insufficient role
    Forbidden(String),

    /// Not found (404)
    NotFound(String),

    /// Conflict (409), e.g. duplicate email or a parent that still has children
    Conflict(String),

    /// Bad request (400) with per-field details
    ValidationError(Vec<ValidationErrorDetail>),

    /// Too many requests (429)
    RateLimitExceeded {
        retry_after: u64,
        message: String,
    },

    /// Internal server error (500)
    InternalError {
        message: String,
        retryable: bool,
    },
}

impl ApiError {
    /// Internal error that retrying will not fix
    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::InternalError {
            message: message.into(),
            retryable: false,
        }
    }
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "bad_request", "unauthorized")
    pub error: String,

    /// Human-readable error message
    pub message: String,

    /// Optional validation errors
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationErrorDetail>>,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::Forbidden(msg) => write!(f, "Forbidden: {}", msg),
            ApiError::NotFound(msg) => write!(f, "Not found: {}", msg),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::ValidationError(errors) => {
                write!(f, "Validation failed: {} errors", errors.len())
            }
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::InternalError { message, .. } => write!(f, "Internal error: {}", message),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let retry_after = match &self {
            ApiError::RateLimitExceeded { retry_after, .. } => Some(*retry_after),
            _ => None,
        };

        let (status, error_code, message, details) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg, None),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, "unauthorized", msg, None),
            ApiError::Forbidden(msg) => (StatusCode::FORBIDDEN, "forbidden", msg, None),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, "not_found", msg, None),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, "conflict", msg, None),
            ApiError::ValidationError(errors) => (
                StatusCode::BAD_REQUEST,
                "validation_error",
                "Request validation failed".to_string(),
                Some(errors),
            ),
            ApiError::RateLimitExceeded { message, .. } => (
                StatusCode::TOO_MANY_REQUESTS,
                "rate_limit_exceeded",
                message,
                None,
            ),
            ApiError::InternalError { message, retryable } => {
                // Log internal errors but don't expose details to clients
                if retryable {
                    tracing::warn!(retryable = true, error = %message, "Transient internal error");
                } else {
                    tracing::error!(error = %message, "Internal error");
                }
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal_error",
                    "An internal error occurred".to_string(),
                    None,
                )
            }
        };

        let body = Json(ErrorResponse {
            error: error_code.to_string(),
            message,
            details,
        });

        let mut response = (status, body).into_response();
        if let Some(seconds) = retry_after {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// Convert store errors that escaped a service
impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { constraint } => {
                ApiError::Conflict(format!("Constraint violation: {}", constraint))
            }
            StoreError::ForeignKeyViolation { constraint } => {
                ApiError::Conflict(format!("Referenced row violates {}", constraint))
            }
            err => ApiError::InternalError {
                retryable: err.is_retryable(),
                message: err.to_string(),
            },
        }
    }
}

/// Convert auth gate rejections
impl From<GateError> for ApiError {
    fn from(err: GateError) -> Self {
        match err {
            GateError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            GateError::Forbidden(_) => ApiError::Forbidden(err.to_string()),
        }
    }
}

/// Convert role policy decisions
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::Unauthenticated => ApiError::Unauthorized(err.to_string()),
            AuthzError::InsufficientRole { .. } => ApiError::Forbidden(err.to_string()),
        }
    }
}

/// Token creation failures are internal; verification failures go through the gate
impl From<JwtError> for ApiError {
    fn from(err: JwtError) -> Self {
        ApiError::internal(format!("Token operation failed: {}", err))
    }
}

impl From<HierarchyError> for ApiError {
    fn from(err: HierarchyError) -> Self {
        match err {
            HierarchyError::Validation(details) => ApiError::ValidationError(details),
            HierarchyError::NotFound { .. } => ApiError::NotFound(err.to_string()),
            HierarchyError::HasChildren { .. } | HierarchyError::Conflict(_) => {
                ApiError::Conflict(err.to_string())
            }
            HierarchyError::Store(store) => store.into(),
        }
    }
}

impl From<AccountError> for ApiError {
    fn from(err: AccountError) -> Self {
        match err {
            AccountError::Validation(details) => ApiError::ValidationError(details),
            AccountError::InvalidCredentials => ApiError::Unauthorized(err.to_string()),
            AccountError::NotFound(_) => ApiError::NotFound(err.to_string()),
            AccountError::Conflict(msg) => ApiError::Conflict(msg),
            AccountError::Password(e) => {
                ApiError::internal(format!("Password operation failed: {}", e))
            }
            AccountError::Token(e) => e.into(),
            AccountError::Store(store) => store.into(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}
