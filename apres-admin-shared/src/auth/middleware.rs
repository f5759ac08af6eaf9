/// Auth gate for Axum
///
/// Reads `Authorization: Bearer <token>`, verifies the token and records the
/// resulting [`Identity`] in the request extensions. A request without a
/// usable bearer token is *unauthenticated* (401); a request whose token fails
/// verification is *forbidden* (403).
///
/// Which routes go through the gate is decided by the role policy, see
/// [`crate::auth::authorization`].
///
/// # Example
///
/// ```
/// use axum::http::{header, HeaderMap, HeaderValue};
/// use apres_admin_shared::auth::jwt::TokenService;
/// use apres_admin_shared::auth::middleware::{authenticate, GateError};
/// use apres_admin_shared::models::user::Role;
///
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes!!");
/// let token = tokens.issue(5, Role::User).unwrap();
///
/// let mut headers = HeaderMap::new();
/// headers.insert(header::AUTHORIZATION, HeaderValue::from_str(&format!("Bearer {token}")).unwrap());
/// assert_eq!(authenticate(&headers, &tokens).unwrap().user_id, 5);
///
/// assert!(matches!(authenticate(&HeaderMap::new(), &tokens), Err(GateError::Unauthenticated)));
/// ```

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header, request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use super::jwt::{Identity, JwtError, TokenService};

/// Why the gate turned a request away
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// No bearer token on the request
    #[error("Authentication required")]
    Unauthenticated,

    /// A token was supplied but did not verify
    #[error("Invalid or expired token")]
    Forbidden(#[source] JwtError),
}

impl IntoResponse for GateError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            GateError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            GateError::Forbidden(_) => (StatusCode::FORBIDDEN, "forbidden"),
        };

        (status, Json(json!({ "error": code, "message": self.to_string() }))).into_response()
    }
}

/// Returns the bearer token, if the request carries one
///
/// A missing header, a non-ASCII header, another scheme or an empty token all
/// count as no token.
pub fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;

    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }

    let token = token.trim();
    (!token.is_empty()).then_some(token)
}

/// Runs the gate over a set of request headers
pub fn authenticate(headers: &HeaderMap, tokens: &TokenService) -> Result<Identity, GateError> {
    let token = extract_bearer(headers).ok_or(GateError::Unauthenticated)?;

    tokens.verify(token).map_err(|e| {
        tracing::debug!(error = %e, "Rejected bearer token");
        GateError::Forbidden(e)
    })
}

/// Extracts the identity the gate recorded in the request extensions
///
/// Handlers behind a non-public route can take `Identity` as an argument.
#[async_trait]
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = GateError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .copied()
            .ok_or(GateError::Unauthenticated)
    }
}
