/// Bearer token issuance and verification
///
/// Tokens are HS256-signed JWTs carrying the user ID and role. They are not
/// stored anywhere: every request is authorized by checking the signature,
/// the issuer and the expiry. There is no refresh flow; clients log in again
/// once a token expires.
///
/// # Claims
///
/// - `sub`: user ID as a decimal string
/// - `role`: role at the time of login
/// - `iss`: always `"apres-admin"`
/// - `iat` / `nbf`: issue time
/// - `exp`: issue time + 1 hour
///
/// # Example
///
/// ```
/// use apres_admin_shared::auth::jwt::TokenService;
/// use apres_admin_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let tokens = TokenService::new("a-secret-of-at-least-thirty-two-bytes!!");
///
/// let token = tokens.issue(42, Role::Admin)?;
/// let identity = tokens.verify(&token)?;
///
/// assert_eq!(identity.user_id, 42);
/// assert_eq!(identity.role, Role::Admin);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use crate::models::user::Role;

/// Issuer written into and required from every token
pub const ISSUER: &str = "apres-admin";

/// How long an issued token stays valid, in seconds
pub const TOKEN_LIFETIME_SECS: i64 = 3600;

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued by someone else
    #[error("Invalid issuer")]
    InvalidIssuer,

    /// Bad signature, malformed payload, or any other rejection
    #[error("Invalid token: {0}")]
    Invalid(String),
}

/// JWT claims structure
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - user ID, decimal string
    pub sub: String,

    /// Role of the subject when the token was issued
    pub role: Role,

    /// Issuer - always "apres-admin"
    pub iss: String,

    /// Issued at (Unix timestamp)
    pub iat: i64,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Not before (Unix timestamp)
    pub nbf: i64,
}

impl Claims {
    /// Claims for a token issued now
    pub fn new(user_id: i32, role: Role) -> Self {
        Self::issued_at(user_id, role, Utc::now())
    }

    /// Claims for a token issued at `now`, expiring an hour later
    pub fn issued_at(user_id: i32, role: Role, now: DateTime<Utc>) -> Self {
        Self {
            sub: user_id.to_string(),
            role,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + Duration::seconds(TOKEN_LIFETIME_SECS)).timestamp(),
            nbf: now.timestamp(),
        }
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() > self.exp
    }

    pub fn identity(&self) -> Result<Identity, JwtError> {
        let user_id = self
            .sub
            .parse()
            .map_err(|_| JwtError::Invalid(format!("Subject is not a user ID: {}", self.sub)))?;

        Ok(Identity {
            user_id,
            role: self.role,
        })
    }
}

/// The verified identity behind a request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub user_id: i32,
    pub role: Role,
}

/// Signs claims with HS256
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&Header::new(Algorithm::HS256), claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Verifies signature, issuer, `nbf` and `exp` (no clock-skew leeway)
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.set_required_spec_claims(&["exp", "iss", "sub"]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidIssuer => JwtError::InvalidIssuer,
        _ => JwtError::Invalid(e.to_string()),
    })?;

    Ok(token_data.claims)
}

/// Issues and verifies tokens with one shared secret
#[derive(Clone)]
pub struct TokenService {
    secret: String,
}

impl TokenService {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    /// Issues a one-hour token for this user
    pub fn issue(&self, user_id: i32, role: Role) -> Result<String, JwtError> {
        create_token(&Claims::new(user_id, role), &self.secret)
    }

    /// Verifies a token and returns the identity it carries
    pub fn verify(&self, token: &str) -> Result<Identity, JwtError> {
        validate_token(token, &self.secret)?.identity()
    }
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService").finish_non_exhaustive()
    }
}
