//! Accounts: login, signup and user administration
//!
//! Password hashing and verification are CPU-bound, so both run on the
//! blocking pool rather than on a runtime worker.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};
use validator::Validate;

use super::{field_errors, non_blank, optional_text, FieldError};
use crate::auth::{
    jwt::{JwtError, TokenService},
    password::{self, PasswordError},
};
use crate::models::user::{CreateUser, Role, UpdateUser, User};
use crate::store::{DirectoryStore, StoreError};

pub type AccountResult<T> = Result<T, AccountError>;

/// Account service errors
#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("Validation failed")]
    Validation(Vec<FieldError>),

    /// Unknown user, account without password, or wrong password
    #[error("Invalid username or password")]
    InvalidCredentials,

    #[error("User {0} not found")]
    NotFound(i32),

    /// Email or username already taken
    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error(transparent)]
    Token(#[from] JwtError),

    #[error(transparent)]
    Store(StoreError),
}

impl From<StoreError> for AccountError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { constraint } if constraint.contains("username") => {
                AccountError::Conflict("Username is already taken".to_string())
            }
            StoreError::Conflict { .. } => {
                AccountError::Conflict("A user with this email already exists".to_string())
            }
            other => AccountError::Store(other),
        }
    }
}

/// Login request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(length(min = 1, message = "username is required"))]
    pub username: String,

    #[validate(length(min = 1, message = "password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer token, valid for one hour
    pub token: String,

    /// Role of the logged-in user, for display only
    pub role: Role,
}

/// Signup request
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SignupRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "username must be 1-100 characters"))]
    pub username: String,

    /// Checked against the strength rule separately
    pub password: String,

    #[serde(alias = "firstName")]
    #[validate(length(max = 100, message = "first_name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[serde(alias = "lastName")]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 50, message = "phone must be at most 50 characters"))]
    pub phone: Option<String>,
}

/// Add-user and edit-user payload of the admin console
///
/// `password` is only honoured when adding a user; edits never touch it.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserPayload {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, max = 100, message = "username must be 1-100 characters"))]
    pub username: Option<String>,

    pub password: Option<String>,

    #[serde(alias = "firstName")]
    #[validate(length(max = 100, message = "first_name must be at most 100 characters"))]
    pub first_name: Option<String>,

    #[serde(alias = "lastName")]
    #[validate(length(max = 100, message = "last_name must be at most 100 characters"))]
    pub last_name: Option<String>,

    #[validate(length(max = 50, message = "phone must be at most 50 characters"))]
    pub phone: Option<String>,

    #[serde(default)]
    pub role: Role,
}

fn validate(payload: &impl Validate) -> AccountResult<()> {
    payload
        .validate()
        .map_err(|errors| AccountError::Validation(field_errors(&errors)))
}

fn check_strength(password: &str) -> AccountResult<()> {
    password::validate_password_strength(password)
        .map_err(|message| AccountError::Validation(vec![FieldError::new("password", message)]))
}

async fn hash(password: String) -> AccountResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&password))
        .await
        .map_err(|e| PasswordError::HashError(e.to_string()))?
        .map_err(AccountError::from)
}

async fn verify(password: String, hash: String) -> AccountResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&password, &hash))
        .await
        .map_err(|e| PasswordError::VerifyError(e.to_string()))?
        .map_err(AccountError::from)
}

/// Account operations over a [`DirectoryStore`]
#[derive(Clone)]
pub struct AccountService {
    store: Arc<dyn DirectoryStore>,
    tokens: TokenService,
}

impl AccountService {
    pub fn new(store: Arc<dyn DirectoryStore>, tokens: TokenService) -> Self {
        Self { store, tokens }
    }

    /// Checks credentials and issues a token carrying the stored role
    ///
    /// Every credential failure reports the same error so callers cannot
    /// tell which usernames exist.
    pub async fn login(&self, request: LoginRequest) -> AccountResult<LoginResponse> {
        validate(&request)?;

        let Some(user) = self.store.find_user_by_username(&request.username).await? else {
            return Err(AccountError::InvalidCredentials);
        };
        let Some(stored_hash) = user.password_hash.clone() else {
            return Err(AccountError::InvalidCredentials);
        };

        match verify(request.password, stored_hash).await {
            Ok(true) => {}
            Ok(false) => return Err(AccountError::InvalidCredentials),
            Err(AccountError::Password(e)) => {
                warn!(user_id = user.id, error = %e, "Stored password hash is unusable");
                return Err(AccountError::InvalidCredentials);
            }
            Err(e) => return Err(e),
        }

        let token = self.tokens.issue(user.id, user.role)?;
        info!(user_id = user.id, role = %user.role, "User logged in");

        Ok(LoginResponse {
            token,
            role: user.role,
        })
    }

    /// Creates a regular account
    pub async fn signup(&self, request: SignupRequest) -> AccountResult<User> {
        validate(&request)?;
        check_strength(&request.password)?;
        let username = non_blank(request.username, "username").map_err(AccountError::Validation)?;

        let password_hash = hash(request.password).await?;

        let user = self
            .store
            .create_user(CreateUser {
                email: request.email.trim().to_string(),
                username: Some(username),
                password_hash: Some(password_hash),
                first_name: optional_text(request.first_name),
                last_name: optional_text(request.last_name),
                phone: optional_text(request.phone),
                role: Role::User,
            })
            .await?;

        info!(user_id = user.id, "User signed up");
        Ok(user)
    }

    pub async fn list_users(&self) -> AccountResult<Vec<User>> {
        Ok(self.store.list_users().await?)
    }

    pub async fn get_user(&self, id: i32) -> AccountResult<User> {
        self.store
            .find_user(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    /// Adds a user from the admin console; a password is optional
    pub async fn create_user(&self, payload: UserPayload) -> AccountResult<User> {
        validate(&payload)?;

        let password_hash = match optional_text(payload.password) {
            Some(password) => {
                check_strength(&password)?;
                Some(hash(password).await?)
            }
            None => None,
        };

        let user = self
            .store
            .create_user(CreateUser {
                email: payload.email.trim().to_string(),
                username: optional_text(payload.username),
                password_hash,
                first_name: optional_text(payload.first_name),
                last_name: optional_text(payload.last_name),
                phone: optional_text(payload.phone),
                role: payload.role,
            })
            .await?;

        info!(user_id = user.id, role = %user.role, "Created user");
        Ok(user)
    }

    /// Replaces profile fields and role
    pub async fn update_user(&self, id: i32, payload: UserPayload) -> AccountResult<User> {
        validate(&payload)?;

        self.store
            .update_user(
                id,
                UpdateUser {
                    email: payload.email.trim().to_string(),
                    username: optional_text(payload.username),
                    first_name: optional_text(payload.first_name),
                    last_name: optional_text(payload.last_name),
                    phone: optional_text(payload.phone),
                    role: payload.role,
                },
            )
            .await?
            .ok_or(AccountError::NotFound(id))
    }

    pub async fn delete_user(&self, id: i32) -> AccountResult<User> {
        self.store
            .delete_user(id)
            .await?
            .ok_or(AccountError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    const SECRET: &str = "test-secret-key-that-is-long-enough-for-hs256";

    fn service() -> (Arc<MemoryStore>, AccountService) {
        let store = Arc::new(MemoryStore::new());
        let service = AccountService::new(store.clone(), TokenService::new(SECRET));
        (store, service)
    }

    async fn seed(store: &MemoryStore, username: &str, password: &str, role: Role) -> User {
        store
            .create_user(CreateUser {
                email: format!("{username}@example.com"),
                username: Some(username.to_string()),
                password_hash: Some(bcrypt::hash(password, 4).unwrap()),
                first_name: None,
                last_name: None,
                phone: None,
                role,
            })
            .await
            .unwrap()
    }

    fn login(username: &str, password: &str) -> LoginRequest {
        LoginRequest {
            username: username.to_string(),
            password: password.to_string(),
        }
    }

    fn payload(email: &str) -> UserPayload {
        UserPayload {
            email: email.to_string(),
            username: None,
            password: None,
            first_name: Some("Ingrid".to_string()),
            last_name: None,
            phone: None,
            role: Role::Admin,
        }
    }

    #[tokio::test]
    async fn test_login_issues_token_with_stored_role() {
        let (store, service) = service();
        let user = seed(&store, "patrol", "Sn0w!fall", Role::Superuser).await;

        let response = service.login(login("patrol", "Sn0w!fall")).await.unwrap();
        assert_eq!(response.role, Role::Superuser);

        let identity = TokenService::new(SECRET).verify(&response.token).unwrap();
        assert_eq!(identity.user_id, user.id);
        assert_eq!(identity.role, Role::Superuser);
    }

    #[tokio::test]
    async fn test_login_failures_are_indistinguishable() {
        let (store, service) = service();
        seed(&store, "patrol", "Sn0w!fall", Role::User).await;
        store
            .create_user(CreateUser {
                email: "nopass@example.com".to_string(),
                username: Some("nopass".to_string()),
                password_hash: None,
                first_name: None,
                last_name: None,
                phone: None,
                role: Role::User,
            })
            .await
            .unwrap();

        for (username, password) in [("patrol", "wrong"), ("ghost", "Sn0w!fall"), ("nopass", "x")] {
            let err = service.login(login(username, password)).await.unwrap_err();
            assert!(matches!(err, AccountError::InvalidCredentials), "{username}");
        }
    }

    #[tokio::test]
    async fn test_signup_enforces_strength_and_assigns_user_role() {
        let (_, service) = service();

        let weak = SignupRequest {
            email: "new@example.com".to_string(),
            username: "newbie".to_string(),
            password: "password".to_string(),
            first_name: None,
            last_name: None,
            phone: None,
        };
        match service.signup(weak.clone()).await.unwrap_err() {
            AccountError::Validation(details) => assert_eq!(details[0].field, "password"),
            other => panic!("unexpected error: {other:?}"),
        }

        let strong = SignupRequest {
            password: "Fresh!P0wder".to_string(),
            ..weak
        };
        let user = service.signup(strong).await.unwrap();
        assert_eq!(user.role, Role::User);

        let response = service.login(login("newbie", "Fresh!P0wder")).await.unwrap();
        assert_eq!(response.role, Role::User);
    }

    #[tokio::test]
    async fn test_duplicate_email_is_conflict() {
        let (_, service) = service();
        service.create_user(payload("dup@example.com")).await.unwrap();

        let err = service.create_user(payload("dup@example.com")).await.unwrap_err();
        assert!(matches!(err, AccountError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_user_crud() {
        let (_, service) = service();
        let created = service.create_user(payload("host@example.com")).await.unwrap();
        assert_eq!(created.role, Role::Admin);
        assert!(created.password_hash.is_none());

        let mut edit = payload("host@example.com");
        edit.role = Role::User;
        edit.phone = Some("555-0100".to_string());
        let updated = service.update_user(created.id, edit).await.unwrap();
        assert_eq!(updated.role, Role::User);
        assert_eq!(updated.phone.as_deref(), Some("555-0100"));

        assert_eq!(service.list_users().await.unwrap().len(), 1);
        assert_eq!(service.delete_user(created.id).await.unwrap().id, created.id);
        assert!(matches!(
            service.get_user(created.id).await,
            Err(AccountError::NotFound(_))
        ));
        assert!(matches!(
            service.update_user(created.id, payload("x@example.com")).await,
            Err(AccountError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let (_, service) = service();
        let err = service.create_user(payload("not-an-email")).await.unwrap_err();
        assert!(matches!(err, AccountError::Validation(_)));
    }
}
