/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id hashing, legacy bcrypt verification, strength rule
/// - [`jwt`]: bearer token issuance and verification
/// - [`middleware`]: the auth gate (bearer extraction, 401 vs 403)
/// - [`authorization`]: per-action role policy
///
/// # Example
///
/// ```no_run
/// use apres_admin_shared::auth::password::{hash_password, verify_password};
/// use apres_admin_shared::auth::jwt::TokenService;
/// use apres_admin_shared::models::user::Role;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Fresh#Tracks9")?;
/// assert!(verify_password("Fresh#Tracks9", &hash)?);
///
/// let token = TokenService::new("a-secret-of-at-least-thirty-two-bytes!!").issue(1, Role::User)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
