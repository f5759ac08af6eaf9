/// Configuration management for the API server
///
/// Configuration comes from environment variables (a `.env` file is honoured
/// in development). Parsing is a pure function over a lookup closure, so tests
/// never touch the process environment.
///
/// # Environment Variables
///
/// - `API_HOST`: Host to bind to (default: 0.0.0.0)
/// - `API_PORT`: Port to bind to (default: 5000)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: Pool size (default: 10)
/// - `JWT_SECRET`: Token signing secret, at least 32 characters (required)
/// - `CORS_ORIGINS`: Comma-separated allowed origins (default: `*`)
/// - `PRODUCTION`: Enables HSTS when `true`
/// - `REDIS_URL`: Enables rate limiting when set
/// - `RATE_LIMIT_MAX`: Requests per window and client (default: 100)
/// - `RATE_LIMIT_WINDOW_SECS`: Window length (default: 900)
/// - `TRUSTED_PROXIES`: Comma-separated proxy IPs whose `X-Forwarded-For`
///   is believed (default: none)
/// - `ACCESS_POLICY`: Per-action requirement overrides,
///   e.g. `update-user=admin,delete-town=authenticated`
///
/// # Example
///
/// ```no_run
/// use apres_admin_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use apres_admin_shared::{auth::authorization::RolePolicy, db::pool::DatabaseConfig};
use std::env;
use std::net::IpAddr;
use std::str::FromStr;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Database configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Rate limiting configuration
    pub rate_limit: RateLimitConfig,

    /// Role policy with any configured overrides applied
    pub policy: RolePolicy,
}

/// API server configuration
#[derive(Debug, Clone)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode turns on HSTS
    pub production: bool,
}

/// JWT configuration
#[derive(Clone)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// Must be at least 32 characters. Generate with `openssl rand -hex 32`.
    pub secret: String,
}

impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig").field("secret", &"<redacted>").finish()
    }
}

/// Fixed-window rate limiting per client address
#[derive(Debug, Clone)]
pub struct RateLimitConfig {
    /// Redis backing the counters; rate limiting is off without it
    pub redis_url: Option<String>,

    /// Requests allowed per window
    pub max_requests: u64,

    /// Window length in seconds
    pub window_secs: u64,

    /// Peers allowed to name the client through `X-Forwarded-For`
    pub trusted_proxies: Vec<IpAddr>,
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        Some(value) => value
            .trim()
            .parse()
            .with_context(|| format!("{key} has an invalid value: {value}")),
        None => Ok(default),
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - Required environment variables are missing
    /// - Environment variables have invalid values
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from any key → value source
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 5000u16)?;

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|origins| {
                origins
                    .split(',')
                    .map(|o| o.trim().to_string())
                    .filter(|o| !o.is_empty())
                    .collect::<Vec<_>>()
            })
            .filter(|origins| !origins.is_empty())
            .unwrap_or_else(|| vec!["*".to_string()]);
        let production = parse_or(&lookup, "PRODUCTION", false)?;

        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL environment variable is required")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret = lookup("JWT_SECRET")
            .context("JWT_SECRET environment variable is required")?;
        if jwt_secret.chars().count() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let rate_limit = RateLimitConfig {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            max_requests: parse_or(&lookup, "RATE_LIMIT_MAX", 100u64)?,
            window_secs: parse_or(&lookup, "RATE_LIMIT_WINDOW_SECS", 900u64)?,
            trusted_proxies: lookup("TRUSTED_PROXIES")
                .unwrap_or_default()
                .split(',')
                .map(str::trim)
                .filter(|ip| !ip.is_empty())
                .map(|ip| {
                    ip.parse()
                        .with_context(|| format!("TRUSTED_PROXIES has an invalid address: {ip}"))
                })
                .collect::<anyhow::Result<_>>()?,
        };
        if rate_limit.window_secs == 0 {
            anyhow::bail!("RATE_LIMIT_WINDOW_SECS must be positive");
        }

        let policy = RolePolicy::default()
            .with_overrides(&lookup("ACCESS_POLICY").unwrap_or_default())
            .context("ACCESS_POLICY is invalid")?;

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                max_connections,
                ..DatabaseConfig::from_url(database_url)
            },
            jwt: JwtConfig { secret: jwt_secret },
            rate_limit,
            policy,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use apres_admin_shared::auth::authorization::{Action, Requirement};
    use apres_admin_shared::models::user::Role;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn required() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/apres_admin"),
            ("JWT_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = load(&required()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:5000");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.rate_limit.redis_url, None);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_secs, 900);
        assert!(config.rate_limit.trusted_proxies.is_empty());
        assert_eq!(config.policy, RolePolicy::default());
    }

    #[test]
    fn test_overrides() {
        let mut vars = required();
        vars.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "8080"),
            ("CORS_ORIGINS", "https://admin.example.com, https://example.com"),
            ("PRODUCTION", "true"),
            ("DATABASE_MAX_CONNECTIONS", "4"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("RATE_LIMIT_MAX", "5"),
            ("TRUSTED_PROXIES", "10.0.0.1, ::1"),
            ("ACCESS_POLICY", "update-user=admin, delete-town=authenticated"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:8080");
        assert_eq!(config.api.cors_origins.len(), 2);
        assert!(config.api.production);
        assert_eq!(config.database.max_connections, 4);
        assert_eq!(config.rate_limit.redis_url.as_deref(), Some("redis://localhost:6379"));
        assert_eq!(config.rate_limit.max_requests, 5);
        assert_eq!(
            config.rate_limit.trusted_proxies,
            vec![IpAddr::from([10, 0, 0, 1]), IpAddr::from(std::net::Ipv6Addr::LOCALHOST)]
        );
        assert_eq!(
            config.policy.requirement(Action::UpdateUser),
            Requirement::AtLeast(Role::Admin)
        );
        assert_eq!(
            config.policy.requirement(Action::DeleteTown),
            Requirement::Authenticated
        );
    }

    #[test]
    fn test_missing_required() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/x")]).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgresql://localhost/x"),
            ("JWT_SECRET", "too-short"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("32 characters"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut vars = required();
        vars.push(("API_PORT", "not-a-port"));
        assert!(load(&vars).is_err());

        let mut vars = required();
        vars.push(("ACCESS_POLICY", "launch-rockets=public"));
        assert!(load(&vars).is_err());

        let mut vars = required();
        vars.push(("TRUSTED_PROXIES", "10.0.0.1, proxy.local"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_secret_not_in_debug_output() {
        let config = load(&required()).unwrap();
        assert!(!format!("{config:?}").contains(SECRET));
    }
}
