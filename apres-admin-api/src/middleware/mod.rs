/// Middleware modules for the API server
///
/// - Security headers on every response
/// - Per-client rate limiting backed by Redis

pub mod rate_limit;
pub mod security;
