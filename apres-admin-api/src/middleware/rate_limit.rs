/// Per-client rate limiting
///
/// Fixed-window counters kept in Redis: each client address may make
/// `max_requests` requests per `window_secs`. The first request of a window
/// creates the counter with a TTL of one window; the counter disappears with
/// the window.
///
/// When Redis is not configured the layer is a no-op. When Redis fails the
/// request is let through and the failure logged; a broken limiter must not
/// take the API down with it.
///
/// # Storage
///
/// Keys: `ratelimit:client:{address}`, TTL: one window
///
/// The address is the TCP peer. `X-Forwarded-For` only counts when the peer
/// is a configured trusted proxy, and then the right-most hop that is not
/// itself a trusted proxy is used.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: Requests allowed per window
/// - `X-RateLimit-Remaining`: Requests left in the current window
/// - `Retry-After`: Seconds until the window resets (429 responses only)

use crate::app::AppState;
use crate::config::RateLimitConfig;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::net::{IpAddr, SocketAddr};

/// Atomically bumps the window counter and reports it with its TTL
const WINDOW_SCRIPT: &str = r#"
local count = redis.call('INCR', KEYS[1])
if count == 1 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
end
local ttl = redis.call('TTL', KEYS[1])
if ttl < 0 then
    redis.call('EXPIRE', KEYS[1], ARGV[1])
    ttl = tonumber(ARGV[1])
end
return {count, ttl}
"#;

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    /// Whether the request may proceed
    pub allowed: bool,

    /// Requests left in the current window
    pub remaining: u64,

    /// Seconds until the current window resets
    pub reset_after: u64,
}

impl RateLimitDecision {
    /// Interprets a window counter after this request was counted
    pub fn from_window(count: u64, ttl: i64, max_requests: u64, window_secs: u64) -> Self {
        let reset_after = if ttl > 0 { ttl as u64 } else { window_secs };
        Self {
            allowed: count <= max_requests,
            remaining: max_requests.saturating_sub(count),
            reset_after,
        }
    }
}

/// Redis-backed fixed-window limiter
#[derive(Clone)]
pub struct RateLimiter {
    conn: ConnectionManager,
    script: redis::Script,
    max_requests: u64,
    window_secs: u64,
    trusted_proxies: Vec<IpAddr>,
}

impl RateLimiter {
    /// Connects to Redis; `None` when rate limiting is not configured
    pub async fn from_config(config: &RateLimitConfig) -> Result<Option<Self>, redis::RedisError> {
        let Some(url) = &config.redis_url else {
            return Ok(None);
        };

        let client = redis::Client::open(url.as_str())?;
        let conn = ConnectionManager::new(client).await?;

        Ok(Some(Self {
            conn,
            script: redis::Script::new(WINDOW_SCRIPT),
            max_requests: config.max_requests,
            window_secs: config.window_secs,
            trusted_proxies: config.trusted_proxies.clone(),
        }))
    }

    pub fn max_requests(&self) -> u64 {
        self.max_requests
    }

    pub fn trusted_proxies(&self) -> &[IpAddr] {
        &self.trusted_proxies
    }

    /// Counts one request for `client` and decides whether it may proceed
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision, redis::RedisError> {
        let mut conn = self.conn.clone();
        let key = format!("ratelimit:client:{}", client);

        let (count, ttl): (u64, i64) = self
            .script
            .key(&key)
            .arg(self.window_secs)
            .invoke_async(&mut conn)
            .await?;

        Ok(RateLimitDecision::from_window(
            count,
            ttl,
            self.max_requests,
            self.window_secs,
        ))
    }
}

/// Identifies the client a request is counted against
///
/// Without a trusted peer the header is ignored, since any client can write
/// it. Behind a trusted proxy the chain is read right to left and the first
/// hop that is not a trusted proxy wins.
pub fn client_key(headers: &HeaderMap, peer: Option<SocketAddr>, trusted: &[IpAddr]) -> String {
    let Some(peer) = peer.map(|addr| addr.ip()) else {
        return "unknown".to_string();
    };
    if !trusted.contains(&peer) {
        return peer.to_string();
    }

    headers
        .get_all("x-forwarded-for")
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .map(str::trim)
        .filter_map(|hop| hop.parse::<IpAddr>().ok())
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .find(|hop| !trusted.contains(hop))
        .unwrap_or(peer)
        .to_string()
}

/// Rate limiting middleware
///
/// # Errors
///
/// - 429 Too Many Requests: the client exhausted its window
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(limiter) = state.rate_limiter.as_ref() else {
        return Ok(next.run(request).await);
    };

    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0);
    let client = client_key(request.headers(), peer, limiter.trusted_proxies());

    let decision = match limiter.check(&client).await {
        Ok(decision) => decision,
        Err(e) => {
            tracing::warn!(error = %e, client = %client, "Rate limit check failed, allowing request");
            return Ok(next.run(request).await);
        }
    };

    if !decision.allowed {
        tracing::info!(client = %client, retry_after = decision.reset_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.reset_after,
            message: format!(
                "Too many requests. Try again in {} seconds",
                decision.reset_after
            ),
        });
    }

    let mut response = next.run(request).await;
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limiter.max_requests()));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(decision.remaining));

    Ok(response)
}
