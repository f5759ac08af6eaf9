/// Liveness check
///
/// `GET /health` always answers 200 while the process is up. The body says
/// whether the store answered a ping and whether requests are rate limited:
///
/// ```json
/// { "status": "healthy", "version": "0.1.0", "database": "connected", "rate_limited": true }
/// ```

use crate::app::AppState;
use axum::{extract::State, Json};
use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ServiceStatus {
    Healthy,
    Degraded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreStatus {
    Connected,
    Disconnected,
}

#[derive(Debug, Serialize)]
pub struct HealthReport {
    pub status: ServiceStatus,
    pub version: &'static str,
    pub database: StoreStatus,
    pub rate_limited: bool,
}

pub async fn health_check(State(state): State<AppState>) -> Json<HealthReport> {
    let (status, database) = match state.store.ping().await {
        Ok(()) => (ServiceStatus::Healthy, StoreStatus::Connected),
        Err(e) => {
            tracing::warn!(error = %e, retryable = e.is_retryable(), "Store did not answer ping");
            (ServiceStatus::Degraded, StoreStatus::Disconnected)
        }
    };

    Json(HealthReport {
        status,
        version: env!("CARGO_PKG_VERSION"),
        database,
        rate_limited: state.rate_limiter.is_some(),
    })
}
