//! # Après-Ski Admin API Server
//!
//! Serves the admin console: accounts, the State → Town directory with its
//! venues, businesses and bands, and the event calendar.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p apres-admin-api
//! ```

use anyhow::Context;
use apres_admin_api::{
    app::{build_router, AppState},
    config::Config,
    middleware::rate_limit::RateLimiter,
};
use apres_admin_shared::{
    db::{migrations, pool},
    store::PgStore,
};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // LOG_FORMAT=json switches to one JSON object per line
    let json_logs = std::env::var("LOG_FORMAT").is_ok_and(|format| format == "json");

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "apres_admin_api=debug,apres_admin_shared=info,tower_http=debug".into()
            }),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(tracing_subscriber::fmt::layer))
        .init();

    tracing::info!(
        "Après-Ski Admin API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let config = Config::from_env().context("Failed to load configuration")?;

    if !config.api.production {
        migrations::ensure_database_exists(&config.database.url)
            .await
            .context("Failed to create the development database")?;
    }

    let pool = pool::create_pool(config.database.clone())
        .await
        .context("Failed to connect to the database")?;
    migrations::run_migrations(&pool)
        .await
        .context("Failed to run database migrations")?;

    let rate_limiter = match RateLimiter::from_config(&config.rate_limit).await {
        Ok(Some(limiter)) => {
            tracing::info!(
                max_requests = config.rate_limit.max_requests,
                window_secs = config.rate_limit.window_secs,
                "Rate limiting enabled"
            );
            Some(limiter)
        }
        Ok(None) => {
            tracing::info!("REDIS_URL not set, rate limiting disabled");
            None
        }
        Err(e) => {
            tracing::warn!(error = %e, "Redis unavailable, rate limiting disabled");
            None
        }
    };

    let bind_address = config.bind_address();
    let state = AppState::new(Arc::new(PgStore::new(pool.clone())), config)
        .with_rate_limiter(rate_limiter);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {bind_address}"))?;
    tracing::info!("Server listening on http://{}", bind_address);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    let stats = pool::pool_stats(&pool);
    tracing::info!(
        active = stats.active_connections,
        idle = stats.idle_connections,
        "Draining database pool"
    );
    pool::close_pool(&pool).await;
    tracing::info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received, draining connections...");
}
