mod api;
mod config;
mod error;
mod feed;
mod idempotency;
mod models;
mod observability;
mod state;
mod store;
mod tasks;
mod tracking;

use std::sync::Arc;

use tokio::sync::watch;
use tracing_subscriber::EnvFilter;

use crate::store::idempotency::IdempotencyStore;

#[tokio::main]
async fn main() -> Result<(), error::AppError> {
    let config = config::Config::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(config.log_level.clone()))
        .with_target(false)
        .compact()
        .init();

    let pool = store::connect(&config.database_url).await?;
    let shared_state = Arc::new(state::AppState::new(pool.clone(), &config));

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    tokio::spawn(tasks::run_idempotency_sweep(
        IdempotencyStore::new(pool, config.idempotency_ttl),
        config.idempotency_sweep_interval,
        shutdown_rx.clone(),
    ));
    tokio::spawn(tasks::run_location_sweep(
        shared_state.clone(),
        config.location_sweep_interval,
        shutdown_rx.clone(),
    ));
    tokio::spawn(tasks::run_audit_sweep(
        shared_state.clone(),
        config.audit_sweep_interval,
        config.audit_retention,
        shutdown_rx.clone(),
    ));
    tokio::spawn(tasks::run_heartbeat(
        shared_state.clone(),
        config.heartbeat_interval,
        shutdown_rx,
    ));

    let app = api::rest::router(shared_state);

    let bind_addr = format!("0.0.0.0:{}", config.http_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .map_err(|err| error::AppError::Internal(format!("failed to bind {bind_addr}: {err}")))?;

    tracing::info!(http_port = config.http_port, "http server started");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .map_err(|err| error::AppError::Internal(format!("server error: {err}")))?;

    let _ = shutdown_tx.send(true);

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
    }
}
