//! Long-running background loops spawned at startup. Each one ticks on its
//! own timer and stops when the shutdown channel flips; sweep failures are
//! logged and never abort the loop.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;
use crate::store::idempotency::IdempotencyStore;

pub async fn run_idempotency_sweep(
    store: IdempotencyStore,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "idempotency sweep started");
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match store.delete_expired().await {
                    Ok(deleted) if deleted > 0 => {
                        debug!(deleted, "expired idempotency records removed");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "idempotency sweep failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("idempotency sweep stopped");
}

pub async fn run_location_sweep(
    state: Arc<AppState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "location eviction sweep started");
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let evicted = state.locations.evict_expired();
                if evicted > 0 {
                    debug!(evicted, "stale courier locations evicted");
                }
                state.metrics.cached_locations.set(state.locations.len() as i64);
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("location eviction sweep stopped");
}

pub async fn run_audit_sweep(
    state: Arc<AppState>,
    period: Duration,
    retention: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "order number audit sweep started");
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                match state.sequencer.prune_audit(retention).await {
                    Ok(deleted) if deleted > 0 => {
                        debug!(deleted, "order number audit rows pruned");
                    }
                    Ok(_) => {}
                    Err(err) => warn!(error = %err, "audit sweep failed"),
                }
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("order number audit sweep stopped");
}

pub async fn run_heartbeat(
    state: Arc<AppState>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(period_secs = period.as_secs(), "feed heartbeat started");
    let mut ticker = interval(period);

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let pruned = state.feed.heartbeat();
                if pruned > 0 {
                    debug!(pruned, "dead feed subscribers pruned by heartbeat");
                }
                state
                    .metrics
                    .live_subscribers
                    .set(state.feed.subscriber_count() as i64);
            }
            _ = shutdown.changed() => break,
        }
    }

    info!("feed heartbeat stopped");
}
