use std::sync::RwLock;

use sqlx::SqlitePool;

use crate::config::Config;
use crate::feed::FeedHub;
use crate::idempotency::IdempotencyCoordinator;
use crate::models::store_status::StoreStatus;
use crate::observability::metrics::Metrics;
use crate::store::idempotency::IdempotencyStore;
use crate::store::orders::OrderStore;
use crate::store::sequence::OrderNumberSequencer;
use crate::tracking::cache::LocationCache;

pub struct AppState {
    /// Hard cap on a live-feed connection; clients reconnect when it elapses.
    pub feed_timeout: std::time::Duration,
    pub orders: OrderStore,
    pub sequencer: OrderNumberSequencer,
    pub idempotency: IdempotencyCoordinator,
    pub locations: LocationCache,
    pub feed: FeedHub,
    pub store_status: RwLock<StoreStatus>,
    pub metrics: Metrics,
}

impl AppState {
    pub fn new(pool: SqlitePool, config: &Config) -> Self {
        let metrics = Metrics::new();
        let idempotency = IdempotencyCoordinator::new(
            IdempotencyStore::new(pool.clone(), config.idempotency_ttl),
            metrics.clone(),
        );

        Self {
            feed_timeout: config.feed_connection_timeout,
            orders: OrderStore::new(pool.clone()),
            sequencer: OrderNumberSequencer::new(pool),
            idempotency,
            locations: LocationCache::new(config.location_ttl),
            feed: FeedHub::new(config.feed_buffer_size),
            store_status: RwLock::new(StoreStatus::Open),
            metrics,
        }
    }

    pub fn current_store_status(&self) -> StoreStatus {
        *self
            .store_status
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_store_status(&self, status: StoreStatus) {
        *self
            .store_status
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }
}
