pub mod api;
pub mod config;
pub mod error;
pub mod feed;
pub mod idempotency;
pub mod models;
pub mod observability;
pub mod state;
pub mod store;
pub mod tasks;
pub mod tracking;
