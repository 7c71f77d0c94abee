use serde::{Deserialize, Serialize};

/// Whether the store is taking orders. Broadcast to live-feed subscribers
/// whenever staff change it.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StoreStatus {
    Open,
    Paused,
    Closed,
}
