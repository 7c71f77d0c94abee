use axum::response::sse::Event;
use dashmap::DashMap;
use serde_json::json;
use tokio::sync::mpsc;
use tracing::debug;
use uuid::Uuid;

use crate::models::location::CourierLocation;
use crate::models::store_status::StoreStatus;

#[derive(Debug, Clone)]
pub enum FeedMessage {
    Location(CourierLocation),
    Status(StoreStatus),
    Ping,
}

impl FeedMessage {
    pub fn into_event(self) -> Event {
        match self {
            FeedMessage::Location(location) => Event::default().event("location").data(
                json!({
                    "order_id": location.order_id,
                    "courier_id": location.courier_id,
                    "latitude": location.latitude,
                    "longitude": location.longitude,
                    "heading": location.heading,
                    "speed": location.speed,
                    "recorded_at": location.recorded_at,
                })
                .to_string(),
            ),
            FeedMessage::Status(status) => Event::default()
                .event("status")
                .data(json!({ "store_status": status }).to_string()),
            FeedMessage::Ping => Event::default().event("ping").data("{}"),
        }
    }
}

struct Subscriber {
    order_id: Uuid,
    tx: mpsc::Sender<FeedMessage>,
}

/// Registry of live-feed subscribers. Delivery is best-effort: a subscriber
/// whose channel is closed or full is dropped and never retried.
pub struct FeedHub {
    subscribers: DashMap<Uuid, Subscriber>,
    buffer_size: usize,
}

impl FeedHub {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            subscribers: DashMap::new(),
            buffer_size,
        }
    }

    pub fn subscribe(&self, order_id: Uuid) -> (Uuid, mpsc::Receiver<FeedMessage>) {
        let id = Uuid::new_v4();
        let (tx, rx) = mpsc::channel(self.buffer_size);
        self.subscribers.insert(id, Subscriber { order_id, tx });
        debug!(subscriber_id = %id, order_id = %order_id, "feed subscriber added");
        (id, rx)
    }

    pub fn unsubscribe(&self, id: Uuid) {
        if self.subscribers.remove(&id).is_some() {
            debug!(subscriber_id = %id, "feed subscriber removed");
        }
    }

    pub fn broadcast_location(&self, location: &CourierLocation) {
        self.send_where(
            |subscriber| subscriber.order_id == location.order_id,
            FeedMessage::Location(location.clone()),
        );
    }

    pub fn broadcast_status(&self, status: StoreStatus) {
        self.send_where(|_| true, FeedMessage::Status(status));
    }

    /// Pings every subscriber; the ones that fail to accept it are pruned.
    pub fn heartbeat(&self) -> usize {
        self.send_where(|_| true, FeedMessage::Ping)
    }

    fn send_where(&self, matches: impl Fn(&Subscriber) -> bool, message: FeedMessage) -> usize {
        let mut dead = Vec::new();

        for entry in self.subscribers.iter() {
            if !matches(entry.value()) {
                continue;
            }
            if entry.value().tx.try_send(message.clone()).is_err() {
                dead.push(*entry.key());
            }
        }

        let pruned = dead.len();
        for id in dead {
            self.unsubscribe(id);
        }
        pruned
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}
