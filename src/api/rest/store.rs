use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::routing::get;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::models::store_status::StoreStatus;
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/store/status", get(get_status).put(set_status))
}

#[derive(Serialize, Deserialize)]
pub struct StoreStatusBody {
    pub status: StoreStatus,
}

async fn get_status(State(state): State<Arc<AppState>>) -> Json<StoreStatusBody> {
    Json(StoreStatusBody {
        status: state.current_store_status(),
    })
}

/// Staff toggle; every live-feed subscriber hears about it immediately.
async fn set_status(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<StoreStatusBody>,
) -> Json<StoreStatusBody> {
    state.set_store_status(payload.status);
    state.feed.broadcast_status(payload.status);

    info!(status = ?payload.status, "store status changed");

    Json(StoreStatusBody {
        status: payload.status,
    })
}
