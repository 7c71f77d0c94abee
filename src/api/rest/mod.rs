pub mod orders;
pub mod store;
pub mod tracking;

use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::get;
use serde::Serialize;
use tower_http::cors::CorsLayer;
use uuid::Uuid;

use crate::error::AppError;
use crate::models::store_status::StoreStatus;
use crate::state::AppState;

pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .merge(orders::router())
        .merge(tracking::router())
        .merge(store::router())
        .route("/health", get(health))
        .route("/metrics", get(metrics))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Pulls a Uuid identity out of a request header. Stands in for the
/// authenticated principal; real authentication lives outside this service.
pub(crate) fn header_uuid(headers: &HeaderMap, name: &str) -> Result<Uuid, AppError> {
    let raw = headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .ok_or_else(|| AppError::Validation(format!("missing {name} header")))?;

    Uuid::parse_str(raw).map_err(|_| AppError::Validation(format!("invalid {name} header")))
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    store_status: StoreStatus,
    cached_locations: usize,
    live_subscribers: usize,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        store_status: state.current_store_status(),
        cached_locations: state.locations.len(),
        live_subscribers: state.feed.subscriber_count(),
    })
}

async fn metrics(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    match state.metrics.encode() {
        Ok(body) => (
            StatusCode::OK,
            [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
            body,
        )
            .into_response(),
        Err(err) => (StatusCode::INTERNAL_SERVER_ERROR, err).into_response(),
    }
}
