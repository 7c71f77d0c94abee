use std::convert::Infallible;
use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::response::IntoResponse;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use futures::StreamExt;
use tokio_stream::wrappers::ReceiverStream;
use tracing::info;
use uuid::Uuid;

use crate::api::rest::header_uuid;
use crate::error::AppError;
use crate::models::location::CourierLocation;
use crate::models::order::Order;
use crate::state::AppState;
use crate::tracking::auth;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/tracking/location", post(push_location))
        .route("/orders/:id/location", get(get_location))
        .route("/orders/:id/feed", get(order_feed))
}

#[derive(serde::Deserialize)]
pub struct PushLocationRequest {
    pub order_id: Uuid,
    pub latitude: f64,
    pub longitude: f64,
    pub heading: Option<f64>,
    pub speed: Option<f64>,
}

async fn push_location(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<PushLocationRequest>,
) -> Result<Json<CourierLocation>, AppError> {
    let courier_id = header_uuid(&headers, "x-courier-id")?;

    let order = load_order(&state, payload.order_id).await?;
    if !auth::courier_can_push(&order, courier_id) {
        return Err(AppError::Conflict(format!(
            "courier {courier_id} may not push location for order {}",
            order.number
        )));
    }

    let location = CourierLocation::new(
        courier_id,
        payload.order_id,
        payload.latitude,
        payload.longitude,
        payload.heading,
        payload.speed,
    )?;

    state.locations.put(location.clone());
    state.metrics.location_pushes_total.inc();
    state
        .metrics
        .cached_locations
        .set(state.locations.len() as i64);
    state.feed.broadcast_location(&location);

    Ok(Json(location))
}

async fn get_location(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<CourierLocation>, AppError> {
    let customer_id = header_uuid(&headers, "x-customer-id")?;

    let order = load_order(&state, id).await?;
    check_customer(&order, customer_id)?;

    state
        .locations
        .get_by_order(order.id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no recent location for order {}", order.number)))
}

/// Long-lived SSE stream of `location`, `status` and `ping` events for one
/// order. The connection is cut after the configured timeout; clients are
/// expected to reconnect.
async fn order_feed(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<impl IntoResponse, AppError> {
    let customer_id = header_uuid(&headers, "x-customer-id")?;

    let order = load_order(&state, id).await?;
    check_customer(&order, customer_id)?;

    let (subscriber_id, rx) = state.feed.subscribe(order.id);
    state
        .metrics
        .live_subscribers
        .set(state.feed.subscriber_count() as i64);

    info!(order_id = %order.id, subscriber_id = %subscriber_id, "feed subscriber connected");

    let guard = FeedGuard {
        state: state.clone(),
        subscriber_id,
    };
    let deadline = Box::pin(tokio::time::sleep(state.feed_timeout));

    let stream = ReceiverStream::new(rx)
        .map(move |message| {
            let _ = &guard;
            Ok::<Event, Infallible>(message.into_event())
        })
        .take_until(deadline);

    Ok(Sse::new(stream))
}

async fn load_order(state: &AppState, id: Uuid) -> Result<Order, AppError> {
    state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))
}

fn check_customer(order: &Order, customer_id: Uuid) -> Result<(), AppError> {
    if auth::customer_can_track(order, customer_id) {
        return Ok(());
    }
    if order.customer_id != Some(customer_id) {
        return Err(AppError::Conflict(format!(
            "order {} does not belong to customer {customer_id}",
            order.number
        )));
    }
    Err(AppError::NotFound(format!(
        "order {} is not currently trackable",
        order.number
    )))
}

/// Deregisters the subscriber when the SSE stream is dropped, whether by
/// client disconnect or the connection timeout.
struct FeedGuard {
    state: Arc<AppState>,
    subscriber_id: Uuid,
}

impl Drop for FeedGuard {
    fn drop(&mut self) {
        self.state.feed.unsubscribe(self.subscriber_id);
        self.state
            .metrics
            .live_subscribers
            .set(self.state.feed.subscriber_count() as i64);
    }
}
