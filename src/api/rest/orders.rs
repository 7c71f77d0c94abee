use std::sync::Arc;

use axum::Json;
use axum::Router;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::IntoResponse;
use axum::routing::{get, patch, post, put};
use serde::Deserialize;
use tracing::{info, warn};
use uuid::Uuid;

use crate::api::rest::header_uuid;
use crate::error::AppError;
use crate::models::order::{Fulfillment, Order, OrderItem, OrderStatus};
use crate::state::AppState;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/orders", post(create_order).get(list_orders))
        .route("/orders/:id", get(get_order))
        .route("/orders/:id/status", patch(update_status))
        .route("/orders/:id/cancel", post(cancel_order))
        .route("/orders/:id/finish", post(finish_order))
        .route("/orders/:id/courier", put(assign_courier))
}

#[derive(Deserialize)]
pub struct CreateOrderRequest {
    pub customer_id: Option<Uuid>,
    pub fulfillment: Fulfillment,
    pub items: Vec<OrderItem>,
}

#[derive(Deserialize)]
pub struct UpdateStatusRequest {
    pub status: OrderStatus,
}

#[derive(Deserialize)]
pub struct AssignCourierRequest {
    pub courier_id: Uuid,
}

/// Creation is guarded by the Idempotency-Key header: a retry with the same
/// key within the expiration window replays the original response verbatim.
async fn create_order(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(payload): Json<CreateOrderRequest>,
) -> Result<impl IntoResponse, AppError> {
    let key = headers
        .get("idempotency-key")
        .and_then(|value| value.to_str().ok())
        .map(str::to_string);

    let op_state = state.clone();
    let (status, body) = state
        .idempotency
        .execute(key.as_deref(), "/orders", || async move {
            let number = op_state.sequencer.next().await?;
            let order = Order::new(number, payload.customer_id, payload.fulfillment, payload.items)?;
            op_state.orders.create(&order).await?;
            op_state.metrics.orders_created_total.inc();

            info!(order_id = %order.id, number = %order.number, "order created");

            let body = serde_json::to_string(&order)
                .map_err(|err| AppError::Internal(format!("serialize order: {err}")))?;
            Ok((StatusCode::CREATED, body))
        })
        .await?;

    Ok((status, [(header::CONTENT_TYPE, "application/json")], body))
}

async fn list_orders(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Order>>, AppError> {
    Ok(Json(state.orders.list().await?))
}

async fn get_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;
    Ok(Json(order))
}

async fn update_status(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> Result<Json<Order>, AppError> {
    let mut order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let previous = order.status;
    order.transition_to(payload.status)?;
    state.orders.persist_transition(&order, previous).await?;

    info!(
        order_id = %order.id,
        from = previous.as_str(),
        to = order.status.as_str(),
        "order status updated"
    );

    Ok(Json(order))
}

async fn cancel_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
) -> Result<Json<Order>, AppError> {
    let mut order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let previous = order.status;
    order.cancel()?;
    state.orders.persist_transition(&order, previous).await?;

    if previous == OrderStatus::Finished {
        warn!(order_id = %order.id, number = %order.number, "finished order cancelled as a correction");
    } else {
        info!(order_id = %order.id, "order cancelled");
    }

    Ok(Json(order))
}

/// Courier-reported completion; only the assigned courier (or nobody, when
/// unassigned) may finish the order.
async fn finish_order(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    headers: HeaderMap,
) -> Result<Json<Order>, AppError> {
    let courier_id = header_uuid(&headers, "x-courier-id")?;

    let mut order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    let previous = order.status;
    order.finish_by(courier_id)?;
    state.orders.persist_transition(&order, previous).await?;

    // The trip is over; the cached position stops being meaningful.
    state.locations.remove(courier_id);

    info!(order_id = %order.id, courier_id = %courier_id, "order finished by courier");

    Ok(Json(order))
}

async fn assign_courier(
    State(state): State<Arc<AppState>>,
    Path(id): Path<Uuid>,
    Json(payload): Json<AssignCourierRequest>,
) -> Result<Json<Order>, AppError> {
    let mut order = state
        .orders
        .get(id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("order {id} not found")))?;

    if !order.is_delivery() {
        return Err(AppError::Validation(format!(
            "order {} is not a delivery order",
            order.number
        )));
    }

    order.assign_courier(payload.courier_id);
    state.orders.update_courier(&order).await?;

    info!(order_id = %order.id, courier_id = %payload.courier_id, "courier assigned");

    Ok(Json(order))
}
