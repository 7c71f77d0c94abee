use uuid::Uuid;

use crate::models::order::{Order, OrderStatus};

/// An order is trackable while a courier is on it: delivery fulfillment,
/// courier assigned, and the kitchen has started on it.
pub fn can_track(order: &Order) -> bool {
    order.is_delivery()
        && order.courier_id.is_some()
        && matches!(
            order.status,
            OrderStatus::Preparing | OrderStatus::OutForDelivery
        )
}

/// Read access: only the customer who placed the order.
pub fn customer_can_track(order: &Order, customer_id: Uuid) -> bool {
    can_track(order) && order.customer_id == Some(customer_id)
}

/// Write access: only the courier the order is assigned to.
pub fn courier_can_push(order: &Order, courier_id: Uuid) -> bool {
    can_track(order) && order.courier_id == Some(courier_id)
}
