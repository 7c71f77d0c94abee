use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AppError;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Received,
    Preparing,
    OutForDelivery,
    Finished,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Received => "RECEIVED",
            OrderStatus::Preparing => "PREPARING",
            OrderStatus::OutForDelivery => "OUT_FOR_DELIVERY",
            OrderStatus::Finished => "FINISHED",
            OrderStatus::Cancelled => "CANCELLED",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "RECEIVED" => Some(OrderStatus::Received),
            "PREPARING" => Some(OrderStatus::Preparing),
            "OUT_FOR_DELIVERY" => Some(OrderStatus::OutForDelivery),
            "FINISHED" => Some(OrderStatus::Finished),
            "CANCELLED" => Some(OrderStatus::Cancelled),
            _ => None,
        }
    }

    /// States reachable from `self`. Cancellation is reachable from every
    /// state except CANCELLED itself; a FINISHED order may still be
    /// cancelled as an operational correction.
    pub fn allowed_transitions(&self) -> &'static [OrderStatus] {
        match self {
            OrderStatus::Received => &[OrderStatus::Preparing, OrderStatus::Cancelled],
            OrderStatus::Preparing => &[OrderStatus::OutForDelivery, OrderStatus::Cancelled],
            OrderStatus::OutForDelivery => &[OrderStatus::Finished, OrderStatus::Cancelled],
            OrderStatus::Finished => &[OrderStatus::Cancelled],
            OrderStatus::Cancelled => &[],
        }
    }

    pub fn can_transition_to(&self, target: OrderStatus) -> bool {
        self.allowed_transitions().contains(&target)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Fulfillment {
    Delivery { address: String },
    Table { number: u32 },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderItem {
    pub product_id: Uuid,
    pub name: String,
    pub quantity: u32,
    pub unit_price_cents: i64,
}

impl OrderItem {
    pub fn subtotal_cents(&self) -> i64 {
        i64::from(self.quantity) * self.unit_price_cents
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub number: String,
    pub customer_id: Option<Uuid>,
    pub courier_id: Option<Uuid>,
    pub fulfillment: Fulfillment,
    pub items: Vec<OrderItem>,
    pub status: OrderStatus,
    pub total_cents: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn new(
        number: String,
        customer_id: Option<Uuid>,
        fulfillment: Fulfillment,
        items: Vec<OrderItem>,
    ) -> Result<Self, AppError> {
        if items.is_empty() {
            return Err(AppError::Validation(
                "order must contain at least one item".to_string(),
            ));
        }
        for item in &items {
            if item.quantity == 0 {
                return Err(AppError::Validation(format!(
                    "item {} has zero quantity",
                    item.name
                )));
            }
            if item.unit_price_cents < 0 {
                return Err(AppError::Validation(format!(
                    "item {} has negative price",
                    item.name
                )));
            }
        }
        if let Fulfillment::Delivery { address } = &fulfillment {
            if address.trim().is_empty() {
                return Err(AppError::Validation(
                    "delivery address cannot be empty".to_string(),
                ));
            }
        }

        let total_cents = items.iter().map(OrderItem::subtotal_cents).sum();
        let now = Utc::now();

        Ok(Self {
            id: Uuid::new_v4(),
            number,
            customer_id,
            courier_id: None,
            fulfillment,
            items,
            status: OrderStatus::Received,
            total_cents,
            created_at: now,
            updated_at: now,
        })
    }

    pub fn is_delivery(&self) -> bool {
        matches!(self.fulfillment, Fulfillment::Delivery { .. })
    }

    pub fn transition_to(&mut self, target: OrderStatus) -> Result<(), AppError> {
        if !self.status.can_transition_to(target) {
            return Err(AppError::invalid_transition(
                self.status.as_str(),
                target.as_str(),
            ));
        }
        self.status = target;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn cancel(&mut self) -> Result<(), AppError> {
        self.transition_to(OrderStatus::Cancelled)
    }

    /// A courier may finish an order only when none is assigned or the
    /// requester is the assigned one.
    pub fn finish_by(&mut self, courier_id: Uuid) -> Result<(), AppError> {
        if let Some(assigned) = self.courier_id {
            if assigned != courier_id {
                return Err(AppError::Conflict(format!(
                    "courier {courier_id} is not assigned to order {}",
                    self.number
                )));
            }
        }
        self.transition_to(OrderStatus::Finished)
    }

    pub fn assign_courier(&mut self, courier_id: Uuid) {
        self.courier_id = Some(courier_id);
        self.updated_at = Utc::now();
    }
}
