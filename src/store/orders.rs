use chrono::{DateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::error::AppError;
use crate::models::order::{Fulfillment, Order, OrderItem, OrderStatus};

#[derive(Clone)]
pub struct OrderStore {
    pool: SqlitePool,
}

#[derive(FromRow)]
struct DbOrder {
    id: String,
    number: String,
    customer_id: Option<String>,
    courier_id: Option<String>,
    fulfillment_json: String,
    items_json: String,
    status: String,
    total_cents: i64,
    created_at: String,
    updated_at: String,
}

impl DbOrder {
    fn into_order(self) -> Result<Order, AppError> {
        let corrupt = |what: &str, detail: String| {
            AppError::Internal(format!("corrupt order row ({what}): {detail}"))
        };

        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt("id", e.to_string()))?;
        let customer_id = self
            .customer_id
            .map(|raw| Uuid::parse_str(&raw))
            .transpose()
            .map_err(|e| corrupt("customer_id", e.to_string()))?;
        let courier_id = self
            .courier_id
            .map(|raw| Uuid::parse_str(&raw))
            .transpose()
            .map_err(|e| corrupt("courier_id", e.to_string()))?;
        let fulfillment: Fulfillment = serde_json::from_str(&self.fulfillment_json)
            .map_err(|e| corrupt("fulfillment", e.to_string()))?;
        let items: Vec<OrderItem> = serde_json::from_str(&self.items_json)
            .map_err(|e| corrupt("items", e.to_string()))?;
        let status = OrderStatus::parse(&self.status)
            .ok_or_else(|| corrupt("status", self.status.clone()))?;
        let created_at = DateTime::parse_from_rfc3339(&self.created_at)
            .map_err(|e| corrupt("created_at", e.to_string()))?
            .with_timezone(&Utc);
        let updated_at = DateTime::parse_from_rfc3339(&self.updated_at)
            .map_err(|e| corrupt("updated_at", e.to_string()))?
            .with_timezone(&Utc);

        Ok(Order {
            id,
            number: self.number,
            customer_id,
            courier_id,
            fulfillment,
            items,
            status,
            total_cents: self.total_cents,
            created_at,
            updated_at,
        })
    }
}

const COLUMNS: &str = "id, number, customer_id, courier_id, fulfillment_json, items_json, status, total_cents, created_at, updated_at";

impl OrderStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, order: &Order) -> Result<(), AppError> {
        let fulfillment_json = serde_json::to_string(&order.fulfillment)
            .map_err(|e| AppError::Internal(format!("serialize fulfillment: {e}")))?;
        let items_json = serde_json::to_string(&order.items)
            .map_err(|e| AppError::Internal(format!("serialize items: {e}")))?;

        sqlx::query(
            "INSERT INTO orders (id, number, customer_id, courier_id, fulfillment_json, items_json, status, total_cents, created_at, updated_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(order.id.to_string())
        .bind(&order.number)
        .bind(order.customer_id.map(|id| id.to_string()))
        .bind(order.courier_id.map(|id| id.to_string()))
        .bind(fulfillment_json)
        .bind(items_json)
        .bind(order.status.as_str())
        .bind(order.total_cents)
        .bind(order.created_at.to_rfc3339())
        .bind(order.updated_at.to_rfc3339())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<Order>, AppError> {
        let row: Option<DbOrder> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders WHERE id = ?"))
                .bind(id.to_string())
                .fetch_optional(&self.pool)
                .await?;

        row.map(DbOrder::into_order).transpose()
    }

    pub async fn list(&self) -> Result<Vec<Order>, AppError> {
        let rows: Vec<DbOrder> =
            sqlx::query_as(&format!("SELECT {COLUMNS} FROM orders ORDER BY number"))
                .fetch_all(&self.pool)
                .await?;

        rows.into_iter().map(DbOrder::into_order).collect()
    }

    /// Writes a status change guarded by the status the caller read, so two
    /// racing updates cannot both land on the same order.
    pub async fn persist_transition(
        &self,
        order: &Order,
        previous: OrderStatus,
    ) -> Result<(), AppError> {
        let updated = sqlx::query(
            "UPDATE orders SET status = ?, courier_id = ?, updated_at = ? WHERE id = ? AND status = ?",
        )
        .bind(order.status.as_str())
        .bind(order.courier_id.map(|id| id.to_string()))
        .bind(order.updated_at.to_rfc3339())
        .bind(order.id.to_string())
        .bind(previous.as_str())
        .execute(&self.pool)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::Conflict(format!(
                "order {} was modified concurrently",
                order.number
            )));
        }

        Ok(())
    }

    pub async fn update_courier(&self, order: &Order) -> Result<(), AppError> {
        let updated = sqlx::query("UPDATE orders SET courier_id = ?, updated_at = ? WHERE id = ?")
            .bind(order.courier_id.map(|id| id.to_string()))
            .bind(order.updated_at.to_rfc3339())
            .bind(order.id.to_string())
            .execute(&self.pool)
            .await?;

        if updated.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("order {} not found", order.id)));
        }

        Ok(())
    }
}
