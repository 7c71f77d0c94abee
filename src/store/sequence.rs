use std::time::Duration;

use chrono::Utc;
use sqlx::SqlitePool;
use tracing::warn;

use crate::error::AppError;

/// Allocates order numbers from a single-row counter. The increment happens
/// inside one UPDATE, so concurrent callers can never observe the same value.
#[derive(Clone)]
pub struct OrderNumberSequencer {
    pool: SqlitePool,
}

impl OrderNumberSequencer {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Failure here aborts order creation: handing out a possibly duplicated
    /// number is worse than rejecting the request.
    pub async fn next(&self) -> Result<String, AppError> {
        let value: i64 =
            sqlx::query_scalar("UPDATE order_counter SET value = value + 1 WHERE id = 0 RETURNING value")
                .fetch_one(&self.pool)
                .await
                .map_err(|err| {
                    AppError::Internal(format!("order number allocation failed: {err}"))
                })?;

        // Audit trail only; losing a row never loses a number.
        if let Err(err) = sqlx::query("INSERT INTO order_number_audit (value, allocated_at) VALUES (?, ?)")
            .bind(value)
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await
        {
            warn!(error = %err, value, "failed to record order number audit row");
        }

        Ok(format_number(value))
    }

    pub async fn prune_audit(&self, retention: Duration) -> Result<u64, sqlx::Error> {
        let cutoff = Utc::now().timestamp() - retention.as_secs() as i64;
        let deleted = sqlx::query("DELETE FROM order_number_audit WHERE allocated_at < ?")
            .bind(cutoff)
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }
}

/// Zero-padded to at least four digits, growing as the counter does.
fn format_number(value: i64) -> String {
    format!("{value:04}")
}

#[cfg(test)]
mod tests {
    use super::format_number;

    #[test]
    fn pads_to_four_digits() {
        assert_eq!(format_number(1), "0001");
        assert_eq!(format_number(42), "0042");
        assert_eq!(format_number(9999), "9999");
    }

    #[test]
    fn grows_past_four_digits() {
        assert_eq!(format_number(10000), "10000");
        assert_eq!(format_number(123456), "123456");
    }
}
