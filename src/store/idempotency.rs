use std::time::Duration;

use chrono::Utc;
use sqlx::{FromRow, SqlitePool};

/// Stored outcome of a previously executed guarded operation.
#[derive(Debug, Clone, FromRow)]
pub struct IdempotencyRecord {
    pub response_status: i64,
    pub response_body: String,
}

pub enum InsertOutcome {
    Inserted,
    /// Another request with the same (key, endpoint) won the insert race.
    Duplicate,
}

#[derive(Clone)]
pub struct IdempotencyStore {
    pool: SqlitePool,
    ttl: Duration,
}

impl IdempotencyStore {
    pub fn new(pool: SqlitePool, ttl: Duration) -> Self {
        Self { pool, ttl }
    }

    /// Returns the unexpired record for (key, endpoint), if any.
    pub async fn fetch(
        &self,
        key: &str,
        endpoint: &str,
    ) -> Result<Option<IdempotencyRecord>, sqlx::Error> {
        sqlx::query_as(
            "SELECT response_status, response_body FROM idempotency_records
             WHERE key = ? AND endpoint = ? AND expires_at > ?",
        )
        .bind(key)
        .bind(endpoint)
        .bind(Utc::now().timestamp())
        .fetch_optional(&self.pool)
        .await
    }

    /// Inserts a fresh record. A UNIQUE violation on (key, endpoint) is the
    /// signal that a concurrent retry already recorded its response.
    pub async fn insert(
        &self,
        key: &str,
        endpoint: &str,
        response_status: u16,
        response_body: &str,
    ) -> Result<InsertOutcome, sqlx::Error> {
        let now = Utc::now().timestamp();
        let expires_at = now + self.ttl.as_secs() as i64;

        let result = sqlx::query(
            "INSERT INTO idempotency_records (key, endpoint, response_status, response_body, created_at, expires_at)
             VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(key)
        .bind(endpoint)
        .bind(i64::from(response_status))
        .bind(response_body)
        .bind(now)
        .bind(expires_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(err) => {
                let unique = err
                    .as_database_error()
                    .is_some_and(|db| db.is_unique_violation());
                if unique {
                    Ok(InsertOutcome::Duplicate)
                } else {
                    Err(err)
                }
            }
        }
    }

    pub async fn delete_expired(&self) -> Result<u64, sqlx::Error> {
        let deleted = sqlx::query("DELETE FROM idempotency_records WHERE expires_at <= ?")
            .bind(Utc::now().timestamp())
            .execute(&self.pool)
            .await?;
        Ok(deleted.rows_affected())
    }
}
