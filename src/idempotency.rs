use std::future::Future;

use axum::http::StatusCode;
use tracing::warn;

use crate::error::AppError;
use crate::observability::metrics::Metrics;
use crate::store::idempotency::{IdempotencyStore, InsertOutcome};

/// Wraps a side-effecting operation so retries of the same request replay the
/// stored response instead of running the operation again.
///
/// Storage trouble degrades to direct execution: a request should not fail
/// because the idempotency table is unreachable.
#[derive(Clone)]
pub struct IdempotencyCoordinator {
    store: IdempotencyStore,
    metrics: Metrics,
}

impl IdempotencyCoordinator {
    pub fn new(store: IdempotencyStore, metrics: Metrics) -> Self {
        Self { store, metrics }
    }

    pub async fn execute<F, Fut>(
        &self,
        key: Option<&str>,
        endpoint: &str,
        op: F,
    ) -> Result<(StatusCode, String), AppError>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<(StatusCode, String), AppError>>,
    {
        let key = match key.map(str::trim) {
            Some(key) if !key.is_empty() => key,
            _ => {
                self.count("unkeyed");
                return op().await;
            }
        };

        match self.store.fetch(key, endpoint).await {
            Ok(Some(record)) => {
                if let Some(cached) = decode(&record.response_body, record.response_status) {
                    self.count("hit");
                    return Ok(cached);
                }
                // Unreadable record: fall through and re-execute.
                warn!(key, endpoint, "cached idempotency record is unreadable, treating as miss");
            }
            Ok(None) => {}
            Err(err) => {
                warn!(error = %err, key, endpoint, "idempotency lookup failed, executing directly");
                self.count("degraded");
                return op().await;
            }
        }

        let (status, body) = op().await?;

        match self.store.insert(key, endpoint, status.as_u16(), &body).await {
            Ok(InsertOutcome::Inserted) => {
                self.count("miss");
            }
            Ok(InsertOutcome::Duplicate) => {
                // A concurrent retry beat us to the insert; its response is
                // the canonical one.
                if let Ok(Some(record)) = self.store.fetch(key, endpoint).await {
                    if let Some(cached) = decode(&record.response_body, record.response_status) {
                        self.count("hit");
                        return Ok(cached);
                    }
                }
                self.count("miss");
            }
            Err(err) => {
                warn!(error = %err, key, endpoint, "failed to record idempotent response");
                self.count("degraded");
            }
        }

        Ok((status, body))
    }

    fn count(&self, outcome: &str) {
        self.metrics
            .idempotency_requests_total
            .with_label_values(&[outcome])
            .inc();
    }
}

fn decode(body: &str, status: i64) -> Option<(StatusCode, String)> {
    let status = u16::try_from(status).ok()?;
    let status = StatusCode::from_u16(status).ok()?;
    serde_json::from_str::<serde_json::Value>(body).ok()?;
    Some((status, body.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn decode_rejects_bad_status_and_bad_body() {
        assert!(decode("{\"ok\":true}", 201).is_some());
        assert!(decode("not json", 200).is_none());
        assert!(decode("{}", 99).is_none());
        assert!(decode("{}", -1).is_none());
    }

    async fn coordinator() -> (IdempotencyCoordinator, IdempotencyStore, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let url = format!("sqlite://{}", dir.path().join("test.db").display());
        let pool = crate::store::connect(&url).await.unwrap();

        let ttl = Duration::from_secs(3600);
        let store = IdempotencyStore::new(pool.clone(), ttl);
        let coordinator = IdempotencyCoordinator::new(store, Metrics::new());
        (coordinator, IdempotencyStore::new(pool, ttl), dir)
    }

    #[tokio::test]
    async fn cached_record_short_circuits_the_operation() {
        let (coordinator, store, _dir) = coordinator().await;

        store
            .insert("abc123", "/orders", 201, r#"{"order":"cached"}"#)
            .await
            .unwrap();

        let executed = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = executed.clone();

        let (status, body) = coordinator
            .execute(Some("abc123"), "/orders", || async move {
                flag.store(true, std::sync::atomic::Ordering::SeqCst);
                Ok((StatusCode::OK, r#"{"order":"fresh"}"#.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, r#"{"order":"cached"}"#);
        assert!(!executed.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn losing_the_insert_race_returns_the_winners_response() {
        let (coordinator, racer, _dir) = coordinator().await;

        // The operation simulates a concurrent retry recording its response
        // between our lookup miss and our insert.
        let (status, body) = coordinator
            .execute(Some("abc123"), "/orders", || async move {
                racer
                    .insert("abc123", "/orders", 201, r#"{"order":"winner"}"#)
                    .await
                    .unwrap();
                Ok((StatusCode::OK, r#"{"order":"loser"}"#.to_string()))
            })
            .await
            .unwrap();

        assert_eq!(status, StatusCode::CREATED);
        assert_eq!(body, r#"{"order":"winner"}"#);
    }

    #[tokio::test]
    async fn blank_key_executes_directly_every_time() {
        let (coordinator, _store, _dir) = coordinator().await;

        for _ in 0..2 {
            let (status, body) = coordinator
                .execute(Some("  "), "/orders", || async {
                    Ok((StatusCode::CREATED, "{}".to_string()))
                })
                .await
                .unwrap();
            assert_eq!(status, StatusCode::CREATED);
            assert_eq!(body, "{}");
        }
    }
}
