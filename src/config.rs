use std::env;
use std::time::Duration;

use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct Config {
    pub http_port: u16,
    pub log_level: String,
    pub database_url: String,
    pub idempotency_ttl: Duration,
    pub idempotency_sweep_interval: Duration,
    pub location_ttl: Duration,
    pub location_sweep_interval: Duration,
    pub audit_retention: Duration,
    pub audit_sweep_interval: Duration,
    pub heartbeat_interval: Duration,
    pub feed_connection_timeout: Duration,
    pub feed_buffer_size: usize,
}

impl Config {
    pub fn from_env() -> Result<Self, AppError> {
        let _ = dotenvy::dotenv();

        Ok(Self {
            http_port: parse_or_default("HTTP_PORT", 3000)?,
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            database_url: env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://data/comanda.db".to_string()),
            idempotency_ttl: Duration::from_secs(
                parse_or_default("IDEMPOTENCY_TTL_HOURS", 24u64)? * 3600,
            ),
            idempotency_sweep_interval: Duration::from_secs(parse_or_default(
                "IDEMPOTENCY_SWEEP_SECS",
                300u64,
            )?),
            location_ttl: Duration::from_secs(parse_or_default("LOCATION_TTL_SECS", 300u64)?),
            location_sweep_interval: Duration::from_secs(parse_or_default(
                "LOCATION_SWEEP_SECS",
                60u64,
            )?),
            audit_retention: Duration::from_secs(
                parse_or_default("AUDIT_RETENTION_DAYS", 7u64)? * 86_400,
            ),
            audit_sweep_interval: Duration::from_secs(
                parse_or_default("AUDIT_SWEEP_HOURS", 6u64)? * 3600,
            ),
            heartbeat_interval: Duration::from_secs(parse_or_default("HEARTBEAT_SECS", 20u64)?),
            feed_connection_timeout: Duration::from_secs(parse_or_default(
                "FEED_TIMEOUT_SECS",
                300u64,
            )?),
            feed_buffer_size: parse_or_default("FEED_BUFFER_SIZE", 32)?,
        })
    }
}

fn parse_or_default<T>(key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|err| AppError::Internal(format!("invalid {key}: {err}"))),
        Err(_) => Ok(default),
    }
}
