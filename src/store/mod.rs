pub mod idempotency;
pub mod orders;
pub mod sequence;

use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode};

use crate::error::AppError;

/// Opens the pool and applies the schema. The DDL file holds one statement
/// per block, split on ';' because sqlite prepares a single statement at a
/// time.
pub async fn connect(database_url: &str) -> Result<SqlitePool, AppError> {
    if let Some(path) = database_url.strip_prefix("sqlite://") {
        if path != ":memory:" {
            let p = std::path::Path::new(path);
            if let Some(parent) = p.parent() {
                if !parent.as_os_str().is_empty() {
                    tokio::fs::create_dir_all(parent)
                        .await
                        .map_err(|err| AppError::Internal(format!("create db dir: {err}")))?;
                }
            }
        }
    }

    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|err| AppError::Internal(format!("invalid database url: {err}")))?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal);

    let pool = SqlitePool::connect_with(options).await?;

    let ddl = include_str!("migrations/0001_init.sql");
    for statement in ddl.split(';') {
        let statement = statement.trim();
        if statement.is_empty() {
            continue;
        }
        sqlx::query(statement).execute(&pool).await?;
    }

    Ok(pool)
}
