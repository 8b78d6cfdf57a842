//! Store - Persistence Layer
//!
//! ## Responsibilities
//!
//! - Stream, target, and contact rows (SQLite via sqlx)
//! - Schema bootstrap at startup
//!
//! The monitoring core only ever writes a stream's `active` flag and
//! `started_at` timestamp; everything else is row-level CRUD for the API.

mod contacts;
mod streams;
mod targets;
mod types;

pub use contacts::ContactRepository;
pub use streams::StreamRepository;
pub use targets::TargetRepository;
pub use types::*;

use crate::error::Result;
use sqlx::SqlitePool;

/// Create tables if they don't exist
pub async fn init_schema(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS streams (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            stream_id TEXT NOT NULL UNIQUE,
            stream_url TEXT NOT NULL,
            active BOOLEAN NOT NULL DEFAULT FALSE,
            started_at TEXT
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS targets (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            target_id TEXT NOT NULL UNIQUE,
            target_name TEXT NOT NULL,
            image_path TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS contacts (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            contact_name TEXT NOT NULL UNIQUE,
            contact_email TEXT UNIQUE,
            contact_phone TEXT UNIQUE,
            active BOOLEAN NOT NULL DEFAULT TRUE
        )
        "#,
    )
    .execute(pool)
    .await?;

    tracing::info!("Database schema ready");
    Ok(())
}

#[cfg(test)]
pub(crate) async fn test_pool() -> SqlitePool {
    use sqlx::sqlite::SqlitePoolOptions;
    use std::time::Duration;

    // One connection: every pooled connection to :memory: would get its
    // own empty database otherwise
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None::<Duration>)
        .max_lifetime(None::<Duration>)
        .connect("sqlite::memory:")
        .await
        .expect("in-memory sqlite");
    init_schema(&pool).await.expect("schema");
    pool
}
