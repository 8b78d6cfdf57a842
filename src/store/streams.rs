//! Stream repository
//!
//! Database access for stream rows. The activation flag transitions here
//! are the durable side of the monitor registry's state.

use super::types::StreamRecord;
use crate::error::Result;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

const STREAM_COLUMNS: &str = "id, stream_id, stream_url, active, started_at";

/// Repository for `streams`
#[derive(Clone)]
pub struct StreamRepository {
    pool: SqlitePool,
}

impl StreamRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Register a new stream (inactive) and return the row
    pub async fn create(&self, stream_url: &str) -> Result<StreamRecord> {
        let stream_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO streams (stream_id, stream_url, active) VALUES (?, ?, FALSE)")
            .bind(&stream_id)
            .bind(stream_url)
            .execute(&self.pool)
            .await?;

        self.get(&stream_id).await?.ok_or_else(|| {
            crate::error::Error::Internal(format!("stream {} vanished after insert", stream_id))
        })
    }

    pub async fn get(&self, stream_id: &str) -> Result<Option<StreamRecord>> {
        let query = format!("SELECT {} FROM streams WHERE stream_id = ?", STREAM_COLUMNS);
        let row = sqlx::query_as::<_, StreamRecord>(&query)
            .bind(stream_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn find_by_url(&self, stream_url: &str) -> Result<Option<StreamRecord>> {
        let query = format!(
            "SELECT {} FROM streams WHERE stream_url = ?",
            STREAM_COLUMNS
        );
        let row = sqlx::query_as::<_, StreamRecord>(&query)
            .bind(stream_url)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<StreamRecord>> {
        let query = format!("SELECT {} FROM streams ORDER BY id", STREAM_COLUMNS);
        let rows = sqlx::query_as::<_, StreamRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Flip the activation flag.
    ///
    /// `started_at` is set when provided (activation) and left untouched
    /// otherwise, so a deactivated row keeps its last start time.
    pub async fn set_active(
        &self,
        stream_id: &str,
        active: bool,
        started_at: Option<DateTime<Utc>>,
    ) -> Result<()> {
        sqlx::query(
            "UPDATE streams SET active = ?, started_at = COALESCE(?, started_at) WHERE stream_id = ?",
        )
        .bind(active)
        .bind(started_at)
        .bind(stream_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark every stream inactive (startup reconciliation: no monitor
    /// survives a restart, so no row may claim to be active)
    pub async fn deactivate_all(&self) -> Result<u64> {
        let result = sqlx::query("UPDATE streams SET active = FALSE WHERE active = TRUE")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    /// Delete a row; true when something was removed
    pub async fn delete(&self, stream_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM streams WHERE stream_id = ?")
            .bind(stream_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
