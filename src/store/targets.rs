//! Target repository
//!
//! Row-level CRUD for enrolled recognition targets. Embeddings live in
//! the recognition engine; rows here only carry the label and the
//! reference image path.

use super::types::TargetRecord;
use crate::error::{Error, Result};
use sqlx::SqlitePool;

const TARGET_COLUMNS: &str = "id, target_id, target_name, image_path";

/// Repository for `targets`
#[derive(Clone)]
pub struct TargetRepository {
    pool: SqlitePool,
}

impl TargetRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, target_name: &str, image_path: &str) -> Result<TargetRecord> {
        let target_id = uuid::Uuid::new_v4().to_string();
        sqlx::query("INSERT INTO targets (target_id, target_name, image_path) VALUES (?, ?, ?)")
            .bind(&target_id)
            .bind(target_name)
            .bind(image_path)
            .execute(&self.pool)
            .await?;

        self.get(&target_id).await?.ok_or_else(|| {
            Error::Internal(format!("target {} vanished after insert", target_id))
        })
    }

    pub async fn get(&self, target_id: &str) -> Result<Option<TargetRecord>> {
        let query = format!("SELECT {} FROM targets WHERE target_id = ?", TARGET_COLUMNS);
        let row = sqlx::query_as::<_, TargetRecord>(&query)
            .bind(target_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<TargetRecord>> {
        let query = format!("SELECT {} FROM targets ORDER BY target_name", TARGET_COLUMNS);
        let rows = sqlx::query_as::<_, TargetRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn delete(&self, target_id: &str) -> Result<bool> {
        let result = sqlx::query("DELETE FROM targets WHERE target_id = ?")
            .bind(target_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;

    #[tokio::test]
    async fn test_crud_roundtrip() {
        let repo = TargetRepository::new(test_pool().await);

        let created = repo.create("alice", "targets/alice.jpg").await.unwrap();
        assert_eq!(created.target_name, "alice");

        let listed = repo.list().await.unwrap();
        assert_eq!(listed.len(), 1);

        assert!(repo.delete(&created.target_id).await.unwrap());
        assert!(repo.list().await.unwrap().is_empty());
    }
}
