//! Contact repository
//!
//! Alert recipients. Only active contacts are notified; the dispatcher
//! loads them at dispatch time so edits take effect immediately.

use super::types::{ContactRecord, CreateContactRequest, UpdateContactRequest};
use crate::error::{Error, Result};
use sqlx::SqlitePool;

const CONTACT_COLUMNS: &str = "id, contact_name, contact_email, contact_phone, active";

/// Repository for `contacts`
#[derive(Clone)]
pub struct ContactRepository {
    pool: SqlitePool,
}

impl ContactRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn create(&self, req: &CreateContactRequest) -> Result<ContactRecord> {
        if req.contact_email.is_none() && req.contact_phone.is_none() {
            return Err(Error::Validation(
                "contact needs an email or a phone number".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO contacts (contact_name, contact_email, contact_phone, active) VALUES (?, ?, ?, ?)",
        )
        .bind(&req.contact_name)
        .bind(&req.contact_email)
        .bind(&req.contact_phone)
        .bind(req.active)
        .execute(&self.pool)
        .await?;

        self.get(result.last_insert_rowid()).await?.ok_or_else(|| {
            Error::Internal("contact vanished after insert".to_string())
        })
    }

    pub async fn get(&self, id: i64) -> Result<Option<ContactRecord>> {
        let query = format!("SELECT {} FROM contacts WHERE id = ?", CONTACT_COLUMNS);
        let row = sqlx::query_as::<_, ContactRecord>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row)
    }

    pub async fn list(&self) -> Result<Vec<ContactRecord>> {
        let query = format!("SELECT {} FROM contacts ORDER BY contact_name", CONTACT_COLUMNS);
        let rows = sqlx::query_as::<_, ContactRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Contacts eligible for notification
    pub async fn list_active(&self) -> Result<Vec<ContactRecord>> {
        let query = format!(
            "SELECT {} FROM contacts WHERE active = TRUE ORDER BY contact_name",
            CONTACT_COLUMNS
        );
        let rows = sqlx::query_as::<_, ContactRecord>(&query)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    pub async fn update(&self, id: i64, req: &UpdateContactRequest) -> Result<ContactRecord> {
        let existing = self
            .get(id)
            .await?
            .ok_or_else(|| Error::NotFound(format!("contact {}", id)))?;

        sqlx::query(
            "UPDATE contacts SET contact_email = ?, contact_phone = ?, active = ? WHERE id = ?",
        )
        .bind(req.contact_email.as_ref().or(existing.contact_email.as_ref()))
        .bind(req.contact_phone.as_ref().or(existing.contact_phone.as_ref()))
        .bind(req.active.unwrap_or(existing.active))
        .bind(id)
        .execute(&self.pool)
        .await?;

        self.get(id).await?.ok_or_else(|| {
            Error::Internal("contact vanished after update".to_string())
        })
    }

    pub async fn delete(&self, id: i64) -> Result<bool> {
        let result = sqlx::query("DELETE FROM contacts WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }
}
