//! Store row types and request DTOs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One monitored stream (row in `streams`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct StreamRecord {
    pub id: i64,
    pub stream_id: String,
    pub stream_url: String,
    pub active: bool,
    pub started_at: Option<DateTime<Utc>>,
}

/// One enrolled recognition target (row in `targets`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct TargetRecord {
    pub id: i64,
    pub target_id: String,
    pub target_name: String,
    pub image_path: String,
}

/// One alert recipient (row in `contacts`)
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ContactRecord {
    pub id: i64,
    pub contact_name: String,
    pub contact_email: Option<String>,
    pub contact_phone: Option<String>,
    pub active: bool,
}

/// Create-target request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateTargetRequest {
    pub target_name: String,
    pub image_path: String,
}

/// Create-contact request body
#[derive(Debug, Clone, Deserialize)]
pub struct CreateContactRequest {
    pub contact_name: String,
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default = "default_true")]
    pub active: bool,
}

/// Update-contact request body (partial)
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateContactRequest {
    #[serde(default)]
    pub contact_email: Option<String>,
    #[serde(default)]
    pub contact_phone: Option<String>,
    #[serde(default)]
    pub active: Option<bool>,
}

fn default_true() -> bool {
    true
}
