//! Webhook alerts (JSON POST)

use super::{AlertMessage, NotificationSink};
use crate::error::{Error, Result};
use crate::store::ContactRecord;
use async_trait::async_trait;
use serde_json::json;
use std::time::Duration;

/// Webhook sink posting the alert payload to one configured URL
pub struct WebhookSink {
    client: reqwest::Client,
    url: String,
}

impl WebhookSink {
    pub fn new(url: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self { client, url }
    }
}

#[async_trait]
impl NotificationSink for WebhookSink {
    fn name(&self) -> &'static str {
        "webhook"
    }

    async fn notify(&self, alert: &AlertMessage, _recipients: &[ContactRecord]) -> Result<()> {
        let payload = json!({
            "stream_id": alert.stream_id,
            "target_ids": alert.identities,
            "timestamp": alert.occurred_at.to_rfc3339(),
            "video_url": alert.video_url,
            "alert_type": "face_recognition",
        });

        let resp = self
            .client
            .post(&self.url)
            .json(&payload)
            .send()
            .await
            .map_err(|e| Error::Notify(format!("webhook request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Notify(format!(
                "webhook returned {}",
                resp.status()
            )));
        }

        tracing::info!(url = %self.url, "Webhook alert sent");
        Ok(())
    }
}
