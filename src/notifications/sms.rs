//! SMS alerts via the Twilio REST API

use super::{AlertMessage, NotificationSink};
use crate::error::{Error, Result};
use crate::store::ContactRecord;
use async_trait::async_trait;
use std::time::Duration;

const TWILIO_API_BASE: &str = "https://api.twilio.com/2010-04-01";

/// Twilio SMS sink
pub struct SmsSink {
    client: reqwest::Client,
    account_sid: String,
    auth_token: String,
    from_number: String,
}

impl SmsSink {
    pub fn new(account_sid: String, auth_token: String, from_number: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            account_sid,
            auth_token,
            from_number,
        }
    }

    async fn send_one(&self, to: &str, body: &str) -> Result<()> {
        let url = format!(
            "{}/Accounts/{}/Messages.json",
            TWILIO_API_BASE, self.account_sid
        );

        let resp = self
            .client
            .post(&url)
            .basic_auth(&self.account_sid, Some(&self.auth_token))
            .form(&[("To", to), ("From", self.from_number.as_str()), ("Body", body)])
            .send()
            .await
            .map_err(|e| Error::Notify(format!("twilio request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Notify(format!(
                "twilio returned {}",
                resp.status()
            )));
        }

        Ok(())
    }
}

#[async_trait]
impl NotificationSink for SmsSink {
    fn name(&self) -> &'static str {
        "sms"
    }

    async fn notify(&self, alert: &AlertMessage, recipients: &[ContactRecord]) -> Result<()> {
        let body = format!(
            "ALERT: Target {} identified at {}. Video: {}",
            alert.identities_label(),
            alert.occurred_at.format("%Y-%m-%d %H:%M:%S"),
            alert.video_url
        );

        for contact in recipients {
            let Some(phone) = contact.contact_phone.as_deref() else {
                continue;
            };

            match self.send_one(phone, &body).await {
                Ok(()) => {
                    tracing::info!(phone = %phone, "SMS alert sent");
                }
                Err(e) => {
                    tracing::error!(
                        phone = %phone,
                        error = %e,
                        "Failed to send SMS alert"
                    );
                }
            }
        }

        Ok(())
    }
}
