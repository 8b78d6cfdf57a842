//! Notifications - Alert Delivery
//!
//! ## Responsibilities
//!
//! - Deliver one alert per detection episode over every configured channel
//! - Email (SMTP), SMS (Twilio REST), webhook (JSON POST)
//!
//! Delivery is fire-and-forget from the core's perspective: a sink
//! failure is logged by the dispatcher and never retried.

mod email;
mod sms;
mod webhook;

pub use email::EmailSink;
pub use sms::SmsSink;
pub use webhook::WebhookSink;

use crate::error::Result;
use crate::store::ContactRecord;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// One alert, shared by all sinks
#[derive(Debug, Clone)]
pub struct AlertMessage {
    pub stream_id: String,
    /// Identity labels seen during the episode
    pub identities: Vec<String>,
    pub occurred_at: DateTime<Utc>,
    /// Durable URL of the uploaded recording
    pub video_url: String,
}

impl AlertMessage {
    /// Comma-joined identity labels for message bodies
    pub fn identities_label(&self) -> String {
        self.identities.join(", ")
    }
}

/// A delivery channel for alerts.
#[async_trait]
pub trait NotificationSink: Send + Sync {
    /// Channel name for logging
    fn name(&self) -> &'static str;

    /// Deliver `alert` to the recipients this channel can reach.
    ///
    /// Recipients the channel cannot reach (no email address for the
    /// email sink, etc.) are skipped silently; per-recipient failures
    /// are logged and do not abort delivery to the rest.
    async fn notify(&self, alert: &AlertMessage, recipients: &[ContactRecord]) -> Result<()>;
}
