//! Alerts - Recording-Finished Fan-Out
//!
//! ## Responsibilities
//!
//! - Upload the finished artifact to the object store
//! - Notify every configured sink once, only after a successful upload
//!
//! At most one notification episode per recording session: the recorder
//! emits exactly one finished event per session and nothing here retries
//! or re-opens anything. Failures are logged; a failed upload leaves the
//! artifact on local disk for manual recovery.

use crate::notifications::{AlertMessage, NotificationSink};
use crate::recording::RecordingFinished;
use crate::storage::ObjectStore;
use crate::store::ContactRepository;
use std::sync::Arc;

/// Dispatches alerts for finished recordings
pub struct AlertDispatcher {
    object_store: Arc<dyn ObjectStore>,
    sinks: Vec<Arc<dyn NotificationSink>>,
    contacts: ContactRepository,
}

impl AlertDispatcher {
    pub fn new(
        object_store: Arc<dyn ObjectStore>,
        sinks: Vec<Arc<dyn NotificationSink>>,
        contacts: ContactRepository,
    ) -> Self {
        Self {
            object_store,
            sinks,
            contacts,
        }
    }

    /// Object key for an artifact: `alerts/<stream_id>/<file name>`
    fn object_key(event: &RecordingFinished) -> String {
        let file_name = event
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording.mp4".to_string());
        format!("alerts/{}/{}", event.stream_id, file_name)
    }

    /// Handle one recording-finished event.
    ///
    /// Never returns an error: nothing downstream of the recorder may
    /// affect the state machine, so every failure ends here as a log
    /// line.
    pub async fn dispatch(&self, event: &RecordingFinished) {
        let key = Self::object_key(event);

        let video_url = match self.object_store.upload(&event.path, &key).await {
            Ok(url) => url,
            Err(e) => {
                tracing::error!(
                    stream_id = %event.stream_id,
                    path = %event.path.display(),
                    error = %e,
                    "Artifact upload failed, alert suppressed (recording kept locally)"
                );
                return;
            }
        };

        let recipients = match self.contacts.list_active().await {
            Ok(contacts) => contacts,
            Err(e) => {
                tracing::error!(error = %e, "Failed to load notification contacts");
                Vec::new()
            }
        };

        let alert = AlertMessage {
            stream_id: event.stream_id.clone(),
            identities: event.identities.clone(),
            occurred_at: event.ended_at,
            video_url,
        };

        for sink in &self.sinks {
            if let Err(e) = sink.notify(&alert, &recipients).await {
                tracing::error!(
                    channel = sink.name(),
                    stream_id = %event.stream_id,
                    error = %e,
                    "Alert delivery failed"
                );
            }
        }

        tracing::info!(
            stream_id = %event.stream_id,
            identities = ?event.identities,
            channels = self.sinks.len(),
            "Alert episode dispatched"
        );
    }
}
