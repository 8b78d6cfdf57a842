//! facewatch - Face Recognition Stream Monitoring Server
//!
//! Watches live video streams for enrolled faces, records while a target
//! is in view, and alerts contacts with the uploaded clip.
//!
//! ## Architecture
//!
//! 1. FrameBuffer - bounded drop-oldest queue between capture and analysis
//! 2. FrameSource - stream ingest (ffmpeg over RTSP/file/device)
//! 3. Recognizer - external recognition engine adapter with sampling
//! 4. Recording - detection-driven recording state machine
//! 5. Alerts - upload + notification fan-out per finished recording
//! 6. StreamMonitor - capture/processing task pair for one stream
//! 7. MonitorRegistry - lifecycle ledger, one monitor per stream
//! 8. Store - streams/targets/contacts persistence (SQLite)
//! 9. WebAPI - REST endpoints
//!
//! ## Design Principles
//!
//! - Per-frame failures never stop a pipeline; only source loss does
//! - Stop is cooperative: loops observe a liveness flag, stop() joins
//! - The registry is the only writer of the durable `active` flag while
//!   a monitor is alive

pub mod alerts;
pub mod error;
pub mod frame_buffer;
pub mod frame_source;
pub mod models;
pub mod monitor_registry;
pub mod notifications;
pub mod recognizer;
pub mod recording;
pub mod state;
pub mod storage;
pub mod store;
pub mod stream_monitor;
pub mod web_api;

#[cfg(test)]
pub(crate) mod test_support;

pub use error::{Error, Result};
