//! Application state
//!
//! Holds configuration and the shared components handlers need.

use crate::monitor_registry::MonitorRegistry;
use crate::recognizer::{EngineModelConfig, HttpRecognitionEngine};
use crate::store::{ContactRepository, StreamRepository, TargetRepository};
use crate::stream_monitor::MonitorConfig;
use sqlx::SqlitePool;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// SMTP settings for the email sink
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub sender: String,
    pub password: String,
    pub smtp_server: String,
    pub smtp_port: u16,
}

/// Twilio settings for the SMS sink
#[derive(Debug, Clone)]
pub struct TwilioConfig {
    pub account_sid: String,
    pub auth_token: String,
    pub from_number: String,
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Database URL (SQLite)
    pub database_url: String,
    /// Recognition engine base URL
    pub engine_url: String,
    /// Server host
    pub host: String,
    /// Server port
    pub port: u16,
    /// Local directory for recording artifacts
    pub recordings_dir: PathBuf,
    /// Frame rate written into recording artifacts
    pub recording_fps: u32,
    /// S3 bucket for uploaded recordings
    pub s3_bucket: String,
    /// Model settings forwarded to the recognition engine
    pub model: EngineModelConfig,
    /// Email sink (enabled when sender and password are set)
    pub email: Option<EmailConfig>,
    /// SMS sink (enabled when Twilio credentials are set)
    pub twilio: Option<TwilioConfig>,
    /// Webhook sink (enabled when a URL is set)
    pub webhook_url: Option<String>,
    /// Per-stream pipeline tunables
    pub monitor: MonitorConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        let email = match (
            std::env::var("EMAIL_SENDER").ok(),
            std::env::var("EMAIL_PASSWORD").ok(),
        ) {
            (Some(sender), Some(password)) => Some(EmailConfig {
                sender,
                password,
                smtp_server: std::env::var("SMTP_SERVER")
                    .unwrap_or_else(|_| "smtp.gmail.com".to_string()),
                smtp_port: std::env::var("SMTP_PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(587),
            }),
            _ => None,
        };

        let twilio = match (
            std::env::var("TWILIO_ACCOUNT_SID").ok(),
            std::env::var("TWILIO_AUTH_TOKEN").ok(),
            std::env::var("TWILIO_PHONE_NUMBER").ok(),
        ) {
            (Some(account_sid), Some(auth_token), Some(from_number)) => Some(TwilioConfig {
                account_sid,
                auth_token,
                from_number,
            }),
            _ => None,
        };

        let monitor = MonitorConfig {
            buffer_capacity: std::env::var("FRAME_BUFFER_CAPACITY")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::frame_buffer::DEFAULT_CAPACITY),
            pop_timeout: Duration::from_millis(
                std::env::var("POP_TIMEOUT_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(1000),
            ),
            sample_interval: std::env::var("SAMPLE_INTERVAL")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::recognizer::DEFAULT_SAMPLE_INTERVAL),
            grace_frames: std::env::var("GRACE_FRAMES")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(crate::recording::DEFAULT_GRACE_FRAMES),
        };

        Self {
            database_url: std::env::var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite://facewatch.db".to_string()),
            engine_url: std::env::var("ENGINE_URL")
                .unwrap_or_else(|_| "http://localhost:9000".to_string()),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .ok()
                .and_then(|p| p.parse().ok())
                .unwrap_or(8080),
            recordings_dir: std::env::var("RECORDINGS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from("recordings")),
            recording_fps: std::env::var("RECORDING_FPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(20),
            s3_bucket: std::env::var("S3_BUCKET")
                .unwrap_or_else(|_| "face-recognition-alerts".to_string()),
            model: EngineModelConfig {
                model_name: std::env::var("MODEL_NAME")
                    .unwrap_or_else(|_| "Facenet".to_string()),
                distance_metric: std::env::var("DISTANCE_METRIC")
                    .unwrap_or_else(|_| "cosine".to_string()),
                threshold: std::env::var("RECOGNITION_THRESHOLD")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(0.35),
            },
            email,
            twilio,
            webhook_url: std::env::var("WEBHOOK_URL").ok(),
            monitor,
        }
    }
}

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database pool
    pub pool: SqlitePool,
    /// Application config
    pub config: AppConfig,
    /// Monitor registry (stream id -> running pipeline)
    pub registry: Arc<MonitorRegistry>,
    /// Stream repository
    pub streams: StreamRepository,
    /// Target repository
    pub targets: TargetRepository,
    /// Contact repository
    pub contacts: ContactRepository,
    /// Recognition engine client (health checks)
    pub engine: Arc<HttpRecognitionEngine>,
}
