//! Shared models and types
//!
//! This module contains types shared across multiple modules
//! to avoid circular dependencies.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Standard API response wrapper
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiResponse<T> {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> ApiResponse<T> {
    pub fn success(data: T) -> Self {
        Self {
            ok: true,
            data: Some(data),
            message: None,
            error: None,
        }
    }

    pub fn success_with_message(data: T, msg: impl Into<String>) -> Self {
        Self {
            ok: true,
            data: Some(data),
            message: Some(msg.into()),
            error: None,
        }
    }

    pub fn error(msg: impl Into<String>) -> Self {
        Self {
            ok: false,
            data: None,
            message: None,
            error: Some(msg.into()),
        }
    }
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub engine_connected: bool,
    pub db_connected: bool,
    pub active_monitors: usize,
}

/// A single decoded video frame (BGR24 pixel buffer).
///
/// Produced by the capture loop, which stamps the monotonically increasing
/// sequence number. Ownership moves through the pipeline with the frame;
/// no two stages ever hold the same frame mutably.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Monotonic per-stream sequence number (starts at 1)
    pub seq: u64,
    pub width: u32,
    pub height: u32,
    /// Raw BGR24 pixels, `width * height * 3` bytes
    pub data: Vec<u8>,
    pub captured_at: DateTime<Utc>,
}

impl Frame {
    /// Expected byte length for the frame's dimensions
    pub fn expected_len(width: u32, height: u32) -> usize {
        width as usize * height as usize * 3
    }
}
