//! FrameSource - Stream Ingest Abstraction
//!
//! ## Responsibilities
//!
//! - Open a stream by locator (network URL, file path, or device index)
//! - Deliver decoded BGR24 frames one at a time
//! - Release the underlying transport on close
//!
//! The capture loop is written against the `FrameSource` trait so the
//! pipeline runs identically over RTSP cameras, video files, local capture
//! devices, and scripted in-process sources in tests.

mod ffmpeg;

pub use ffmpeg::{FfmpegSource, FfmpegSourceOpener};

use crate::error::Result;
use async_trait::async_trait;

/// Where a stream comes from.
///
/// A bare small integer (`"0"`, `"1"`) is a local capture device index,
/// anything else is treated as a URL or file path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamLocator {
    Url(String),
    Device(u32),
}

impl StreamLocator {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u32>() {
            Ok(index) => StreamLocator::Device(index),
            Err(_) => StreamLocator::Url(raw.trim().to_string()),
        }
    }
}

impl std::fmt::Display for StreamLocator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            StreamLocator::Url(url) => write!(f, "{}", url),
            StreamLocator::Device(index) => write!(f, "device:{}", index),
        }
    }
}

/// An open stream delivering raw BGR24 frames.
#[async_trait]
pub trait FrameSource: Send {
    /// Frame width in pixels
    fn width(&self) -> u32;

    /// Frame height in pixels
    fn height(&self) -> u32;

    /// Read the next frame's pixel data.
    ///
    /// Returns `Ok(None)` when the stream has ended. An `Err` means the
    /// source died mid-stream; both terminate the capture loop.
    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>>;

    /// Release the underlying transport. Safe to call more than once.
    async fn close(&mut self);
}

/// Opens frame sources by locator.
#[async_trait]
pub trait FrameSourceOpener: Send + Sync {
    /// Open the locator, or fail with `Error::SourceUnavailable`.
    async fn open(&self, locator: &StreamLocator) -> Result<Box<dyn FrameSource>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_locator_parse_device_index() {
        assert_eq!(StreamLocator::parse("0"), StreamLocator::Device(0));
        assert_eq!(StreamLocator::parse("3"), StreamLocator::Device(3));
    }

    #[test]
    fn test_locator_parse_url() {
        assert_eq!(
            StreamLocator::parse("rtsp://cam.local:554/stream"),
            StreamLocator::Url("rtsp://cam.local:554/stream".to_string())
        );
        assert_eq!(
            StreamLocator::parse("/data/clips/entrance.mp4"),
            StreamLocator::Url("/data/clips/entrance.mp4".to_string())
        );
    }
}
