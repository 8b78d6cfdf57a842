//! Recognizer - Face Recognition Engine Adapter
//!
//! ## Responsibilities
//!
//! - Send frames to the external recognition engine
//! - Parse match results into a uniform list
//! - Subsample frames (every K-th) to bound CPU cost
//! - Treat per-frame engine failures as "no matches", never as fatal
//!
//! The matching algorithm, model, and distance metric are the engine's
//! business; this module only carries the configuration through.

use crate::error::{Error, Result};
use crate::models::Frame;
use async_trait::async_trait;
use image::codecs::jpeg::JpegEncoder;
use reqwest::multipart::{Form, Part};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Default sampling interval: run inference on every 15th frame
pub const DEFAULT_SAMPLE_INTERVAL: u64 = 15;

/// JPEG quality for frames sent to the engine
const ENGINE_JPEG_QUALITY: u8 = 85;

/// Region of a matched face within the frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

/// One identified face in one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceMatch {
    /// Identity label of the matched target
    pub target_id: String,
    pub region: BoundingBox,
    /// Engine-reported confidence score
    pub confidence: f32,
}

/// Model configuration passed through to the engine
#[derive(Debug, Clone, Serialize)]
pub struct EngineModelConfig {
    pub model_name: String,
    pub distance_metric: String,
    pub threshold: f32,
}

impl Default for EngineModelConfig {
    fn default() -> Self {
        Self {
            model_name: "Facenet".to_string(),
            distance_metric: "cosine".to_string(),
            threshold: 0.35,
        }
    }
}

/// The external recognition engine boundary.
#[async_trait]
pub trait RecognitionEngine: Send + Sync {
    /// Run inference on one frame, returning zero or more matches.
    async fn identify(&self, stream_id: &str, frame: &Frame) -> Result<Vec<FaceMatch>>;
}

/// Engine response body
#[derive(Debug, Deserialize)]
struct IdentifyResponse {
    #[serde(default)]
    matches: Vec<FaceMatch>,
}

/// HTTP client for the recognition engine
pub struct HttpRecognitionEngine {
    client: reqwest::Client,
    base_url: String,
    model: EngineModelConfig,
}

impl HttpRecognitionEngine {
    /// Create new engine client
    pub fn new(base_url: String, model: EngineModelConfig) -> Self {
        Self::with_timeout(base_url, model, Duration::from_secs(30))
    }

    /// Create new engine client with custom timeout
    pub fn with_timeout(base_url: String, model: EngineModelConfig, timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("Failed to create HTTP client");

        Self {
            client,
            base_url,
            model,
        }
    }

    /// Check engine health
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/healthz", self.base_url);
        match self.client.get(&url).send().await {
            Ok(resp) => Ok(resp.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RecognitionEngine for HttpRecognitionEngine {
    async fn identify(&self, stream_id: &str, frame: &Frame) -> Result<Vec<FaceMatch>> {
        let url = format!("{}/v1/identify", self.base_url);
        let jpeg = encode_jpeg(frame)?;

        let form = Form::new()
            .part(
                "frame",
                Part::bytes(jpeg)
                    .file_name("frame.jpg")
                    .mime_str("image/jpeg")
                    .map_err(|e| Error::Inference(format!("multipart build failed: {}", e)))?,
            )
            .text("stream_id", stream_id.to_string())
            .text("captured_at", frame.captured_at.to_rfc3339())
            .text("model_name", self.model.model_name.clone())
            .text("distance_metric", self.model.distance_metric.clone())
            .text("threshold", self.model.threshold.to_string());

        let resp = self
            .client
            .post(&url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| Error::Inference(format!("engine request failed: {}", e)))?;

        if !resp.status().is_success() {
            return Err(Error::Inference(format!(
                "engine returned {}",
                resp.status()
            )));
        }

        let result: IdentifyResponse = resp
            .json()
            .await
            .map_err(|e| Error::Inference(format!("engine response parse failed: {}", e)))?;

        Ok(result.matches)
    }
}

/// Encode a BGR24 frame as JPEG for the engine
fn encode_jpeg(frame: &Frame) -> Result<Vec<u8>> {
    // BGR -> RGB
    let mut rgb = frame.data.clone();
    for px in rgb.chunks_exact_mut(3) {
        px.swap(0, 2);
    }

    let mut jpeg = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut jpeg, ENGINE_JPEG_QUALITY);
    encoder
        .encode(
            &rgb,
            frame.width,
            frame.height,
            image::ExtendedColorType::Rgb8,
        )
        .map_err(|e| Error::Inference(format!("jpeg encode failed: {}", e)))?;

    Ok(jpeg)
}

/// Frame-level adapter: sampling plus failure policy.
///
/// `process` returns:
/// - `None` when the frame was skipped by sampling (no verdict),
/// - `Some(matches)` when the engine ran (possibly empty).
///
/// The distinction matters downstream: the recording grace counter only
/// advances on a sampled frame with no matches, never on a skipped frame.
pub struct RecognitionAdapter {
    engine: Arc<dyn RecognitionEngine>,
    sample_interval: u64,
}

impl RecognitionAdapter {
    pub fn new(engine: Arc<dyn RecognitionEngine>, sample_interval: u64) -> Self {
        Self {
            engine,
            sample_interval: sample_interval.max(1),
        }
    }

    /// Run inference if this frame falls on the sampling grid.
    ///
    /// An engine failure is logged and reported as an empty match list;
    /// it must never stop the processing loop.
    pub async fn process(&self, stream_id: &str, frame: &Frame) -> Option<Vec<FaceMatch>> {
        if frame.seq % self.sample_interval != 0 {
            return None;
        }

        match self.engine.identify(stream_id, frame).await {
            Ok(matches) => Some(matches),
            Err(e) => {
                tracing::warn!(
                    stream_id = %stream_id,
                    seq = frame.seq,
                    error = %e,
                    "Inference failed, treating frame as no matches"
                );
                Some(Vec::new())
            }
        }
    }

    pub fn sample_interval(&self) -> u64 {
        self.sample_interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn frame(seq: u64) -> Frame {
        Frame {
            seq,
            width: 4,
            height: 4,
            data: vec![0u8; 48],
            captured_at: Utc::now(),
        }
    }

    struct CountingEngine {
        calls: AtomicUsize,
        fail: bool,
    }

    #[async_trait]
    impl RecognitionEngine for CountingEngine {
        async fn identify(&self, _stream_id: &str, _frame: &Frame) -> Result<Vec<FaceMatch>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                Err(Error::Inference("engine down".to_string()))
            } else {
                Ok(vec![FaceMatch {
                    target_id: "t-1".to_string(),
                    region: BoundingBox {
                        x: 0,
                        y: 0,
                        width: 2,
                        height: 2,
                    },
                    confidence: 0.9,
                }])
            }
        }
    }

    #[tokio::test]
    async fn test_sampling_skips_off_grid_frames() {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let adapter = RecognitionAdapter::new(engine.clone(), 15);

        for seq in 1..=30 {
            let verdict = adapter.process("s-1", &frame(seq)).await;
            if seq % 15 == 0 {
                assert!(verdict.is_some());
            } else {
                assert!(verdict.is_none());
            }
        }

        // Exactly one engine call per sampled frame (15 and 30)
        assert_eq!(engine.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_engine_failure_becomes_empty_matches() {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            fail: true,
        });
        let adapter = RecognitionAdapter::new(engine, 1);

        let verdict = adapter.process("s-1", &frame(1)).await;
        assert_eq!(verdict, Some(Vec::new()));
    }

    #[tokio::test]
    async fn test_interval_of_one_samples_everything() {
        let engine = Arc::new(CountingEngine {
            calls: AtomicUsize::new(0),
            fail: false,
        });
        let adapter = RecognitionAdapter::new(engine.clone(), 1);

        for seq in 1..=5 {
            assert!(adapter.process("s-1", &frame(seq)).await.is_some());
        }
        assert_eq!(engine.calls.load(Ordering::SeqCst), 5);
    }

    #[test]
    fn test_encode_jpeg_produces_jpeg_magic() {
        let f = frame(1);
        let jpeg = encode_jpeg(&f).unwrap();
        assert!(jpeg.starts_with(&[0xFF, 0xD8]));
    }
}
