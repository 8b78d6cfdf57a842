//! StreamMonitor - Per-Stream Capture/Inference/Recording Pipeline
//!
//! ## Responsibilities
//!
//! - Run one capture task and one processing task around a shared frame
//!   buffer for a single stream
//! - Cooperative stop: both loops check the liveness flag every
//!   iteration; `stop()` joins them (worst case one buffer pop timeout)
//! - Force-close an open recording on stop, with no alert
//! - Mark the stream inactive in the store when the source dies on its own
//!
//! A monitor exists only in the running state: `start` is the
//! constructor, `stop` consumes it. There is no way to start one twice.

use crate::alerts::AlertDispatcher;
use crate::frame_buffer::{FrameBuffer, PushOutcome};
use crate::frame_source::FrameSource;
use crate::models::Frame;
use crate::recognizer::RecognitionAdapter;
use crate::recording::Recorder;
use crate::store::StreamRepository;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

/// Pipeline tunables, shared by every monitor the registry starts
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Frame buffer capacity (drop-oldest beyond this)
    pub buffer_capacity: usize,
    /// Blocking-pop window; also bounds stop latency
    pub pop_timeout: Duration,
    /// Run inference on every K-th frame
    pub sample_interval: u64,
    /// Consecutive empty detections before a recording closes
    pub grace_frames: u32,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: crate::frame_buffer::DEFAULT_CAPACITY,
            pop_timeout: Duration::from_secs(1),
            sample_interval: crate::recognizer::DEFAULT_SAMPLE_INTERVAL,
            grace_frames: crate::recording::DEFAULT_GRACE_FRAMES,
        }
    }
}

/// A running per-stream pipeline
pub struct StreamMonitor {
    stream_id: String,
    running: Arc<AtomicBool>,
    external_stop: Arc<AtomicBool>,
    capture: JoinHandle<()>,
    process: JoinHandle<()>,
}

/// Signals shared by the two pipeline tasks
#[derive(Clone)]
struct PipelineSignals {
    /// Cleared by stop(); both loops exit promptly, dropping queued frames
    running: Arc<AtomicBool>,
    /// Set by the capture loop on end-of-stream or read failure; the
    /// processing loop drains the buffer first, then winds down
    source_done: Arc<AtomicBool>,
    /// Set when the shutdown came from stop() rather than source loss
    external_stop: Arc<AtomicBool>,
}

impl StreamMonitor {
    /// Launch the pipeline over an already-open source.
    ///
    /// The capture loop and the processing loop are independently
    /// scheduled tasks sharing only the frame buffer.
    pub fn start(
        stream_id: String,
        source: Box<dyn FrameSource>,
        adapter: RecognitionAdapter,
        recorder: Recorder,
        dispatcher: Arc<AlertDispatcher>,
        streams: StreamRepository,
        config: &MonitorConfig,
    ) -> Self {
        let signals = PipelineSignals {
            running: Arc::new(AtomicBool::new(true)),
            source_done: Arc::new(AtomicBool::new(false)),
            external_stop: Arc::new(AtomicBool::new(false)),
        };
        let buffer = Arc::new(FrameBuffer::new(config.buffer_capacity));

        let capture = tokio::spawn(capture_loop(
            stream_id.clone(),
            source,
            buffer.clone(),
            signals.clone(),
        ));

        let process = tokio::spawn(process_loop(
            stream_id.clone(),
            buffer,
            adapter,
            recorder,
            dispatcher,
            streams,
            signals.clone(),
            config.pop_timeout,
        ));

        tracing::info!(stream_id = %stream_id, "Stream monitor started");

        Self {
            stream_id,
            running: signals.running,
            external_stop: signals.external_stop,
            capture,
            process,
        }
    }

    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Whether the pipeline is still alive.
    ///
    /// False once the processing task has wound down, whether from
    /// stop() or from source loss.
    pub fn is_running(&self) -> bool {
        !self.process.is_finished()
    }

    /// Signal both loops and wait for them to exit.
    ///
    /// Consumes the monitor; a stopped pipeline cannot be restarted.
    /// Safe to call on a pipeline that already died on its own.
    pub async fn stop(self) {
        self.external_stop.store(true, Ordering::Relaxed);
        self.running.store(false, Ordering::Relaxed);

        if let Err(e) = self.capture.await {
            tracing::error!(stream_id = %self.stream_id, error = %e, "Capture task panicked");
        }
        if let Err(e) = self.process.await {
            tracing::error!(stream_id = %self.stream_id, error = %e, "Processing task panicked");
        }

        tracing::info!(stream_id = %self.stream_id, "Stream monitor stopped");
    }
}

/// Read frames as fast as the source allows and push them at the buffer.
///
/// No back-pressure toward the source: overload is absorbed by the
/// buffer's drop-oldest policy. Read failure or end-of-stream raises
/// `source_done`, which winds the whole monitor down once the buffer
/// has drained.
async fn capture_loop(
    stream_id: String,
    mut source: Box<dyn FrameSource>,
    buffer: Arc<FrameBuffer>,
    signals: PipelineSignals,
) {
    let width = source.width();
    let height = source.height();
    let mut seq = 0u64;
    let mut dropped = 0u64;

    loop {
        if !signals.running.load(Ordering::Relaxed) {
            break;
        }

        match source.read_frame().await {
            Ok(Some(data)) => {
                seq += 1;
                let frame = Frame {
                    seq,
                    width,
                    height,
                    data,
                    captured_at: Utc::now(),
                };
                if let PushOutcome::Evicted(_) = buffer.push(frame).await {
                    dropped += 1;
                    if dropped == 1 || dropped % 100 == 0 {
                        tracing::debug!(
                            stream_id = %stream_id,
                            dropped = dropped,
                            "Processing is behind, dropping oldest frames"
                        );
                    }
                }
            }
            Ok(None) => {
                tracing::info!(
                    stream_id = %stream_id,
                    frames = seq,
                    "Stream ended"
                );
                signals.source_done.store(true, Ordering::Relaxed);
                break;
            }
            Err(e) => {
                tracing::warn!(
                    stream_id = %stream_id,
                    error = %e,
                    "Frame read failed, stopping monitor"
                );
                signals.source_done.store(true, Ordering::Relaxed);
                break;
            }
        }
    }

    source.close().await;
}

/// Pop frames, run recognition, drive the recorder, dispatch alerts.
///
/// On external stop the loop exits at the next iteration, dropping
/// whatever is still queued. When the source ends on its own the buffer
/// is drained first, so a naturally-ended stream is processed to the
/// last captured frame.
#[allow(clippy::too_many_arguments)]
async fn process_loop(
    stream_id: String,
    buffer: Arc<FrameBuffer>,
    adapter: RecognitionAdapter,
    mut recorder: Recorder,
    dispatcher: Arc<AlertDispatcher>,
    streams: StreamRepository,
    signals: PipelineSignals,
    pop_timeout: Duration,
) {
    loop {
        if !signals.running.load(Ordering::Relaxed) {
            break;
        }

        // Timing out here is how the stop signal stays observable
        let Some(frame) = buffer.pop(pop_timeout).await else {
            if signals.source_done.load(Ordering::Relaxed) && buffer.is_empty().await {
                break;
            }
            continue;
        };

        let verdict = adapter.process(&stream_id, &frame).await;
        if let Some(event) = recorder.on_frame(&frame, verdict.as_deref()).await {
            dispatcher.dispatch(&event).await;
        }
    }

    // An interrupted session is flushed but never alerted
    recorder.force_close().await;

    if !signals.external_stop.load(Ordering::Relaxed) {
        // The source died on its own: keep the durable flag in sync
        match streams.set_active(&stream_id, false, None).await {
            Ok(()) => {
                tracing::info!(
                    stream_id = %stream_id,
                    "Stream marked inactive after source loss"
                );
            }
            Err(e) => {
                tracing::error!(
                    stream_id = %stream_id,
                    error = %e,
                    "Failed to mark stream inactive after source loss"
                );
            }
        }
    }
}
