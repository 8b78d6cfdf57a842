//! Recording - Detection-Driven Recording State Machine
//!
//! ## Responsibilities
//!
//! - Open a recording session on the first frame with matches
//! - Keep writing through a grace window of empty detections
//! - Close the session exactly once and emit a recording-finished event
//! - Overlay match regions best-effort (never aborts the write path)
//!
//! States: `Idle` (no session) and `Recording` (open session). Only the
//! processing loop touches a recorder; sessions are never shared.

mod annotate;
mod writer;

pub use annotate::draw_regions;
pub use writer::{FfmpegWriterFactory, RecordingWriter, RecordingWriterFactory};

use crate::models::Frame;
use crate::recognizer::FaceMatch;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::Arc;

/// Consecutive empty detections tolerated before a recording ends
pub const DEFAULT_GRACE_FRAMES: u32 = 15;

/// Emitted when a session closes naturally (grace window expired).
///
/// Forced closes (monitor stop) do not produce this event.
#[derive(Debug, Clone)]
pub struct RecordingFinished {
    pub stream_id: String,
    /// Identities seen during the episode, deduplicated, sorted
    pub identities: Vec<String>,
    pub path: PathBuf,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub first_seq: u64,
    pub last_seq: u64,
}

/// State carried while `recording == true`
struct RecordingSession {
    writer: Box<dyn RecordingWriter>,
    started_at: DateTime<Utc>,
    first_seq: u64,
    last_seq: u64,
    identities: BTreeSet<String>,
    empty_streak: u32,
}

/// Per-stream recording state machine.
pub struct Recorder {
    stream_id: String,
    factory: Arc<dyn RecordingWriterFactory>,
    grace_frames: u32,
    session: Option<RecordingSession>,
}

impl Recorder {
    pub fn new(
        stream_id: impl Into<String>,
        factory: Arc<dyn RecordingWriterFactory>,
        grace_frames: u32,
    ) -> Self {
        Self {
            stream_id: stream_id.into(),
            factory,
            grace_frames: grace_frames.max(1),
            session: None,
        }
    }

    pub fn is_recording(&self) -> bool {
        self.session.is_some()
    }

    /// Advance the state machine by one frame.
    ///
    /// `verdict` is `None` when the frame was skipped by sampling,
    /// `Some(matches)` when inference ran. Skipped frames are still
    /// written while recording but never move the grace counter.
    pub async fn on_frame(
        &mut self,
        frame: &Frame,
        verdict: Option<&[FaceMatch]>,
    ) -> Option<RecordingFinished> {
        match verdict {
            Some(matches) if !matches.is_empty() => {
                if self.session.is_none() && !self.open_session(frame).await {
                    return None;
                }
                if let Some(session) = self.session.as_mut() {
                    session
                        .identities
                        .extend(matches.iter().map(|m| m.target_id.clone()));
                    session.empty_streak = 0;
                }
                self.write(frame, Some(matches)).await;
                None
            }
            Some(_) => {
                // Sampled, nothing found: grace period while recording
                if self.session.is_none() {
                    return None;
                }
                if !self.write(frame, None).await {
                    return None;
                }
                let expired = match self.session.as_mut() {
                    Some(session) => {
                        session.empty_streak += 1;
                        session.empty_streak >= self.grace_frames
                    }
                    None => false,
                };
                if expired {
                    return self.close_session().await;
                }
                None
            }
            None => {
                // Skipped by sampling: keep writing, no state change
                if self.session.is_some() {
                    self.write(frame, None).await;
                }
                None
            }
        }
    }

    /// Force the session closed without emitting an event.
    ///
    /// Used on monitor stop: detection was interrupted, not concluded, so
    /// no alert should follow. Safe to call with no session open.
    pub async fn force_close(&mut self) {
        if let Some(mut session) = self.session.take() {
            if let Err(e) = session.writer.finish().await {
                tracing::warn!(
                    stream_id = %self.stream_id,
                    error = %e,
                    "Forced close: artifact flush failed"
                );
            } else {
                tracing::info!(
                    stream_id = %self.stream_id,
                    path = %session.writer.path().display(),
                    "Recording force-closed, no alert dispatched"
                );
            }
        }
    }

    async fn open_session(&mut self, frame: &Frame) -> bool {
        match self
            .factory
            .open(&self.stream_id, frame.captured_at, frame.width, frame.height)
            .await
        {
            Ok(writer) => {
                tracing::info!(
                    stream_id = %self.stream_id,
                    path = %writer.path().display(),
                    seq = frame.seq,
                    "Started recording"
                );
                self.session = Some(RecordingSession {
                    writer,
                    started_at: frame.captured_at,
                    first_seq: frame.seq,
                    last_seq: frame.seq,
                    identities: BTreeSet::new(),
                    empty_streak: 0,
                });
                true
            }
            Err(e) => {
                tracing::error!(
                    stream_id = %self.stream_id,
                    error = %e,
                    "Failed to open recording session"
                );
                false
            }
        }
    }

    /// Write one frame into the open session.
    ///
    /// A write failure abandons the session (best-effort close, no event):
    /// the monitor keeps running and a later detection opens a fresh one.
    /// Returns false when the session was abandoned.
    async fn write(&mut self, frame: &Frame, matches: Option<&[FaceMatch]>) -> bool {
        let session = match self.session.as_mut() {
            Some(s) => s,
            None => return false,
        };

        let annotated = matches.map(|m| {
            let regions: Vec<_> = m.iter().map(|fm| fm.region).collect();
            draw_regions(frame, &regions)
        });
        let to_write = annotated.as_ref().unwrap_or(frame);

        match session.writer.write_frame(to_write).await {
            Ok(()) => {
                session.last_seq = frame.seq;
                true
            }
            Err(e) => {
                tracing::error!(
                    stream_id = %self.stream_id,
                    seq = frame.seq,
                    error = %e,
                    "Frame write failed, abandoning session"
                );
                if let Some(mut dead) = self.session.take() {
                    let _ = dead.writer.finish().await;
                }
                false
            }
        }
    }

    async fn close_session(&mut self) -> Option<RecordingFinished> {
        let mut session = self.session.take()?;
        let path = session.writer.path().to_path_buf();

        if let Err(e) = session.writer.finish().await {
            // A possibly corrupt artifact is never announced
            tracing::error!(
                stream_id = %self.stream_id,
                path = %path.display(),
                error = %e,
                "Artifact close failed, suppressing recording-finished event"
            );
            return None;
        }

        let event = RecordingFinished {
            stream_id: self.stream_id.clone(),
            identities: session.identities.iter().cloned().collect(),
            path,
            started_at: session.started_at,
            ended_at: Utc::now(),
            first_seq: session.first_seq,
            last_seq: session.last_seq,
        };

        tracing::info!(
            stream_id = %self.stream_id,
            path = %event.path.display(),
            identities = ?event.identities,
            frames = event.last_seq - event.first_seq + 1,
            "Recording finished"
        );

        Some(event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{Error, Result};
    use crate::recognizer::BoundingBox;
    use async_trait::async_trait;
    use std::path::Path;
    use std::sync::Mutex;

    fn frame(seq: u64) -> Frame {
        Frame {
            seq,
            width: 8,
            height: 8,
            data: vec![0u8; Frame::expected_len(8, 8)],
            captured_at: Utc::now(),
        }
    }

    fn matches(ids: &[&str]) -> Vec<FaceMatch> {
        ids.iter()
            .map(|id| FaceMatch {
                target_id: id.to_string(),
                region: BoundingBox {
                    x: 1,
                    y: 1,
                    width: 4,
                    height: 4,
                },
                confidence: 0.9,
            })
            .collect()
    }

    /// Shared journal of everything a MemWriter saw
    #[derive(Default)]
    struct Journal {
        written: Vec<u64>,
        finish_calls: usize,
        opened: usize,
    }

    struct MemWriter {
        journal: Arc<Mutex<Journal>>,
        path: PathBuf,
        finished: bool,
        fail_writes: bool,
    }

    #[async_trait]
    impl RecordingWriter for MemWriter {
        fn path(&self) -> &Path {
            &self.path
        }

        async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
            if self.finished {
                return Err(Error::RecordingWrite("write after finish".to_string()));
            }
            if self.fail_writes {
                return Err(Error::RecordingWrite("disk full".to_string()));
            }
            self.journal.lock().unwrap().written.push(frame.seq);
            Ok(())
        }

        async fn finish(&mut self) -> Result<()> {
            assert!(!self.finished, "session closed twice");
            self.finished = true;
            self.journal.lock().unwrap().finish_calls += 1;
            Ok(())
        }
    }

    struct MemFactory {
        journal: Arc<Mutex<Journal>>,
        fail_writes: bool,
    }

    #[async_trait]
    impl RecordingWriterFactory for MemFactory {
        async fn open(
            &self,
            stream_id: &str,
            started_at: DateTime<Utc>,
            _width: u32,
            _height: u32,
        ) -> Result<Box<dyn RecordingWriter>> {
            self.journal.lock().unwrap().opened += 1;
            Ok(Box::new(MemWriter {
                journal: self.journal.clone(),
                path: PathBuf::from(format!(
                    "recordings/{}/{}.mp4",
                    stream_id,
                    started_at.format("%Y%m%d_%H%M%S")
                )),
                finished: false,
                fail_writes: self.fail_writes,
            }))
        }
    }

    fn recorder(journal: &Arc<Mutex<Journal>>, grace: u32) -> Recorder {
        Recorder::new(
            "s-1",
            Arc::new(MemFactory {
                journal: journal.clone(),
                fail_writes: false,
            }),
            grace,
        )
    }

    #[tokio::test]
    async fn test_episode_with_grace_window() {
        // Matches on frames 5..=7, empty elsewhere, grace 3:
        // opens at 5, closes after the 3rd empty frame (10),
        // artifact holds exactly frames 5..=10.
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = recorder(&journal, 3);

        let mut event = None;
        for seq in 1..=12 {
            let verdict = if (5..=7).contains(&seq) {
                matches(&["t-1"])
            } else {
                Vec::new()
            };
            if let Some(e) = rec.on_frame(&frame(seq), Some(&verdict)).await {
                assert!(event.is_none(), "more than one event per episode");
                event = Some(e);
            }
        }

        let event = event.expect("recording should have finished");
        assert_eq!(event.first_seq, 5);
        assert_eq!(event.last_seq, 10);
        assert_eq!(event.identities, vec!["t-1".to_string()]);
        assert!(!rec.is_recording());

        let journal = journal.lock().unwrap();
        assert_eq!(journal.written, vec![5, 6, 7, 8, 9, 10]);
        assert_eq!(journal.finish_calls, 1);
        assert_eq!(journal.opened, 1);
    }

    #[tokio::test]
    async fn test_matches_reset_grace_counter() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = recorder(&journal, 3);

        // open
        assert!(rec.on_frame(&frame(1), Some(&matches(&["a"]))).await.is_none());
        // two empties, then a match: streak resets
        assert!(rec.on_frame(&frame(2), Some(&[])).await.is_none());
        assert!(rec.on_frame(&frame(3), Some(&[])).await.is_none());
        assert!(rec.on_frame(&frame(4), Some(&matches(&["b"]))).await.is_none());
        // needs three fresh empties to close
        assert!(rec.on_frame(&frame(5), Some(&[])).await.is_none());
        assert!(rec.on_frame(&frame(6), Some(&[])).await.is_none());
        let event = rec.on_frame(&frame(7), Some(&[])).await.unwrap();

        assert_eq!(event.identities, vec!["a".to_string(), "b".to_string()]);
        assert_eq!(event.last_seq, 7);
    }

    #[tokio::test]
    async fn test_skipped_frames_written_without_state_change() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = recorder(&journal, 2);

        rec.on_frame(&frame(1), Some(&matches(&["a"]))).await;
        // Unsampled frames: written, grace untouched
        rec.on_frame(&frame(2), None).await;
        rec.on_frame(&frame(3), None).await;
        assert!(rec.is_recording());

        rec.on_frame(&frame(4), Some(&[])).await;
        let event = rec.on_frame(&frame(5), Some(&[])).await.unwrap();

        assert_eq!(journal.lock().unwrap().written, vec![1, 2, 3, 4, 5]);
        assert_eq!(event.last_seq, 5);
    }

    #[tokio::test]
    async fn test_idle_frames_do_nothing() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = recorder(&journal, 3);

        assert!(rec.on_frame(&frame(1), Some(&[])).await.is_none());
        assert!(rec.on_frame(&frame(2), None).await.is_none());
        assert!(!rec.is_recording());
        assert!(journal.lock().unwrap().written.is_empty());
        assert_eq!(journal.lock().unwrap().opened, 0);
    }

    #[tokio::test]
    async fn test_write_failure_abandons_session_without_event() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = Recorder::new(
            "s-1",
            Arc::new(MemFactory {
                journal: journal.clone(),
                fail_writes: true,
            }),
            3,
        );

        let event = rec.on_frame(&frame(1), Some(&matches(&["a"]))).await;
        assert!(event.is_none());
        assert!(!rec.is_recording());
        // Abandoned session was still closed best-effort
        assert_eq!(journal.lock().unwrap().finish_calls, 1);

        // Later detections open a fresh session
        journal.lock().unwrap().finish_calls = 0;
        rec.on_frame(&frame(10), Some(&matches(&["a"]))).await;
        assert_eq!(journal.lock().unwrap().opened, 2);
    }

    #[tokio::test]
    async fn test_force_close_no_event_and_idempotent() {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let mut rec = recorder(&journal, 3);

        rec.on_frame(&frame(1), Some(&matches(&["a"]))).await;
        assert!(rec.is_recording());

        rec.force_close().await;
        assert!(!rec.is_recording());
        assert_eq!(journal.lock().unwrap().finish_calls, 1);

        // Second call is a no-op
        rec.force_close().await;
        assert_eq!(journal.lock().unwrap().finish_calls, 1);
    }
}
