//! Shared fakes for pipeline and registry tests

use crate::alerts::AlertDispatcher;
use crate::error::{Error, Result};
use crate::frame_source::{FrameSource, FrameSourceOpener, StreamLocator};
use crate::models::Frame;
use crate::notifications::{AlertMessage, NotificationSink};
use crate::recognizer::{BoundingBox, FaceMatch, RecognitionEngine};
use crate::recording::{RecordingWriter, RecordingWriterFactory};
use crate::storage::ObjectStore;
use crate::store::{ContactRecord, ContactRepository};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;
use std::ops::RangeInclusive;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-process frame source producing fixed-size blank frames
pub struct ScriptedSource {
    total: Option<u64>,
    produced: u64,
    delay: Duration,
    width: u32,
    height: u32,
}

impl ScriptedSource {
    /// Produce `total` frames, then end-of-stream
    pub fn finite(total: u64, delay: Duration) -> Self {
        Self {
            total: Some(total),
            produced: 0,
            delay,
            width: 4,
            height: 4,
        }
    }

    /// Produce frames until closed
    pub fn endless(delay: Duration) -> Self {
        Self {
            total: None,
            produced: 0,
            delay,
            width: 4,
            height: 4,
        }
    }
}

#[async_trait]
impl FrameSource for ScriptedSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        if let Some(total) = self.total {
            if self.produced >= total {
                return Ok(None);
            }
        }
        tokio::time::sleep(self.delay).await;
        self.produced += 1;
        Ok(Some(vec![0u8; Frame::expected_len(self.width, self.height)]))
    }

    async fn close(&mut self) {}
}

/// Opener handing out scripted sources, or refusing to open at all
pub struct ScriptedOpener {
    fail: bool,
    frames_per_source: Option<u64>,
    pub opened: AtomicUsize,
}

impl ScriptedOpener {
    pub fn working_endless() -> Self {
        Self {
            fail: false,
            frames_per_source: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn working_finite(frames: u64) -> Self {
        Self {
            fail: false,
            frames_per_source: Some(frames),
            opened: AtomicUsize::new(0),
        }
    }

    pub fn broken() -> Self {
        Self {
            fail: true,
            frames_per_source: None,
            opened: AtomicUsize::new(0),
        }
    }

    pub fn open_count(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl FrameSourceOpener for ScriptedOpener {
    async fn open(&self, locator: &StreamLocator) -> Result<Box<dyn FrameSource>> {
        if self.fail {
            return Err(Error::SourceUnavailable(format!("cannot open {}", locator)));
        }
        self.opened.fetch_add(1, Ordering::SeqCst);
        let source = match self.frames_per_source {
            Some(n) => ScriptedSource::finite(n, Duration::from_millis(2)),
            None => ScriptedSource::endless(Duration::from_millis(5)),
        };
        Ok(Box::new(source))
    }
}

/// Engine matching a scripted set of frame sequence numbers
pub struct ScriptedEngine {
    mode: EngineMode,
}

enum EngineMode {
    Range(RangeInclusive<u64>),
    Always,
    Never,
}

impl ScriptedEngine {
    pub fn matching(range: RangeInclusive<u64>) -> Self {
        Self {
            mode: EngineMode::Range(range),
        }
    }

    pub fn always_match() -> Self {
        Self {
            mode: EngineMode::Always,
        }
    }

    pub fn never_match() -> Self {
        Self {
            mode: EngineMode::Never,
        }
    }
}

#[async_trait]
impl RecognitionEngine for ScriptedEngine {
    async fn identify(&self, _stream_id: &str, frame: &Frame) -> Result<Vec<FaceMatch>> {
        let hit = match &self.mode {
            EngineMode::Range(range) => range.contains(&frame.seq),
            EngineMode::Always => true,
            EngineMode::Never => false,
        };
        if hit {
            Ok(vec![FaceMatch {
                target_id: "t-1".to_string(),
                region: BoundingBox {
                    x: 0,
                    y: 0,
                    width: 2,
                    height: 2,
                },
                confidence: 0.95,
            }])
        } else {
            Ok(Vec::new())
        }
    }
}

/// What the in-memory recording writers observed
#[derive(Default)]
struct JournalInner {
    written: Vec<u64>,
    finish_calls: usize,
    opened: usize,
}

/// Cloneable handle over a writer journal
#[derive(Clone)]
pub struct SharedJournal(Arc<Mutex<JournalInner>>);

impl SharedJournal {
    pub fn new() -> Self {
        Self(Arc::new(Mutex::new(JournalInner::default())))
    }

    pub fn written(&self) -> Vec<u64> {
        self.0.lock().unwrap().written.clone()
    }

    pub fn finish_calls(&self) -> usize {
        self.0.lock().unwrap().finish_calls
    }

    pub fn opened(&self) -> usize {
        self.0.lock().unwrap().opened
    }
}

/// In-memory recording writer feeding a SharedJournal
pub struct MemWriter {
    journal: SharedJournal,
    path: PathBuf,
    finished: bool,
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
        self.journal.0.lock().unwrap().written.push(frame.seq);
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        assert!(!self.finished, "session closed twice");
        self.finished = true;
        self.journal.0.lock().unwrap().finish_calls += 1;
        Ok(())
    }
}

/// Factory handing out MemWriters over one shared journal
pub struct MemFactory {
    journal: SharedJournal,
}

impl MemFactory {
    pub fn shared(journal: &SharedJournal) -> Arc<dyn RecordingWriterFactory> {
        Arc::new(Self {
            journal: journal.clone(),
        })
    }
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
        self.journal.0.lock().unwrap().opened += 1;
        Ok(Box::new(MemWriter {
            journal: self.journal.clone(),
            path: PathBuf::from(format!(
                "recordings/{}/{}.mp4",
                stream_id,
                started_at.format("%Y%m%d_%H%M%S")
            )),
            finished: false,
        }))
    }
}

/// Upload counter standing in for S3
pub struct CountingObjectStore {
    uploads: AtomicUsize,
    fail: bool,
}

impl CountingObjectStore {
    pub fn ok() -> Self {
        Self {
            uploads: AtomicUsize::new(0),
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            uploads: AtomicUsize::new(0),
            fail: true,
        }
    }

    pub fn uploads(&self) -> usize {
        self.uploads.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ObjectStore for CountingObjectStore {
    async fn upload(&self, _local_path: &Path, object_key: &str) -> Result<String> {
        self.uploads.fetch_add(1, Ordering::SeqCst);
        if self.fail {
            Err(Error::Upload("bucket offline".to_string()))
        } else {
            Ok(format!("https://clips.example.com/{}", object_key))
        }
    }
}

/// Notification counter standing in for real sinks
pub struct CountingSink {
    calls: AtomicUsize,
}

impl CountingSink {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NotificationSink for CountingSink {
    fn name(&self) -> &'static str {
        "counting"
    }

    async fn notify(&self, _alert: &AlertMessage, _recipients: &[ContactRecord]) -> Result<()> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Dispatcher wired to counting fakes over the given pool's contacts
pub async fn dispatcher_with(
    store: Arc<CountingObjectStore>,
    sink: Arc<CountingSink>,
    pool: SqlitePool,
) -> Arc<AlertDispatcher> {
    Arc::new(AlertDispatcher::new(
        store,
        vec![sink],
        ContactRepository::new(pool),
    ))
}
