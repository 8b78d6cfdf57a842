//! Recording artifact writers
//!
//! The state machine writes through the `RecordingWriter` trait; the
//! production implementation pipes raw BGR24 frames into an ffmpeg
//! encoder child producing one mp4 per session.

use crate::error::{Error, Result};
use crate::models::Frame;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::process::{Child, ChildStdin, Command};

/// How long finish() waits for the encoder to flush and exit
const ENCODER_FINISH_TIMEOUT: Duration = Duration::from_secs(15);

/// An open recording artifact.
///
/// `finish` flushes and closes the artifact; writing after `finish` is a
/// contract violation and implementations return an error for it.
#[async_trait]
pub trait RecordingWriter: Send {
    /// Path of the artifact being written
    fn path(&self) -> &Path;

    /// Append one frame
    async fn write_frame(&mut self, frame: &Frame) -> Result<()>;

    /// Flush and close the artifact (exactly once)
    async fn finish(&mut self) -> Result<()>;
}

/// Opens one writer per recording session.
#[async_trait]
pub trait RecordingWriterFactory: Send + Sync {
    async fn open(
        &self,
        stream_id: &str,
        started_at: DateTime<Utc>,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn RecordingWriter>>;
}

/// Factory for ffmpeg-encoded mp4 sessions under a stream-scoped directory.
///
/// Artifacts are named deterministically from the stream id and the
/// session start time: `<dir>/<stream_id>/<YYYYMMDD_HHMMSS>.mp4`.
pub struct FfmpegWriterFactory {
    recordings_dir: PathBuf,
    fps: u32,
}

impl FfmpegWriterFactory {
    pub fn new(recordings_dir: PathBuf, fps: u32) -> Self {
        Self {
            recordings_dir,
            fps: fps.max(1),
        }
    }

    /// Deterministic artifact path for a session
    pub fn session_path(&self, stream_id: &str, started_at: DateTime<Utc>) -> PathBuf {
        self.recordings_dir
            .join(stream_id)
            .join(format!("{}.mp4", started_at.format("%Y%m%d_%H%M%S")))
    }
}

#[async_trait]
impl RecordingWriterFactory for FfmpegWriterFactory {
    async fn open(
        &self,
        stream_id: &str,
        started_at: DateTime<Utc>,
        width: u32,
        height: u32,
    ) -> Result<Box<dyn RecordingWriter>> {
        let path = self.session_path(stream_id, started_at);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let writer = FfmpegRecordingWriter::spawn(path, width, height, self.fps).await?;
        Ok(Box::new(writer))
    }
}

/// ffmpeg encoder child consuming raw frames on stdin
pub struct FfmpegRecordingWriter {
    path: PathBuf,
    child: Option<Child>,
    stdin: Option<ChildStdin>,
}

impl FfmpegRecordingWriter {
    async fn spawn(path: PathBuf, width: u32, height: u32, fps: u32) -> Result<Self> {
        let size = format!("{}x{}", width, height);
        let rate = fps.to_string();
        let mut child = Command::new("ffmpeg")
            .args([
                "-f", "rawvideo",
                "-pix_fmt", "bgr24",
                "-s", &size,
                "-r", &rate,
                "-i", "-",
                "-pix_fmt", "yuv420p",
                "-loglevel", "error",
                "-y",
            ])
            .arg(&path)
            .stdin(Stdio::piped())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::RecordingWrite(format!("encoder spawn failed: {}", e)))?;

        let stdin = child.stdin.take().ok_or_else(|| {
            Error::RecordingWrite("encoder stdin unavailable".to_string())
        })?;

        Ok(Self {
            path,
            child: Some(child),
            stdin: Some(stdin),
        })
    }
}

#[async_trait]
impl RecordingWriter for FfmpegRecordingWriter {
    fn path(&self) -> &Path {
        &self.path
    }

    async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let stdin = self
            .stdin
            .as_mut()
            .ok_or_else(|| Error::RecordingWrite("writer already finished".to_string()))?;

        stdin
            .write_all(&frame.data)
            .await
            .map_err(|e| Error::RecordingWrite(format!("encoder write failed: {}", e)))?;
        Ok(())
    }

    async fn finish(&mut self) -> Result<()> {
        // Closing stdin tells the encoder to flush and exit
        self.stdin.take();

        let child = match self.child.as_mut() {
            Some(c) => c,
            None => return Ok(()),
        };

        match tokio::time::timeout(ENCODER_FINISH_TIMEOUT, child.wait()).await {
            Ok(Ok(status)) if status.success() => {
                self.child.take();
                Ok(())
            }
            Ok(Ok(status)) => {
                self.child.take();
                Err(Error::RecordingWrite(format!(
                    "encoder exited with {}",
                    status
                )))
            }
            Ok(Err(e)) => {
                self.child.take();
                Err(Error::RecordingWrite(format!("encoder wait failed: {}", e)))
            }
            Err(_) => {
                // kill_on_drop reaps the stuck encoder
                self.child.take();
                Err(Error::RecordingWrite("encoder flush timeout".to_string()))
            }
        }
    }
}
