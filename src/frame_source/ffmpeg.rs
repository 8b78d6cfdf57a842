//! ffmpeg-backed frame source
//!
//! Decodes any input ffmpeg can open (RTSP/HTTP URLs, files, V4L2 devices)
//! into raw BGR24 frames on stdout. Dimensions are probed with ffprobe
//! before the decoder is spawned so every frame read is a fixed-size
//! `read_exact`.
//!
//! Child processes are spawned with `kill_on_drop(true)` so an abandoned
//! source can never leave a zombie decoder behind.

use super::{FrameSource, FrameSourceOpener, StreamLocator};
use crate::error::{Error, Result};
use crate::models::Frame;
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, ChildStdout, Command};

/// ffprobe timeout; opening is allowed to be slow for RTSP handshakes
const PROBE_TIMEOUT: Duration = Duration::from_secs(15);

/// Opener spawning one ffmpeg decoder per stream
pub struct FfmpegSourceOpener;

#[async_trait]
impl FrameSourceOpener for FfmpegSourceOpener {
    async fn open(&self, locator: &StreamLocator) -> Result<Box<dyn FrameSource>> {
        let source = FfmpegSource::open(locator).await?;
        Ok(Box::new(source))
    }
}

/// A running ffmpeg decoder piping BGR24 frames to stdout
pub struct FfmpegSource {
    child: Option<Child>,
    stdout: Option<ChildStdout>,
    width: u32,
    height: u32,
    frame_len: usize,
}

impl FfmpegSource {
    /// Probe the input and spawn the decoder.
    pub async fn open(locator: &StreamLocator) -> Result<Self> {
        let (width, height) = probe_dimensions(locator).await?;

        let mut cmd = Command::new("ffmpeg");
        input_args(&mut cmd, locator);
        cmd.args([
            "-f", "rawvideo",
            "-pix_fmt", "bgr24",
            "-loglevel", "error",
            "-",
        ]);

        let mut child = cmd
            .stdout(Stdio::piped())
            .stderr(Stdio::null())
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                Error::SourceUnavailable(format!("ffmpeg spawn failed for {}: {}", locator, e))
            })?;

        let stdout = child.stdout.take().ok_or_else(|| {
            Error::SourceUnavailable(format!("ffmpeg stdout unavailable for {}", locator))
        })?;

        tracing::info!(
            locator = %locator,
            width = width,
            height = height,
            "Frame source opened"
        );

        Ok(Self {
            child: Some(child),
            stdout: Some(stdout),
            width,
            height,
            frame_len: Frame::expected_len(width, height),
        })
    }
}

#[async_trait]
impl FrameSource for FfmpegSource {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }

    async fn read_frame(&mut self) -> Result<Option<Vec<u8>>> {
        let stdout = match self.stdout.as_mut() {
            Some(s) => s,
            None => return Ok(None),
        };

        let mut data = vec![0u8; self.frame_len];
        match stdout.read_exact(&mut data).await {
            Ok(_) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(Error::SourceUnavailable(format!(
                "frame read failed: {}",
                e
            ))),
        }
    }

    async fn close(&mut self) {
        self.stdout.take();
        if let Some(mut child) = self.child.take() {
            let _ = child.kill().await;
            let _ = child.wait().await;
            tracing::debug!("Frame source decoder terminated");
        }
    }
}

/// Add the input arguments for a locator (transport options differ per kind)
fn input_args(cmd: &mut Command, locator: &StreamLocator) {
    match locator {
        StreamLocator::Url(url) => {
            if url.starts_with("rtsp://") {
                // TCP is the reliable transport for RTSP cameras
                cmd.args(["-rtsp_transport", "tcp"]);
            }
            cmd.args(["-i", url]);
        }
        StreamLocator::Device(index) => {
            let device = format!("/dev/video{}", index);
            cmd.args(["-f", "v4l2", "-i", &device]);
        }
    }
}

/// Probe frame dimensions with ffprobe
async fn probe_dimensions(locator: &StreamLocator) -> Result<(u32, u32)> {
    let mut cmd = Command::new("ffprobe");
    cmd.args([
        "-v", "error",
        "-select_streams", "v:0",
        "-show_entries", "stream=width,height",
        "-of", "csv=s=x:p=0",
    ]);
    match locator {
        StreamLocator::Url(url) => {
            cmd.arg(url);
        }
        StreamLocator::Device(index) => {
            let device = format!("/dev/video{}", index);
            cmd.args(["-f", "v4l2"]).arg(device);
        }
    }

    let child = cmd
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .stdin(Stdio::null())
        .kill_on_drop(true)
        .spawn()
        .map_err(|e| Error::SourceUnavailable(format!("ffprobe spawn failed: {}", e)))?;

    let output = match tokio::time::timeout(PROBE_TIMEOUT, child.wait_with_output()).await {
        Ok(Ok(output)) => output,
        Ok(Err(e)) => {
            return Err(Error::SourceUnavailable(format!(
                "ffprobe failed for {}: {}",
                locator, e
            )))
        }
        Err(_) => {
            // kill_on_drop already reaped the probe
            return Err(Error::SourceUnavailable(format!(
                "ffprobe timeout for {}",
                locator
            )));
        }
    };

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::SourceUnavailable(format!(
            "cannot open {}: {}",
            locator,
            stderr.trim()
        )));
    }

    parse_dimensions(&String::from_utf8_lossy(&output.stdout)).ok_or_else(|| {
        Error::SourceUnavailable(format!("no video stream found in {}", locator))
    })
}

/// Parse "1280x720" (first line of ffprobe csv output)
fn parse_dimensions(raw: &str) -> Option<(u32, u32)> {
    let line = raw.lines().next()?.trim();
    let (w, h) = line.split_once('x')?;
    let width = w.trim().parse().ok()?;
    let height = h.trim().parse().ok()?;
    if width == 0 || height == 0 {
        return None;
    }
    Some((width, height))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_dimensions() {
        assert_eq!(parse_dimensions("1280x720\n"), Some((1280, 720)));
        assert_eq!(parse_dimensions("640x480"), Some((640, 480)));
    }

    #[test]
    fn test_parse_dimensions_rejects_garbage() {
        assert_eq!(parse_dimensions(""), None);
        assert_eq!(parse_dimensions("no-video"), None);
        assert_eq!(parse_dimensions("0x0"), None);
    }
}
