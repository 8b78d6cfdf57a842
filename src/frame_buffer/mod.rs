//! FrameBuffer - キャプチャと解析の間の有界フレームキュー
//!
//! ## 目的
//!
//! - キャプチャループを解析速度から切り離す（pushは絶対にブロックしない）
//! - 満杯時は最古のフレームを破棄（drop-oldest）
//! - popはタイムアウト付きブロック（停止フラグを定期的に確認できるように）

use crate::models::Frame;
use std::collections::VecDeque;
use std::time::Duration;
use tokio::sync::{Mutex, Notify};
use tokio::time::Instant;

/// デフォルト容量（フレーム数）
pub const DEFAULT_CAPACITY: usize = 30;

/// Bounded FIFO frame queue with a drop-oldest eviction policy.
///
/// Exactly two tasks touch a buffer: the capture loop pushes, the
/// processing loop pops. Frames come out in push order; evicted frames
/// are simply gone (no reordering).
pub struct FrameBuffer {
    queue: Mutex<VecDeque<Frame>>,
    notify: Notify,
    capacity: usize,
}

impl FrameBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            queue: Mutex::new(VecDeque::with_capacity(capacity)),
            notify: Notify::new(),
            capacity: capacity.max(1),
        }
    }

    /// Push a frame, evicting the oldest entry first when at capacity.
    ///
    /// Never waits for the consumer. The dropped frame is counted by the
    /// caller's logging, not here.
    pub async fn push(&self, frame: Frame) -> PushOutcome {
        let mut queue = self.queue.lock().await;
        let outcome = if queue.len() >= self.capacity {
            let dropped = queue.pop_front();
            PushOutcome::Evicted(dropped.map(|f| f.seq).unwrap_or(0))
        } else {
            PushOutcome::Stored
        };
        queue.push_back(frame);
        drop(queue);
        self.notify.notify_one();
        outcome
    }

    /// Pop the oldest frame, waiting up to `timeout`.
    ///
    /// `None` means the buffer stayed empty for the whole window. That is
    /// not an error: the consumer is expected to re-check its liveness
    /// flag and call pop again.
    pub async fn pop(&self, timeout: Duration) -> Option<Frame> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(frame) = self.queue.lock().await.pop_front() {
                return Some(frame);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            if tokio::time::timeout(deadline - now, self.notify.notified())
                .await
                .is_err()
            {
                // タイムアウト。push直後の取りこぼしがないよう最終確認
                return self.queue.lock().await.pop_front();
            }
        }
    }

    pub async fn len(&self) -> usize {
        self.queue.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.queue.lock().await.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Result of a push
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    /// Stored without eviction
    Stored,
    /// Oldest frame (by sequence number) was dropped to make room
    Evicted(u64),
}
