//! MonitorRegistry - ストリームごとの監視パイプライン台帳
//!
//! ## 目的
//!
//! - 同一ストリームへの監視パイプライン多重起動を防止
//! - 同一ストリームIDのactivate/deactivateを直列化（別ストリームは並行）
//! - 永続ストアのactiveフラグとエントリ台帳を1トランザクション内で一致させる
//!
//! エントリ挿入は永続フラグを立てた後、削除はモニタ停止完了後。
//! ソースが開けない場合はフラグをロールバックして `SourceUnavailable`。

use crate::alerts::AlertDispatcher;
use crate::error::{Error, Result};
use crate::frame_source::{FrameSourceOpener, StreamLocator};
use crate::recognizer::{RecognitionAdapter, RecognitionEngine};
use crate::recording::{Recorder, RecordingWriterFactory};
use crate::store::StreamRepository;
use crate::stream_monitor::{MonitorConfig, StreamMonitor};
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

/// Result of an activation request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActivationOutcome {
    /// A new monitor was started
    Started,
    /// A monitor was already running for this stream (idempotent no-op)
    AlreadyActive,
}

/// Registry of running stream monitors
pub struct MonitorRegistry {
    /// ストリームID → 稼働中モニタ
    entries: Mutex<HashMap<String, StreamMonitor>>,
    /// ストリームIDごとの直列化ロック
    locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
    streams: StreamRepository,
    opener: Arc<dyn FrameSourceOpener>,
    engine: Arc<dyn RecognitionEngine>,
    writer_factory: Arc<dyn RecordingWriterFactory>,
    dispatcher: Arc<AlertDispatcher>,
    config: MonitorConfig,
}

impl MonitorRegistry {
    pub fn new(
        streams: StreamRepository,
        opener: Arc<dyn FrameSourceOpener>,
        engine: Arc<dyn RecognitionEngine>,
        writer_factory: Arc<dyn RecordingWriterFactory>,
        dispatcher: Arc<AlertDispatcher>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            entries: Mutex::new(HashMap::new()),
            locks: RwLock::new(HashMap::new()),
            streams,
            opener,
            engine,
            writer_factory,
            dispatcher,
            config,
        }
    }

    /// Start monitoring a stream.
    ///
    /// 手順: 稼働中なら何もしない → 永続フラグON → ソースopen
    /// （失敗時はフラグをロールバック）→ モニタ起動 → エントリ挿入。
    pub async fn activate(&self, stream_id: &str, locator: &str) -> Result<ActivationOutcome> {
        let lock = self.get_or_create_lock(stream_id).await;
        let _guard = lock.lock().await;

        // 稼働中エントリがあればidempotentに成功、死んでいれば回収
        let stale = {
            let mut entries = self.entries.lock().await;
            match entries.get(stream_id) {
                Some(monitor) if monitor.is_running() => {
                    tracing::info!(
                        stream_id = %stream_id,
                        "Activation is a no-op, monitor already running"
                    );
                    return Ok(ActivationOutcome::AlreadyActive);
                }
                Some(_) => entries.remove(stream_id),
                None => None,
            }
        };
        if let Some(dead) = stale {
            tracing::info!(stream_id = %stream_id, "Reaping dead monitor before restart");
            dead.stop().await;
        }

        let locator = StreamLocator::parse(locator);

        // Durable flag first; the entry is only inserted afterwards
        self.streams
            .set_active(stream_id, true, Some(Utc::now()))
            .await?;

        let source = match self.opener.open(&locator).await {
            Ok(source) => source,
            Err(e) => {
                // ロールバック: フラグを倒して失敗を返す
                if let Err(rollback_err) = self.streams.set_active(stream_id, false, None).await {
                    tracing::error!(
                        stream_id = %stream_id,
                        error = %rollback_err,
                        "Rollback of activation flag failed"
                    );
                }
                tracing::warn!(
                    stream_id = %stream_id,
                    locator = %locator,
                    error = %e,
                    "Activation failed, source unavailable"
                );
                return Err(Error::SourceUnavailable(format!(
                    "cannot open {}: {}",
                    locator, e
                )));
            }
        };

        let adapter = RecognitionAdapter::new(self.engine.clone(), self.config.sample_interval);
        let recorder = Recorder::new(
            stream_id,
            self.writer_factory.clone(),
            self.config.grace_frames,
        );
        let monitor = StreamMonitor::start(
            stream_id.to_string(),
            source,
            adapter,
            recorder,
            self.dispatcher.clone(),
            self.streams.clone(),
            &self.config,
        );

        self.entries
            .lock()
            .await
            .insert(stream_id.to_string(), monitor);

        tracing::info!(stream_id = %stream_id, locator = %locator, "Stream activated");
        Ok(ActivationOutcome::Started)
    }

    /// Stop monitoring a stream.
    ///
    /// エントリがなくても永続フラグは必ず倒す（モニタが先に死んだ
    /// ストリームのdeactivateをサポート）。
    pub async fn deactivate(&self, stream_id: &str) -> Result<()> {
        let lock = self.get_or_create_lock(stream_id).await;
        let _guard = lock.lock().await;

        let entry = self.entries.lock().await.remove(stream_id);
        match entry {
            Some(monitor) => {
                monitor.stop().await;
                tracing::info!(stream_id = %stream_id, "Stream deactivated");
            }
            None => {
                tracing::debug!(
                    stream_id = %stream_id,
                    "Deactivate with no running monitor, updating flag only"
                );
            }
        }

        self.streams.set_active(stream_id, false, None).await?;
        Ok(())
    }

    /// Stop every monitor and mark its stream inactive (clean shutdown)
    pub async fn shutdown(&self) {
        let drained: Vec<(String, StreamMonitor)> =
            self.entries.lock().await.drain().collect();

        for (stream_id, monitor) in drained {
            monitor.stop().await;
            if let Err(e) = self.streams.set_active(&stream_id, false, None).await {
                tracing::error!(
                    stream_id = %stream_id,
                    error = %e,
                    "Failed to mark stream inactive during shutdown"
                );
            }
        }

        tracing::info!("Monitor registry shut down");
    }

    /// Number of live monitors
    pub async fn active_count(&self) -> usize {
        self.entries
            .lock()
            .await
            .values()
            .filter(|m| m.is_running())
            .count()
    }

    /// ストリームIDに対応するロックを取得（なければ作成）
    async fn get_or_create_lock(&self, stream_id: &str) -> Arc<Mutex<()>> {
        // 読み取りロックでまず確認
        {
            let locks = self.locks.read().await;
            if let Some(lock) = locks.get(stream_id) {
                return lock.clone();
            }
        }

        // なければ書き込みロックで作成
        let mut locks = self.locks.write().await;
        locks
            .entry(stream_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::test_pool;
    use crate::test_support::{
        dispatcher_with, CountingObjectStore, CountingSink, MemFactory, ScriptedEngine,
        ScriptedOpener, SharedJournal,
    };
    use std::time::Duration;

    struct Harness {
        registry: Arc<MonitorRegistry>,
        streams: StreamRepository,
        opener: Arc<ScriptedOpener>,
    }

    async fn harness(opener: ScriptedOpener) -> Harness {
        let pool = test_pool().await;
        let streams = StreamRepository::new(pool.clone());
        let opener = Arc::new(opener);
        let dispatcher = dispatcher_with(
            Arc::new(CountingObjectStore::ok()),
            Arc::new(CountingSink::new()),
            pool,
        )
        .await;

        let config = MonitorConfig {
            buffer_capacity: 16,
            pop_timeout: Duration::from_millis(100),
            sample_interval: 1,
            grace_frames: 3,
        };

        let registry = Arc::new(MonitorRegistry::new(
            streams.clone(),
            opener.clone(),
            Arc::new(ScriptedEngine::never_match()),
            MemFactory::shared(&SharedJournal::new()),
            dispatcher,
            config,
        ));

        Harness {
            registry,
            streams,
            opener,
        }
    }

    #[tokio::test]
    async fn test_activate_is_idempotent() {
        let h = harness(ScriptedOpener::working_endless()).await;
        let row = h.streams.create("scripted://a").await.unwrap();

        let first = h.registry.activate(&row.stream_id, "scripted://a").await.unwrap();
        let second = h.registry.activate(&row.stream_id, "scripted://a").await.unwrap();

        assert_eq!(first, ActivationOutcome::Started);
        assert_eq!(second, ActivationOutcome::AlreadyActive);
        assert_eq!(h.opener.open_count(), 1);
        assert_eq!(h.registry.active_count().await, 1);

        let row = h.streams.get(&row.stream_id).await.unwrap().unwrap();
        assert!(row.active);
        assert!(row.started_at.is_some());

        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_concurrent_activations_start_one_monitor() {
        let h = harness(ScriptedOpener::working_endless()).await;
        let row = h.streams.create("scripted://b").await.unwrap();

        let mut handles = Vec::new();
        for _ in 0..8 {
            let registry = h.registry.clone();
            let id = row.stream_id.clone();
            handles.push(tokio::spawn(async move {
                registry.activate(&id, "scripted://b").await.unwrap()
            }));
        }

        let mut started = 0;
        for handle in handles {
            if handle.await.unwrap() == ActivationOutcome::Started {
                started += 1;
            }
        }

        assert_eq!(started, 1);
        assert_eq!(h.opener.open_count(), 1);
        assert_eq!(h.registry.active_count().await, 1);

        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_deactivate_stops_and_clears_flag() {
        let h = harness(ScriptedOpener::working_endless()).await;
        let row = h.streams.create("scripted://c").await.unwrap();

        h.registry.activate(&row.stream_id, "scripted://c").await.unwrap();
        h.registry.deactivate(&row.stream_id).await.unwrap();

        assert_eq!(h.registry.active_count().await, 0);
        let record = h.streams.get(&row.stream_id).await.unwrap().unwrap();
        assert!(!record.active);

        // Deactivating again (no entry) still succeeds and keeps the flag down
        h.registry.deactivate(&row.stream_id).await.unwrap();
        let record = h.streams.get(&row.stream_id).await.unwrap().unwrap();
        assert!(!record.active);
    }

    #[tokio::test]
    async fn test_source_unavailable_rolls_back_flag() {
        let h = harness(ScriptedOpener::broken()).await;
        let row = h.streams.create("scripted://dead").await.unwrap();

        let result = h.registry.activate(&row.stream_id, "scripted://dead").await;
        assert!(matches!(result, Err(Error::SourceUnavailable(_))));

        assert_eq!(h.registry.active_count().await, 0);
        let record = h.streams.get(&row.stream_id).await.unwrap().unwrap();
        assert!(!record.active);
    }

    #[tokio::test]
    async fn test_dead_monitor_is_replaced_on_activate() {
        // Source delivers 3 frames then dies; the monitor terminates on
        // its own and a later activate starts a fresh one.
        let h = harness(ScriptedOpener::working_finite(3)).await;
        let row = h.streams.create("scripted://flaky").await.unwrap();

        let first = h.registry.activate(&row.stream_id, "scripted://flaky").await.unwrap();
        assert_eq!(first, ActivationOutcome::Started);

        // Wait for the pipeline to consume the stream and die
        let deadline = std::time::Instant::now() + Duration::from_secs(5);
        while h.registry.active_count().await > 0 {
            assert!(std::time::Instant::now() < deadline);
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        // Source loss marked the row inactive on its own
        let record = h.streams.get(&row.stream_id).await.unwrap().unwrap();
        assert!(!record.active);

        let second = h.registry.activate(&row.stream_id, "scripted://flaky").await.unwrap();
        assert_eq!(second, ActivationOutcome::Started);
        assert_eq!(h.opener.open_count(), 2);

        h.registry.shutdown().await;
    }

    #[tokio::test]
    async fn test_monitors_for_different_streams_run_in_parallel() {
        let h = harness(ScriptedOpener::working_endless()).await;
        let a = h.streams.create("scripted://a").await.unwrap();
        let b = h.streams.create("scripted://b").await.unwrap();

        h.registry.activate(&a.stream_id, "scripted://a").await.unwrap();
        h.registry.activate(&b.stream_id, "scripted://b").await.unwrap();
        assert_eq!(h.registry.active_count().await, 2);

        h.registry.deactivate(&a.stream_id).await.unwrap();
        assert_eq!(h.registry.active_count().await, 1);

        h.registry.shutdown().await;
        assert_eq!(h.registry.active_count().await, 0);
    }
}
