//! Stream controller: start/stop state machine driving periodic generation.
//!
//! The controller owns the [`SampleStore`] and a background tokio task. While
//! running, the task generates one interval, appends it, recomputes the
//! running totals and publishes a fresh [`Snapshot`], then waits
//! `stream_speed_secs` before the next interval. The wait races against state
//! changes, so [`StreamController::stop`] takes effect immediately rather than
//! after the sleep elapses.
//!
//! All writes to the store happen under one mutex. Readers get `Arc` snapshots
//! either on demand ([`StreamController::snapshot`]) or by subscribing to
//! updates ([`StreamController::subscribe`]).

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{ConfigError, StreamConfig};
use crate::export::{ExportError, ExportSummary, export_samples};
use crate::generator::{NoiseSource, SampleGenerator, UniformNoise};
use crate::metrics::SummaryMetrics;
use crate::sample::Sample;
use crate::store::{SampleStore, Snapshot};

/// Whether intervals are being generated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamState {
    #[default]
    Stopped,
    Running,
}

impl StreamState {
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

impl std::fmt::Display for StreamState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stopped => write!(f, "stopped"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Session bookkeeping for the current (or last) stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionState {
    pub state: StreamState,
    /// When the most recent start happened.
    pub start_time: Option<DateTime<Utc>>,
    /// Batch named by the most recent start.
    pub batch_name: Option<String>,
    /// Intervals generated since the controller was created.
    pub intervals: u64,
}

struct Inner {
    store: SampleStore,
    session: SessionState,
    generator: SampleGenerator<Box<dyn NoiseSource>>,
}

struct Shared {
    config: RwLock<StreamConfig>,
    inner: Mutex<Inner>,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl Shared {
    fn lock(&self) -> MutexGuard<'_, Inner> {
        // The log is append-only, so a panic mid-write cannot leave it torn.
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn config(&self) -> StreamConfig {
        self.config
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Generate one interval if still running. Returns whether anything was appended.
    fn tick(&self) -> bool {
        let config = self.config();
        let mut inner = self.lock();
        if !inner.session.state.is_running() {
            return false;
        }

        let now = Utc::now();
        let samples = inner.generator.generate(now, &config);
        inner.store.append(samples);
        inner.store.recompute_cumulative();
        inner.session.intervals += 1;
        log::debug!(
            "interval {} generated at {now} ({} samples in log)",
            inner.session.intervals,
            inner.store.len()
        );

        // Publish under the lock so snapshots are never delivered out of order.
        self.snapshot_tx.send_replace(inner.store.snapshot());
        true
    }
}

/// Handle to a running stream engine.
///
/// Must be created inside a tokio runtime. Dropping the controller stops the
/// background task.
pub struct StreamController {
    shared: Arc<Shared>,
    state_tx: watch::Sender<StreamState>,
    task: Option<JoinHandle<()>>,
}

impl StreamController {
    /// Spawn a controller with OS-seeded noise.
    pub fn spawn(config: StreamConfig) -> Self {
        Self::with_noise(config, UniformNoise::new())
    }

    /// Spawn a controller with a specific noise source.
    pub fn with_noise<N>(config: StreamConfig, noise: N) -> Self
    where
        N: NoiseSource + 'static,
    {
        let (state_tx, state_rx) = watch::channel(StreamState::Stopped);
        let (snapshot_tx, _) = watch::channel(Snapshot::default());
        let generator: SampleGenerator<Box<dyn NoiseSource>> =
            SampleGenerator::with_noise(Box::new(noise));

        let shared = Arc::new(Shared {
            config: RwLock::new(config),
            inner: Mutex::new(Inner {
                store: SampleStore::new(),
                session: SessionState::default(),
                generator,
            }),
            snapshot_tx,
        });

        let task = tokio::spawn(run_ticker(Arc::clone(&shared), state_rx));

        Self {
            shared,
            state_tx,
            task: Some(task),
        }
    }

    /// Start a batch named after the configured `batch_name`.
    pub fn start(&self) -> DateTime<Utc> {
        let batch = self.shared.config().batch_name;
        self.start_batch(batch)
    }

    /// Start (or restart) streaming under `batch_name`.
    ///
    /// Appends a `tag-0` marker stamped with the start time. Calling this while
    /// already running is allowed and records another marker.
    pub fn start_batch(&self, batch_name: impl Into<String>) -> DateTime<Utc> {
        let batch_name = batch_name.into();
        let start_time = Utc::now();
        {
            let mut inner = self.shared.lock();
            if inner.session.state.is_running() {
                log::warn!("start requested while already running; recording another batch marker");
            }
            inner
                .store
                .append([Sample::batch_marker(batch_name.clone(), start_time)]);
            inner.session.state = StreamState::Running;
            inner.session.start_time = Some(start_time);
            inner.session.batch_name = Some(batch_name.clone());
            self.shared.snapshot_tx.send_replace(inner.store.snapshot());
        }
        // Wake the ticker only on a real transition so a repeated start keeps the cadence.
        self.state_tx.send_if_modified(|state| {
            std::mem::replace(state, StreamState::Running) != StreamState::Running
        });
        log::info!("stream started: batch '{batch_name}'");
        start_time
    }

    /// Stop generating. The log is left untouched. Returns whether the stream was running.
    pub fn stop(&self) -> bool {
        let was_running = {
            let mut inner = self.shared.lock();
            let was = inner.session.state.is_running();
            inner.session.state = StreamState::Stopped;
            was
        };
        self.state_tx.send_replace(StreamState::Stopped);
        if was_running {
            log::info!("stream stopped");
        }
        was_running
    }

    /// Flip between running and stopped. Returns the new state.
    pub fn toggle(&self) -> StreamState {
        if self.state().is_running() {
            self.stop();
            StreamState::Stopped
        } else {
            self.start();
            StreamState::Running
        }
    }

    pub fn state(&self) -> StreamState {
        self.shared.lock().session.state
    }

    pub fn session(&self) -> SessionState {
        self.shared.lock().session.clone()
    }

    /// Current configuration.
    pub fn config(&self) -> StreamConfig {
        self.shared.config()
    }

    /// Replace the configuration. Applies from the next interval.
    pub fn update_config(&self, config: StreamConfig) -> Result<(), ConfigError> {
        config.validate()?;
        *self
            .shared
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner) = config;
        Ok(())
    }

    /// Edit the configuration in place, clamping the result into range.
    pub fn modify_config<F>(&self, edit: F) -> StreamConfig
    where
        F: FnOnce(&mut StreamConfig),
    {
        let mut guard = self
            .shared
            .config
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let mut next = guard.clone();
        edit(&mut next);
        let clamped = next.clone().clamped();
        if clamped != next {
            log::warn!("configuration clamped into range");
        }
        *guard = clamped.clone();
        clamped
    }

    /// Consistent view of the log and running totals.
    pub fn snapshot(&self) -> Snapshot {
        self.shared.lock().store.snapshot()
    }

    /// Receiver notified whenever a new snapshot is published.
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.shared.snapshot_tx.subscribe()
    }

    /// Headline metrics for the current snapshot.
    pub fn metrics(&self) -> SummaryMetrics {
        let configured = self.shared.config().batch_name;
        SummaryMetrics::from_snapshot(&self.snapshot(), &configured)
    }

    /// Save the full log to `path`. Failures are reported, never fatal.
    pub fn export(&self, path: &Path) -> Result<ExportSummary, ExportError> {
        let snapshot = self.snapshot();
        export_samples(path, &snapshot.log).inspect_err(|e| log::warn!("save failed: {e}"))
    }

    /// Stop streaming and wait for the background task to exit.
    pub async fn shutdown(mut self) {
        self.stop();
        let task = self.task.take();
        drop(self);
        if let Some(task) = task
            && let Err(e) = task.await
        {
            log::warn!("stream ticker ended abnormally: {e}");
        }
    }
}

impl Drop for StreamController {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Background loop: tick immediately on start, then once per period until stopped.
async fn run_ticker(shared: Arc<Shared>, mut state_rx: watch::Receiver<StreamState>) {
    loop {
        let state = *state_rx.borrow_and_update();
        if !state.is_running() {
            if state_rx.changed().await.is_err() {
                break;
            }
            continue;
        }

        shared.tick();
        let period = shared.config().period();
        tokio::select! {
            _ = tokio::time::sleep(period) => {}
            changed = state_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }
    log::debug!("stream ticker exited");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;
    use crate::generator::ZeroNoise;
    use crate::sample::{SampleValue, TagId};

    fn config(speed: u64) -> StreamConfig {
        StreamConfig {
            stream_speed_secs: speed,
            ..Default::default()
        }
    }

    async fn settle() {
        tokio::time::sleep(Duration::from_millis(1)).await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_initial_state_is_stopped_and_empty() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        settle().await;
        assert_eq!(c.state(), StreamState::Stopped);
        assert!(c.snapshot().is_empty());
        assert_eq!(c.metrics().defect_rate, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_appends_marker_then_ticks_immediately() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        let start = c.start_batch("Lot-42");
        settle().await;

        let snap = c.snapshot();
        assert_eq!(snap.len(), 6);
        assert_eq!(snap.log[0].tag, TagId::BatchMarker);
        assert_eq!(snap.log[0].value, SampleValue::Label("Lot-42".into()));
        assert_eq!(snap.log[0].timestamp, start);
        assert_eq!(
            snap.latest(TagId::TotalDefects).and_then(Sample::count_value),
            Some(16)
        );

        let session = c.session();
        assert_eq!(session.state, StreamState::Running);
        assert_eq!(session.start_time, Some(start));
        assert_eq!(session.batch_name.as_deref(), Some("Lot-42"));
        assert_eq!(session.intervals, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_follow_stream_speed() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        c.start();
        settle().await;
        assert_eq!(c.session().intervals, 1);

        tokio::time::sleep(Duration::from_secs(4)).await;
        assert_eq!(c.session().intervals, 1);

        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(c.session().intervals, 2);

        tokio::time::sleep(Duration::from_secs(10)).await;
        assert_eq!(c.session().intervals, 4);

        let m = c.metrics();
        assert_eq!(m.total_inspected, 2000);
        assert_eq!(m.total_defects, 64);
        assert_eq!(m.batch_name, "Batch-1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_mid_wait_halts_before_next_tick() {
        let c = StreamController::with_noise(config(10), ZeroNoise);
        c.start();
        settle().await;
        tokio::time::sleep(Duration::from_secs(3)).await;
        let before = c.snapshot().len();

        assert!(c.stop());
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert_eq!(c.snapshot().len(), before);
        assert_eq!(c.state(), StreamState::Stopped);
        assert!(!c.stop());
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_records_two_markers() {
        let c = StreamController::with_noise(config(10), ZeroNoise);
        c.start_batch("first");
        c.start_batch("second");
        settle().await;

        let snap = c.snapshot();
        let markers: Vec<&Sample> = snap.series(TagId::BatchMarker).collect();
        assert_eq!(markers.len(), 2);
        assert_eq!(markers[0].value.as_label(), Some("first"));
        assert_eq!(markers[1].value.as_label(), Some("second"));
        assert!(markers[0].timestamp <= markers[1].timestamp);
        assert_eq!(c.metrics().batch_name, "second");
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_start_keeps_cadence() {
        let c = StreamController::with_noise(config(10), ZeroNoise);
        c.start_batch("a");
        settle().await;
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(c.session().intervals, 1);

        c.start_batch("b");
        settle().await;
        assert_eq!(c.session().intervals, 1);
        assert_eq!(c.snapshot().series(TagId::BatchMarker).count(), 2);

        // Next interval still lands 10s after the first one.
        tokio::time::sleep(Duration::from_secs(7)).await;
        assert_eq!(c.session().intervals, 1);
        tokio::time::sleep(Duration::from_secs(2)).await;
        assert_eq!(c.session().intervals, 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_after_stop_keeps_history() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        c.start_batch("A");
        settle().await;
        c.stop();
        settle().await;
        c.start_batch("B");
        settle().await;

        let snap = c.snapshot();
        assert_eq!(snap.len(), 12);
        assert_eq!(snap.series(TagId::BatchMarker).count(), 2);
        assert_eq!(snap.cumulative.latest_total(TagId::Inspected), 1000);
    }

    #[tokio::test(start_paused = true)]
    async fn test_toggle_flips_state() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        assert_eq!(c.toggle(), StreamState::Running);
        assert_eq!(c.toggle(), StreamState::Stopped);
        settle().await;
        assert_eq!(c.snapshot().series(TagId::BatchMarker).count(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_subscribers_see_each_interval() {
        let c = StreamController::with_noise(config(2), ZeroNoise);
        let mut rx = c.subscribe();
        c.start();

        let mut lens = Vec::new();
        while lens.len() < 3 {
            rx.changed().await.unwrap();
            let len = rx.borrow_and_update().len();
            if len % 5 == 1 && len > 1 {
                lens.push(len);
            }
        }
        assert_eq!(lens, vec![6, 11, 16]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_config_changes_apply_next_interval() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        c.start();
        settle().await;

        let mut next = c.config();
        next.inspections_per_interval = 1000;
        c.update_config(next).unwrap();
        tokio::time::sleep(Duration::from_secs(5)).await;

        let inspected: Vec<u64> = c
            .snapshot()
            .series(TagId::Inspected)
            .filter_map(Sample::count_value)
            .collect();
        assert_eq!(inspected, vec![500, 1000]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_config_rejects_out_of_range() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        let bad = StreamConfig {
            stream_speed_secs: 11,
            ..Default::default()
        };
        assert!(c.update_config(bad).is_err());
        assert_eq!(c.config().stream_speed_secs, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_modify_config_clamps() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        let cfg = c.modify_config(|cfg| {
            cfg.rates.glass += 10.0;
            cfg.stream_speed_secs = 0;
        });
        assert_eq!(cfg.rates.glass, 5.0);
        assert_eq!(cfg.stream_speed_secs, 1);
        assert_eq!(c.config(), cfg);
    }

    #[tokio::test(start_paused = true)]
    async fn test_export_failure_leaves_stream_running() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        c.start();
        settle().await;

        let tmp = tempfile::tempdir().unwrap();
        let bad = tmp.path().join("no-such-dir").join("out.csv");
        assert!(c.export(&bad).is_err());
        assert_eq!(c.state(), StreamState::Running);

        let good = tmp.path().join("out.csv");
        let summary = c.export(&good).unwrap();
        assert_eq!(summary.rows, 6);
    }

    struct PanickingNoise;

    impl NoiseSource for PanickingNoise {
        fn offset(&mut self) -> i64 {
            panic!("noise source failed");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_after_ticker_panic() {
        let c = StreamController::with_noise(config(5), PanickingNoise);
        c.start_batch("doomed");
        settle().await;

        // The marker survives and the poisoned store is still readable.
        assert_eq!(c.snapshot().len(), 1);
        assert_eq!(c.state(), StreamState::Running);
        c.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_joins_task() {
        let c = StreamController::with_noise(config(5), ZeroNoise);
        c.start();
        settle().await;
        c.shutdown().await;
    }
}
