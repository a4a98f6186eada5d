//! Refresh cycle and background worker.
//!
//! One cycle is extract → reject empty → normalize → persist → publish. The
//! cycle is the error boundary: whatever fails is returned as a
//! [`RefreshError`], recorded in the [`RefreshMonitor`] and logged, and the
//! previously published snapshot keeps serving.
//!
//! [`RefreshLoop::spawn`] runs cycles on a dedicated thread at a fixed
//! period, one at a time. [`RefreshWorker::shutdown`] stops scheduling new
//! cycles and waits for the in-flight one to finish.

use std::sync::Arc;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use thiserror::Error;

use crate::ingest::{ExtractError, Extractor, check_row_shape};
use crate::logging::{self, Component};
use crate::normalize::normalize_with_coverage;
use crate::registry::CategoryRegistry;
use crate::store::{Published, SnapshotStore, StoreError};
use crate::verify::CoverageReport;

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("extraction failed: {0}")]
    Extract(#[from] ExtractError),
    #[error("persistence failed: {0}")]
    Persist(#[from] StoreError),
}

/// Outcome of one refresh cycle.
pub type CycleResult = Result<Arc<Published>, RefreshError>;

// ---------------------------------------------------------------------------
// Monitor
// ---------------------------------------------------------------------------

/// Health of the refresh loop as seen by the status endpoint.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RefreshHealth {
    pub cycles: u64,
    pub consecutive_failures: u32,
    pub last_attempt: Option<DateTime<Utc>>,
    pub last_success: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
    pub last_coverage: Option<CoverageReport>,
}

/// Shared record of cycle outcomes. Written by the refresh worker only.
#[derive(Debug, Default)]
pub struct RefreshMonitor {
    health: Mutex<RefreshHealth>,
}

impl RefreshMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn health(&self) -> RefreshHealth {
        self.health.lock().clone()
    }

    fn record_success(&self, at: DateTime<Utc>, coverage: CoverageReport) {
        let mut health = self.health.lock();
        health.cycles += 1;
        health.consecutive_failures = 0;
        health.last_attempt = Some(at);
        health.last_success = Some(at);
        health.last_error = None;
        health.last_coverage = Some(coverage);
    }

    fn record_failure(&self, at: DateTime<Utc>, err: &RefreshError) {
        let mut health = self.health.lock();
        health.cycles += 1;
        health.consecutive_failures += 1;
        health.last_attempt = Some(at);
        health.last_error = Some(err.to_string());
    }
}

// ---------------------------------------------------------------------------
// Refresh loop
// ---------------------------------------------------------------------------

pub struct RefreshLoop {
    extractor: Box<dyn Extractor>,
    source: String,
    registry: Arc<CategoryRegistry>,
    store: Arc<SnapshotStore>,
    monitor: Arc<RefreshMonitor>,
}

impl RefreshLoop {
    pub fn new(
        extractor: Box<dyn Extractor>,
        source: impl Into<String>,
        registry: Arc<CategoryRegistry>,
        store: Arc<SnapshotStore>,
        monitor: Arc<RefreshMonitor>,
    ) -> Self {
        Self {
            extractor,
            source: source.into(),
            registry,
            store,
            monitor,
        }
    }

    /// Runs one cycle and records its outcome. Never panics on source or
    /// storage failure; the error is returned and logged instead.
    pub fn run_cycle(&mut self) -> CycleResult {
        let started = Utc::now();
        let result = self.try_cycle();

        if let Err(e) = &result {
            self.monitor.record_failure(started, e);
            logging::log_refresh_failure(&self.source, e);
        }
        result
    }

    fn try_cycle(&mut self) -> CycleResult {
        let started = Utc::now();
        logging::debug(
            Component::Refresh,
            None,
            &format!("Running {} extractor", self.extractor.name()),
        );

        check_row_shape(&*self.extractor)?;
        let rows = self.extractor.fetch(&self.source)?;
        if rows.is_empty() {
            return Err(ExtractError::Empty.into());
        }

        let normalized = normalize_with_coverage(&rows, &self.registry);
        let published = self.store.publish(normalized.snapshot, &rows)?;

        logging::log_cycle_summary(rows.len(), &normalized.coverage);
        self.monitor.record_success(started, normalized.coverage);
        Ok(published)
    }

    /// Runs one cycle at startup unless the store already serves a persisted
    /// snapshot. A failed bootstrap is logged and recorded like any other
    /// cycle; the caller carries on and serves the empty document.
    pub fn bootstrap(&mut self) -> Bootstrap {
        if self.store.has_snapshot() {
            logging::info(Component::Refresh, None, "Persisted snapshot loaded, skipping bootstrap");
            return Bootstrap::Skipped;
        }
        logging::info(Component::Refresh, None, "No persisted snapshot, running bootstrap cycle");
        match self.run_cycle() {
            Ok(_) => Bootstrap::Published,
            Err(_) => Bootstrap::Failed,
        }
    }

    /// Starts the background worker. Cycles begin `period` apart, measured
    /// from the start of the previous cycle; a cycle that overruns is followed
    /// immediately by the next, never overlapped. With `run_immediately`
    /// false the first cycle waits one full period. A period too long to
    /// represent as a deadline means no further cycles until shutdown.
    pub fn spawn(mut self, period: Duration, run_immediately: bool) -> std::io::Result<RefreshWorker> {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();

        let handle = thread::Builder::new()
            .name("sensor-refresh".to_string())
            .spawn(move || {
                logging::info(
                    Component::Refresh,
                    None,
                    &format!("Refresh worker started (every {:?})", period),
                );

                let now = Instant::now();
                let mut next_run = if run_immediately {
                    Some(now)
                } else {
                    now.checked_add(period)
                };

                loop {
                    let signal = match next_run {
                        Some(at) => stop_rx.recv_timeout(at.saturating_duration_since(Instant::now())),
                        None => stop_rx.recv().map_err(|_| RecvTimeoutError::Disconnected),
                    };
                    match signal {
                        Err(RecvTimeoutError::Timeout) => {}
                        Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    }

                    let cycle_start = Instant::now();
                    // The result is already recorded and logged by run_cycle.
                    let _ = self.run_cycle();
                    next_run = cycle_start.checked_add(period);
                }

                logging::info(Component::Refresh, None, "Refresh worker stopped");
            })?;

        Ok(RefreshWorker {
            stop: Some(stop_tx),
            handle: Some(handle),
        })
    }
}

/// What [`RefreshLoop::bootstrap`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Bootstrap {
    /// A persisted snapshot was already being served.
    Skipped,
    Published,
    Failed,
}

impl Bootstrap {
    /// Whether the worker's first cycle should start right away. Only when
    /// no bootstrap cycle ran; otherwise the next cycle is one period after
    /// the bootstrap started, whatever its outcome.
    pub fn run_immediately(self) -> bool {
        self == Bootstrap::Skipped
    }
}

// ---------------------------------------------------------------------------
// Worker handle
// ---------------------------------------------------------------------------

/// Handle to the background refresh thread.
pub struct RefreshWorker {
    stop: Option<mpsc::Sender<()>>,
    handle: Option<JoinHandle<()>>,
}

impl RefreshWorker {
    /// Signals the worker to stop and waits for the in-flight cycle, if any.
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }

    fn stop_and_join(&mut self) {
        if let Some(stop) = self.stop.take() {
            let _ = stop.send(());
        }
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                logging::error(Component::Refresh, None, "Refresh worker panicked");
            }
        }
    }
}

impl Drop for RefreshWorker {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{CategoryId, RawRow, ReadingValue};
    use crate::store::StorePaths;
    use std::collections::VecDeque;

    /// Extractor that replays a fixed script of outcomes.
    struct ScriptedExtractor {
        script: VecDeque<Result<Vec<RawRow>, ExtractError>>,
    }

    impl ScriptedExtractor {
        fn new(script: Vec<Result<Vec<RawRow>, ExtractError>>) -> Box<Self> {
            Box::new(Self { script: script.into() })
        }
    }

    impl Extractor for ScriptedExtractor {
        fn fetch(&mut self, _source: &str) -> Result<Vec<RawRow>, ExtractError> {
            self.script.pop_front().unwrap_or(Err(ExtractError::Empty))
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn registry() -> Arc<CategoryRegistry> {
        Arc::new(CategoryRegistry::new([(CategoryId::FloodSensors, vec!["A", "B"])]).unwrap())
    }

    fn rows(current: &str) -> Vec<RawRow> {
        vec![RawRow::new("A", "08:00", "1.0m", current, "ok")]
    }

    fn setup(
        script: Vec<Result<Vec<RawRow>, ExtractError>>,
    ) -> (tempfile::TempDir, RefreshLoop, Arc<SnapshotStore>, Arc<RefreshMonitor>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(StorePaths::in_dir(dir.path())));
        let monitor = Arc::new(RefreshMonitor::new());
        let refresh = RefreshLoop::new(
            ScriptedExtractor::new(script),
            "test://source",
            registry(),
            Arc::clone(&store),
            Arc::clone(&monitor),
        );
        (dir, refresh, store, monitor)
    }

    fn current_a(store: &SnapshotStore) -> Option<ReadingValue> {
        store
            .current()
            .snapshot
            .record(CategoryId::FloodSensors, "A")
            .map(|r| r.current_value.clone())
    }

    #[test]
    fn test_successful_cycle_publishes_and_records_health() {
        let (_dir, mut refresh, store, monitor) = setup(vec![Ok(rows("1.1m"))]);

        let published = refresh.run_cycle().expect("cycle should succeed");

        assert!(published.published_at.is_some());
        assert_eq!(current_a(&store), Some(ReadingValue::Text("1.1m".into())));
        let health = monitor.health();
        assert_eq!(health.cycles, 1);
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_success.is_some());
        assert_eq!(
            health.last_coverage.unwrap().category(CategoryId::FloodSensors).unwrap().sentinel_filled,
            ["B"]
        );
    }

    #[test]
    fn test_extraction_failure_keeps_previous_snapshot() {
        let (_dir, mut refresh, store, monitor) = setup(vec![
            Ok(rows("1.1m")),
            Err(ExtractError::Timeout { attempts: 3, last_error: "HTTP error: 503".into() }),
        ]);

        refresh.run_cycle().unwrap();
        let before = store.current();
        let result = refresh.run_cycle();

        assert!(matches!(result, Err(RefreshError::Extract(ExtractError::Timeout { .. }))));
        assert_eq!(store.current(), before);
        let health = monitor.health();
        assert_eq!(health.cycles, 2);
        assert_eq!(health.consecutive_failures, 1);
        assert!(health.last_error.unwrap().contains("503"));
    }

    #[test]
    fn test_empty_extraction_aborts_without_publishing() {
        let (_dir, mut refresh, store, _monitor) = setup(vec![Ok(Vec::new())]);

        let result = refresh.run_cycle();

        assert!(matches!(result, Err(RefreshError::Extract(ExtractError::Empty))));
        assert!(!store.has_snapshot(), "empty extraction must not publish sentinels");
    }

    #[test]
    fn test_success_resets_consecutive_failures() {
        let (_dir, mut refresh, _store, monitor) = setup(vec![
            Err(ExtractError::Empty),
            Err(ExtractError::StructureNotFound("table tbody".into())),
            Ok(rows("0.9m")),
        ]);

        let _ = refresh.run_cycle();
        let _ = refresh.run_cycle();
        assert_eq!(monitor.health().consecutive_failures, 2);
        refresh.run_cycle().unwrap();
        let health = monitor.health();
        assert_eq!(health.consecutive_failures, 0);
        assert!(health.last_error.is_none());
    }

    #[test]
    fn test_persistence_failure_keeps_previous_snapshot() {
        let (dir, mut refresh, store, _monitor) = setup(vec![Ok(rows("1.1m")), Ok(rows("2.2m"))]);
        refresh.run_cycle().unwrap();

        let document = dir.path().join("sensor_data.json");
        std::fs::remove_file(&document).unwrap();
        std::fs::create_dir(&document).unwrap();
        std::fs::write(document.join("keep"), "x").unwrap();

        let result = refresh.run_cycle();
        assert!(matches!(result, Err(RefreshError::Persist(_))));
        assert_eq!(current_a(&store), Some(ReadingValue::Text("1.1m".into())));
    }

    #[test]
    fn test_worker_runs_cycles_and_shuts_down() {
        let (_dir, refresh, store, monitor) = setup(vec![Ok(rows("1.1m")), Ok(rows("1.2m"))]);

        let worker = refresh.spawn(Duration::from_millis(20), true).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.health().cycles < 2 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        worker.shutdown();

        assert!(monitor.health().cycles >= 2);
        assert!(store.has_snapshot());
    }

    #[test]
    fn test_bootstrap_outcomes_choose_start_delay() {
        assert!(Bootstrap::Skipped.run_immediately());
        assert!(!Bootstrap::Published.run_immediately());
        assert!(!Bootstrap::Failed.run_immediately());
    }

    #[test]
    fn test_unsupported_row_shape_fails_cycle_before_fetch() {
        struct FutureShape;

        impl Extractor for FutureShape {
            fn fetch(&mut self, _source: &str) -> Result<Vec<RawRow>, ExtractError> {
                panic!("fetch must not run for an unsupported row shape");
            }

            fn name(&self) -> &str {
                "future-shape"
            }

            fn row_shape_version(&self) -> u32 {
                crate::ingest::ROW_SHAPE_VERSION + 1
            }
        }

        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(SnapshotStore::new(StorePaths::in_dir(dir.path())));
        let mut refresh = RefreshLoop::new(
            Box::new(FutureShape),
            "test://source",
            registry(),
            Arc::clone(&store),
            Arc::new(RefreshMonitor::new()),
        );

        assert!(matches!(
            refresh.run_cycle(),
            Err(RefreshError::Extract(ExtractError::UnsupportedRowShape { .. }))
        ));
        assert!(!store.has_snapshot());
    }

    #[test]
    fn test_unrepresentable_period_keeps_worker_alive() {
        let (_dir, refresh, _store, monitor) = setup(vec![Ok(rows("1.1m")), Ok(rows("1.2m"))]);

        let worker = refresh.spawn(Duration::from_secs(u64::MAX), true).unwrap();
        let deadline = Instant::now() + Duration::from_secs(5);
        while monitor.health().cycles < 1 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        thread::sleep(Duration::from_millis(50));

        assert!(worker.is_running(), "worker must not die computing its next deadline");
        assert_eq!(monitor.health().cycles, 1);
        worker.shutdown();
    }

    #[test]
    fn test_unrepresentable_first_deadline_waits_for_shutdown() {
        let (_dir, refresh, _store, monitor) = setup(vec![Ok(rows("1.1m"))]);

        let worker = refresh.spawn(Duration::from_secs(u64::MAX), false).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(worker.is_running());
        worker.shutdown();

        assert_eq!(monitor.health().cycles, 0);
    }

    #[test]
    fn test_worker_waits_a_period_when_not_run_immediately() {
        let (_dir, refresh, _store, monitor) = setup(vec![Ok(rows("1.1m"))]);

        let worker = refresh.spawn(Duration::from_secs(60), false).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(worker.is_running());
        worker.shutdown();

        assert_eq!(monitor.health().cycles, 0);
    }
}
