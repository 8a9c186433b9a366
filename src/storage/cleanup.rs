use anyhow::{Context, Result};
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::core::errors::StorageResult;
use crate::storage::clock::{is_expired, Clock};
use crate::storage::flash::FlashStore;
use crate::storage::image_store::ImageStorage;
use crate::storage::result_store::ResultStore;
use crate::utils::Metrics;

/// Outcome of one pass over the stored result images
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub scanned: usize,
    pub removed: usize,
    pub kept: usize,
    pub failed: usize,
}

/// Deletes stored result images older than the retention window.
pub struct RetentionSweeper {
    storage: Arc<dyn ImageStorage>,
    clock: Arc<dyn Clock>,
    retention: Duration,
    interval: Duration,
    last_sweep: Mutex<Option<SystemTime>>,
    metrics: Option<Metrics>,
}

impl RetentionSweeper {
    pub fn new(
        storage: Arc<dyn ImageStorage>,
        clock: Arc<dyn Clock>,
        retention: Duration,
        interval: Duration,
    ) -> Self {
        Self {
            storage,
            clock,
            retention,
            interval,
            last_sweep: Mutex::new(None),
            metrics: None,
        }
    }

    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn retention(&self) -> Duration {
        self.retention
    }

    /// True when an image last modified at `modified` is past retention
    pub fn is_expired(&self, modified: SystemTime) -> bool {
        is_expired(self.clock.now(), modified, self.retention)
    }

    /// Run one full pass.
    ///
    /// Only a failure to list the storage aborts the pass; per-file errors are
    /// logged and counted in `failed`.
    pub fn sweep(&self) -> StorageResult<SweepReport> {
        *self.last_sweep.lock() = Some(self.clock.now());

        let mut report = SweepReport::default();
        for image in self.storage.list()? {
            report.scanned += 1;
            if !self.is_expired(image.modified) {
                report.kept += 1;
                continue;
            }
            match self.storage.remove(&image.id) {
                Ok(true) => report.removed += 1,
                // Removed by someone else since the listing
                Ok(false) => debug!("Result image {} already gone", image.id),
                Err(e) => {
                    error!("Error removing old file {}: {}", image.id, e);
                    report.failed += 1;
                }
            }
        }

        if let Some(ref m) = self.metrics {
            m.record_sweep(report.removed, report.failed);
        }
        Ok(report)
    }

    /// Sweep only if a full interval has passed since the previous pass.
    ///
    /// Used where no background loop runs; concurrent callers race for the slot
    /// and at most one of them sweeps.
    pub fn sweep_if_due(&self) -> Option<StorageResult<SweepReport>> {
        {
            let now = self.clock.now();
            let mut last = self.last_sweep.lock();
            if let Some(previous) = *last {
                if !is_expired(now, previous, self.interval) {
                    return None;
                }
            }
            *last = Some(now);
        }
        Some(self.sweep())
    }

    /// Run `sweep` on the blocking pool
    pub async fn sweep_async(self: &Arc<Self>) -> Result<SweepReport> {
        let sweeper = Arc::clone(self);
        let report = tokio::task::spawn_blocking(move || sweeper.sweep())
            .await
            .context("Failed to spawn blocking task for cleanup sweep")?
            .context("Cleanup sweep could not list result images")?;
        Ok(report)
    }
}

/// Periodic background cleanup: expired images, sessions and flash queues.
pub struct CleanupTask {
    sweeper: Arc<RetentionSweeper>,
    results: Arc<dyn ResultStore>,
    flashes: Arc<FlashStore>,
    interval: Duration,
}

impl CleanupTask {
    pub fn new(
        sweeper: Arc<RetentionSweeper>,
        results: Arc<dyn ResultStore>,
        flashes: Arc<FlashStore>,
        interval: Duration,
    ) -> Self {
        Self {
            sweeper,
            results,
            flashes,
            interval,
        }
    }

    /// One cleanup pass; never fails, errors are logged
    pub async fn run_once(&self) -> SweepReport {
        let report = match self.sweeper.sweep_async().await {
            Ok(report) => report,
            Err(e) => {
                error!("Error in cleanup process: {:#}", e);
                SweepReport::default()
            }
        };
        let sessions = self.results.purge_expired();
        let flashes = self.flashes.purge_expired();

        info!(
            "Cleanup complete. Removed {} old image files ({} errors), {} expired sessions, {} stale flash queues.",
            report.removed, report.failed, sessions, flashes
        );
        report
    }

    /// Full pass when the sweeper's interval has elapsed, None otherwise.
    ///
    /// Blocking; serves deployments where no background loop runs.
    pub fn run_if_due(&self) -> Option<SweepReport> {
        let report = match self.sweeper.sweep_if_due()? {
            Ok(report) => report,
            Err(e) => {
                error!("Error in on-demand cleanup: {}", e);
                SweepReport::default()
            }
        };
        let sessions = self.results.purge_expired();
        let flashes = self.flashes.purge_expired();

        if report.removed + sessions + flashes > 0 {
            info!(
                "On-demand cleanup removed {} old image files, {} expired sessions, {} stale flash queues",
                report.removed, sessions, flashes
            );
        }
        Some(report)
    }

    /// Fire-and-forget `run_if_due` on the blocking pool
    pub fn spawn_if_due(self: &Arc<Self>) -> JoinHandle<Option<SweepReport>> {
        let task = Arc::clone(self);
        tokio::task::spawn_blocking(move || task.run_if_due())
    }

    /// Spawn the loop: sleep one interval, then sweep, forever.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                "Cleanup task started (interval {}s, retention {}h)",
                self.interval.as_secs(),
                self.sweeper.retention().as_secs() / 3600
            );
            loop {
                tokio::time::sleep(self.interval).await;
                let report = self.run_once().await;
                if report.failed > 0 {
                    warn!("{} result images could not be removed", report.failed);
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::{
        AnalysisResult, Dimensions, Flash, ResultId, ResultImage, SessionId,
    };
    use crate::storage::clock::{ManualClock, SystemClock};
    use crate::storage::image_store::{DiskImageStorage, MemoryImageStorage};
    use crate::storage::result_store::MemoryResultStore;

    const DAY: Duration = Duration::from_secs(24 * 3600);
    const HOUR: Duration = Duration::from_secs(3600);

    #[test]
    fn test_sweep_removes_only_expired() {
        let clock = Arc::new(ManualClock::starting_now());
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = RetentionSweeper::new(storage.clone(), clock.clone(), DAY, HOUR);

        let old = ResultId::generate();
        storage.save(&old, b"old").unwrap();
        clock.advance(2 * HOUR);
        let young = ResultId::generate();
        storage.save(&young, b"young").unwrap();
        clock.advance(DAY - HOUR);

        let report = sweeper.sweep().unwrap();
        assert_eq!(
            report,
            SweepReport {
                scanned: 2,
                removed: 1,
                kept: 1,
                failed: 0
            }
        );
        assert_eq!(storage.load(&old).unwrap(), None);
        assert!(storage.load(&young).unwrap().is_some());
    }

    #[test]
    fn test_sweep_on_disk_with_simulated_time() {
        let tmp = tempfile::tempdir().unwrap();
        let storage = Arc::new(DiskImageStorage::new(tmp.path()).unwrap());
        let id = ResultId::generate();
        storage.save(&id, b"jpeg").unwrap();

        let clock = Arc::new(ManualClock::starting_now());
        let metrics = Metrics::new();
        let sweeper = RetentionSweeper::new(storage.clone(), clock.clone(), DAY, HOUR)
            .with_metrics(metrics.clone());

        clock.advance(23 * HOUR);
        assert_eq!(sweeper.sweep().unwrap().removed, 0);
        assert!(storage.load(&id).unwrap().is_some());

        clock.advance(2 * HOUR);
        assert_eq!(sweeper.sweep().unwrap().removed, 1);
        assert!(storage.load(&id).unwrap().is_none());
        assert_eq!(metrics.snapshot().files_removed, 1);
        assert_eq!(metrics.snapshot().sweeps_run, 2);
    }

    #[test]
    fn test_sweep_if_due_respects_interval() {
        let clock = Arc::new(ManualClock::starting_now());
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = RetentionSweeper::new(storage, clock.clone(), DAY, HOUR);

        assert!(sweeper.sweep_if_due().is_some());
        assert!(sweeper.sweep_if_due().is_none());
        clock.advance(HOUR + Duration::from_secs(1));
        assert!(sweeper.sweep_if_due().is_some());
    }

    #[tokio::test]
    async fn test_run_once_purges_sessions() {
        let clock = Arc::new(ManualClock::starting_now());
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(storage.clone(), clock.clone(), DAY, HOUR));
        let results = Arc::new(MemoryResultStore::new(clock.clone(), DAY));
        let flashes = Arc::new(FlashStore::new(clock.clone(), DAY));

        let id = ResultId::generate();
        storage.save(&id, b"jpeg").unwrap();
        results.put(
            &SessionId::generate(),
            healthy_result(ResultImage::Stored { id }, clock.now()),
        );

        clock.advance(DAY + HOUR);
        let task = CleanupTask::new(sweeper, results.clone(), flashes, HOUR);
        let report = task.run_once().await;
        assert_eq!(report.removed, 1);
        assert!(results.is_empty());
        assert!(storage.is_empty());
    }

    fn healthy_result(image: ResultImage, created_at: SystemTime) -> AnalysisResult {
        AnalysisResult {
            image,
            disease_id: 6,
            disease_name: "Healthy Plant".into(),
            confidence: 90.0,
            description: String::new(),
            treatment: String::new(),
            prevention: String::new(),
            affected_areas: Vec::new(),
            analysis_size: Dimensions::new(10, 10),
            display_size: Dimensions::new(10, 10),
            created_at,
        }
    }

    #[test]
    fn test_run_if_due_purges_sessions_and_flashes() {
        let clock = Arc::new(ManualClock::starting_now());
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(storage.clone(), clock.clone(), DAY, HOUR));
        let results = Arc::new(MemoryResultStore::new(clock.clone(), DAY));
        let flashes = Arc::new(FlashStore::new(clock.clone(), DAY));
        let task = CleanupTask::new(sweeper, results.clone(), flashes.clone(), HOUR);

        let stale = SessionId::generate();
        results.put(
            &stale,
            healthy_result(
                ResultImage::Inline {
                    jpeg_base64: "/9j/".into(),
                },
                clock.now(),
            ),
        );
        flashes.push(&stale, Flash::warning("never read"));

        // First call always runs; nothing is old yet
        assert_eq!(task.run_if_due(), Some(SweepReport::default()));
        assert_eq!(results.len(), 1);
        assert_eq!(flashes.len(), 1);
        assert_eq!(task.run_if_due(), None);

        clock.advance(DAY + HOUR);
        let fresh = SessionId::generate();
        flashes.push(&fresh, Flash::error("just now"));
        assert!(task.run_if_due().is_some());
        assert!(results.is_empty());
        assert_eq!(flashes.len(), 1);
        assert_eq!(flashes.take(&fresh).len(), 1);
    }

    #[tokio::test]
    async fn test_spawned_loop_sweeps_periodically() {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let storage = Arc::new(MemoryImageStorage::new(clock.clone()));
        let sweeper = Arc::new(RetentionSweeper::new(
            storage.clone(),
            clock.clone(),
            Duration::from_millis(1),
            Duration::from_millis(20),
        ));
        storage.save(&ResultId::generate(), b"jpeg").unwrap();

        let task = CleanupTask::new(
            sweeper,
            Arc::new(MemoryResultStore::new(clock.clone(), DAY)),
            Arc::new(FlashStore::new(clock, DAY)),
            Duration::from_millis(20),
        );
        let handle = task.spawn();

        let drained = tokio::time::timeout(Duration::from_secs(5), async {
            while !storage.is_empty() {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await;
        handle.abort();
        assert!(drained.is_ok(), "cleanup loop never removed the expired image");
    }
}
