//! Run coordinator.
//!
//! # Design
//! - One `SyncerService` owns the validated spec, the store handle and the long-lived hash index.
//! - `pull` takes `&mut self`, so runs on one engine never overlap.
//! - A run is scan, dispatch with concurrent downloads, a hard join barrier, then housekeeping.
//! - Housekeeping is skipped whenever listing did not reach its terminal page.
//! - A temp directory created by a run is removed when the run ends or is abandoned.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use s3s_telemetry::{Metrics, RunSample, RunStatus};
use tokio::fs;
use tokio::sync::mpsc;
use tokio::task::spawn_blocking;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::config::{SyncSpec, SyncerConfig};
use crate::dispatch::dispatch_listing;
use crate::error::{SyncError, SyncResult};
use crate::housekeeper::run_housekeeping;
use crate::index::HashIndex;
use crate::scan::scan_local_tree;
use crate::store::ObjectStore;
use crate::worker::{WorkerContext, WorkerPool};

/// Summary of one completed run.
#[derive(Debug)]
pub struct RunOutcome {
    /// Sequence number of the run on this engine, starting at 1.
    pub run: u64,
    /// Unique identifier attached to the run's logs.
    pub run_id: Uuid,
    /// Wall-clock start of the run.
    pub started_at: DateTime<Utc>,
    /// Elapsed time of the run.
    pub duration: Duration,
    /// File objects under the prefix seen in the listing.
    pub listed: usize,
    /// Download tasks submitted to the worker pool.
    pub queued: usize,
    /// Objects downloaded and installed.
    pub fetched: usize,
    /// Local-only files deleted by housekeeping.
    pub deleted: usize,
    /// Per-object failures in arrival order.
    pub failures: Vec<SyncError>,
}

impl RunOutcome {
    /// First per-object failure observed, if any.
    #[must_use]
    pub fn first_error(&self) -> Option<&SyncError> {
        self.failures.first()
    }

    /// Whether every queued object was installed.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

/// One-way mirroring engine for a single remote prefix and local root.
pub struct SyncerService {
    spec: SyncSpec,
    store: Arc<dyn ObjectStore>,
    index: HashIndex,
    metrics: Option<Metrics>,
    runs: u64,
    owns_temp_dir: bool,
}

impl SyncerService {
    /// Validate `config` and build an engine around `store`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when the configuration is rejected.
    pub fn new(config: &SyncerConfig, store: Arc<dyn ObjectStore>) -> SyncResult<Self> {
        Ok(Self::from_spec(SyncSpec::from_config(config)?, store))
    }

    /// Build an engine from an already validated spec.
    #[must_use]
    pub fn from_spec(spec: SyncSpec, store: Arc<dyn ObjectStore>) -> Self {
        Self {
            spec,
            store,
            index: HashIndex::new(),
            metrics: None,
            runs: 0,
            owns_temp_dir: false,
        }
    }

    /// Attach a metrics registry that receives per-run counts.
    #[must_use]
    pub fn with_metrics(mut self, metrics: Metrics) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// Validated configuration.
    #[must_use]
    pub const fn spec(&self) -> &SyncSpec {
        &self.spec
    }

    /// Shared hash index.
    #[must_use]
    pub const fn hash_index(&self) -> &HashIndex {
        &self.index
    }

    /// Fingerprint the existing local tree once, on a blocking thread.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::WorkerJoin`] if the seeding task panics.
    pub async fn init_hash_index(&self) -> SyncResult<usize> {
        let index = self.index.clone();
        let root = self.spec.local_root.clone();
        let exclude = self.staging_exclusion();
        let seeded = spawn_blocking(move || index.seed_from_tree(&root, exclude.as_deref()))
            .await
            .map_err(|source| SyncError::WorkerJoin { source })?;
        info!(files = seeded, root = %self.spec.local_root.display(), "hash index initialized");
        Ok(seeded)
    }

    /// Perform one full reconciliation pass.
    ///
    /// Per-object failures are collected in [`RunOutcome::failures`]; only run-level
    /// failures are returned as errors.
    ///
    /// # Errors
    ///
    /// Returns an error when the temp directory cannot be prepared, the local root cannot
    /// be scanned, or the remote listing fails. Housekeeping does not run in those cases.
    pub async fn pull(&mut self) -> SyncResult<RunOutcome> {
        self.runs += 1;
        let run = self.runs;
        let run_id = Uuid::new_v4();
        let span = info_span!("pull", run, run_id = %run_id, uri = %self.spec.remote.uri());

        let result = self.run_once(run, run_id).instrument(span).await;
        if let Err(err) = &result {
            warn!(run, error = %err, operation = err.operation().unwrap_or("run"), "pull failed");
            if let Some(metrics) = &self.metrics {
                metrics.inc_run(RunStatus::Failed);
            }
        }
        result
    }

    /// Remove the temp directory if the last run created it and did not get to clean up.
    ///
    /// Call this after dropping an in-flight [`pull`](Self::pull) future.
    pub async fn release_temp_dir(&mut self) {
        if std::mem::take(&mut self.owns_temp_dir) {
            debug!(path = %self.spec.temp_dir.display(), "removing temp directory created by this engine");
            discard_temp_dir(&self.spec.temp_dir).await;
        }
    }

    async fn run_once(&mut self, run: u64, run_id: Uuid) -> SyncResult<RunOutcome> {
        let started_at = Utc::now();
        let clock = Instant::now();

        self.owns_temp_dir = prepare_temp_dir(&self.spec.temp_dir).await?;
        let result = self.reconcile(run, run_id, started_at, clock).await;
        self.release_temp_dir().await;

        let outcome = result?;
        info!(
            listed = outcome.listed,
            queued = outcome.queued,
            fetched = outcome.fetched,
            deleted = outcome.deleted,
            failures = outcome.failures.len(),
            duration_ms = u64::try_from(outcome.duration.as_millis()).unwrap_or(u64::MAX),
            "pull finished"
        );
        if let Some(metrics) = &self.metrics {
            metrics.record_run(&RunSample {
                listed: to_u64(outcome.listed),
                pulled: to_u64(outcome.fetched),
                deleted: to_u64(outcome.deleted),
                failures: to_u64(outcome.failures.len()),
                duration: outcome.duration,
            });
        }
        Ok(outcome)
    }

    async fn reconcile(
        &self,
        run: u64,
        run_id: Uuid,
        started_at: DateTime<Utc>,
        clock: Instant,
    ) -> SyncResult<RunOutcome> {
        let exclude = self.staging_exclusion();

        let scan_root = self.spec.local_root.clone();
        let scan_exclude = exclude.clone();
        let mut candidates =
            spawn_blocking(move || scan_local_tree(&scan_root, scan_exclude.as_deref()))
                .await
                .map_err(|source| SyncError::WorkerJoin { source })??;

        let (task_tx, task_rx) = mpsc::channel(self.spec.queue_capacity);
        let (failure_tx, mut failure_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(
            self.spec.workers,
            WorkerContext {
                store: Arc::clone(&self.store),
                container: self.spec.remote.container.clone(),
                temp_dir: self.spec.temp_dir.clone(),
                index: self.index.clone(),
                failures: failure_tx,
            },
            task_rx,
        );

        let listing = dispatch_listing(
            self.store.as_ref(),
            &self.spec,
            &self.index,
            &mut candidates,
            &task_tx,
        )
        .await;
        drop(task_tx);

        let report = pool.join().await;
        let mut failures = Vec::new();
        while let Ok(failure) = failure_rx.try_recv() {
            failures.push(failure);
        }
        failures.extend(report.join_failures);

        let stats = match listing {
            Ok(stats) => stats,
            Err(err) => {
                warn!(
                    fetched = report.fetched,
                    failures = failures.len(),
                    "listing incomplete; skipping housekeeping"
                );
                return Err(err);
            }
        };

        let root = self.spec.local_root.clone();
        let index = self.index.clone();
        let housekeeping = spawn_blocking(move || {
            run_housekeeping(&root, candidates, &index, exclude.as_deref())
        })
        .await
        .map_err(|source| SyncError::WorkerJoin { source })?;

        Ok(RunOutcome {
            run,
            run_id,
            started_at,
            duration: clock.elapsed(),
            listed: stats.listed,
            queued: stats.queued,
            fetched: report.fetched,
            deleted: housekeeping.deleted,
            failures,
        })
    }

    /// Resolved temp directory when it lies inside the sync root.
    fn staging_exclusion(&self) -> Option<PathBuf> {
        let temp = &self.spec.temp_dir;
        let resolved = temp
            .canonicalize()
            .or_else(|_| std::path::absolute(temp))
            .ok()?;
        resolved
            .starts_with(&self.spec.local_root)
            .then_some(resolved)
    }
}

/// Ensure the temp directory exists. Returns `true` when this call created it.
async fn prepare_temp_dir(path: &Path) -> SyncResult<bool> {
    match fs::metadata(path).await {
        Ok(metadata) if metadata.is_dir() => Ok(false),
        Ok(_) => Err(SyncError::io(
            "run.prepare_temp",
            path,
            io::Error::other("temp path is not a directory"),
        )),
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            fs::create_dir_all(path)
                .await
                .map_err(|source| SyncError::io("run.create_temp", path, source))?;
            Ok(true)
        }
        Err(source) => Err(SyncError::io("run.prepare_temp", path, source)),
    }
}

async fn discard_temp_dir(path: &Path) {
    if let Err(err) = fs::remove_dir_all(path).await {
        warn!(error = %err, path = %path.display(), "failed to remove temp directory");
    }
}

fn to_u64(value: usize) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}
