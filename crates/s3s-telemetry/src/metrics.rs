//! Prometheus-backed metrics registry and snapshot helpers.
//!
//! # Design
//! - Encapsulates collector registration to keep the public API small.
//! - Cumulative counters track totals across runs; gauges hold the most recent run.

use std::convert::TryFrom;
use std::sync::Arc;
use std::time::Duration;

use prometheus::{Encoder, IntCounter, IntCounterVec, IntGauge, Opts, Registry, TextEncoder};
use serde::Serialize;

use crate::error::{Result, TelemetryError};

/// Terminal state of one synchronization run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    /// Listing completed and every object was installed.
    Success,
    /// Listing completed but some objects failed.
    Partial,
    /// The run aborted before housekeeping.
    Failed,
}

impl RunStatus {
    /// Label value used on `s3s_sync_runs_total`.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Failed => "failed",
        }
    }
}

/// Counts observed during one completed run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSample {
    /// Objects under the prefix seen in the listing.
    pub listed: u64,
    /// Objects downloaded and installed.
    pub pulled: u64,
    /// Local-only files deleted.
    pub deleted: u64,
    /// Per-object download failures.
    pub failures: u64,
    /// Wall-clock duration of the run.
    pub duration: Duration,
}

/// Prometheus-backed metrics registry shared across services.
#[derive(Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

struct MetricsInner {
    registry: Registry,
    objects_listed_total: IntCounter,
    objects_pulled_total: IntCounter,
    files_deleted_total: IntCounter,
    download_failures_total: IntCounter,
    sync_runs_total: IntCounterVec,
    last_run_listed: IntGauge,
    last_run_pulled: IntGauge,
    last_run_duration_ms: IntGauge,
}

/// Snapshot of selected gauges and counters for health reporting.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MetricsSnapshot {
    /// Total objects listed across runs.
    pub objects_listed_total: u64,
    /// Total objects pulled across runs.
    pub objects_pulled_total: u64,
    /// Total local files deleted across runs.
    pub files_deleted_total: u64,
    /// Total per-object download failures across runs.
    pub download_failures_total: u64,
    /// Runs that finished without failures.
    pub runs_succeeded: u64,
    /// Runs that finished with per-object failures.
    pub runs_partial: u64,
    /// Runs that aborted.
    pub runs_failed: u64,
    /// Objects listed by the most recent completed run.
    pub last_run_listed: i64,
    /// Objects pulled by the most recent completed run.
    pub last_run_pulled: i64,
    /// Duration of the most recent completed run in milliseconds.
    pub last_run_duration_ms: i64,
}

impl Metrics {
    /// Construct a new metrics registry with the standard collectors registered.
    ///
    /// # Errors
    ///
    /// Returns an error if any of the Prometheus collectors cannot be
    /// registered.
    pub fn new() -> Result<Self> {
        let registry = Registry::new();

        let objects_listed_total = counter(
            "s3s_objects_listed_total",
            "Remote objects seen under the configured prefix",
        )?;
        let objects_pulled_total = counter(
            "s3s_objects_pulled_total",
            "Remote objects downloaded and installed",
        )?;
        let files_deleted_total =
            counter("s3s_files_deleted_total", "Local-only files removed")?;
        let download_failures_total = counter(
            "s3s_download_failures_total",
            "Downloads abandoned after a failure",
        )?;
        let sync_runs_total = IntCounterVec::new(
            Opts::new("s3s_sync_runs_total", "Synchronization runs by outcome"),
            &["status"],
        )
        .map_err(|source| TelemetryError::MetricDefinition {
            metric: "s3s_sync_runs_total",
            source,
        })?;
        let last_run_listed = gauge("s3s_last_run_listed", "Objects listed by the last run")?;
        let last_run_pulled = gauge("s3s_last_run_pulled", "Objects pulled by the last run")?;
        let last_run_duration_ms = gauge(
            "s3s_last_run_duration_ms",
            "Duration of the last run in milliseconds",
        )?;

        register(&registry, "s3s_objects_listed_total", &objects_listed_total)?;
        register(&registry, "s3s_objects_pulled_total", &objects_pulled_total)?;
        register(&registry, "s3s_files_deleted_total", &files_deleted_total)?;
        register(
            &registry,
            "s3s_download_failures_total",
            &download_failures_total,
        )?;
        register(&registry, "s3s_sync_runs_total", &sync_runs_total)?;
        register(&registry, "s3s_last_run_listed", &last_run_listed)?;
        register(&registry, "s3s_last_run_pulled", &last_run_pulled)?;
        register(&registry, "s3s_last_run_duration_ms", &last_run_duration_ms)?;

        Ok(Self {
            inner: Arc::new(MetricsInner {
                registry,
                objects_listed_total,
                objects_pulled_total,
                files_deleted_total,
                download_failures_total,
                sync_runs_total,
                last_run_listed,
                last_run_pulled,
                last_run_duration_ms,
            }),
        })
    }

    /// Record the counts of a run that reached housekeeping.
    pub fn record_run(&self, sample: &RunSample) {
        let inner = &self.inner;
        inner.objects_listed_total.inc_by(sample.listed);
        inner.objects_pulled_total.inc_by(sample.pulled);
        inner.files_deleted_total.inc_by(sample.deleted);
        inner.download_failures_total.inc_by(sample.failures);
        inner.last_run_listed.set(saturating_i64(sample.listed));
        inner.last_run_pulled.set(saturating_i64(sample.pulled));
        inner
            .last_run_duration_ms
            .set(Self::duration_to_ms(sample.duration));

        let status = if sample.failures == 0 {
            RunStatus::Success
        } else {
            RunStatus::Partial
        };
        self.inc_run(status);
    }

    /// Increment the run counter for `status`.
    pub fn inc_run(&self, status: RunStatus) {
        self.inner
            .sync_runs_total
            .with_label_values(&[status.as_str()])
            .inc();
    }

    /// Render the metrics registry using the Prometheus text exposition format.
    ///
    /// # Errors
    ///
    /// Returns an error if the metrics cannot be encoded or if the encoded
    /// buffer is not valid UTF-8.
    pub fn render(&self) -> Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.inner.registry.gather();
        let mut buffer = Vec::new();
        encoder
            .encode(&metric_families, &mut buffer)
            .map_err(|source| TelemetryError::Exposition { source })?;
        String::from_utf8(buffer).map_err(|source| TelemetryError::ExpositionUtf8 { source })
    }

    /// Take a point-in-time snapshot of the most relevant gauges and counters.
    #[must_use]
    pub fn snapshot(&self) -> MetricsSnapshot {
        let runs = |status: RunStatus| {
            self.inner
                .sync_runs_total
                .with_label_values(&[status.as_str()])
                .get()
        };
        MetricsSnapshot {
            objects_listed_total: self.inner.objects_listed_total.get(),
            objects_pulled_total: self.inner.objects_pulled_total.get(),
            files_deleted_total: self.inner.files_deleted_total.get(),
            download_failures_total: self.inner.download_failures_total.get(),
            runs_succeeded: runs(RunStatus::Success),
            runs_partial: runs(RunStatus::Partial),
            runs_failed: runs(RunStatus::Failed),
            last_run_listed: self.inner.last_run_listed.get(),
            last_run_pulled: self.inner.last_run_pulled.get(),
            last_run_duration_ms: self.inner.last_run_duration_ms.get(),
        }
    }

    /// Convert a duration to milliseconds saturating at `i64::MAX`.
    pub(crate) fn duration_to_ms(duration: Duration) -> i64 {
        i64::try_from(duration.as_millis()).unwrap_or(i64::MAX)
    }
}

fn counter(name: &'static str, help: &str) -> Result<IntCounter> {
    IntCounter::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricDefinition { metric: name, source })
}

fn gauge(name: &'static str, help: &str) -> Result<IntGauge> {
    IntGauge::with_opts(Opts::new(name, help))
        .map_err(|source| TelemetryError::MetricDefinition { metric: name, source })
}

fn register<C>(registry: &Registry, name: &'static str, collector: &C) -> Result<()>
where
    C: prometheus::core::Collector + Clone + 'static,
{
    registry
        .register(Box::new(collector.clone()))
        .map_err(|source| TelemetryError::MetricRegistration { metric: name, source })
}

fn saturating_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duration_to_ms_saturates_on_large_values() {
        let duration = Duration::from_secs(u64::MAX / 2);
        assert_eq!(Metrics::duration_to_ms(duration), i64::MAX);
    }

    #[test]
    fn metrics_snapshot_reflects_runs() -> Result<()> {
        let metrics = Metrics::new()?;
        metrics.record_run(&RunSample {
            listed: 2,
            pulled: 2,
            deleted: 0,
            failures: 0,
            duration: Duration::from_millis(120),
        });
        metrics.record_run(&RunSample {
            listed: 1,
            pulled: 0,
            deleted: 1,
            failures: 1,
            duration: Duration::from_millis(45),
        });
        metrics.inc_run(RunStatus::Failed);

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.objects_listed_total, 3);
        assert_eq!(snapshot.objects_pulled_total, 2);
        assert_eq!(snapshot.files_deleted_total, 1);
        assert_eq!(snapshot.download_failures_total, 1);
        assert_eq!(snapshot.runs_succeeded, 1);
        assert_eq!(snapshot.runs_partial, 1);
        assert_eq!(snapshot.runs_failed, 1);
        assert_eq!(snapshot.last_run_listed, 1);
        assert_eq!(snapshot.last_run_pulled, 0);
        assert_eq!(snapshot.last_run_duration_ms, 45);

        let rendered = metrics.render()?;
        assert!(rendered.contains("s3s_objects_pulled_total 2"));
        assert!(rendered.contains("s3s_sync_runs_total{status=\"partial\"} 1"));
        assert!(rendered.contains("s3s_last_run_duration_ms 45"));
        Ok(())
    }

    #[test]
    fn snapshot_serializes_for_health_payloads() -> std::result::Result<(), serde_json::Error> {
        let snapshot = MetricsSnapshot {
            objects_listed_total: 1,
            objects_pulled_total: 1,
            files_deleted_total: 0,
            download_failures_total: 0,
            runs_succeeded: 1,
            runs_partial: 0,
            runs_failed: 0,
            last_run_listed: 1,
            last_run_pulled: 1,
            last_run_duration_ms: 3,
        };
        let value = serde_json::to_value(&snapshot)?;
        assert_eq!(value["runs_succeeded"], 1);
        assert_eq!(value["last_run_duration_ms"], 3);
        Ok(())
    }
}
