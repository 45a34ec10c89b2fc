#![forbid(unsafe_code)]
#![deny(
    warnings,
    dead_code,
    unused,
    unused_imports,
    unused_must_use,
    unreachable_pub,
    clippy::all,
    clippy::pedantic,
    clippy::nursery,
    rustdoc::broken_intra_doc_links,
    rustdoc::bare_urls,
    missing_docs
)]
#![allow(clippy::module_name_repetitions)]

//! Telemetry primitives shared across the s3s workspace.
//!
//! This crate centralises logging setup, build information and the Prometheus
//! registry so the engine, the HTTP surface and the binary report consistently.

pub mod context;
pub mod error;
pub mod init;
pub mod metrics;

pub use context::app_span;
pub use error::{Result, TelemetryError};
pub use init::{
    BuildInfo, DEFAULT_LOG_LEVEL, LogFormat, LoggingConfig, VERBOSE_LOG_LEVEL, build_info,
    init_logging,
};
pub use metrics::{Metrics, MetricsSnapshot, RunSample, RunStatus};
