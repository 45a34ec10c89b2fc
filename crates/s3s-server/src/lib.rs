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

//! HTTP host for the synchronizer's observability surface.
//!
//! Serves Prometheus metrics, build information and a health summary while the
//! binary runs in interval mode.

pub mod error;
mod handlers;
pub mod router;

pub use error::{ServerError, ServerResult};
pub use router::MetricsServer;
