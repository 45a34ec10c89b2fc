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
#![allow(clippy::redundant_pub_crate)]

//! Application wiring for the `s3s` synchronizer.
//!
//! Layout:
//! - `cli.rs`: argument parsing and command dispatch
//! - `bootstrap.rs`: logging, metrics and engine construction
//! - `scheduler.rs`: run-once and interval execution, signal handling
//! - `error.rs`: application errors and exit codes
//! - `main.rs`: thin entrypoint delegating to `run()`

pub(crate) mod bootstrap;
pub(crate) mod cli;
pub mod error;
pub(crate) mod scheduler;

pub use cli::run;
pub use error::{AppError, AppResult};
