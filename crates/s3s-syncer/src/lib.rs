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

//! One-way mirroring of an S3 prefix onto a local directory tree.
//!
//! Each run scans the local tree, pages through the remote listing, downloads new or
//! changed objects through a bounded worker pool with atomic installs, and finally removes
//! local files that no longer exist remotely.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod housekeeper;
pub mod index;
pub mod remote;
pub mod scan;
pub mod service;
pub mod store;
mod worker;

pub use config::{SyncSpec, SyncerConfig, TransportOptions};
pub use dispatch::{DispatchStats, SyncTask};
pub use error::{SyncError, SyncResult};
pub use index::HashIndex;
pub use remote::RemotePath;
pub use scan::DeletionCandidates;
pub use service::{RunOutcome, SyncerService};
pub use store::{ListPage, MemoryObjectStore, ObjectStore, RemoteObject, S3ObjectStore};
