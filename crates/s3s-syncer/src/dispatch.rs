//! Remote listing reconciliation.
//!
//! # Design
//! - Pages through the listing and decides fetch or skip for every object.
//! - Every listed descendant is removed from the deletion candidates before any decision on content.
//! - Fingerprints compare by exact string equality, and a match only counts for a file this run's scan found.
//! - Task submission awaits queue capacity, which is the only backpressure on the lister.

use std::path::PathBuf;

use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::SyncSpec;
use crate::error::{SyncError, SyncResult};
use crate::index::HashIndex;
use crate::remote::{is_directory_marker, is_prefix_root, local_path};
use crate::scan::DeletionCandidates;
use crate::store::{ObjectStore, RemoteObject};

/// A single download to perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncTask {
    /// Full remote object key.
    pub key: String,
    /// Absolute destination path.
    pub local_path: PathBuf,
    /// Fingerprint to record once installed.
    pub etag: String,
    /// Canonical key relative to the sync root.
    pub relative: String,
}

/// Outcome of reconciling one listed object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Folder placeholder key; ignored.
    DirectoryMarker,
    /// The key denotes the prefix itself.
    PrefixRoot,
    /// The key does not descend from the configured prefix or has no canonical path below it.
    OutsidePrefix,
    /// Local content already matches the remote fingerprint.
    UpToDate,
    /// Content must be downloaded.
    Fetch(SyncTask),
}

/// Counters accumulated while listing.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchStats {
    /// File objects under the prefix seen in the listing.
    pub listed: usize,
    /// Download tasks submitted to the worker pool.
    pub queued: usize,
}

/// Decide what to do with one listed object and protect its local path from deletion.
pub fn reconcile(
    spec: &SyncSpec,
    index: &HashIndex,
    candidates: &mut DeletionCandidates,
    object: RemoteObject,
) -> Decision {
    if is_directory_marker(&object.key) {
        return Decision::DirectoryMarker;
    }
    let Some(relative) = spec.remote.relative_key(&object.key) else {
        debug!(key = %object.key, prefix = %spec.remote.prefix, "object has no canonical path below the configured prefix");
        return Decision::OutsidePrefix;
    };
    if is_prefix_root(&relative) {
        return Decision::PrefixRoot;
    }

    let destination = local_path(&spec.local_root, &relative);
    let on_disk = candidates.retain_path(&destination);

    if on_disk && index.get(&relative).as_deref() == Some(object.etag.as_str()) {
        trace!(key = %object.key, "object up to date");
        return Decision::UpToDate;
    }
    Decision::Fetch(SyncTask {
        key: object.key,
        local_path: destination,
        etag: object.etag,
        relative,
    })
}

/// Page through the remote listing, submitting fetch tasks to `tasks`.
///
/// # Errors
///
/// Returns the store error when any listing call fails, or
/// [`SyncError::WorkerPoolClosed`] if every worker has exited.
pub async fn dispatch_listing(
    store: &dyn ObjectStore,
    spec: &SyncSpec,
    index: &HashIndex,
    candidates: &mut DeletionCandidates,
    tasks: &mpsc::Sender<SyncTask>,
) -> SyncResult<DispatchStats> {
    let mut stats = DispatchStats::default();
    let mut continuation = None;

    loop {
        let page = store
            .list_page(&spec.remote.container, &spec.remote.prefix, continuation)
            .await?;
        debug!(objects = page.objects.len(), more = page.next.is_some(), "listed page");

        for object in page.objects {
            match reconcile(spec, index, candidates, object) {
                Decision::DirectoryMarker | Decision::PrefixRoot | Decision::OutsidePrefix => {}
                Decision::UpToDate => stats.listed += 1,
                Decision::Fetch(task) => {
                    stats.listed += 1;
                    tasks
                        .send(task)
                        .await
                        .map_err(|_| SyncError::WorkerPoolClosed)?;
                    stats.queued += 1;
                }
            }
        }

        match page.next {
            Some(token) => continuation = Some(token),
            None => break,
        }
    }
    Ok(stats)
}
