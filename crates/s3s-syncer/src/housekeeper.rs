//! Post-run cleanup.
//!
//! # Design
//! - Runs only after listing completed and the worker pool has shut down.
//! - Each stale file is deleted independently; one failure never aborts the batch.
//! - A file that is gone from disk loses its hash index entry.
//! - Empty directories are pruned deepest first and the root is never removed.

use std::fs;
use std::io;
use std::path::Path;

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::index::HashIndex;
use crate::remote::relative_from_local;
use crate::scan::DeletionCandidates;

/// Counters reported by a cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HousekeepingReport {
    /// Stale files removed.
    pub deleted: usize,
    /// Stale files that could not be removed.
    pub delete_failures: usize,
    /// Empty directories pruned.
    pub pruned_dirs: usize,
}

/// Delete every remaining candidate and forget its fingerprint, then prune empty directories
/// below `root`.
#[must_use]
pub fn run_housekeeping(
    root: &Path,
    candidates: DeletionCandidates,
    index: &HashIndex,
    exclude: Option<&Path>,
) -> HousekeepingReport {
    let mut report = HousekeepingReport::default();
    for path in candidates.into_sorted() {
        match fs::remove_file(&path) {
            Ok(()) => {
                info!(path = %path.display(), "deleted local-only file");
                forget(root, &path, index);
                report.deleted += 1;
            }
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                debug!(path = %path.display(), "stale file already gone");
                forget(root, &path, index);
            }
            Err(err) => {
                warn!(error = %err, path = %path.display(), "failed to delete local-only file");
                report.delete_failures += 1;
            }
        }
    }
    report.pruned_dirs = prune_empty_dirs(root, exclude);
    report
}

fn forget(root: &Path, path: &Path, index: &HashIndex) {
    let Some(relative) = relative_from_local(root, path) else {
        return;
    };
    if index.remove(&relative).is_some() {
        debug!(key = %relative, "dropped hash index entry");
    }
}

/// Remove directories under `root` that hold no files, directly or transitively.
///
/// Returns the number of directories removed. `root` and the `exclude` subtree are kept.
pub fn prune_empty_dirs(root: &Path, exclude: Option<&Path>) -> usize {
    let mut directories = Vec::new();
    let walker = WalkDir::new(root)
        .follow_links(false)
        .into_iter()
        .filter_entry(|entry| exclude.is_none_or(|skip| !entry.path().starts_with(skip)));
    for entry in walker {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) => {
                warn!(error = %err, path = %root.display(), "failed to traverse sync root for pruning");
                continue;
            }
        };
        if entry.depth() > 0 && entry.file_type().is_dir() {
            directories.push(entry);
        }
    }

    directories.sort_by_key(walkdir::DirEntry::depth);
    directories.reverse();

    let mut removed = 0;
    for entry in directories {
        let empty = entry
            .path()
            .read_dir()
            .map(|mut iter| iter.next().is_none())
            .unwrap_or(false);
        if !empty {
            continue;
        }
        match fs::remove_dir(entry.path()) {
            Ok(()) => {
                debug!(path = %entry.path().display(), "pruned empty directory");
                removed += 1;
            }
            Err(err) => {
                warn!(error = %err, path = %entry.path().display(), "failed to prune empty directory");
            }
        }
    }
    removed
}
