//! Local tree scanner.
//!
//! # Design
//! - Enumerates every regular file under the sync root at the start of a run.
//! - Subtrees whose relative path cannot be expressed as a canonical key are pruned and logged.
//! - Only a failure to read the root itself aborts the scan.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::error::{SyncError, SyncResult};
use crate::remote::relative_from_local;

/// Absolute local paths presumed stale until the remote listing proves otherwise.
///
/// Owned exclusively by the run coordinator; the dispatcher removes paths as they are
/// listed and the housekeeper consumes whatever remains.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct DeletionCandidates {
    paths: HashSet<PathBuf>,
}

impl DeletionCandidates {
    /// Mark `path` as present remotely. Returns `true` if it was a candidate.
    pub fn retain_path(&mut self, path: &Path) -> bool {
        self.paths.remove(path)
    }

    /// Whether `path` is still scheduled for deletion.
    #[must_use]
    pub fn contains(&self, path: &Path) -> bool {
        self.paths.contains(path)
    }

    /// Number of remaining candidates.
    #[must_use]
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether no candidates remain.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remaining candidates in lexical order.
    #[must_use]
    pub fn into_sorted(self) -> Vec<PathBuf> {
        let mut paths: Vec<_> = self.paths.into_iter().collect();
        paths.sort();
        paths
    }
}

impl FromIterator<PathBuf> for DeletionCandidates {
    fn from_iter<I: IntoIterator<Item = PathBuf>>(iter: I) -> Self {
        Self {
            paths: iter.into_iter().collect(),
        }
    }
}

/// Enumerate regular files below `root`, skipping the `exclude` subtree.
///
/// # Errors
///
/// Returns [`SyncError::Walkdir`] when the root itself cannot be read.
pub fn scan_local_tree(root: &Path, exclude: Option<&Path>) -> SyncResult<DeletionCandidates> {
    let mut paths = HashSet::new();
    let mut walker = WalkDir::new(root).follow_links(false).into_iter();

    while let Some(entry) = walker.next() {
        let entry = match entry {
            Ok(entry) => entry,
            Err(err) if err.depth() == 0 => {
                return Err(SyncError::walkdir("scan.walk_root", root, err));
            }
            Err(err) => {
                warn!(error = %err, root = %root.display(), "skipping unreadable entry during scan");
                continue;
            }
        };
        if entry.depth() == 0 {
            continue;
        }
        let path = entry.path();
        if exclude.is_some_and(|skip| path.starts_with(skip)) {
            debug!(path = %path.display(), "skipping temp directory during scan");
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        if relative_from_local(root, path).is_none() {
            warn!(path = %path.display(), "path has no canonical key; pruning from scan");
            if entry.file_type().is_dir() {
                walker.skip_current_dir();
            }
            continue;
        }
        if entry.file_type().is_file() {
            paths.insert(path.to_path_buf());
        }
    }

    debug!(root = %root.display(), files = paths.len(), "scanned local tree");
    Ok(DeletionCandidates { paths })
}
