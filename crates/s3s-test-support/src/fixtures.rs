//! Filesystem fixtures for mirroring tests.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tempfile::TempDir;
use walkdir::WalkDir;

/// Temporary workspace holding a mirror root and a sibling staging directory.
#[derive(Debug)]
pub struct Sandbox {
    _dir: TempDir,
    root: PathBuf,
    staging: PathBuf,
}

impl Sandbox {
    /// Create a sandbox with an empty canonical mirror root.
    ///
    /// # Errors
    ///
    /// Returns an error if the temporary directories cannot be created.
    pub fn new() -> Result<Self> {
        let dir = TempDir::new().context("failed to create sandbox")?;
        let base = dir
            .path()
            .canonicalize()
            .context("failed to canonicalize sandbox")?;
        let root = base.join("mirror");
        fs::create_dir_all(&root).context("failed to create mirror root")?;
        Ok(Self {
            _dir: dir,
            root,
            staging: base.join("staging"),
        })
    }

    /// Mirror root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Staging directory path beside the root; not created up front.
    #[must_use]
    pub fn staging(&self) -> &Path {
        &self.staging
    }
}

/// Write each `(relative path, contents)` pair below `root`, creating parents.
///
/// # Errors
///
/// Returns an error if a directory or file cannot be written.
pub fn write_tree(root: &Path, files: &[(&str, &[u8])]) -> Result<()> {
    for (relative, contents) in files {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create '{}'", parent.display()))?;
        }
        fs::write(&path, contents)
            .with_context(|| format!("failed to write '{}'", path.display()))?;
    }
    Ok(())
}

/// Every regular file below `root`, keyed by `/`-separated relative path.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked or a file cannot be read.
pub fn tree_snapshot(root: &Path) -> Result<BTreeMap<String, Vec<u8>>> {
    let mut files = BTreeMap::new();
    for entry in WalkDir::new(root) {
        let entry = entry.context("failed to walk tree")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let contents = fs::read(entry.path())
            .with_context(|| format!("failed to read '{}'", entry.path().display()))?;
        files.insert(relative_key(root, entry.path())?, contents);
    }
    Ok(files)
}

/// Every directory strictly below `root`, keyed by `/`-separated relative path.
///
/// # Errors
///
/// Returns an error if the tree cannot be walked.
pub fn directory_listing(root: &Path) -> Result<BTreeSet<String>> {
    let mut directories = BTreeSet::new();
    for entry in WalkDir::new(root).min_depth(1) {
        let entry = entry.context("failed to walk tree")?;
        if entry.file_type().is_dir() {
            directories.insert(relative_key(root, entry.path())?);
        }
    }
    Ok(directories)
}

fn relative_key(root: &Path, path: &Path) -> Result<String> {
    let relative = path
        .strip_prefix(root)
        .with_context(|| format!("'{}' is outside the tree", path.display()))?;
    let segments: Vec<_> = relative
        .components()
        .map(|component| component.as_os_str().to_string_lossy().into_owned())
        .collect();
    Ok(segments.join("/"))
}
