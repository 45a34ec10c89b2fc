//! Local hash index.
//!
//! # Design
//! - Maps canonical relative keys to the store fingerprint (quoted MD5 hex) of the installed file.
//! - Shared between the dispatcher (reads) and download workers (writes) behind one mutex.
//! - A poisoned lock is recovered rather than propagated; entries are independent strings.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::remote::relative_from_local;

/// Concurrent map from relative key to content fingerprint.
#[derive(Debug, Clone, Default)]
pub struct HashIndex {
    entries: Arc<Mutex<HashMap<String, String>>>,
}

impl HashIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Fingerprint recorded for `key`, if any.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// Record `fingerprint` for `key`, replacing any previous value.
    pub fn insert(&self, key: impl Into<String>, fingerprint: impl Into<String>) {
        self.lock().insert(key.into(), fingerprint.into());
    }

    /// Drop the entry for `key`, returning the previous fingerprint.
    pub fn remove(&self, key: &str) -> Option<String> {
        self.lock().remove(key)
    }

    /// Number of recorded entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the index holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Ordered copy of the current entries.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        self.lock()
            .iter()
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    /// Fingerprint every regular file under `root` and record it.
    ///
    /// Entries below `exclude` are skipped. Unreadable files and traversal errors are logged
    /// and skipped so one bad entry never blocks startup. Returns the number of files indexed.
    pub fn seed_from_tree(&self, root: &Path, exclude: Option<&Path>) -> usize {
        let mut seeded = 0;
        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|entry| exclude.is_none_or(|skip| !entry.path().starts_with(skip)));
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(err) => {
                    warn!(error = %err, root = %root.display(), "skipping unreadable entry while seeding index");
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(relative) = relative_from_local(root, entry.path()) else {
                debug!(path = %entry.path().display(), "skipping path outside sync root");
                continue;
            };
            match fingerprint_file(entry.path()) {
                Ok(fingerprint) => {
                    self.insert(relative, fingerprint);
                    seeded += 1;
                }
                Err(err) => {
                    warn!(error = %err, path = %entry.path().display(), "failed to fingerprint local file");
                }
            }
        }
        seeded
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, String>> {
        match self.entries.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("hash index mutex poisoned; continuing with inner state");
                poisoned.into_inner()
            }
        }
    }
}

/// Format an MD5 digest the way S3 reports single-part ETags.
#[must_use]
pub fn format_fingerprint(digest: md5::Digest) -> String {
    format!("\"{digest:x}\"")
}

/// Stream a file through MD5 and return its quoted hex fingerprint.
///
/// # Errors
///
/// Returns the underlying IO error when the file cannot be opened or read.
pub fn fingerprint_file(path: &Path) -> io::Result<String> {
    let mut file = File::open(path)?;
    let mut context = md5::Context::new();
    io::copy(&mut file, &mut context)?;
    Ok(format_fingerprint(context.compute()))
}
