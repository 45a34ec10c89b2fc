//! Remote URI resolution and key-to-path mapping.
//!
//! # Design
//! - `s3://<bucket>/<prefix>` is the only accepted shape; anything else is a configuration error.
//! - Object keys map onto relative paths with `/` as the canonical separator.
//! - Keys that do not descend from the configured prefix never produce a path.
//! - Keys with empty or dot segments are skipped, never normalised onto another key's path.

use std::path::{Path, PathBuf};

use percent_encoding::percent_decode_str;
use url::Url;

use crate::error::{SyncError, SyncResult};

/// URI scheme identifying the object store protocol.
pub const REMOTE_SCHEME: &str = "s3";

const SEPARATOR: char = '/';

/// Container and key prefix identifying the mirrored subset of remote objects.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemotePath {
    /// Bucket name.
    pub container: String,
    /// Key prefix without a leading separator; may be empty.
    pub prefix: String,
}

impl RemotePath {
    /// Parse an `s3://bucket/prefix` URI.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] when the URI is malformed, uses another scheme,
    /// or names an empty bucket.
    pub fn parse(uri: &str) -> SyncResult<Self> {
        let parsed = Url::parse(uri.trim())
            .map_err(|_| SyncError::invalid_config("remote_uri", "malformed", Some(uri)))?;
        if parsed.scheme() != REMOTE_SCHEME {
            return Err(SyncError::invalid_config(
                "remote_uri",
                "unsupported_scheme",
                Some(uri),
            ));
        }
        let container = parsed
            .host_str()
            .filter(|host| !host.is_empty())
            .ok_or_else(|| SyncError::invalid_config("remote_uri", "empty_bucket", Some(uri)))?
            .to_string();

        let path = percent_decode_str(parsed.path())
            .decode_utf8()
            .map_err(|_| SyncError::invalid_config("remote_uri", "prefix_not_utf8", Some(uri)))?;
        let prefix = path.strip_prefix(SEPARATOR).unwrap_or(&path).to_string();

        Ok(Self { container, prefix })
    }

    /// Full URI of an object key inside this container.
    #[must_use]
    pub fn object_uri(&self, key: &str) -> String {
        format!("{REMOTE_SCHEME}://{}/{key}", self.container)
    }

    /// URI of the configured prefix itself.
    #[must_use]
    pub fn uri(&self) -> String {
        self.object_uri(&self.prefix)
    }

    /// Path of `key` relative to the configured prefix.
    ///
    /// Returns `None` when the key is not a descendant of the prefix, would escape it, or is not
    /// in canonical form.
    /// The prefix root itself yields `Some("")`.
    #[must_use]
    pub fn relative_key(&self, key: &str) -> Option<String> {
        relative_key(&self.prefix, key)
    }
}

/// Compute the canonical relative path of `key` below `prefix`.
///
/// Keys holding empty, `.` or `..` segments below the prefix are rejected, so distinct keys
/// never share a local path.
#[must_use]
pub fn relative_key(prefix: &str, key: &str) -> Option<String> {
    let base = prefix.trim_end_matches(SEPARATOR);
    let rest = if base.is_empty() {
        key
    } else if key == base {
        ""
    } else {
        key.strip_prefix(base)?.strip_prefix(SEPARATOR)?
    };

    if rest.is_empty() {
        return Some(String::new());
    }
    if rest
        .split(SEPARATOR)
        .any(|segment| matches!(segment, "" | "." | ".."))
    {
        return None;
    }
    Some(rest.to_string())
}

/// Returns `true` when a relative key denotes the prefix root rather than a file.
#[must_use]
pub fn is_prefix_root(relative: &str) -> bool {
    matches!(relative, "" | "." | "/")
}

/// Returns `true` for folder placeholder keys (trailing separator).
#[must_use]
pub fn is_directory_marker(key: &str) -> bool {
    key.ends_with(SEPARATOR)
}

/// Join a canonical relative key onto `root` using the platform separator.
#[must_use]
pub fn local_path(root: &Path, relative: &str) -> PathBuf {
    relative
        .split(SEPARATOR)
        .filter(|segment| !segment.is_empty())
        .fold(root.to_path_buf(), |path, segment| path.join(segment))
}

/// Canonical relative key of a local path below `root`, or `None` when it lies outside.
#[must_use]
pub fn relative_from_local(root: &Path, path: &Path) -> Option<String> {
    let relative = path.strip_prefix(root).ok()?;
    let mut segments = Vec::new();
    for component in relative.components() {
        match component {
            std::path::Component::Normal(segment) => segments.push(segment.to_str()?.to_string()),
            std::path::Component::CurDir => {}
            _ => return None,
        }
    }
    Some(segments.join("/"))
}
