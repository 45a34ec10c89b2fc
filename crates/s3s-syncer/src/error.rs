//! # Design
//!
//! - Provide structured, constant-message errors for the sync pipeline.
//! - Capture operation context (paths, fields, remote targets) to make failures reproducible in tests.
//! - Preserve source errors without interpolating context into error messages.

use std::error::Error as StdError;
use std::io;
use std::path::PathBuf;

use thiserror::Error;

/// Result type for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;

/// Boxed source error raised by an object store backend.
pub type RemoteSource = Box<dyn StdError + Send + Sync + 'static>;

/// Errors produced by the synchronization engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// IO failures while interacting with the local filesystem.
    #[error("syncer io failure")]
    Io {
        /// Operation that triggered the IO failure.
        operation: &'static str,
        /// Path involved in the IO failure.
        path: PathBuf,
        /// Underlying IO error.
        source: io::Error,
    },
    /// Walkdir traversal failures.
    #[error("syncer walkdir failure")]
    Walkdir {
        /// Operation that triggered the walkdir failure.
        operation: &'static str,
        /// Path involved in the walkdir failure.
        path: PathBuf,
        /// Underlying walkdir error.
        source: walkdir::Error,
    },
    /// Configuration validation failures; fatal to engine construction.
    #[error("syncer invalid configuration")]
    InvalidConfig {
        /// Field that failed validation.
        field: &'static str,
        /// Static reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// Object store request failures.
    #[error("syncer remote failure")]
    Remote {
        /// Operation that triggered the remote failure.
        operation: &'static str,
        /// Remote URI the request targeted.
        target: String,
        /// Underlying store error.
        source: RemoteSource,
    },
    /// The worker pool stopped accepting tasks before listing finished.
    #[error("syncer worker pool closed")]
    WorkerPoolClosed,
    /// A download worker terminated abnormally.
    #[error("syncer worker join failure")]
    WorkerJoin {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl SyncError {
    pub(crate) fn io(operation: &'static str, path: impl Into<PathBuf>, source: io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn walkdir(
        operation: &'static str,
        path: impl Into<PathBuf>,
        source: walkdir::Error,
    ) -> Self {
        Self::Walkdir {
            operation,
            path: path.into(),
            source,
        }
    }

    pub(crate) fn invalid_config(
        field: &'static str,
        reason: &'static str,
        value: Option<&str>,
    ) -> Self {
        Self::InvalidConfig {
            field,
            reason,
            value: value.map(str::to_string),
        }
    }

    /// Build a remote failure from any store error.
    pub fn remote(
        operation: &'static str,
        target: impl Into<String>,
        source: impl Into<RemoteSource>,
    ) -> Self {
        Self::Remote {
            operation,
            target: target.into(),
            source: source.into(),
        }
    }

    /// Returns `true` for configuration errors that make any run impossible.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::InvalidConfig { .. })
    }

    /// Operation label recorded with the error, when one exists.
    #[must_use]
    pub const fn operation(&self) -> Option<&'static str> {
        match self {
            Self::Io { operation, .. }
            | Self::Walkdir { operation, .. }
            | Self::Remote { operation, .. } => Some(operation),
            Self::InvalidConfig { .. } | Self::WorkerPoolClosed | Self::WorkerJoin { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;
    use tempfile::TempDir;
    use walkdir::WalkDir;

    #[test]
    fn sync_error_helpers_build_variants() -> Result<(), Box<dyn Error>> {
        let io_err = SyncError::io("install.rename", "path", io::Error::other("io"));
        assert!(matches!(io_err, SyncError::Io { .. }));
        assert!(io_err.source().is_some());
        assert_eq!(io_err.operation(), Some("install.rename"));

        let temp = TempDir::new()?;
        let missing = temp.path().join("missing");
        let walkdir_error = WalkDir::new(&missing)
            .into_iter()
            .next()
            .and_then(Result::err)
            .ok_or_else(|| io::Error::other("expected walkdir error"))?;
        let walk_err = SyncError::walkdir("scan.walk", &missing, walkdir_error);
        assert!(matches!(walk_err, SyncError::Walkdir { .. }));
        assert!(walk_err.source().is_some());

        let remote = SyncError::remote("list", "s3://bucket/prefix", io::Error::other("denied"));
        assert!(remote.source().is_some());
        assert!(!remote.is_config());

        let config = SyncError::invalid_config("remote_uri", "empty_bucket", Some("s3:///x"));
        assert!(config.is_config());
        assert_eq!(config.operation(), None);
        assert_eq!(config.to_string(), "syncer invalid configuration");
        Ok(())
    }
}
