//! # Design
//!
//! - Wrap crate-level failures with the operation that surfaced them.
//! - Map every failure onto a process exit code: 2 for rejected input, 3 for runtime failures.
//! - Keep messages constant; context lives in fields and in `display_message`.

use std::error::Error as StdError;

use s3s_server::ServerError;
use s3s_syncer::SyncError;
use s3s_telemetry::TelemetryError;
use thiserror::Error;

/// Result type for application wiring.
pub type AppResult<T> = Result<T, AppError>;

/// Errors surfaced by the `s3s` binary.
#[derive(Debug, Error)]
pub enum AppError {
    /// Command-line input was rejected before any work started.
    #[error("invalid command-line input")]
    Validation {
        /// Argument that failed validation.
        field: &'static str,
        /// Static reason for the rejection.
        reason: &'static str,
    },
    /// The synchronization engine failed.
    #[error("sync operation failed")]
    Sync {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying engine error.
        source: SyncError,
    },
    /// A run completed but left objects unsynchronized.
    #[error("sync run incomplete")]
    IncompleteRun {
        /// Number of per-object failures recorded by the run.
        failures: usize,
        /// First failure observed, kept for diagnostics.
        source: SyncError,
    },
    /// Telemetry initialisation failed.
    #[error("telemetry operation failed")]
    Telemetry {
        /// Operation that failed.
        operation: &'static str,
        /// Underlying telemetry error.
        source: TelemetryError,
    },
    /// The metrics server failed.
    #[error("metrics server failed")]
    Server {
        /// Underlying server error.
        source: ServerError,
    },
    /// The metrics server task terminated abnormally.
    #[error("metrics server task failed")]
    ServerJoin {
        /// Underlying join error.
        source: tokio::task::JoinError,
    },
}

impl AppError {
    pub(crate) const fn sync(operation: &'static str, source: SyncError) -> Self {
        Self::Sync { operation, source }
    }

    pub(crate) const fn telemetry(operation: &'static str, source: TelemetryError) -> Self {
        Self::Telemetry { operation, source }
    }

    /// Process exit code for this failure.
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::Validation { .. } => 2,
            Self::Sync { source, .. } if source.is_config() => 2,
            _ => 3,
        }
    }

    /// Human-readable message including field context and the source chain.
    #[must_use]
    pub fn display_message(&self) -> String {
        let mut message = match self {
            Self::Validation { field, reason } => format!("{self}: {field}: {reason}"),
            Self::Sync {
                source:
                    SyncError::InvalidConfig {
                        field,
                        reason,
                        value,
                    },
                ..
            } => match value {
                Some(value) => format!("{self}: {field}: {reason} ('{value}')"),
                None => format!("{self}: {field}: {reason}"),
            },
            Self::Sync { operation, .. } | Self::Telemetry { operation, .. } => {
                format!("{self} ({operation})")
            }
            Self::IncompleteRun { failures, .. } => {
                format!("{self}: {failures} object(s) failed to synchronize")
            }
            Self::Server { .. } | Self::ServerJoin { .. } => self.to_string(),
        };
        let mut source = self.source();
        while let Some(err) = source {
            message.push_str(": ");
            message.push_str(&err.to_string());
            source = err.source();
        }
        message
    }
}
