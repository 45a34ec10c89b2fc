//! Engine configuration and validation.
//!
//! # Design
//! - `SyncerConfig` is the raw, caller-supplied input; it carries defaults but no guarantees.
//! - `SyncSpec` is the validated, immutable form every run reads from.
//! - Validation failures are configuration errors and are never retried.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{SyncError, SyncResult};
use crate::remote::RemotePath;

/// Default directory for in-flight downloads.
pub const DEFAULT_TEMP_DIR: &str = "tmp";
/// Default number of concurrent download workers.
pub const DEFAULT_WORKERS: usize = 5;
/// Default capacity of the bounded task queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 1000;
/// Region used when neither configuration nor environment supplies one.
pub const DEFAULT_REGION: &str = "us-west-1";

/// Raw engine configuration as supplied by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncerConfig {
    /// Local directory to mirror into.
    pub local_dir: PathBuf,
    /// Remote URI (`s3://bucket/prefix`) to mirror from.
    pub remote_uri: String,
    /// Optional custom S3 endpoint URL.
    pub endpoint: Option<String>,
    /// Directory for temporary download files; must share a filesystem with `local_dir`.
    pub temp_dir: PathBuf,
    /// Disable TLS on object store connections.
    pub disable_tls: bool,
    /// Optional region override.
    pub region: Option<String>,
    /// Number of concurrent download workers.
    pub workers: usize,
    /// Capacity of the task queue between the lister and the workers.
    pub queue_capacity: usize,
}

impl Default for SyncerConfig {
    fn default() -> Self {
        Self {
            local_dir: PathBuf::new(),
            remote_uri: String::new(),
            endpoint: None,
            temp_dir: PathBuf::from(DEFAULT_TEMP_DIR),
            disable_tls: false,
            region: None,
            workers: DEFAULT_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }
}

/// Object store transport options.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransportOptions {
    /// Custom endpoint; enables path-style addressing when present.
    pub endpoint: Option<String>,
    /// Force plain HTTP.
    pub disable_tls: bool,
    /// Optional region override.
    pub region: Option<String>,
}

impl TransportOptions {
    /// Endpoint URL to hand to the client, if the defaults must be overridden.
    ///
    /// A bare host gets a scheme matching `disable_tls`; an explicit scheme is rewritten
    /// to `http` when TLS is disabled. Without a custom endpoint and with TLS disabled, the
    /// regional AWS endpoint is addressed over plain HTTP.
    #[must_use]
    pub fn resolved_endpoint(&self, region: &str) -> Option<String> {
        let scheme = if self.disable_tls { "http" } else { "https" };
        match self.endpoint.as_deref().map(str::trim) {
            Some(endpoint) => {
                let host = endpoint
                    .strip_prefix("https://")
                    .or_else(|| endpoint.strip_prefix("http://"));
                match host {
                    Some(host) if self.disable_tls => Some(format!("http://{host}")),
                    Some(_) => Some(endpoint.to_string()),
                    None => Some(format!("{scheme}://{endpoint}")),
                }
            }
            None if self.disable_tls => Some(format!("http://s3.{region}.amazonaws.com")),
            None => None,
        }
    }

    /// Whether requests must use path-style bucket addressing.
    #[must_use]
    pub const fn force_path_style(&self) -> bool {
        self.endpoint.is_some()
    }
}

/// Validated, immutable per-engine configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncSpec {
    /// Canonical local root directory.
    pub local_root: PathBuf,
    /// Remote container and prefix.
    pub remote: RemotePath,
    /// Temporary download directory.
    pub temp_dir: PathBuf,
    /// Transport options.
    pub transport: TransportOptions,
    /// Number of concurrent download workers.
    pub workers: usize,
    /// Capacity of the bounded task queue.
    pub queue_capacity: usize,
}

impl SyncSpec {
    /// Validate raw configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidConfig`] if the local root is missing or not a directory,
    /// the remote URI does not parse, or a numeric or endpoint setting is out of range.
    pub fn from_config(config: &SyncerConfig) -> SyncResult<Self> {
        let local_root = validate_local_root(&config.local_dir)?;
        let remote = RemotePath::parse(&config.remote_uri)?;

        if config.workers == 0 {
            return Err(SyncError::invalid_config("workers", "zero", Some("0")));
        }
        if config.queue_capacity == 0 {
            return Err(SyncError::invalid_config("queue_capacity", "zero", Some("0")));
        }
        if config.temp_dir.as_os_str().is_empty() {
            return Err(SyncError::invalid_config("temp_dir", "empty", None));
        }
        let endpoint = match config.endpoint.as_deref().map(str::trim) {
            Some("") => {
                return Err(SyncError::invalid_config("endpoint", "blank", Some("")));
            }
            other => other.map(str::to_string),
        };
        let region = config
            .region
            .as_deref()
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string);

        Ok(Self {
            local_root,
            remote,
            temp_dir: config.temp_dir.clone(),
            transport: TransportOptions {
                endpoint,
                disable_tls: config.disable_tls,
                region,
            },
            workers: config.workers,
            queue_capacity: config.queue_capacity,
        })
    }
}

fn validate_local_root(path: &Path) -> SyncResult<PathBuf> {
    let display = path.to_string_lossy();
    if path.as_os_str().is_empty() {
        return Err(SyncError::invalid_config("local_dir", "empty", None));
    }
    let canonical = path
        .canonicalize()
        .map_err(|_| SyncError::invalid_config("local_dir", "not_found", Some(display.as_ref())))?;
    if !canonical.is_dir() {
        return Err(SyncError::invalid_config(
            "local_dir",
            "not_a_directory",
            Some(display.as_ref()),
        ));
    }
    Ok(canonical)
}
