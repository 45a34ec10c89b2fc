//! Object store seam used by the lister and download workers.

mod memory;
mod s3;

pub use memory::MemoryObjectStore;
pub use s3::S3ObjectStore;

use async_trait::async_trait;
use tokio::io::AsyncWrite;

use crate::error::SyncResult;

/// One object returned by a listing page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    /// Full object key.
    pub key: String,
    /// Opaque content fingerprint (ETag) as reported by the store.
    pub etag: String,
}

/// A single page of a prefix listing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListPage {
    /// Objects on this page.
    pub objects: Vec<RemoteObject>,
    /// Continuation token for the next page; `None` on the terminal page.
    pub next: Option<String>,
}

/// Remote object store operations required by the engine.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Fetch one page of objects under `prefix`, resuming from `continuation` when present.
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> SyncResult<ListPage>;

    /// Stream the content of `key` into `writer`, returning the number of bytes written.
    ///
    /// Bytes may already have reached `writer` when an error is returned.
    async fn fetch(
        &self,
        container: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> SyncResult<u64>;
}
