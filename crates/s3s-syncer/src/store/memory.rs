//! In-process object store used by tests and local dry runs.
//!
//! # Design
//! - Keys live in an ordered map so pagination is deterministic.
//! - Failure injection covers listing pages, mid-transfer aborts and stalled listings.
//! - The state lock is never held across an await point.

use std::collections::{BTreeMap, HashMap};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::error;

use super::{ListPage, ObjectStore, RemoteObject};
use crate::error::{SyncError, SyncResult};
use crate::index::format_fingerprint;

const DEFAULT_PAGE_SIZE: usize = 1000;

#[derive(Debug, Clone)]
struct StoredObject {
    body: Vec<u8>,
    etag: String,
}

#[derive(Debug, Default)]
struct MemoryState {
    containers: HashMap<String, BTreeMap<String, StoredObject>>,
    fail_list_page: Option<usize>,
    pages_served: usize,
    fail_fetch: HashMap<String, usize>,
    list_delay: Option<Duration>,
}

/// Object store holding every object in memory.
#[derive(Debug, Clone)]
pub struct MemoryObjectStore {
    state: Arc<Mutex<MemoryState>>,
    page_size: usize,
    fetches: Arc<AtomicUsize>,
}

impl Default for MemoryObjectStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryObjectStore {
    /// Create an empty store with the default page size.
    #[must_use]
    pub fn new() -> Self {
        Self::with_page_size(DEFAULT_PAGE_SIZE)
    }

    /// Create an empty store returning at most `page_size` objects per listing page.
    #[must_use]
    pub fn with_page_size(page_size: usize) -> Self {
        Self {
            state: Arc::new(Mutex::new(MemoryState::default())),
            page_size: page_size.max(1),
            fetches: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Store `body` under `key`, fingerprinted with its quoted MD5 digest.
    pub fn put(&self, container: &str, key: &str, body: impl Into<Vec<u8>>) {
        let body = body.into();
        let etag = format_fingerprint(md5::compute(&body));
        self.put_with_etag(container, key, body, etag);
    }

    /// Store `body` under `key` with an explicit fingerprint.
    pub fn put_with_etag(
        &self,
        container: &str,
        key: &str,
        body: impl Into<Vec<u8>>,
        etag: impl Into<String>,
    ) {
        self.lock()
            .containers
            .entry(container.to_string())
            .or_default()
            .insert(
                key.to_string(),
                StoredObject {
                    body: body.into(),
                    etag: etag.into(),
                },
            );
    }

    /// Delete `key`, returning whether it existed.
    pub fn remove(&self, container: &str, key: &str) -> bool {
        self.lock()
            .containers
            .get_mut(container)
            .is_some_and(|objects| objects.remove(key).is_some())
    }

    /// Fail the listing call for the zero-based page `page` of every subsequent listing.
    pub fn fail_listing_at_page(&self, page: usize) {
        self.lock().fail_list_page = Some(page);
    }

    /// Abort transfers of `key` after `after_bytes` bytes have been written.
    pub fn fail_fetch_after(&self, key: &str, after_bytes: usize) {
        self.lock().fail_fetch.insert(key.to_string(), after_bytes);
    }

    /// Delay every listing call by `delay`.
    pub fn stall_listing(&self, delay: Duration) {
        self.lock().list_delay = Some(delay);
    }

    /// Remove every injected failure and stall.
    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_list_page = None;
        state.fail_fetch.clear();
        state.list_delay = None;
    }

    /// Number of fetch calls served so far, including failed ones.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }

    fn lock(&self) -> MutexGuard<'_, MemoryState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => {
                error!("memory object store mutex poisoned; continuing with inner state");
                poisoned.into_inner()
            }
        }
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn list_page(
        &self,
        container: &str,
        prefix: &str,
        continuation: Option<String>,
    ) -> SyncResult<ListPage> {
        let delay = self.lock().list_delay;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.lock();
        if continuation.is_none() {
            state.pages_served = 0;
        }
        if state.fail_list_page == Some(state.pages_served) {
            return Err(SyncError::remote(
                "store.list",
                format!("s3://{container}/{prefix}"),
                io::Error::other("injected listing failure"),
            ));
        }
        state.pages_served += 1;

        let Some(objects) = state.containers.get(container) else {
            return Err(SyncError::remote(
                "store.list",
                format!("s3://{container}/{prefix}"),
                io::Error::new(io::ErrorKind::NotFound, "no such bucket"),
            ));
        };
        let mut page: Vec<RemoteObject> = objects
            .iter()
            .filter(|(key, _)| key.starts_with(prefix))
            .filter(|(key, _)| continuation.as_deref().is_none_or(|after| key.as_str() > after))
            .take(self.page_size + 1)
            .map(|(key, object)| RemoteObject {
                key: key.clone(),
                etag: object.etag.clone(),
            })
            .collect();
        drop(state);

        let next = if page.len() > self.page_size {
            page.truncate(self.page_size);
            page.last().map(|object| object.key.clone())
        } else {
            None
        };
        Ok(ListPage {
            objects: page,
            next,
        })
    }

    async fn fetch(
        &self,
        container: &str,
        key: &str,
        writer: &mut (dyn AsyncWrite + Send + Unpin),
    ) -> SyncResult<u64> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        let target = format!("s3://{container}/{key}");
        let (body, fail_after) = {
            let state = self.lock();
            let object = state
                .containers
                .get(container)
                .and_then(|objects| objects.get(key))
                .ok_or_else(|| {
                    SyncError::remote(
                        "store.get",
                        target.clone(),
                        io::Error::new(io::ErrorKind::NotFound, "no such key"),
                    )
                })?;
            (object.body.clone(), state.fail_fetch.get(key).copied())
        };

        let limit = fail_after.map_or(body.len(), |after| after.min(body.len()));
        writer
            .write_all(&body[..limit])
            .await
            .map_err(|err| SyncError::remote("store.write_body", target.clone(), err))?;
        if fail_after.is_some() {
            return Err(SyncError::remote(
                "store.read_body",
                target,
                io::Error::new(io::ErrorKind::ConnectionReset, "injected transfer failure"),
            ));
        }
        Ok(body.len() as u64)
    }
}
