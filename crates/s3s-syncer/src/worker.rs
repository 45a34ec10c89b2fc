//! Download worker pool.
//!
//! # Design
//! - A fixed number of workers share one bounded task receiver.
//! - Each task streams into a temp file named from the destination path, then renames it into place.
//! - Failures abandon the task, remove its temp file and are reported on an unbounded channel.
//! - The index is only updated after the rename succeeds.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio::fs;
use tokio::io::AsyncWriteExt;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::dispatch::SyncTask;
use crate::error::{SyncError, SyncResult};
use crate::index::HashIndex;
use crate::store::ObjectStore;

/// Shared state handed to every worker.
pub(crate) struct WorkerContext {
    pub(crate) store: Arc<dyn ObjectStore>,
    pub(crate) container: String,
    pub(crate) temp_dir: PathBuf,
    pub(crate) index: HashIndex,
    pub(crate) failures: mpsc::UnboundedSender<SyncError>,
}

/// Totals reported once every worker has exited.
#[derive(Debug, Default)]
pub(crate) struct PoolReport {
    pub(crate) fetched: usize,
    pub(crate) join_failures: Vec<SyncError>,
}

/// Handle over the spawned workers.
pub(crate) struct WorkerPool {
    workers: JoinSet<usize>,
}

impl WorkerPool {
    /// Spawn `count` workers draining `tasks` until the sender side is dropped.
    pub(crate) fn spawn(
        count: usize,
        context: WorkerContext,
        tasks: mpsc::Receiver<SyncTask>,
    ) -> Self {
        let context = Arc::new(context);
        let tasks = Arc::new(Mutex::new(tasks));
        let mut workers = JoinSet::new();
        for worker in 0..count {
            workers.spawn(run_worker(worker, Arc::clone(&context), Arc::clone(&tasks)));
        }
        Self { workers }
    }

    /// Wait for every worker to exit.
    pub(crate) async fn join(mut self) -> PoolReport {
        let mut report = PoolReport::default();
        while let Some(joined) = self.workers.join_next().await {
            match joined {
                Ok(fetched) => report.fetched += fetched,
                Err(source) => {
                    warn!(error = %source, "download worker terminated abnormally");
                    report.join_failures.push(SyncError::WorkerJoin { source });
                }
            }
        }
        report
    }
}

async fn run_worker(
    worker: usize,
    context: Arc<WorkerContext>,
    tasks: Arc<Mutex<mpsc::Receiver<SyncTask>>>,
) -> usize {
    let mut fetched = 0;
    while let Some(task) = next_task(&tasks).await {
        match install(&context, &task).await {
            Ok(bytes) => {
                fetched += 1;
                debug!(worker, key = %task.key, bytes, path = %task.local_path.display(), "installed object");
            }
            Err(err) => {
                warn!(worker, error = %err, key = %task.key, path = %task.local_path.display(), "download failed");
                if context.failures.send(err).is_err() {
                    warn!(worker, key = %task.key, "failure channel closed; dropping error");
                }
            }
        }
    }
    debug!(worker, fetched, "download worker finished");
    fetched
}

async fn next_task(tasks: &Mutex<mpsc::Receiver<SyncTask>>) -> Option<SyncTask> {
    tasks.lock().await.recv().await
}

/// Deterministic temp file name for a destination path.
pub(crate) fn temp_file_name(destination: &Path) -> String {
    format!("{:x}", md5::compute(destination.as_os_str().as_encoded_bytes()))
}

async fn install(context: &WorkerContext, task: &SyncTask) -> SyncResult<u64> {
    if let Some(parent) = task.local_path.parent() {
        fs::create_dir_all(parent)
            .await
            .map_err(|source| SyncError::io("install.create_parent", parent, source))?;
    }

    let temp_path = context.temp_dir.join(temp_file_name(&task.local_path));
    let result = download_and_rename(context, task, &temp_path).await;
    if result.is_err() {
        discard_temp(&temp_path).await;
        return result;
    }

    context.index.insert(task.relative.clone(), task.etag.clone());
    result
}

async fn download_and_rename(
    context: &WorkerContext,
    task: &SyncTask,
    temp_path: &Path,
) -> SyncResult<u64> {
    let mut file = fs::File::create(temp_path)
        .await
        .map_err(|source| SyncError::io("install.create_temp", temp_path, source))?;
    let bytes = context
        .store
        .fetch(&context.container, &task.key, &mut file)
        .await?;
    file.flush()
        .await
        .map_err(|source| SyncError::io("install.flush_temp", temp_path, source))?;
    file.sync_all()
        .await
        .map_err(|source| SyncError::io("install.sync_temp", temp_path, source))?;
    drop(file);

    fs::rename(temp_path, &task.local_path)
        .await
        .map_err(|source| SyncError::io("install.rename", &task.local_path, source))?;
    Ok(bytes)
}

async fn discard_temp(temp_path: &Path) {
    match fs::remove_file(temp_path).await {
        Ok(()) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => {
            warn!(error = %err, path = %temp_path.display(), "failed to remove temp file");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryObjectStore;
    use std::error::Error;
    use tempfile::TempDir;

    struct Harness {
        _root: TempDir,
        local: PathBuf,
        staging: PathBuf,
        store: MemoryObjectStore,
        index: HashIndex,
    }

    impl Harness {
        fn new() -> Result<Self, Box<dyn Error>> {
            let root = TempDir::new()?;
            let local = root.path().join("local");
            let staging = root.path().join("staging");
            std::fs::create_dir_all(&local)?;
            std::fs::create_dir_all(&staging)?;
            Ok(Self {
                _root: root,
                local,
                staging,
                store: MemoryObjectStore::new(),
                index: HashIndex::new(),
            })
        }

        fn context(&self) -> (WorkerContext, mpsc::UnboundedReceiver<SyncError>) {
            let (failures, failure_rx) = mpsc::unbounded_channel();
            (
                WorkerContext {
                    store: Arc::new(self.store.clone()),
                    container: "bucket".to_string(),
                    temp_dir: self.staging.clone(),
                    index: self.index.clone(),
                    failures,
                },
                failure_rx,
            )
        }

        fn task(&self, relative: &str, etag: &str) -> SyncTask {
            SyncTask {
                key: relative.to_string(),
                local_path: self.local.join(relative),
                etag: etag.to_string(),
                relative: relative.to_string(),
            }
        }
    }

    #[test]
    fn temp_names_are_stable_and_distinct() {
        let a = temp_file_name(Path::new("/root/a.txt"));
        assert_eq!(a, temp_file_name(Path::new("/root/a.txt")));
        assert_ne!(a, temp_file_name(Path::new("/root/b.txt")));
        assert_eq!(a.len(), 32);
    }

    #[tokio::test]
    async fn install_creates_parents_and_indexes() -> Result<(), Box<dyn Error>> {
        let harness = Harness::new()?;
        harness.store.put_with_etag("bucket", "b/c.txt", b"2".to_vec(), "2");
        let (context, _failures) = harness.context();

        let bytes = install(&context, &harness.task("b/c.txt", "2")).await?;
        assert_eq!(bytes, 1);
        assert_eq!(std::fs::read(harness.local.join("b/c.txt"))?, b"2");
        assert_eq!(harness.index.get("b/c.txt").as_deref(), Some("2"));
        assert_eq!(std::fs::read_dir(&harness.staging)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn failed_transfer_keeps_previous_version() -> Result<(), Box<dyn Error>> {
        let harness = Harness::new()?;
        std::fs::write(harness.local.join("a.txt"), b"old")?;
        harness.index.insert("a.txt", "old");
        harness
            .store
            .put_with_etag("bucket", "a.txt", b"brand new".to_vec(), "new");
        harness.store.fail_fetch_after("a.txt", 4);
        let (context, _failures) = harness.context();

        assert!(install(&context, &harness.task("a.txt", "new")).await.is_err());
        assert_eq!(std::fs::read(harness.local.join("a.txt"))?, b"old");
        assert_eq!(harness.index.get("a.txt").as_deref(), Some("old"));
        assert_eq!(std::fs::read_dir(&harness.staging)?.count(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn pool_reports_every_failure() -> Result<(), Box<dyn Error>> {
        let harness = Harness::new()?;
        harness.store.put("bucket", "ok.txt", b"ok".to_vec());
        let (context, mut failures) = harness.context();
        let (tx, rx) = mpsc::channel(4);
        let pool = WorkerPool::spawn(3, context, rx);

        tx.send(harness.task("ok.txt", "e")).await?;
        tx.send(harness.task("missing-1", "e")).await?;
        tx.send(harness.task("missing-2", "e")).await?;
        drop(tx);

        let report = pool.join().await;
        assert_eq!(report.fetched, 1);
        assert!(report.join_failures.is_empty());

        let mut reported = 0;
        while failures.try_recv().is_ok() {
            reported += 1;
        }
        assert_eq!(reported, 2);
        Ok(())
    }
}
