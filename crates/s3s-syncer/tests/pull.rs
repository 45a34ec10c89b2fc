//! End-to-end mirroring runs against the in-memory store.

use std::collections::BTreeSet;
use std::fs;
use std::sync::Arc;

use anyhow::{Context, Result};
use s3s_syncer::{MemoryObjectStore, SyncError, SyncerConfig, SyncerService};
use s3s_test_support::fixtures::{Sandbox, directory_listing, tree_snapshot, write_tree};

const BUCKET: &str = "media";

fn service(sandbox: &Sandbox, store: &MemoryObjectStore, workers: usize) -> Result<SyncerService> {
    let config = SyncerConfig {
        local_dir: sandbox.root().to_path_buf(),
        remote_uri: format!("s3://{BUCKET}/library"),
        temp_dir: sandbox.staging().to_path_buf(),
        workers,
        queue_capacity: 4,
        ..SyncerConfig::default()
    };
    SyncerService::new(&config, Arc::new(store.clone())).context("engine construction failed")
}

#[tokio::test]
async fn end_to_end_scenario_tracks_remote_changes() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/a.txt", b"1".to_vec(), "1");
    store.put_with_etag(BUCKET, "library/b/c.txt", b"2".to_vec(), "2");
    let mut engine = service(&sandbox, &store, 2)?;

    let first = engine.pull().await?;
    assert_eq!((first.listed, first.fetched), (2, 2));
    assert!(first.is_clean());
    assert_eq!(fs::read(sandbox.root().join("a.txt"))?, b"1");
    assert_eq!(fs::read(sandbox.root().join("b/c.txt"))?, b"2");
    assert_eq!(engine.hash_index().get("a.txt").as_deref(), Some("1"));
    assert_eq!(engine.hash_index().get("b/c.txt").as_deref(), Some("2"));

    store.put_with_etag(BUCKET, "library/a.txt", b"3".to_vec(), "3");
    assert!(store.remove(BUCKET, "library/b/c.txt"));

    let second = engine.pull().await?;
    assert_eq!((second.listed, second.fetched), (1, 1));
    assert_eq!(second.deleted, 1);
    assert_eq!(fs::read(sandbox.root().join("a.txt"))?, b"3");
    assert_eq!(engine.hash_index().get("a.txt").as_deref(), Some("3"));
    assert!(!sandbox.root().join("b/c.txt").exists());
    assert!(!sandbox.root().join("b").exists());
    assert_eq!(engine.hash_index().get("b/c.txt"), None);
    Ok(())
}

#[tokio::test]
async fn locally_deleted_file_is_restored_on_next_run() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/a.txt", b"1".to_vec(), "1");
    let mut engine = service(&sandbox, &store, 2)?;

    engine.pull().await?;
    fs::remove_file(sandbox.root().join("a.txt"))?;

    let second = engine.pull().await?;
    assert_eq!((second.listed, second.queued, second.fetched), (1, 1, 1));
    assert_eq!(fs::read(sandbox.root().join("a.txt"))?, b"1");
    Ok(())
}

#[tokio::test]
async fn object_restored_with_same_etag_is_reinstalled() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/a.txt", b"1".to_vec(), "1");
    store.put_with_etag(BUCKET, "library/b.txt", b"2".to_vec(), "2");
    let mut engine = service(&sandbox, &store, 2)?;

    engine.pull().await?;
    assert!(store.remove(BUCKET, "library/a.txt"));
    let removal = engine.pull().await?;
    assert_eq!(removal.deleted, 1);
    assert!(!sandbox.root().join("a.txt").exists());
    assert_eq!(engine.hash_index().get("a.txt"), None);

    store.put_with_etag(BUCKET, "library/a.txt", b"1".to_vec(), "1");
    let restored = engine.pull().await?;
    assert_eq!((restored.listed, restored.queued, restored.fetched), (2, 1, 1));
    assert_eq!(fs::read(sandbox.root().join("a.txt"))?, b"1");
    Ok(())
}

#[tokio::test]
async fn keys_aliasing_a_canonical_path_are_not_mirrored() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/a.txt", b"canonical".to_vec(), "1");
    store.put_with_etag(BUCKET, "library//a.txt", b"double".to_vec(), "2");
    store.put_with_etag(BUCKET, "library/./a.txt", b"dotted".to_vec(), "3");
    let mut engine = service(&sandbox, &store, 3)?;

    let outcome = engine.pull().await?;
    assert!(outcome.is_clean());
    assert_eq!((outcome.listed, outcome.fetched), (1, 1));
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(fs::read(sandbox.root().join("a.txt"))?, b"canonical");
    assert_eq!(engine.hash_index().get("a.txt").as_deref(), Some("1"));
    Ok(())
}

#[tokio::test]
async fn second_run_against_unchanged_listing_is_a_no_op() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put(BUCKET, "library/x/one.bin", vec![1_u8; 64]);
    store.put(BUCKET, "library/two.bin", vec![2_u8; 32]);
    let mut engine = service(&sandbox, &store, 3)?;

    engine.pull().await?;
    let fetches = store.fetch_count();
    let before = tree_snapshot(sandbox.root())?;

    let again = engine.pull().await?;
    assert_eq!(again.listed, 2);
    assert_eq!(again.queued, 0);
    assert_eq!(again.fetched, 0);
    assert_eq!(again.deleted, 0);
    assert_eq!(store.fetch_count(), fetches);
    assert_eq!(tree_snapshot(sandbox.root())?, before);
    Ok(())
}

#[tokio::test]
async fn run_converges_arbitrary_local_tree_onto_listing() -> Result<()> {
    let sandbox = Sandbox::new()?;
    write_tree(
        sandbox.root(),
        &[
            ("keep.txt", b"stale"),
            ("orphan.txt", b"orphan"),
            ("deep/nested/orphan.txt", b"orphan"),
        ],
    )?;
    let store = MemoryObjectStore::new();
    store.put(BUCKET, "library/keep.txt", b"fresh".to_vec());
    store.put(BUCKET, "library/new/file.txt", b"new".to_vec());
    store.put(BUCKET, "library/new/", Vec::new());
    store.put(BUCKET, "elsewhere/ignored.txt", b"no".to_vec());
    let mut engine = service(&sandbox, &store, 2)?;

    let outcome = engine.pull().await?;
    assert_eq!(outcome.deleted, 2);
    let snapshot = tree_snapshot(sandbox.root())?;
    let keys: BTreeSet<_> = snapshot.keys().cloned().collect();
    assert_eq!(
        keys,
        BTreeSet::from(["keep.txt".to_string(), "new/file.txt".to_string()])
    );
    assert_eq!(snapshot["keep.txt"], b"fresh");
    assert_eq!(
        directory_listing(sandbox.root())?,
        BTreeSet::from(["new".to_string()])
    );
    Ok(())
}

#[tokio::test]
async fn objects_on_late_pages_protect_local_files() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::with_page_size(2);
    for name in ["a", "b", "c", "d", "e"] {
        store.put(BUCKET, &format!("library/{name}"), name.as_bytes().to_vec());
    }
    let mut engine = service(&sandbox, &store, 2)?;
    engine.pull().await?;

    write_tree(sandbox.root(), &[("zz-local-only", b"gone")])?;
    let outcome = engine.pull().await?;
    assert_eq!(outcome.listed, 5);
    assert_eq!(outcome.deleted, 1);
    assert!(sandbox.root().join("e").exists());
    assert!(!sandbox.root().join("zz-local-only").exists());
    Ok(())
}

#[tokio::test]
async fn listing_failure_skips_housekeeping() -> Result<()> {
    let sandbox = Sandbox::new()?;
    write_tree(sandbox.root(), &[("local-only.txt", b"keep me")])?;
    let store = MemoryObjectStore::with_page_size(1);
    store.put(BUCKET, "library/a", b"a".to_vec());
    store.put(BUCKET, "library/b", b"b".to_vec());
    store.fail_listing_at_page(1);
    let mut engine = service(&sandbox, &store, 1)?;

    let err = engine
        .pull()
        .await
        .err()
        .context("listing failure should abort the run")?;
    assert!(matches!(err, SyncError::Remote { .. }));
    assert!(sandbox.root().join("local-only.txt").exists());
    assert!(sandbox.root().join("a").exists());
    assert!(!sandbox.staging().exists());
    Ok(())
}

#[tokio::test]
async fn interrupted_transfer_leaves_previous_version_in_place() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/doc.txt", b"version one".to_vec(), "v1");
    store.put_with_etag(BUCKET, "library/fresh.txt", b"fresh".to_vec(), "f1");
    let mut engine = service(&sandbox, &store, 2)?;
    engine.pull().await?;

    store.put_with_etag(BUCKET, "library/doc.txt", b"version two, longer".to_vec(), "v2");
    store.put_with_etag(BUCKET, "library/other.txt", b"other".to_vec(), "o1");
    store.fail_fetch_after("library/doc.txt", 5);
    store.fail_fetch_after("library/other.txt", 2);

    let outcome = engine.pull().await?;
    assert_eq!(outcome.queued, 2);
    assert_eq!(outcome.fetched, 0);
    assert_eq!(outcome.failures.len(), 2);
    assert!(outcome.first_error().is_some());
    assert_eq!(fs::read(sandbox.root().join("doc.txt"))?, b"version one");
    assert!(!sandbox.root().join("other.txt").exists());
    assert_eq!(engine.hash_index().get("doc.txt").as_deref(), Some("v1"));
    assert!(sandbox.root().join("fresh.txt").exists());

    store.clear_failures();
    let retry = engine.pull().await?;
    assert_eq!(retry.fetched, 2);
    assert_eq!(fs::read(sandbox.root().join("doc.txt"))?, b"version two, longer");
    Ok(())
}

#[tokio::test]
async fn seeded_fingerprint_skips_download() -> Result<()> {
    let sandbox = Sandbox::new()?;
    write_tree(sandbox.root(), &[("same.txt", b"identical"), ("diff.txt", b"old")])?;
    let store = MemoryObjectStore::new();
    store.put(BUCKET, "library/same.txt", b"identical".to_vec());
    store.put(BUCKET, "library/diff.txt", b"new".to_vec());
    let mut engine = service(&sandbox, &store, 2)?;

    assert_eq!(engine.init_hash_index().await?, 2);
    let outcome = engine.pull().await?;
    assert_eq!(outcome.listed, 2);
    assert_eq!(outcome.queued, 1);
    assert_eq!(store.fetch_count(), 1);
    assert_eq!(fs::read(sandbox.root().join("diff.txt"))?, b"new");
    Ok(())
}

#[tokio::test]
async fn explicit_index_entry_matching_etag_is_skipped() -> Result<()> {
    let sandbox = Sandbox::new()?;
    write_tree(sandbox.root(), &[("k.txt", b"whatever")])?;
    let store = MemoryObjectStore::new();
    store.put_with_etag(BUCKET, "library/k.txt", b"remote".to_vec(), "abc");
    let mut engine = service(&sandbox, &store, 1)?;
    engine.hash_index().insert("k.txt", "abc");

    let outcome = engine.pull().await?;
    assert_eq!(outcome.queued, 0);
    assert_eq!(store.fetch_count(), 0);
    assert_eq!(fs::read(sandbox.root().join("k.txt"))?, b"whatever");
    Ok(())
}

#[tokio::test]
async fn empty_directories_are_pruned_but_survivors_protect_ancestors() -> Result<()> {
    let sandbox = Sandbox::new()?;
    write_tree(
        sandbox.root(),
        &[
            ("stale/only.txt", b"x"),
            ("stale/deeper/also.txt", b"x"),
            ("mixed/gone.txt", b"x"),
            ("mixed/a/b/c/kept.txt", b"x"),
        ],
    )?;
    let store = MemoryObjectStore::new();
    store.put(BUCKET, "library/mixed/a/b/c/kept.txt", b"x".to_vec());
    let mut engine = service(&sandbox, &store, 2)?;

    let outcome = engine.pull().await?;
    assert_eq!(outcome.deleted, 3);
    assert_eq!(
        directory_listing(sandbox.root())?,
        BTreeSet::from([
            "mixed".to_string(),
            "mixed/a".to_string(),
            "mixed/a/b".to_string(),
            "mixed/a/b/c".to_string(),
        ])
    );

    assert!(store.remove(BUCKET, "library/mixed/a/b/c/kept.txt"));
    engine.pull().await?;
    assert!(directory_listing(sandbox.root())?.is_empty());
    assert!(sandbox.root().exists());
    Ok(())
}

#[tokio::test]
async fn worker_count_does_not_change_the_result() -> Result<()> {
    let store = MemoryObjectStore::with_page_size(7);
    for index in 0..40 {
        let key = format!("library/dir{}/file{index}.dat", index % 5);
        store.put(BUCKET, &key, format!("payload {index}").into_bytes());
    }

    let serial_box = Sandbox::new()?;
    let mut serial = service(&serial_box, &store, 1)?;
    serial.pull().await?;

    let parallel_box = Sandbox::new()?;
    let mut parallel = service(&parallel_box, &store, 8)?;
    let outcome = parallel.pull().await?;
    assert_eq!(outcome.fetched, 40);

    assert_eq!(
        tree_snapshot(serial_box.root())?,
        tree_snapshot(parallel_box.root())?
    );
    assert_eq!(
        serial.hash_index().snapshot(),
        parallel.hash_index().snapshot()
    );
    Ok(())
}

#[test]
fn construction_rejects_missing_root() -> Result<()> {
    let sandbox = Sandbox::new()?;
    let config = SyncerConfig {
        local_dir: sandbox.root().join("missing"),
        remote_uri: "s3://media/library".to_string(),
        ..SyncerConfig::default()
    };
    let err = SyncerService::new(&config, Arc::new(MemoryObjectStore::new()))
        .err()
        .context("construction should fail")?;
    assert!(err.is_config());
    Ok(())
}
