//! Integration Tests for the Cache API
//!
//! Exercises get/set/list/clean end to end against real store files.

use std::time::Duration;

use dbm_cache::cache::{epoch_secs, DbmCache, Inline};
use dbm_cache::{CacheError, Config};
use tempfile::{tempdir, TempDir};

// == Helper Functions ==

fn scratch_store() -> (TempDir, std::path::PathBuf) {
    let dir = tempdir().unwrap();
    let path = dir.path().join("integration.dbm");
    (dir, path)
}

async fn keys(cache: &DbmCache, path: &std::path::Path) -> Vec<String> {
    cache
        .list(path, true)
        .await
        .unwrap()
        .into_iter()
        .map(|e| e.key)
        .collect()
}

// == Round Trip ==

#[tokio::test]
async fn test_set_then_get_returns_value() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();

    let stored = cache.set(&path, "greeting", "hello".to_string(), 60).await.unwrap();
    assert_eq!(stored, "hello");

    let value: Option<String> = cache.get(&path, "greeting").await.unwrap();
    assert_eq!(value.as_deref(), Some("hello"));
}

#[tokio::test]
async fn test_store_survives_new_cache_instance() {
    let (_dir, path) = scratch_store();

    DbmCache::new()
        .set(&path, "durable", vec![1u32, 2, 3], 600)
        .await
        .unwrap();

    // A fresh instance shares nothing in memory with the writer.
    let value: Vec<u32> = DbmCache::new().get_strict(&path, "durable").await.unwrap();
    assert_eq!(value, vec![1, 2, 3]);
}

// == Expiry ==

#[tokio::test]
async fn test_expired_entry_returns_default() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();

    cache.set(&path, "short", "lived".to_string(), 1).await.unwrap();

    // Whole-second expiry: past the boundary no matter when the write landed.
    tokio::time::sleep(Duration::from_millis(2100)).await;

    let value = cache
        .get_or(&path, "short", "fallback".to_string())
        .await
        .unwrap();
    assert_eq!(value, "fallback");

    let strict = cache.get_strict::<String>(&path, "short").await;
    assert!(matches!(strict, Err(CacheError::KeyNotFound(_))));
}

#[tokio::test]
async fn test_strict_miss_on_absent_key() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();
    cache.set(&path, "present", 1, 60).await.unwrap();

    let result = cache.get_strict::<i32>(&path, "missing").await;
    assert!(matches!(result, Err(CacheError::KeyNotFound(ref k)) if k == "missing"));
}

#[tokio::test]
async fn test_zero_ttl_is_never_expired() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();

    cache.set(&path, "pinned", "forever".to_string(), 0).await.unwrap();

    let far_future = epoch_secs() + 10 * 365 * 24 * 3600;
    let report = cache.clean(&path, Some(far_future), false).await.unwrap();
    assert_eq!(report.removed, 0);

    let value: String = cache.get_strict(&path, "pinned").await.unwrap();
    assert_eq!(value, "forever");
}

// == Clean ==

#[tokio::test]
async fn test_clean_removes_entries_expiring_before_cutoff() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();

    cache.set(&path, "five", 5, 5).await.unwrap();
    cache.set(&path, "fifteen", 15, 15).await.unwrap();
    cache.set(&path, "twenty_five", 25, 25).await.unwrap();

    let cutoff = epoch_secs() + 20;
    let report = cache.clean(&path, Some(cutoff), false).await.unwrap();
    assert_eq!(report.scanned, 3);
    assert_eq!(report.removed, 2);

    assert_eq!(keys(&cache, &path).await, vec!["twenty_five"]);
}

#[tokio::test]
async fn test_clean_twice_is_a_noop() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();

    cache.set(&path, "a", 1, 5).await.unwrap();
    cache.set(&path, "b", 2, 500).await.unwrap();
    let cutoff = epoch_secs() + 60;

    let first = cache.clean(&path, Some(cutoff), true).await.unwrap();
    let second = cache.clean(&path, Some(cutoff), true).await.unwrap();

    assert_eq!(first.removed, 1);
    assert_eq!(second.removed, 0);
    assert_eq!(keys(&cache, &path).await, vec!["b"]);
}

// == Concurrency ==

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sets_are_all_retrievable() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::from_config(&Config {
        max_workers: 8,
        ..Config::default()
    });

    let mut handles = Vec::new();
    for i in 0..32 {
        let cache = cache.clone();
        let path = path.clone();
        handles.push(tokio::spawn(async move {
            cache.set(&path, &format!("key{i:02}"), i, 300).await
        }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    for i in 0..32 {
        let value: i32 = cache.get_strict(&path, &format!("key{i:02}")).await.unwrap();
        assert_eq!(value, i);
    }
    assert_eq!(keys(&cache, &path).await.len(), 32);
    assert_eq!(cache.stats().writes, 32);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reads_proceed_while_writers_run() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();
    cache.set(&path, "stable", "value".to_string(), 300).await.unwrap();

    let writer = {
        let cache = cache.clone();
        let path = path.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                cache.set(&path, &format!("w{i}"), i, 300).await.unwrap();
            }
        })
    };

    for _ in 0..20 {
        let value: String = cache.get_strict(&path, "stable").await.unwrap();
        assert_eq!(value, "value");
    }
    writer.await.unwrap();
}

#[tokio::test]
async fn test_reads_ignore_held_write_lock() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::new();
    cache.set(&path, "k", 1, 300).await.unwrap();

    let guard = cache.write_coordinator().acquire().await;

    let value = tokio::time::timeout(Duration::from_millis(300), cache.get::<i32>(&path, "k"))
        .await
        .expect("get should not wait for the write lock")
        .unwrap();
    assert_eq!(value, Some(1));

    let listed = tokio::time::timeout(Duration::from_millis(300), cache.list(&path, false))
        .await
        .expect("list should not wait for the write lock")
        .unwrap();
    assert_eq!(listed.len(), 1);

    let blocked = tokio::time::timeout(Duration::from_millis(300), cache.set(&path, "k", 2, 300)).await;
    assert!(blocked.is_err(), "set must wait for the write lock");

    drop(guard);
    assert_eq!(cache.get::<i32>(&path, "k").await.unwrap(), Some(1));
    cache.set(&path, "k", 2, 300).await.unwrap();
    assert_eq!(cache.get::<i32>(&path, "k").await.unwrap(), Some(2));
}

#[tokio::test]
async fn test_inline_offload_behaves_the_same() {
    let (_dir, path) = scratch_store();
    let cache = DbmCache::with_offload(Inline, &Config::default());

    cache.set(&path, "k", "v".to_string(), 60).await.unwrap();
    let value: String = cache.get_strict(&path, "k").await.unwrap();
    assert_eq!(value, "v");

    let report = cache.clean(&path, None, false).await.unwrap();
    assert_eq!(report.removed, 0);
}
