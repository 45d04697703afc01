//! Integration Tests for backend selection and the cache laws
//!
//! Drives the public API the way an application would: build a manager from
//! configuration, take its cache handle, then set/get/forget/remember.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use jazz_cache::cache::{CacheManager, DatabaseStore, FileStore, MemoryStore};
use jazz_cache::config::CacheConfig;
use jazz_cache::{Cache, CacheError, Driver};
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct User {
    name: String,
}

// == Helper Functions ==

fn unreachable_config(driver: &str, tmp: &TempDir) -> CacheConfig {
    CacheConfig {
        driver: driver.to_string(),
        file_path: tmp.path().join("cache"),
        database_path: tmp.path().join("cache.sqlite"),
        redis_url: "redis://127.0.0.1:1".to_string(),
        memcached_host: "127.0.0.1".to_string(),
        memcached_port: 1,
        connect_timeout: Duration::from_secs(1),
        ..CacheConfig::default()
    }
}

/// One cache per backend that runs without an external server.
async fn local_caches(tmp: &TempDir) -> Vec<Cache> {
    vec![
        Cache::new(MemoryStore::new()),
        Cache::new(FileStore::open(tmp.path().join("files")).await.unwrap()),
        Cache::new(
            DatabaseStore::open(tmp.path().join("db.sqlite"), "cache")
                .await
                .unwrap(),
        ),
    ]
}

// == Fallback ==

#[tokio::test]
async fn test_unreachable_redis_falls_back_to_file() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = CacheManager::new(unreachable_config("redis", &tmp));

    let cache = manager.cache().await;

    assert_eq!(cache.driver(), Driver::File);
    assert_eq!(manager.selected(), Some(Driver::File));
    cache
        .set("user:1", &User { name: "Ana".into() }, Duration::from_secs(10))
        .await
        .unwrap();
    assert_eq!(
        cache.get::<User>("user:1").await.unwrap(),
        Some(User { name: "Ana".into() })
    );
}

#[tokio::test]
async fn test_every_unreachable_driver_still_yields_working_cache() {
    for driver in ["redis", "memcached", "dynamodb", "nosuchdriver", ""] {
        let tmp = tempfile::tempdir().unwrap();
        let manager = CacheManager::new(unreachable_config(driver, &tmp));

        let cache = manager.cache().await;

        assert_eq!(cache.driver(), Driver::File, "driver {:?}", driver);
        cache.set("selected", &driver, Duration::from_secs(10)).await.unwrap();
        assert_eq!(
            cache.get::<String>("selected").await.unwrap().as_deref(),
            Some(driver)
        );
    }
}

#[tokio::test]
async fn test_database_driver_is_selected_when_available() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = CacheManager::new(unreachable_config("DATABASE", &tmp));

    let cache = manager.cache().await;

    assert_eq!(cache.driver(), Driver::Database);
    assert!(tmp.path().join("cache.sqlite").exists());
}

#[tokio::test]
async fn test_swing_alias_selects_memory() {
    let tmp = tempfile::tempdir().unwrap();
    let manager = CacheManager::new(unreachable_config("swing", &tmp));

    assert_eq!(manager.cache().await.driver(), Driver::Memory);
    assert!(!tmp.path().join("cache").exists());
}

// == Store Laws ==

#[tokio::test]
async fn test_set_get_forget_laws_on_local_backends() {
    let tmp = tempfile::tempdir().unwrap();

    for cache in local_caches(&tmp).await {
        let driver = cache.driver();

        assert_eq!(cache.get::<i32>("never").await.unwrap(), None, "{}", driver);

        cache.set("k", &1, Duration::from_secs(10)).await.unwrap();
        cache.set("k", &2, Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get::<i32>("k").await.unwrap(), Some(2), "{}", driver);

        cache.forget("k").await.unwrap();
        cache.forget("k").await.unwrap();
        assert_eq!(cache.get::<i32>("k").await.unwrap(), None, "{}", driver);
    }
}

#[tokio::test]
async fn test_expiration_law_on_local_backends() {
    let tmp = tempfile::tempdir().unwrap();
    let caches = local_caches(&tmp).await;

    for cache in &caches {
        cache.set("short", &"v", Duration::from_secs(1)).await.unwrap();
    }

    tokio::time::sleep(Duration::from_millis(1100)).await;

    for cache in &caches {
        assert_eq!(
            cache.get::<String>("short").await.unwrap(),
            None,
            "{} kept an expired entry",
            cache.driver()
        );
    }
}

#[tokio::test]
async fn test_user_scenario_expires_after_ttl() {
    let tmp = tempfile::tempdir().unwrap();
    let caches = local_caches(&tmp).await;
    let ana = User { name: "Ana".into() };

    for cache in &caches {
        cache.set("user:1", &ana, Duration::from_secs(10)).await.unwrap();
        assert_eq!(cache.get::<User>("user:1").await.unwrap(), Some(ana.clone()));
    }

    tokio::time::sleep(Duration::from_secs(11)).await;

    for cache in &caches {
        assert_eq!(cache.get::<User>("user:1").await.unwrap(), None);
    }
}

// == Remember ==

#[tokio::test]
async fn test_remember_law_on_local_backends() {
    let tmp = tempfile::tempdir().unwrap();

    for cache in local_caches(&tmp).await {
        let counter = AtomicUsize::new(0);
        let calls = &counter;
        let produce = move || async move {
            calls.fetch_add(1, Ordering::SeqCst);
            Ok(User { name: "Ana".into() })
        };

        let first = cache
            .remember("user:2", Duration::from_secs(10), produce)
            .await
            .unwrap();
        let second = cache
            .remember("user:2", Duration::from_secs(10), produce)
            .await
            .unwrap();

        assert_eq!(first, second);
        assert_eq!(calls.load(Ordering::SeqCst), 1, "{}", cache.driver());
        assert_eq!(cache.get::<User>("user:2").await.unwrap(), Some(first));
    }
}

#[tokio::test]
async fn test_remember_error_propagates_on_local_backends() {
    let tmp = tempfile::tempdir().unwrap();

    for cache in local_caches(&tmp).await {
        let result = cache
            .remember::<User, _, _>("user:3", Duration::from_secs(10), || async {
                anyhow::bail!("user service unreachable")
            })
            .await;

        assert!(matches!(result, Err(CacheError::Producer(_))));
        assert_eq!(cache.get::<User>("user:3").await.unwrap(), None);
    }
}
