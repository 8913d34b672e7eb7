use patchbay_crypto::{AeadCipher, PassthroughCipher, generate_random_key};
use patchbay_storage::{KvStore, StorageCategory, StorageManager};
use pretty_assertions::assert_eq;
use std::sync::Arc;

fn encrypted_manager() -> StorageManager {
    StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        Arc::new(AeadCipher::new(generate_random_key())),
    )
}

#[tokio::test]
async fn write_read_roundtrip_through_full_pipeline() {
    let manager = encrypted_manager();
    let payload = b"component payload bytes".to_vec();

    manager
        .put_bytes(StorageCategory::Component, "ui.dashboard", payload.clone())
        .await
        .unwrap();

    let read = manager
        .get_bytes(StorageCategory::Component, "ui.dashboard")
        .await
        .unwrap();
    assert_eq!(read, Some(payload));
}

#[tokio::test]
async fn json_roundtrip() {
    let manager = encrypted_manager();
    let value = vec!["a".to_string(), "b".to_string()];

    manager
        .put_json(StorageCategory::Config, "list", &value)
        .await
        .unwrap();
    let read: Option<Vec<String>> = manager
        .get_json(StorageCategory::Config, "list")
        .await
        .unwrap();
    assert_eq!(read, Some(value));
}

#[tokio::test]
async fn second_read_is_a_cache_hit() {
    let manager = encrypted_manager();
    manager
        .put_bytes(StorageCategory::Resource, "logo", b"png".to_vec())
        .await
        .unwrap();

    // The write-through already populated the cache.
    manager
        .get_bytes(StorageCategory::Resource, "logo")
        .await
        .unwrap();
    manager
        .get_bytes(StorageCategory::Resource, "logo")
        .await
        .unwrap();

    let stats = manager.cache_stats();
    assert_eq!(stats.hits, 2);
    assert_eq!(stats.misses, 0);
}

#[tokio::test]
async fn cold_read_misses_then_hits() {
    let manager = encrypted_manager();
    manager
        .put_bytes(StorageCategory::Resource, "logo", b"png".to_vec())
        .await
        .unwrap();
    manager.clear_cache();

    manager
        .get_bytes(StorageCategory::Resource, "logo")
        .await
        .unwrap();
    manager
        .get_bytes(StorageCategory::Resource, "logo")
        .await
        .unwrap();

    let stats = manager.cache_stats();
    assert_eq!(stats.misses, 1);
    assert_eq!(stats.hits, 1);
}

#[tokio::test]
async fn corrupt_row_degrades_to_not_found() {
    // Write through a passthrough manager so the stored blob is garbage
    // from the point of view of an encrypting reader.
    let store = KvStore::open_in_memory().unwrap();
    store
        .put(StorageCategory::Component, "broken", b"not an AEAD blob at all")
        .unwrap();

    let manager = StorageManager::new(store, Arc::new(AeadCipher::new(generate_random_key())));
    let read = manager
        .get_bytes(StorageCategory::Component, "broken")
        .await
        .unwrap();
    assert_eq!(read, None);
}

#[tokio::test]
async fn delete_removes_from_store_and_cache() {
    let manager = encrypted_manager();
    manager
        .put_bytes(StorageCategory::Component, "x", b"1".to_vec())
        .await
        .unwrap();

    assert!(manager.delete(StorageCategory::Component, "x").await.unwrap());
    let read = manager
        .get_bytes(StorageCategory::Component, "x")
        .await
        .unwrap();
    assert_eq!(read, None);
}

#[tokio::test]
async fn export_import_roundtrip() {
    let key = generate_random_key();
    let source = StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        Arc::new(AeadCipher::new(key.clone())),
    );
    source
        .put_bytes(StorageCategory::Component, "a", b"one".to_vec())
        .await
        .unwrap();
    source
        .put_bytes(StorageCategory::Config, "b", b"two".to_vec())
        .await
        .unwrap();

    let backup = source.export_backup().await.unwrap();
    assert_eq!(backup.len(), 2);
    assert!(backup.contains_key("component_a"));
    assert!(backup.contains_key("config_b"));

    // Restore into a fresh store holding the same key.
    let target = StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        Arc::new(AeadCipher::new(key)),
    );
    let report = target.import_backup(&backup).await.unwrap();
    assert!(report.success());
    assert_eq!(report.imported, 2);

    let read = target
        .get_bytes(StorageCategory::Component, "a")
        .await
        .unwrap();
    assert_eq!(read, Some(b"one".to_vec()));
}

#[tokio::test]
async fn import_continues_past_bad_entries() {
    let manager = StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        Arc::new(PassthroughCipher),
    );
    manager
        .put_bytes(StorageCategory::Component, "good", b"v".to_vec())
        .await
        .unwrap();

    let mut backup = manager.export_backup().await.unwrap();
    backup.insert("mystery_key".to_string(), "AAAA".to_string());
    backup.insert("component_bad64".to_string(), "%%%not base64%%%".to_string());

    let target = StorageManager::new(
        KvStore::open_in_memory().unwrap(),
        Arc::new(PassthroughCipher),
    );
    let report = target.import_backup(&backup).await.unwrap();

    assert!(!report.success());
    assert_eq!(report.imported, 1);
    assert_eq!(report.failed.len(), 2);
}
