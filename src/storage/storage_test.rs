use tempfile::TempDir;

use crate::KeyValueStore;
use crate::MemoryKeyValueStore;
use crate::SledKeyValueStore;
use crate::StorageError;

#[test]
fn test_sled_round_trip_and_overwrite() {
    let dir = TempDir::new().expect("temp dir");
    let store = SledKeyValueStore::open(dir.path()).expect("open sled store");

    assert!(store.get_item("user/1").expect("get").is_none());

    store.set_item("user/1", r#"{"name":"alice"}"#).expect("set");
    assert_eq!(
        store.get_item("user/1").expect("get").as_deref(),
        Some(r#"{"name":"alice"}"#)
    );

    store.set_item("user/1", r#"{"name":"bob"}"#).expect("overwrite");
    assert_eq!(
        store.get_item("user/1").expect("get").as_deref(),
        Some(r#"{"name":"bob"}"#)
    );
    assert_eq!(store.len(), 1);
}

#[test]
fn test_sled_survives_reopen() {
    let dir = TempDir::new().expect("temp dir");
    {
        let store = SledKeyValueStore::open(dir.path()).expect("open sled store");
        store.set_item("dict/en", r#"["hello"]"#).expect("set");
    }

    let store = SledKeyValueStore::open(dir.path()).expect("reopen sled store");
    assert_eq!(
        store.get_item("dict/en").expect("get").as_deref(),
        Some(r#"["hello"]"#)
    );
}

#[test]
fn test_sled_rejects_non_utf8_value() {
    let dir = TempDir::new().expect("temp dir");
    let db = sled::open(dir.path()).expect("open db");

    // Write raw bytes behind the adapter's back to simulate corruption.
    let tree = db.open_tree(crate::QUERY_CACHE_TREE).expect("tree");
    tree.insert("corrupt", &[0xff, 0xfe, 0x00][..]).expect("insert");

    let store = SledKeyValueStore::from_db(db).expect("store from db");
    match store.get_item("corrupt") {
        Err(StorageError::NonUtf8Value { key }) => assert_eq!(key, "corrupt"),
        other => panic!("expected NonUtf8Value, got {other:?}"),
    }
}

#[test]
fn test_memory_store_round_trip() {
    let store = MemoryKeyValueStore::new();
    assert!(store.get_item("k").expect("get").is_none());
    store.set_item("k", "v").expect("set");
    assert_eq!(store.get_item("k").expect("get").as_deref(), Some("v"));
}
