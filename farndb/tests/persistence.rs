use std::{fs, path::Path};

use farndb::{
    json::{AtomicWrite, JsonFileStore, backup_path, temp_path},
    prelude::*,
    state::StoreState,
};
use serde_json::{Value, json};

async fn names(store: &DocumentStore<JsonFileStore>) -> Vec<Value> {
    store
        .find("users", Value::Null)
        .await
        .unwrap()
        .into_iter()
        .map(|doc| doc["name"].clone())
        .collect()
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

#[tokio::test]
async fn state_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");

    let store = farndb::open(&path).await.unwrap();
    let id = store.insert("users", json!({"name": "Ann", "tags": ["x"]})).await.unwrap();
    store.insert("users", json!({"name": "Bea"})).await.unwrap();
    store.insert("posts", json!({"title": "Hi"})).await.unwrap();
    store.update("users", json!({"name": "Bea"}), json!({"age": 7})).await.unwrap();
    let before = store.snapshot().await;
    store.shutdown().await.unwrap();

    let store = farndb::open(&path).await.unwrap();

    assert_eq!(store.snapshot().await, before);
    assert_eq!(store.list_collections().await.unwrap(), vec!["posts", "users"]);
    assert_eq!(names(&store).await, vec![json!("Ann"), json!("Bea")]);
    assert_eq!(
        store
            .find_one("users", json!({"_id": id}))
            .await
            .unwrap()
            .unwrap()["tags"],
        json!(["x"])
    );
}

#[tokio::test]
async fn missing_file_opens_empty_and_is_created_on_first_write() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("db.json");

    let store = farndb::open(&path).await.unwrap();
    assert!(store.list_collections().await.unwrap().is_empty());
    assert!(!path.exists());

    store.insert("users", json!({"name": "Ann"})).await.unwrap();

    assert_eq!(read_json(&path)["users"][0]["name"], "Ann");
    assert!(!temp_path(&path).exists());
}

#[tokio::test]
async fn corrupt_file_is_fatal_and_left_alone() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    fs::write(&path, b"{ \"users\": [ {\"name\": ").unwrap();

    let err = farndb::open(&path).await.unwrap_err();

    assert!(matches!(err, DocumentStoreError::CorruptStore { .. }));
    assert_eq!(fs::read(&path).unwrap(), b"{ \"users\": [ {\"name\": ");
}

#[tokio::test]
async fn wrong_shape_is_corrupt() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    fs::write(&path, br#"{"users": {"name": "Ann"}}"#).unwrap();

    assert!(matches!(
        farndb::open(&path).await,
        Err(DocumentStoreError::CorruptStore { .. })
    ));
}

#[tokio::test]
async fn every_mutation_backs_up_the_previous_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = farndb::open(&path).await.unwrap();

    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    assert!(!backup_path(&path).exists());

    store.insert("users", json!({"name": "Bea"})).await.unwrap();
    let bak = read_json(&backup_path(&path));
    assert_eq!(bak["users"].as_array().unwrap().len(), 1);

    store.delete("users", json!({"name": "Ann"})).await.unwrap();
    let bak = read_json(&backup_path(&path));
    assert_eq!(bak["users"].as_array().unwrap().len(), 2);
    assert_eq!(read_json(&path)["users"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn interrupted_save_keeps_prior_committed_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let store = farndb::open(&path).await.unwrap();
    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    let committed = store.snapshot().await;

    // Stop right before the rename.
    let mut next = committed.clone();
    next.collection_or_create("users")
        .insert(Fields::new().with("name", "Bea"));
    let write = AtomicWrite::new(&path);
    write.stage(&next.to_bytes(true).unwrap()).unwrap();
    write.backup_current().unwrap();
    drop(store);

    let reopened = farndb::open(&path).await.unwrap();

    assert_eq!(reopened.snapshot().await, committed);
    assert_eq!(names(&reopened).await, vec![json!("Ann")]);
}

#[tokio::test]
async fn failed_save_rolls_back_and_leaves_file_intact() {
    let dir = tempfile::tempdir().unwrap();
    let parent = dir.path().join("data");
    let path = parent.join("db.json");
    let store = farndb::open(&path).await.unwrap();
    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    let committed = store.snapshot().await;
    let on_disk = fs::read(&path).unwrap();

    // Replace the directory with a plain file so nothing can be written under it.
    fs::remove_dir_all(&parent).unwrap();
    fs::write(&parent, b"in the way").unwrap();

    let err = store.insert("users", json!({"name": "Bea"})).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::IoFailure { .. }));
    assert_eq!(store.snapshot().await, committed);
    assert_eq!(names(&store).await, vec![json!("Ann")]);

    let err = store.update("users", json!({}), json!({"x": 1})).await.unwrap_err();
    assert!(matches!(err, DocumentStoreError::IoFailure { .. }));
    assert_eq!(store.snapshot().await, committed);

    // Put the directory back and write again: only the new change lands.
    fs::remove_file(&parent).unwrap();
    fs::create_dir(&parent).unwrap();
    fs::write(&path, &on_disk).unwrap();

    store.insert("users", json!({"name": "Cid"})).await.unwrap();
    drop(store);

    let reopened = farndb::open(&path).await.unwrap();
    assert_eq!(names(&reopened).await, vec![json!("Ann"), json!("Cid")]);
}

#[tokio::test]
async fn explicit_backup_copies_the_committed_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let destination = dir.path().join("snapshots").join("copy.json");
    fs::create_dir(dir.path().join("snapshots")).unwrap();

    let store = farndb::open(&path).await.unwrap();
    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    store.backup(&destination).await.unwrap();

    assert_eq!(fs::read(&destination).unwrap(), fs::read(&path).unwrap());

    let restored = farndb::open(&destination).await.unwrap();
    assert_eq!(restored.snapshot().await, store.snapshot().await);
}

#[tokio::test]
async fn backup_before_any_write_is_an_empty_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = farndb::open(dir.path().join("db.json")).await.unwrap();
    let destination = dir.path().join("copy.json");

    store.backup(&destination).await.unwrap();

    assert_eq!(read_json(&destination), json!({}));
}

#[tokio::test]
async fn backup_onto_the_store_file_keeps_it_intact() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");

    let store = farndb::open(&path).await.unwrap();
    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    store.insert("users", json!({"name": "Bea"})).await.unwrap();
    let committed = fs::read(&path).unwrap();

    store.backup(&path).await.unwrap();
    store.backup(dir.path().join(".").join("db.json")).await.unwrap();

    assert_eq!(fs::read(&path).unwrap(), committed);
    assert!(!temp_path(&path).exists());

    let reopened = farndb::open(&path).await.unwrap();
    assert_eq!(names(&reopened).await, vec![json!("Ann"), json!("Bea")]);
}

#[tokio::test]
async fn backup_to_unwritable_destination_fails() {
    let dir = tempfile::tempdir().unwrap();
    let store = farndb::open(dir.path().join("db.json")).await.unwrap();
    store.insert("users", json!({"name": "Ann"})).await.unwrap();

    let err = store
        .backup(dir.path().join("no-such-dir").join("copy.json"))
        .await
        .unwrap_err();

    assert!(matches!(err, DocumentStoreError::IoFailure { .. }));
}

#[tokio::test]
async fn older_files_with_epoch_timestamps_load() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    fs::write(
        &path,
        json!({
            "users": [
                {"_id": "1700000000123456", "_created_at": 1700000000.5, "_updated_at": 1700000001.0, "name": "Ann"}
            ]
        })
        .to_string(),
    )
    .unwrap();

    let store = farndb::open(&path).await.unwrap();
    let ann = store
        .find_one("users", json!({"name": "Ann"}))
        .await
        .unwrap()
        .unwrap();

    assert_eq!(ann.id(), "1700000000123456");
    assert_eq!(ann.created_at().unwrap().timestamp(), 1_700_000_000);

    store.update("users", json!({"name": "Ann"}), json!({"age": 30})).await.unwrap();
    let ann = store.find_one("users", Value::Null).await.unwrap().unwrap();
    assert_eq!(ann["_created_at"], 1700000000.5);
    assert!(ann["_updated_at"].is_string());
}

#[tokio::test]
async fn builder_options_apply() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("db.json");
    let backend = JsonFileStore::builder()
        .path(&path)
        .pretty(false)
        .backup(false)
        .build()
        .await
        .unwrap();
    let store = DocumentStore::open(backend).await.unwrap();

    store.insert("users", json!({"name": "Ann"})).await.unwrap();
    store.insert("users", json!({"name": "Bea"})).await.unwrap();

    assert!(!backup_path(&path).exists());
    assert!(!fs::read_to_string(&path).unwrap().contains('\n'));
    assert_eq!(store.backend().path(), path);
    assert_eq!(
        StoreState::from_slice(&fs::read(&path).unwrap(), &path)
            .unwrap()
            .document_count(),
        2
    );
}
