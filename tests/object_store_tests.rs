use bytes::Bytes;
use media_gallery::object_store::{LocalStore, ObjectStore, ObjectStoreError};

const BASE_URL: &str = "http://localhost:5000";

#[tokio::test]
async fn test_local_store_put_get() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let data = Bytes::from("hello world");
    let url = store
        .put("1700000000000-hello.txt", data.clone(), "text/plain")
        .await
        .unwrap();
    assert_eq!(url, "http://localhost:5000/objects/1700000000000-hello.txt");

    let retrieved = store.get("1700000000000-hello.txt").await.unwrap();
    assert_eq!(retrieved, data);
}

#[tokio::test]
async fn test_local_store_exists() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    assert!(!store.exists("missing").await.unwrap());

    store
        .put("present", Bytes::from("data"), "application/octet-stream")
        .await
        .unwrap();
    assert!(store.exists("present").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    store
        .put("to-delete", Bytes::from("data"), "application/octet-stream")
        .await
        .unwrap();
    assert!(store.exists("to-delete").await.unwrap());

    store.delete("to-delete").await.unwrap();
    assert!(!store.exists("to-delete").await.unwrap());
}

#[tokio::test]
async fn test_local_store_delete_nonexistent() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let result = store.delete("nonexistent").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_get_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    let result = store.get("missing").await;
    assert!(matches!(result, Err(ObjectStoreError::NotFound(_))));
}

#[tokio::test]
async fn test_local_store_put_is_create_only() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    store
        .put("key", Bytes::from("first"), "text/plain")
        .await
        .unwrap();
    let second = store.put("key", Bytes::from("second"), "text/plain").await;
    assert!(matches!(second, Err(ObjectStoreError::AlreadyExists(_))));

    // The first write survives
    let data = store.get("key").await.unwrap();
    assert_eq!(data, Bytes::from("first"));
}

#[tokio::test]
async fn test_local_store_rejects_path_traversal() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path().join("objects"), BASE_URL).unwrap();

    for name in ["", ".", "..", "../escape.txt", "nested/name.txt", "back\\slash"] {
        let result = store.put(name, Bytes::from("x"), "text/plain").await;
        assert!(
            matches!(result, Err(ObjectStoreError::InvalidName(_))),
            "name {name:?} should be rejected"
        );
    }
    assert!(!dir.path().join("escape.txt").exists());
}

#[tokio::test]
async fn test_local_store_list_is_sorted() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), BASE_URL).unwrap();

    for name in ["3000-c.mp3", "1000-a.png", "2000-b.mp4"] {
        store.put(name, Bytes::from("x"), "").await.unwrap();
    }

    assert_eq!(
        store.list().await.unwrap(),
        vec!["1000-a.png", "2000-b.mp4", "3000-c.mp3"]
    );
}

#[tokio::test]
async fn test_local_store_url_escapes_names() {
    let dir = tempfile::tempdir().unwrap();
    let store = LocalStore::new(dir.path(), "http://media.example.com/gallery/").unwrap();

    assert_eq!(
        store.url_for("1000-my photo.png"),
        "http://media.example.com/gallery/objects/1000-my%20photo.png"
    );
}
