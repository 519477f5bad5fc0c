use std::collections::BTreeSet;

use bytes::Bytes;
use cellar_core::{
    BlobStore, CreateOutcome, DeleteOutcome, MemoryStore, StorageError, UploadOptions,
    UploadOutcome,
};
use chrono::Utc;

fn overwrite() -> UploadOptions {
    UploadOptions::new().with_overwrite(true)
}

#[tokio::test]
async fn test_create_container_twice_reports_already_exists() {
    let store = MemoryStore::new();

    assert_eq!(
        store.create_container("logs").await.unwrap(),
        CreateOutcome::Created
    );
    assert_eq!(
        store.create_container("logs").await.unwrap(),
        CreateOutcome::AlreadyExists
    );
}

#[tokio::test]
async fn test_delete_missing_container_reports_not_found() {
    let store = MemoryStore::new();

    assert_eq!(
        store.delete_container("never-created").await.unwrap(),
        DeleteOutcome::NotFound
    );
}

#[tokio::test]
async fn test_upload_into_missing_container_creates_it() {
    let store = MemoryStore::new();

    let outcome = store
        .upload_blob("fresh", "a.txt", Bytes::from_static(b"hi"), &overwrite())
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::UploadedAfterCreate);
    assert!(store.container_exists("fresh").await.unwrap());
    assert!(store.blob_exists("fresh", "a.txt").await.unwrap());
}

#[tokio::test]
async fn test_upload_into_pending_delete_container_is_transient() {
    let store = MemoryStore::new();
    store.mark_pending_delete("doomed");

    let err = store
        .upload_blob("doomed", "a.txt", Bytes::from_static(b"hi"), &overwrite())
        .await
        .unwrap_err();

    assert!(matches!(err, StorageError::TransientConflict(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_upload_without_overwrite_preserves_existing_content() {
    let store = MemoryStore::new();
    store.create_container("docs").await.unwrap();

    store
        .upload_blob("docs", "a.txt", Bytes::from_static(b"original"), &overwrite())
        .await
        .unwrap();

    let outcome = store
        .upload_blob(
            "docs",
            "a.txt",
            Bytes::from_static(b"replacement"),
            &UploadOptions::new(),
        )
        .await
        .unwrap();
    assert_eq!(outcome, UploadOutcome::SkippedExisting);

    // Round trip: the original bytes survive the skipped upload.
    let data = store.read_blob("docs", "a.txt").await.unwrap();
    assert_eq!(&data[..], b"original");
}

#[tokio::test]
async fn test_upload_with_overwrite_replaces_content() {
    let store = MemoryStore::new();
    store.create_container("docs").await.unwrap();

    store
        .upload_blob("docs", "a.txt", Bytes::from_static(b"one"), &overwrite())
        .await
        .unwrap();
    let outcome = store
        .upload_blob("docs", "a.txt", Bytes::from_static(b"two"), &overwrite())
        .await
        .unwrap();

    assert_eq!(outcome, UploadOutcome::Uploaded);
    assert_eq!(&store.read_blob("docs", "a.txt").await.unwrap()[..], b"two");
}

#[tokio::test]
async fn test_list_blobs_returns_virtual_directory_names() {
    let store = MemoryStore::new();
    store.create_container("media").await.unwrap();

    for name in ["a/b.txt", "a/c.txt"] {
        store
            .upload_blob("media", name, Bytes::from_static(b"x"), &overwrite())
            .await
            .unwrap();
    }

    let names: BTreeSet<String> = store
        .list_blobs("media")
        .await
        .unwrap()
        .into_iter()
        .map(|entry| entry.name)
        .collect();
    let expected: BTreeSet<String> = ["a/b.txt", "a/c.txt"].iter().map(|s| s.to_string()).collect();
    assert_eq!(names, expected);
}

#[tokio::test]
async fn test_download_missing_blob_is_not_found() {
    let store = MemoryStore::new();
    store.create_container("docs").await.unwrap();

    let err = store.download_blob("docs", "absent").await.err().unwrap();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_delete_missing_blob_reports_not_found() {
    let store = MemoryStore::new();
    store.create_container("docs").await.unwrap();

    assert_eq!(
        store.delete_blob("docs", "absent").await.unwrap(),
        DeleteOutcome::NotFound
    );
}

#[tokio::test]
async fn test_blob_properties_match_uploaded_payload() {
    let store = MemoryStore::new();
    let options = overwrite().with_content_type("text/plain");
    store
        .upload_blob("docs", "a.txt", Bytes::from_static(b"hello"), &options)
        .await
        .unwrap();

    let props = store.blob_properties("docs", "a.txt").await.unwrap();
    assert_eq!(props.size, 5);
    assert_eq!(props.content_type.as_deref(), Some("text/plain"));
    assert!(props.etag.is_some());
}

#[tokio::test]
async fn test_token_defaults_to_one_hour_from_call_time() {
    let store = MemoryStore::new();

    let before = Utc::now();
    let token = store
        .shared_access_token("docs", "a.txt", None)
        .await
        .unwrap();
    let after = Utc::now();

    let lifetime_from_call = token.expires_at - before;
    assert!(lifetime_from_call >= chrono::Duration::seconds(3599));
    assert!(token.expires_at - after <= chrono::Duration::seconds(3600));
    assert!(token.token.contains("sp=r"));
    assert!(!token.is_expired());
}

#[tokio::test]
async fn test_exists_checks_are_listing_membership() {
    let store = MemoryStore::new();
    store.create_container("one").await.unwrap();

    assert!(store.container_exists("one").await.unwrap());
    assert!(!store.container_exists("two").await.unwrap());
    assert!(!store.blob_exists("one", "missing").await.unwrap());
}
