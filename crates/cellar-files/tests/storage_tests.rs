use std::io::{Cursor, Read, Seek, SeekFrom};

use cellar_core::{BlockingClient, MemoryStore, StorageError};
use cellar_files::{BlobFileStorage, FileStorage, StorageConfig};

fn storage() -> BlobFileStorage<MemoryStore> {
    storage_with_config(StorageConfig::default())
}

fn storage_with_config(config: StorageConfig) -> BlobFileStorage<MemoryStore> {
    let client = BlockingClient::new(MemoryStore::new()).unwrap();
    BlobFileStorage::with_config(client, "media", config)
}

fn save(storage: &BlobFileStorage<MemoryStore>, name: &str, data: &[u8]) -> String {
    storage.save(name, &mut Cursor::new(data.to_vec())).unwrap()
}

#[test]
fn test_save_then_open_round_trips() {
    let storage = storage();

    let cleaned = save(&storage, "reports/q3.txt", b"all numbers up");
    assert_eq!(cleaned, "reports/q3.txt");

    let mut file = storage.open("reports/q3.txt").unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "all numbers up");
}

#[test]
fn test_open_is_seekable_and_rewinds() {
    let storage = storage();
    save(&storage, "a.bin", b"0123456789");

    let mut file = storage.open("a.bin").unwrap();
    let mut buf = [0u8; 4];
    file.read_exact(&mut buf).unwrap();
    assert_eq!(&buf, b"0123");

    file.seek(SeekFrom::Start(6)).unwrap();
    let mut rest = Vec::new();
    file.read_to_end(&mut rest).unwrap();
    assert_eq!(rest, b"6789");
}

#[test]
fn test_open_missing_file_fails_on_first_read() {
    let storage = storage();
    save(&storage, "present.txt", b"x");

    // Opening is lazy; the download happens on first access.
    let mut file = storage.open("absent.txt").unwrap();
    let mut contents = String::new();
    let err = file.read_to_string(&mut contents).unwrap_err();
    assert_eq!(err.kind(), std::io::ErrorKind::NotFound);
}

#[test]
fn test_save_without_overwrite_preserves_existing_content() {
    let storage = storage();
    save(&storage, "a.txt", b"original");

    // The skipped write still reports success with the cleaned name.
    let cleaned = save(&storage, "a.txt", b"replacement");
    assert_eq!(cleaned, "a.txt");

    let mut file = storage.open("a.txt").unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "original");
}

#[test]
fn test_save_with_overwrite_replaces_content() {
    let storage = storage_with_config(StorageConfig::new().with_overwrite_files(true));
    save(&storage, "a.txt", b"one");
    save(&storage, "a.txt", b"two");

    let mut file = storage.open("a.txt").unwrap();
    let mut contents = String::new();
    file.read_to_string(&mut contents).unwrap();
    assert_eq!(contents, "two");
}

#[test]
fn test_traversal_names_are_rejected() {
    let storage = storage_with_config(StorageConfig::new().with_location("uploads"));

    let err = storage
        .save("../../etc/passwd", &mut Cursor::new(b"nope".to_vec()))
        .unwrap_err();
    assert!(matches!(err, StorageError::InvalidName(_)));

    let err = storage.open("../../etc/passwd").unwrap_err();
    assert!(matches!(err, StorageError::InvalidName(_)));
}

#[test]
fn test_location_prefixes_stored_paths() {
    let storage = storage_with_config(StorageConfig::new().with_location("uploads"));
    save(&storage, "a.txt", b"x");

    let (_dirs, files) = storage.listdir("").unwrap();
    assert_eq!(files, vec!["a.txt".to_string()]);
    assert!(storage.exists("a.txt").unwrap());
}

#[test]
fn test_listdir_partitions_dirs_and_files() {
    let storage = storage();
    for (name, data) in [
        ("top.txt", b"t".as_slice()),
        ("a/b.txt", b"b"),
        ("a/c.txt", b"c"),
        ("a/deep/d.txt", b"d"),
    ] {
        save(&storage, name, data);
    }

    let (dirs, files) = storage.listdir("").unwrap();
    assert_eq!(dirs, vec!["a".to_string()]);
    assert_eq!(files, vec!["top.txt".to_string()]);

    let (dirs, files) = storage.listdir("a").unwrap();
    assert_eq!(dirs, vec!["deep".to_string()]);
    let mut files = files;
    files.sort();
    assert_eq!(files, vec!["b.txt".to_string(), "c.txt".to_string()]);
}

#[test]
fn test_listdir_on_missing_container_is_empty() {
    let client = BlockingClient::new(MemoryStore::new()).unwrap();
    let storage = BlobFileStorage::new(client, "never-created");

    let (dirs, files) = storage.listdir("").unwrap();
    assert!(dirs.is_empty());
    assert!(files.is_empty());
    assert!(!storage.exists("anything").unwrap());
}

#[test]
fn test_size_and_delete_delegate_to_blob_operations() {
    let storage = storage();
    save(&storage, "a.txt", b"12345");

    assert_eq!(storage.size("a.txt").unwrap(), 5);

    storage.delete("a.txt").unwrap();
    assert!(!storage.exists("a.txt").unwrap());

    // Deleting an absent file is a success.
    storage.delete("a.txt").unwrap();
}

#[test]
fn test_url_uses_token_when_expiration_is_configured() {
    let plain = storage();
    save(&plain, "a.txt", b"x");
    assert_eq!(plain.url("a.txt").unwrap(), "memory://media/a.txt");

    let signed = storage_with_config(
        StorageConfig::new().with_url_expiration(std::time::Duration::from_secs(600)),
    );
    save(&signed, "a.txt", b"x");
    let url = signed.url("a.txt").unwrap();
    assert!(url.starts_with("memory://media/a.txt?"));
    assert!(url.contains("sp=r"));
}

#[test]
fn test_get_available_name_suffixes_taken_names() {
    let storage = storage();
    save(&storage, "doc.txt", b"x");

    let available = storage.get_available_name("doc.txt", None).unwrap();
    assert_ne!(available, "doc.txt");
    assert!(available.starts_with("doc_"));
    assert!(available.ends_with(".txt"));
    assert!(!storage.exists(&available).unwrap());

    // A free name comes back unchanged.
    assert_eq!(
        storage.get_available_name("free.txt", None).unwrap(),
        "free.txt"
    );
}

#[test]
fn test_get_available_name_respects_max_length() {
    let storage = storage();
    save(&storage, "document.txt", b"x");

    let available = storage.get_available_name("document.txt", Some(14)).unwrap();
    assert!(available.len() <= 14, "{available}");
    assert!(available.ends_with(".txt"));
}

#[test]
fn test_get_available_name_keeps_taken_names_when_overwriting() {
    let storage = storage_with_config(StorageConfig::new().with_overwrite_files(true));
    save(&storage, "doc.txt", b"x");

    assert_eq!(
        storage.get_available_name("doc.txt", None).unwrap(),
        "doc.txt"
    );
}

#[test]
fn test_spooled_download_spills_past_memory_threshold() {
    let storage = storage_with_config(
        StorageConfig::new()
            .with_overwrite_files(true)
            .with_max_memory_size(16),
    );
    let payload = vec![7u8; 1024];
    save(&storage, "big.bin", &payload);

    let mut file = storage.open("big.bin").unwrap();
    let mut read_back = Vec::new();
    file.read_to_end(&mut read_back).unwrap();
    assert_eq!(read_back, payload);
}
