//! Stores with an explicit total length, including a short last chunk.

use std::fs;

use chunkstore_core::{ChunkStorage, ReadOptions, StorageError, StoreOptions};
use tempfile::TempDir;

use crate::support::store_with;

fn short_store(temp_dir: &TempDir) -> chunkstore_core::FsChunkStore {
    let path = temp_dir.path().join("test_file");
    store_with(10, StoreOptions::new().with_path(path).with_length(7), temp_dir)
}

#[tokio::test]
async fn test_length_spanning_two_chunks() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("test_file");
    let store = store_with(
        10,
        StoreOptions::new().with_path(&path).with_length(20),
        &temp_dir,
    );

    store.put(0, b"0123456789").await.unwrap();
    assert_eq!(&fs::read(&path).unwrap()[..10], b"0123456789");

    store.put(1, b"1234567890").await.unwrap();
    assert_eq!(fs::read(&path).unwrap(), b"01234567891234567890");

    assert_eq!(store.get(0, None).await.unwrap(), b"0123456789");
    assert_eq!(store.get(1, None).await.unwrap(), b"1234567890");

    store.destroy().await.unwrap();
    assert!(fs::read(&path).is_err());
}

#[tokio::test]
async fn test_length_shorter_than_chunk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = short_store(&temp_dir);

    store.put(0, b"0123456").await.unwrap();

    assert_eq!(fs::read(store.path()).unwrap(), b"0123456");
    assert_eq!(store.get(0, None).await.unwrap(), b"0123456");
    store.destroy().await.unwrap();
    assert!(fs::read(store.path()).is_err());
}

#[tokio::test]
async fn test_short_chunk_rejects_full_length_write() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = short_store(&temp_dir);

    let result = store.put(0, b"0123456789").await;

    match result {
        Err(StorageError::InvalidChunkLength {
            expected,
            actual,
            last,
            ..
        }) => {
            assert_eq!((expected, actual), (7, 10));
            assert!(last);
        }
        other => panic!("Expected InvalidChunkLength, got {other:?}"),
    }
    store.destroy().await.unwrap();
}

#[tokio::test]
async fn test_short_chunk_rejects_out_of_range_reads() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = short_store(&temp_dir);
    store.put(0, b"0123456").await.unwrap();

    let rejected = [
        ReadOptions::from_offset(8),
        ReadOptions {
            offset: 0,
            length: Some(8),
        },
        ReadOptions::range(4, 4),
    ];
    for options in rejected {
        let result = store.get(0, Some(options)).await;
        match result {
            Err(StorageError::InvalidRange { max, .. }) => assert_eq!(max, 7),
            other => panic!("Expected InvalidRange for {options:?}, got {other:?}"),
        }
    }

    assert_eq!(
        store.get(0, Some(ReadOptions::range(4, 3))).await.unwrap(),
        b"456"
    );
    store.destroy().await.unwrap();
}

#[tokio::test]
async fn test_index_past_last_chunk() {
    let temp_dir = tempfile::tempdir().unwrap();
    let store = short_store(&temp_dir);

    assert!(matches!(
        store.put(1, b"0123456789").await,
        Err(StorageError::OutOfBounds { .. })
    ));
    assert!(matches!(
        store.get(1, None).await,
        Err(StorageError::OutOfBounds { .. })
    ));
    store.destroy().await.unwrap();
}
