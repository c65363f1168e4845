//! Open, close and destroy against the real filesystem.

use std::io;
use std::sync::Arc;

use chunkstore_core::{ChunkStorage, StorageError, StoreOptions};
use futures::future::join_all;

use crate::support::{StoreKind, build_store, store_with};

#[tokio::test]
async fn test_destroy_removes_backing_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("test_file");
    let store = store_with(10, StoreOptions::new().with_path(&path), &temp_dir);

    store.put(0, b"0123456789").await.unwrap();
    assert_eq!(std::fs::read(&path).unwrap(), b"0123456789");

    store.destroy().await.unwrap();

    let error = std::fs::read(&path).unwrap_err();
    assert_eq!(error.kind(), io::ErrorKind::NotFound);
}

#[tokio::test]
async fn test_destroy_every_kind_removes_files() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        test.store.put(3, b"0123456789").await.unwrap();
        let files: Vec<_> = test.store.files().iter().map(|file| file.path.clone()).collect();
        assert!(files.iter().all(|file| file.starts_with(test.root())), "{kind:?}");
        // Files are created on first write, so only the one holding chunk 3 exists
        assert!(files.iter().any(|file| file.exists()), "{kind:?}");

        test.store.destroy().await.unwrap();

        for file in &files {
            assert!(!file.exists(), "{kind:?}: {} survived destroy", file.display());
        }
    }
}

#[tokio::test]
async fn test_destroy_never_opened_store() {
    let temp_dir = tempfile::tempdir().unwrap();
    let path = temp_dir.path().join("never/opened");
    let store = store_with(10, StoreOptions::new().with_path(&path), &temp_dir);

    tokio_test::assert_ok!(store.destroy().await);
    assert!(!path.exists());
}

#[tokio::test]
async fn test_nothing_on_disk_before_first_operation() {
    let test = build_store(StoreKind::SingleFile);

    assert!(!test.store.path().exists());
    assert!(!test.store.is_open());

    test.store.put(0, b"0123456789").await.unwrap();
    assert!(test.store.is_open());
    test.store.destroy().await.unwrap();
}

#[tokio::test]
async fn test_close_races_first_operations() {
    let test = build_store(StoreKind::MultiFile);
    let store = &test.store;

    let puts: Vec<_> = (0..10u64)
        .map(|i| {
            let store = Arc::clone(store);
            tokio::spawn(async move { store.put(i, b"0123456789").await })
        })
        .collect();
    store.close().await.unwrap();

    for joined in join_all(puts).await {
        match joined.unwrap() {
            Ok(()) | Err(StorageError::StoreClosed) => {}
            Err(StorageError::Io(error)) => {
                // The handle was closed underneath an accepted write
                assert_eq!(error.kind(), io::ErrorKind::Other);
            }
            Err(other) => panic!("Unexpected error racing close: {other:?}"),
        }
    }

    store.destroy().await.unwrap();
}
