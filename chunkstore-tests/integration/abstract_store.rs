//! Behaviour every chunk store flavour must share.

use std::sync::Arc;

use chunkstore_core::{ChunkStorage, ReadOptions, StorageError};
use futures::future::join_all;

use crate::support::{CHUNK_LENGTH, StoreKind, build_store, digit_chunk};

#[tokio::test]
async fn test_basic_put_then_get() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        test.store.put(0, b"0123456789").await.unwrap();
        let chunk = test.store.get(0, None).await.unwrap();

        assert_eq!(chunk, b"0123456789", "{kind:?}");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_put_invalid_chunk_length() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        let short = test.store.put(0, b"0123").await;
        let oversized = test.store.put(0, b"0123456789A").await;

        assert!(
            matches!(short, Err(StorageError::InvalidChunkLength { .. })),
            "{kind:?}: {short:?}"
        );
        assert!(
            matches!(
                oversized,
                Err(StorageError::InvalidChunkLength {
                    expected: 10,
                    actual: 11,
                    last: false,
                    ..
                })
            ),
            "{kind:?}: {oversized:?}"
        );
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_concurrent_puts_then_gets() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        let store = &test.store;

        let puts = (0..100u64).map(|i| {
            let store = Arc::clone(store);
            async move { store.put(i, &digit_chunk(i)).await }
        });
        for result in join_all(puts).await {
            result.unwrap();
        }

        let gets = (0..100u64).map(|i| {
            let store = Arc::clone(store);
            async move { (i, store.get(i, None).await) }
        });
        for (i, result) in join_all(gets).await {
            assert_eq!(result.unwrap(), digit_chunk(i), "{kind:?} chunk {i}");
        }

        store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_interleaved_puts_and_gets() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        let store = &test.store;

        let tasks = (0..20u64).map(|i| {
            let store = Arc::clone(store);
            tokio::spawn(async move {
                store.put(i, &digit_chunk(i)).await?;
                store.get(i, None).await
            })
        });
        for (i, joined) in join_all(tasks).await.into_iter().enumerate() {
            let chunk = joined.unwrap().unwrap();
            assert_eq!(chunk, digit_chunk(i as u64), "{kind:?} chunk {i}");
        }

        store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_get_sub_ranges() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        let store = &test.store;
        store.put(0, b"0123456789").await.unwrap();

        let cases = [
            (Some(ReadOptions::range(2, 3)), &b"234"[..]),
            (None, &b"0123456789"[..]),
            (Some(ReadOptions::default()), &b"0123456789"[..]),
            (Some(ReadOptions::from_offset(2)), &b"23456789"[..]),
            (
                Some(ReadOptions {
                    offset: 0,
                    length: Some(5),
                }),
                &b"01234"[..],
            ),
        ];
        for (options, expected) in cases {
            let chunk = store.get(0, options).await.unwrap();
            assert_eq!(chunk, expected, "{kind:?} {options:?}");
        }

        store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_put_past_first_chunk() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        test.store.put(10, b"0123456789").await.unwrap();
        let chunk = test.store.get(10, None).await.unwrap();

        assert_eq!(chunk, b"0123456789", "{kind:?}");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_detached_puts_are_silent() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        // Wrong length: the error goes nowhere
        test.store.put_detached(0, b"0123".to_vec()).await.unwrap();
        test.store
            .put_detached(1, b"0123456789".to_vec())
            .await
            .unwrap();

        assert_eq!(test.store.get(1, None).await.unwrap(), b"0123456789");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_chunk_length_property() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        assert_eq!(test.store.chunk_length(), CHUNK_LENGTH, "{kind:?}");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_get_missing_chunk_is_error() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        let result = test.store.get(0, None).await;

        assert!(result.is_err(), "{kind:?}");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_close_empty_store() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);

        test.store.close().await.unwrap();
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_close_after_writes() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        test.store.put(0, b"0123456789").await.unwrap();

        test.store.close().await.unwrap();
        assert!(test.store.is_closed(), "{kind:?}");
        test.store.destroy().await.unwrap();
    }
}

#[tokio::test]
async fn test_operations_after_close() {
    for kind in StoreKind::ALL {
        let test = build_store(kind);
        let store = &test.store;
        store.put(0, b"0123456789").await.unwrap();
        store.close().await.unwrap();

        assert!(matches!(
            store.put(1, b"0123456789").await,
            Err(StorageError::StoreClosed)
        ));
        assert!(matches!(
            store.get(0, None).await,
            Err(StorageError::StoreClosed)
        ));
        assert!(matches!(store.close().await, Err(StorageError::StoreClosed)));

        // Destroy still removes the files of a closed store
        tokio_test::assert_ok!(store.destroy().await);
    }
}
