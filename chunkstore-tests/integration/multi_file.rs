//! Chunks spanning several backing files on the real filesystem.

use std::fs;

use chunkstore_core::{ChunkStorage, FileEntry, ReadOptions, StoreOptions};

use crate::support::store_with;

#[tokio::test]
async fn test_chunk_split_across_two_files() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let options = StoreOptions::new().with_files(vec![
        FileEntry::new(root.join("tmp/file1"), 5),
        FileEntry::new(root.join("tmp/file2"), 5),
    ]);
    let store = store_with(10, options, &temp_dir);

    store.put(0, b"0123456789").await.unwrap();

    assert_eq!(fs::read(root.join("tmp/file1")).unwrap(), b"01234");
    assert_eq!(fs::read(root.join("tmp/file2")).unwrap(), b"56789");
    assert_eq!(store.get(0, None).await.unwrap(), b"0123456789");

    store.destroy().await.unwrap();
    assert!(!root.join("tmp/file1").exists());
    assert!(!root.join("tmp/file2").exists());
}

#[tokio::test]
async fn test_chunks_across_directories_with_short_tail() {
    let temp_dir = tempfile::tempdir().unwrap();
    let root = temp_dir.path();
    let options = StoreOptions::new().with_files(vec![
        FileEntry::new(root.join("tmp/file1"), 5),
        FileEntry::new(root.join("tmp/file2"), 5),
        FileEntry::new(root.join("tmp2/file3"), 8),
        FileEntry::new(root.join("tmp2/file4"), 8),
    ]);
    let store = store_with(10, options, &temp_dir);
    assert_eq!(store.length(), Some(26));
    assert_eq!(store.last_chunk_length(), 6);

    store.put(0, b"0123456789").await.unwrap();
    assert_eq!(fs::read(root.join("tmp/file1")).unwrap(), b"01234");
    assert_eq!(fs::read(root.join("tmp/file2")).unwrap(), b"56789");
    assert_eq!(store.get(0, None).await.unwrap(), b"0123456789");

    store.put(1, b"abcdefghij").await.unwrap();
    assert_eq!(fs::read(root.join("tmp2/file3")).unwrap(), b"abcdefgh");
    assert_eq!(store.get(1, None).await.unwrap(), b"abcdefghij");

    store.put(2, b"klmnop").await.unwrap();
    assert_eq!(fs::read(root.join("tmp2/file4")).unwrap(), b"ijklmnop");
    assert_eq!(store.get(2, None).await.unwrap(), b"klmnop");

    store.destroy().await.unwrap();
    for file in ["tmp/file1", "tmp/file2", "tmp2/file3", "tmp2/file4"] {
        assert!(!root.join(file).exists(), "{file} survived destroy");
    }
}

#[tokio::test]
async fn test_relative_files_under_base_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let base = temp_dir.path().join("tmp");
    let options = StoreOptions::new()
        .with_path(&base)
        .with_files(vec![FileEntry::new("file1", 5), FileEntry::new("file2", 5)]);
    let store = store_with(10, options, &temp_dir);

    store.put(0, b"0123456789").await.unwrap();

    assert_eq!(fs::read(base.join("file1")).unwrap(), b"01234");
    assert_eq!(fs::read(base.join("file2")).unwrap(), b"56789");
    store.destroy().await.unwrap();
    assert!(!base.join("file1").exists());
    assert!(!base.join("file2").exists());
    assert!(base.exists());
}

#[tokio::test]
async fn test_destroy_keeps_unrelated_files_in_base_path() {
    let temp_dir = tempfile::tempdir().unwrap();
    let downloads = temp_dir.path().join("Downloads");
    fs::create_dir_all(&downloads).unwrap();
    fs::write(downloads.join("unrelated.txt"), b"keep me").unwrap();
    let options = StoreOptions::new()
        .with_path(&downloads)
        .with_files(vec![FileEntry::new("file1", 5), FileEntry::new("file2", 5)]);
    let store = store_with(10, options, &temp_dir);

    store.put(0, b"0123456789").await.unwrap();
    store.destroy().await.unwrap();

    assert_eq!(fs::read(downloads.join("unrelated.txt")).unwrap(), b"keep me");
    assert!(!downloads.join("file1").exists());
    assert!(!downloads.join("file2").exists());
}

#[tokio::test]
async fn test_get_sub_range_across_file_boundary() {
    let temp_dir = tempfile::tempdir().unwrap();
    let base = temp_dir.path().join("tmp");
    let options = StoreOptions::new()
        .with_path(&base)
        .with_files(vec![FileEntry::new("file1", 5), FileEntry::new("file2", 5)]);
    let store = store_with(10, options, &temp_dir);
    store.put(0, b"0123456789").await.unwrap();

    let chunk = store.get(0, Some(ReadOptions::range(3, 4))).await.unwrap();

    assert_eq!(chunk, b"3456");
    store.destroy().await.unwrap();
}

#[tokio::test]
async fn test_relative_files_with_name() {
    let temp_dir = tempfile::tempdir().unwrap();
    let base = temp_dir.path().join("tmp");
    let options = StoreOptions::new()
        .with_path(&base)
        .with_name("folder")
        .with_files(vec![FileEntry::new("file1", 5), FileEntry::new("file2", 5)]);
    let store = store_with(10, options, &temp_dir);

    store.put(0, b"0123456789").await.unwrap();

    assert_eq!(store.path(), base.join("folder"));
    assert_eq!(fs::read(base.join("folder/file1")).unwrap(), b"01234");
    assert_eq!(fs::read(base.join("folder/file2")).unwrap(), b"56789");
    store.destroy().await.unwrap();
    assert!(!base.join("folder/file1").exists());
    assert!(!base.join("folder/file2").exists());
    assert!(base.join("folder").exists());
}

#[tokio::test]
async fn test_unique_id_under_name() {
    let temp_dir = tempfile::tempdir().unwrap();
    let named = temp_dir.path().join("tmp/folder");
    let options = StoreOptions::new()
        .with_path(temp_dir.path().join("tmp"))
        .with_name("folder")
        .with_unique_id()
        .with_files(vec![FileEntry::new("file1", 5), FileEntry::new("file2", 5)]);
    let store = store_with(10, options, &temp_dir);

    store.put(0, b"0123456789").await.unwrap();

    let unique_dir = store.path().to_path_buf();
    assert_eq!(unique_dir.parent(), Some(named.as_path()));
    assert_eq!(fs::read(unique_dir.join("file1")).unwrap(), b"01234");
    assert_eq!(fs::read(unique_dir.join("file2")).unwrap(), b"56789");

    store.destroy().await.unwrap();
    assert!(!unique_dir.exists());
}
