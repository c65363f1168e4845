//! Test fixtures for storage testing.
//!
//! Provides standardized store setup and chunk data for consistent testing
//! across storage-related modules and the integration suite.

use std::path::{Path, PathBuf};

use super::options::{FileEntry, StoreOptions};

/// Creates a temporary directory for store backing files.
///
/// # Panics
///
/// Panics if the temporary directory cannot be created. This is acceptable
/// in test fixtures where failures indicate environment issues.
pub fn create_temp_store_dir() -> (tempfile::TempDir, PathBuf) {
    let temp_dir = tempfile::tempdir().unwrap();
    let store_dir = temp_dir.path().join("store");
    (temp_dir, store_dir)
}

/// Chunk of `length` bytes all set to `value`.
pub fn filled_chunk(value: u8, length: usize) -> Vec<u8> {
    vec![value; length]
}

/// Multi-file options with one file per entry of `lengths` under `base`.
pub fn multi_file_options(base: &Path, lengths: &[u64]) -> StoreOptions {
    let files = lengths
        .iter()
        .enumerate()
        .map(|(i, &length)| FileEntry::new(format!("multi{}", i + 1), length))
        .collect();
    StoreOptions::new().with_path(base).with_files(files)
}
