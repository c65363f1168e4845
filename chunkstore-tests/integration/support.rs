//! Shared store construction for the integration suite.

use std::path::PathBuf;
use std::sync::Arc;

use chunkstore_core::storage::test_fixtures::multi_file_options;
use chunkstore_core::{FsChunkStore, StoreConfig, StoreOptions};
use tempfile::TempDir;

/// Chunk length used by the abstract store suite.
pub const CHUNK_LENGTH: u64 = 10;

/// Store flavours the abstract suite runs against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    /// Explicit backing file path
    SingleFile,
    /// Generated path under the configured temp directory
    TempPath,
    /// Two 500 byte files under a base directory
    MultiFile,
}

impl StoreKind {
    pub const ALL: [StoreKind; 3] = [
        StoreKind::SingleFile,
        StoreKind::TempPath,
        StoreKind::MultiFile,
    ];
}

/// Store plus the temporary directory that owns its files.
pub struct TestStore {
    pub store: Arc<FsChunkStore>,
    pub temp_dir: TempDir,
}

impl TestStore {
    pub fn root(&self) -> PathBuf {
        self.temp_dir.path().to_path_buf()
    }
}

/// Config that keeps generated paths inside `temp_dir` and retries quickly.
pub fn config_in(temp_dir: &TempDir) -> StoreConfig {
    StoreConfig {
        temp_dir: temp_dir.path().to_path_buf(),
        ..StoreConfig::for_testing()
    }
}

pub fn build_store(kind: StoreKind) -> TestStore {
    let temp_dir = tempfile::tempdir().unwrap();
    let options = match kind {
        StoreKind::SingleFile => StoreOptions::new().with_path(temp_dir.path().join("test_file")),
        StoreKind::TempPath => StoreOptions::new(),
        StoreKind::MultiFile => multi_file_options(&temp_dir.path().join("multi"), &[500, 500]),
    };
    let store = FsChunkStore::with_config(CHUNK_LENGTH, options, &config_in(&temp_dir)).unwrap();

    TestStore {
        store: Arc::new(store),
        temp_dir,
    }
}

/// Builds a store on the real filesystem with test configuration.
pub fn store_with(chunk_length: u64, options: StoreOptions, temp_dir: &TempDir) -> FsChunkStore {
    FsChunkStore::with_config(chunk_length, options, &config_in(temp_dir)).unwrap()
}

/// Ten byte chunk of the ASCII digit for `index`.
pub fn digit_chunk(index: u64) -> Vec<u8> {
    let digit = b'0' + (index % 10) as u8;
    vec![digit; CHUNK_LENGTH as usize]
}
