//! Storage layer for fixed-size chunks.
//!
//! Defines the chunk storage interface with a file-backed implementation.
//! Chunk indices map onto byte ranges of one or more backing files, which are
//! opened lazily and released on close or destroy.

pub mod backend;
pub mod file_map;
pub mod handle;
pub mod layout;
pub mod lazy;
#[cfg(any(test, feature = "test-utils"))]
pub mod memory;
pub mod options;
pub mod store;
#[cfg(any(test, feature = "test-utils"))]
pub mod test_fixtures;

use std::io;
use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
pub use backend::{FsBackend, RemoveFailure, RetryPolicy, StorageBackend};
pub use file_map::{FileMap, FileSpec, Segment};
pub use handle::{FileHandle, RandomAccessFile};
pub use layout::{ChunkLayout, ReadOptions};
pub use lazy::LazyInit;
#[cfg(any(test, feature = "test-utils"))]
pub use memory::MemoryBackend;
pub use options::{FileEntry, Placement, StoreOptions};
pub use store::FsChunkStore;

/// Chunk-addressed storage operations.
///
/// Chunks are addressed by index only. Every chunk has the same length except
/// possibly the last one, whose length follows from the total store length.
#[async_trait]
pub trait ChunkStorage: Send + Sync {
    /// Length shared by all chunks except possibly the last.
    fn chunk_length(&self) -> u64;

    /// Writes one complete chunk.
    ///
    /// # Errors
    ///
    /// - `StorageError::StoreClosed` - If the store was closed
    /// - `StorageError::InvalidChunkLength` - If `chunk` is not exactly the chunk length
    /// - `StorageError::OutOfBounds` - If the chunk lies past the end of the store
    /// - `StorageError::InitializationFailed` - If backing files could not be prepared
    /// - `StorageError::Io` - If a write failed
    async fn put(&self, index: u64, chunk: &[u8]) -> Result<(), StorageError>;

    /// Reads one chunk, or part of it when `options` are given.
    ///
    /// # Errors
    ///
    /// - `StorageError::StoreClosed` - If the store was closed
    /// - `StorageError::InvalidRange` - If `options` fall outside the chunk
    /// - `StorageError::OutOfBounds` - If the chunk lies past the end of the store
    /// - `StorageError::InitializationFailed` - If backing files could not be prepared
    /// - `StorageError::Io` - If the read failed, including chunks never written
    async fn get(&self, index: u64, options: Option<ReadOptions>) -> Result<Vec<u8>, StorageError>;

    /// Closes the store. Later operations fail with `StoreClosed`.
    ///
    /// # Errors
    ///
    /// - `StorageError::StoreClosed` - If the store was already closed
    /// - `StorageError::Io` - If releasing a backing file failed
    async fn close(&self) -> Result<(), StorageError>;

    /// Closes the store if needed and removes its backing files.
    ///
    /// # Errors
    ///
    /// - `StorageError::DestroyFailed` - If removal failed after all retries
    async fn destroy(&self) -> Result<(), StorageError>;
}

/// Errors that occur during chunk storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Store was closed before the operation
    #[error("Storage is closed")]
    StoreClosed,

    /// Written buffer does not match the length of the target chunk
    #[error("{} length must be {expected}, got {actual} for chunk {index}", chunk_label(.last))]
    InvalidChunkLength {
        /// Index of the chunk being written
        index: u64,
        /// Required length for this index
        expected: u64,
        /// Length of the supplied buffer
        actual: u64,
        /// Whether the index is the (possibly shorter) last chunk
        last: bool,
    },

    /// Read offset and length do not fit the chunk
    #[error("Invalid offset {offset} and/or length {length}: max is {max}")]
    InvalidRange {
        /// Requested offset within the chunk
        offset: u64,
        /// Requested length
        length: u64,
        /// Length of the chunk
        max: u64,
    },

    /// Byte range extends beyond the end of the store
    #[error("Range {start}..{end} exceeds storage length {total}")]
    OutOfBounds {
        /// Start of the resolved byte range
        start: u64,
        /// End of the resolved byte range
        end: u64,
        /// Total length of the store
        total: u64,
    },

    /// Backing directory or files could not be prepared
    #[error("Failed to initialize storage at {}: {source}", .path.display())]
    InitializationFailed {
        /// Path that could not be prepared
        path: PathBuf,
        /// Shared cause, reported to every waiting operation
        source: Arc<io::Error>,
    },

    /// Read, write or close of a backing file failed
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Backing files could not be removed
    #[error("Failed to destroy {} after {attempts} attempts: {source}", .path.display())]
    DestroyFailed {
        /// Path that could not be removed
        path: PathBuf,
        /// Attempts made before giving up
        attempts: u32,
        /// Last removal error
        source: io::Error,
    },

    /// Construction arguments are invalid
    #[error("Invalid configuration: {reason}")]
    InvalidConfig {
        /// Description of the problem
        reason: String,
    },
}

fn chunk_label(last: &bool) -> &'static str {
    if *last { "Last chunk" } else { "Chunk" }
}
