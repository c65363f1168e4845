//! Chunkstore Core - fixed-size chunk storage on files
//!
//! This crate stores a logical array of equal-length byte chunks in one or
//! more files on disk. Callers address chunks by index; the store maps each
//! index to byte ranges in the backing files, opens them on first use and
//! removes them on destroy.

pub mod config;
pub mod storage;
pub mod tracing_setup;

// Re-export main types for convenient access
pub use config::StoreConfig;
pub use storage::{
    ChunkStorage, FileEntry, FsChunkStore, ReadOptions, StorageError, StoreOptions,
};

pub type Result<T> = std::result::Result<T, StorageError>;
