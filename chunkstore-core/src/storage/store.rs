//! File-backed chunk store
//!
//! Chunks live at `index * chunk_length` in the logical address space, which
//! is laid out over one file (single-file mode) or an ordered list of files
//! (multi-file mode). Backing files are opened once, on first use, and every
//! operation issued before that shares the same open attempt.

use std::collections::BTreeSet;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use super::backend::{FsBackend, RetryPolicy, StorageBackend};
use super::file_map::{FileMap, FileSpec, Segment};
use super::handle::RandomAccessFile;
use super::layout::{ChunkLayout, ReadOptions};
use super::lazy::LazyInit;
use super::options::StoreOptions;
use super::{ChunkStorage, StorageError};
use crate::config::StoreConfig;

type Handles = Arc<[Arc<dyn RandomAccessFile>]>;

/// Why the backing files could not be opened. Shared by all waiters.
#[derive(Debug, Clone)]
enum OpenError {
    Closed,
    Failed { path: PathBuf, source: Arc<io::Error> },
}

impl From<OpenError> for StorageError {
    fn from(error: OpenError) -> Self {
        match error {
            OpenError::Closed => StorageError::StoreClosed,
            OpenError::Failed { path, source } => {
                StorageError::InitializationFailed { path, source }
            }
        }
    }
}

/// Chunk store persisted to one or more files.
///
/// All operations take `&self`; share the store through an `Arc` to issue
/// them concurrently. Distinct chunks never overlap, so concurrent puts and
/// gets on different indices need no coordination.
pub struct FsChunkStore {
    layout: ChunkLayout,
    file_map: FileMap,
    base_path: PathBuf,
    removal_targets: Vec<PathBuf>,
    closed: AtomicBool,
    handles: LazyInit<Handles, OpenError>,
    backend: Arc<dyn StorageBackend>,
    retry: RetryPolicy,
}

impl FsChunkStore {
    /// Creates a store on the local filesystem with default configuration.
    ///
    /// Nothing touches the filesystem until the first operation.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If `chunk_length` is zero or the
    ///   options are inconsistent
    pub fn new(chunk_length: u64, options: StoreOptions) -> Result<Self, StorageError> {
        Self::with_config(chunk_length, options, &StoreConfig::default())
    }

    /// Creates a store on the local filesystem.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If `chunk_length` is zero or the
    ///   options are inconsistent
    pub fn with_config(
        chunk_length: u64,
        options: StoreOptions,
        config: &StoreConfig,
    ) -> Result<Self, StorageError> {
        Self::with_backend(chunk_length, options, config, Arc::new(FsBackend))
    }

    /// Creates a store whose file operations go through `backend`.
    ///
    /// # Errors
    ///
    /// - `StorageError::InvalidConfig` - If `chunk_length` is zero or the
    ///   options are inconsistent
    pub fn with_backend(
        chunk_length: u64,
        options: StoreOptions,
        config: &StoreConfig,
        backend: Arc<dyn StorageBackend>,
    ) -> Result<Self, StorageError> {
        let placement = options.place(config)?;
        let layout = ChunkLayout::new(chunk_length, placement.length)?;

        debug!(
            "Created chunk store at {} (chunk length {}, {} file(s))",
            placement.base_path.display(),
            chunk_length,
            placement.file_map.len()
        );

        Ok(Self {
            layout,
            file_map: placement.file_map,
            base_path: placement.base_path,
            removal_targets: placement.removal_targets,
            closed: AtomicBool::new(false),
            handles: LazyInit::new(),
            backend,
            retry: RetryPolicy::from(config),
        })
    }

    pub fn layout(&self) -> &ChunkLayout {
        &self.layout
    }

    /// Total logical length, when known.
    pub fn length(&self) -> Option<u64> {
        self.layout.total_length()
    }

    pub fn last_chunk_index(&self) -> Option<u64> {
        self.layout.last_chunk_index()
    }

    pub fn last_chunk_length(&self) -> u64 {
        self.layout.last_chunk_length()
    }

    pub fn chunk_count(&self) -> Option<u64> {
        self.layout.chunk_count()
    }

    /// Backing file in single-file mode, base directory in multi-file mode.
    pub fn path(&self) -> &Path {
        &self.base_path
    }

    pub fn files(&self) -> &[FileSpec] {
        self.file_map.files()
    }

    /// File segments the chunk at `index` occupies, in address order.
    ///
    /// # Errors
    ///
    /// - `StorageError::OutOfBounds` - If the chunk lies past the end of the store
    pub fn chunk_segments(&self, index: u64) -> Result<Vec<Segment>, StorageError> {
        let range = self.layout.chunk_range(index)?;
        self.file_map.segments(range)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Whether the backing files have been opened successfully.
    pub fn is_open(&self) -> bool {
        matches!(self.handles.settled(), Some(Ok(_)))
    }

    /// Writes a chunk without reporting the outcome.
    ///
    /// The write runs on the tokio runtime; a failure is logged and otherwise
    /// dropped. The returned handle can be awaited to know when it finished.
    pub fn put_detached(self: &Arc<Self>, index: u64, chunk: impl Into<Bytes>) -> JoinHandle<()> {
        let store = Arc::clone(self);
        let chunk = chunk.into();
        tokio::spawn(async move {
            if let Err(error) = store.put(index, &chunk).await {
                debug!("Detached put of chunk {} failed: {}", index, error);
            }
        })
    }

    fn ensure_not_closed(&self) -> Result<(), StorageError> {
        if self.is_closed() {
            Err(StorageError::StoreClosed)
        } else {
            Ok(())
        }
    }

    async fn open(&self) -> Result<Handles, StorageError> {
        let handles = self
            .handles
            .get_or_init(|| self.open_files())
            .await
            .map_err(StorageError::from)?;
        // A close may have landed while this operation waited on the open
        self.ensure_not_closed()?;
        Ok(handles)
    }

    async fn open_files(&self) -> Result<Handles, OpenError> {
        if self.is_closed() {
            return Err(OpenError::Closed);
        }

        let directories: BTreeSet<&Path> = self
            .file_map
            .paths()
            .filter_map(Path::parent)
            .filter(|parent| !parent.as_os_str().is_empty())
            .collect();
        for directory in directories {
            self.backend
                .ensure_dir(directory)
                .await
                .map_err(|source| OpenError::Failed {
                    path: directory.to_path_buf(),
                    source: Arc::new(source),
                })?;
        }

        if self.is_closed() {
            return Err(OpenError::Closed);
        }

        let handles: Handles = self
            .file_map
            .paths()
            .map(|path| self.backend.open(path))
            .collect();
        info!(
            "Opened chunk store at {} ({} file(s))",
            self.base_path.display(),
            handles.len()
        );
        Ok(handles)
    }
}

#[async_trait]
impl ChunkStorage for FsChunkStore {
    fn chunk_length(&self) -> u64 {
        self.layout.chunk_length()
    }

    async fn put(&self, index: u64, chunk: &[u8]) -> Result<(), StorageError> {
        self.ensure_not_closed()?;

        let range = self.layout.validate_put(index, chunk.len() as u64)?;
        let segments = self.file_map.segments(range.clone())?;
        let handles = self.open().await?;

        debug!(
            "put chunk {} at {}..{} across {} segment(s)",
            index,
            range.start,
            range.end,
            segments.len()
        );
        // Segments already written stay written if a later one fails
        for segment in &segments {
            handles[segment.file_index]
                .write_at(segment.file_offset, &chunk[segment.buffer_range()])
                .await?;
        }

        Ok(())
    }

    async fn get(&self, index: u64, options: Option<ReadOptions>) -> Result<Vec<u8>, StorageError> {
        self.ensure_not_closed()?;

        let sub_range = options
            .map(|options| self.layout.sub_range(index, options))
            .transpose()?;
        let range = self.layout.chunk_range(index)?;
        let segments = self.file_map.segments(range.clone())?;
        let handles = self.open().await?;

        debug!(
            "get chunk {} at {}..{} across {} segment(s)",
            index,
            range.start,
            range.end,
            segments.len()
        );
        let mut chunk = Vec::new();
        for segment in &segments {
            let bytes = handles[segment.file_index]
                .read_at(segment.file_offset, segment.length)
                .await?;
            chunk.extend_from_slice(&bytes);
        }

        match sub_range {
            Some(sub_range) => Ok(chunk[sub_range].to_vec()),
            None => Ok(chunk),
        }
    }

    async fn close(&self) -> Result<(), StorageError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Err(StorageError::StoreClosed);
        }

        // Waits for an in-flight open; a store that never opened has nothing to release
        let handles = match self.handles.get_or_init(|| self.open_files()).await {
            Ok(handles) => handles,
            Err(_) => {
                info!("Closed chunk store at {}", self.base_path.display());
                return Ok(());
            }
        };

        let mut first_error = None;
        for handle in handles.iter() {
            if let Err(error) = handle.close().await {
                first_error.get_or_insert(error);
            }
        }

        info!("Closed chunk store at {}", self.base_path.display());
        match first_error {
            Some(error) => Err(StorageError::Io(error)),
            None => Ok(()),
        }
    }

    async fn destroy(&self) -> Result<(), StorageError> {
        if let Err(error) = self.close().await {
            debug!("Ignoring close error during destroy: {}", error);
        }

        for target in &self.removal_targets {
            self.backend
                .remove_all(target, self.retry)
                .await
                .map_err(|failure| StorageError::DestroyFailed {
                    path: target.clone(),
                    attempts: failure.attempts,
                    source: failure.source,
                })?;
        }

        info!("Destroyed chunk store at {}", self.base_path.display());
        Ok(())
    }
}
