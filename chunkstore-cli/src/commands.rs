//! CLI command implementations

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, bail};
use chunkstore_core::{
    ChunkStorage, FileEntry, FsChunkStore, ReadOptions, StoreConfig, StoreOptions,
};
use clap::{Args, Subcommand};
use futures::future::try_join_all;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// Available CLI commands
#[derive(Subcommand)]
pub enum Commands {
    /// Split a file into chunks and store each one
    Import {
        /// File to import
        input: PathBuf,
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Write a chunk, or part of it, to stdout
    Get {
        /// Chunk index
        index: u64,
        #[command(flatten)]
        store: StoreArgs,
        /// Byte offset within the chunk
        #[arg(long)]
        offset: Option<u64>,
        /// Number of bytes to read from the offset
        #[arg(long)]
        size: Option<u64>,
    },
    /// Print the chunk layout and the file segments of each chunk
    Info {
        #[command(flatten)]
        store: StoreArgs,
    },
    /// Remove the backing files of a store
    Destroy {
        #[command(flatten)]
        store: StoreArgs,
    },
}

/// Options shared by every command that addresses a store.
#[derive(Args, Debug, Clone)]
pub struct StoreArgs {
    /// Length of every chunk except possibly the last
    #[arg(long)]
    pub chunk_length: u64,
    /// Backing file, or base directory when `--files` is given
    #[arg(long)]
    pub path: Option<PathBuf>,
    /// Total store length in bytes
    #[arg(long)]
    pub length: Option<u64>,
    /// JSON file with an ordered `[{ "path": ..., "length": ... }]` list
    #[arg(long)]
    pub files: Option<PathBuf>,
}

impl StoreArgs {
    async fn options(&self) -> anyhow::Result<StoreOptions> {
        let mut options = StoreOptions::new();
        if let Some(path) = &self.path {
            options = options.with_path(path);
        }
        if let Some(length) = self.length {
            options = options.with_length(length);
        }
        if let Some(files) = &self.files {
            options = options.with_files(read_file_list(files).await?);
        }
        Ok(options)
    }

    /// Opens a store that must name existing backing files.
    async fn existing_store(&self) -> anyhow::Result<FsChunkStore> {
        if self.path.is_none() && self.files.is_none() {
            bail!("either --path or --files is required");
        }
        self.store().await
    }

    async fn store(&self) -> anyhow::Result<FsChunkStore> {
        let options = self.options().await?;
        let store = FsChunkStore::with_config(self.chunk_length, options, &StoreConfig::from_env())?;
        Ok(store)
    }
}

async fn read_file_list(path: &Path) -> anyhow::Result<Vec<FileEntry>> {
    let raw = fs::read(path)
        .await
        .with_context(|| format!("failed to read file list {}", path.display()))?;
    serde_json::from_slice(&raw)
        .with_context(|| format!("invalid file list in {}", path.display()))
}

/// Handle the CLI command
///
/// # Errors
/// Returns the error of the command that fails
pub async fn handle_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Import { input, store } => import_file(input, store).await,
        Commands::Get {
            index,
            store,
            offset,
            size,
        } => get_chunk(index, store, offset, size).await,
        Commands::Info { store } => show_info(store).await,
        Commands::Destroy { store } => destroy_store(store).await,
    }
}

/// Import a file into a store, one chunk per `chunk_length` bytes
///
/// # Errors
/// - `StorageError::InvalidConfig` - Inconsistent store options
/// - `StorageError::Io` - Reading the input or writing a chunk failed
pub async fn import_file(input: PathBuf, mut args: StoreArgs) -> anyhow::Result<()> {
    let data = fs::read(&input)
        .await
        .with_context(|| format!("failed to read {}", input.display()))?;
    if data.is_empty() {
        bail!("{} is empty", input.display());
    }
    if args.files.is_none() {
        args.length = Some(data.len() as u64);
    }

    let store = Arc::new(args.store().await?);
    let chunk_length = usize::try_from(store.chunk_length()).context("chunk length too large")?;

    println!(
        "Importing {} ({} bytes) into {}",
        input.display(),
        data.len(),
        store.path().display()
    );

    let data: Arc<[u8]> = data.into();
    let count = data.len().div_ceil(chunk_length);
    let puts = (0..count).map(|i| {
        let store = Arc::clone(&store);
        let data = Arc::clone(&data);
        async move {
            let start = i * chunk_length;
            let end = (start + chunk_length).min(data.len());
            store.put(i as u64, &data[start..end]).await
        }
    });
    try_join_all(puts).await?;
    store.close().await?;

    info!("Imported {} chunks from {}", count, input.display());
    println!("Stored {count} chunks");
    Ok(())
}

/// Write a chunk or sub-range to stdout
///
/// # Errors
/// - `StorageError::InvalidRange` - Offset and size fall outside the chunk
/// - `StorageError::Io` - The chunk was never written
pub async fn get_chunk(
    index: u64,
    args: StoreArgs,
    offset: Option<u64>,
    size: Option<u64>,
) -> anyhow::Result<()> {
    let store = args.existing_store().await?;
    let options = match (offset, size) {
        (None, None) => None,
        (offset, length) => Some(ReadOptions {
            offset: offset.unwrap_or_default(),
            length,
        }),
    };
    debug!("Reading chunk {} with {:?}", index, options);

    let chunk = store.get(index, options).await?;
    store.close().await?;

    let mut stdout = tokio::io::stdout();
    stdout.write_all(&chunk).await?;
    stdout.flush().await?;
    Ok(())
}

/// Print the layout of a store without touching its files
///
/// # Errors
/// - `StorageError::InvalidConfig` - Inconsistent store options
pub async fn show_info(args: StoreArgs) -> anyhow::Result<()> {
    let store = args.store().await?;

    println!("Chunk store: {}", store.path().display());
    println!("  Chunk length: {}", store.chunk_length());

    let Some(count) = store.chunk_count() else {
        println!("  Length: unknown");
        return Ok(());
    };
    println!("  Length: {}", store.length().unwrap_or_default());
    println!("  Chunks: {count}");
    println!("  Last chunk length: {}", store.last_chunk_length());

    println!("Files:");
    for (i, file) in store.files().iter().enumerate() {
        println!(
            "  [{i}] {} ({} bytes at {})",
            file.path.display(),
            file.length,
            file.offset
        );
    }

    println!("Segments:");
    for index in 0..count {
        let segments = store.chunk_segments(index)?;
        let parts: Vec<String> = segments
            .iter()
            .map(|segment| {
                format!(
                    "[{}] {}..{}",
                    segment.file_index,
                    segment.file_offset,
                    segment.file_offset + segment.length
                )
            })
            .collect();
        println!("  chunk {index}: {}", parts.join(", "));
    }

    Ok(())
}

/// Remove the backing files of a store
///
/// # Errors
/// - `StorageError::DestroyFailed` - Files stayed busy through every retry
pub async fn destroy_store(args: StoreArgs) -> anyhow::Result<()> {
    let store = args.existing_store().await?;
    store.destroy().await?;

    println!("Destroyed {}", store.path().display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(chunk_length: u64, path: &Path) -> StoreArgs {
        StoreArgs {
            chunk_length,
            path: Some(path.to_path_buf()),
            length: None,
            files: None,
        }
    }

    #[tokio::test]
    async fn test_import_then_read_back() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("input.bin");
        let target = temp_dir.path().join("store");
        fs::write(&input, b"0123456789abcdefghijXYZ").await.unwrap();

        import_file(input, args(10, &target)).await.unwrap();

        assert_eq!(
            std::fs::read(&target).unwrap(),
            b"0123456789abcdefghijXYZ"
        );
    }

    #[tokio::test]
    async fn test_file_list_from_json() {
        let temp_dir = tempfile::tempdir().unwrap();
        let list = temp_dir.path().join("files.json");
        fs::write(&list, r#"[{"path": "a", "length": 5}, {"path": "b", "length": 3}]"#)
            .await
            .unwrap();

        let files = read_file_list(&list).await.unwrap();

        assert_eq!(files, vec![FileEntry::new("a", 5), FileEntry::new("b", 3)]);
    }

    #[tokio::test]
    async fn test_get_requires_location() {
        let store_args = StoreArgs {
            chunk_length: 10,
            path: None,
            length: None,
            files: None,
        };

        assert!(get_chunk(0, store_args, None, None).await.is_err());
    }

    #[tokio::test]
    async fn test_destroy_removes_imported_store() {
        let temp_dir = tempfile::tempdir().unwrap();
        let input = temp_dir.path().join("input.bin");
        let target = temp_dir.path().join("store");
        fs::write(&input, b"0123456789").await.unwrap();
        import_file(input, args(4, &target)).await.unwrap();

        destroy_store(args(4, &target)).await.unwrap();

        assert!(!target.exists());
    }
}
