//! Random-access file handles
//!
//! Positional read/write access to a single backing file. The filesystem
//! handle defers the OS open until the first read or write.

use std::io::{self, SeekFrom};
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};
use tokio::sync::Mutex;
use tracing::{debug, trace};

/// Positional I/O over one backing file.
#[async_trait]
pub trait RandomAccessFile: Send + Sync {
    /// Writes all of `data` at `offset`, extending the file as needed.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If the handle is closed or the write failed
    async fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()>;

    /// Reads exactly `length` bytes at `offset`.
    ///
    /// # Errors
    ///
    /// - `std::io::ErrorKind::UnexpectedEof` - If fewer than `length` bytes exist
    /// - `std::io::Error` - If the handle is closed or the read failed
    async fn read_at(&self, offset: u64, length: u64) -> io::Result<Vec<u8>>;

    /// Flushes and releases the handle. Closing twice is a no-op.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If flushing pending data failed
    async fn close(&self) -> io::Result<()>;
}

enum HandleState {
    Pending,
    Open(File),
    Closed,
}

/// Tokio file handle that opens the underlying file on first use.
///
/// Seek and I/O happen under one lock, so concurrent callers never observe
/// each other's cursor position.
pub struct FileHandle {
    path: PathBuf,
    state: Mutex<HandleState>,
}

impl FileHandle {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            state: Mutex::new(HandleState::Pending),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn open_file(&self) -> io::Result<File> {
        debug!("Opening backing file {}", self.path.display());
        OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&self.path)
            .await
    }

    fn closed_error(&self) -> io::Error {
        io::Error::other(format!("file handle for {} is closed", self.path.display()))
    }
}

#[async_trait]
impl RandomAccessFile for FileHandle {
    async fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        let mut state = self.state.lock().await;
        if let HandleState::Pending = *state {
            *state = HandleState::Open(self.open_file().await?);
        }
        let HandleState::Open(file) = &mut *state else {
            return Err(self.closed_error());
        };

        trace!(
            "write {} bytes at {} in {}",
            data.len(),
            offset,
            self.path.display()
        );
        file.seek(SeekFrom::Start(offset)).await?;
        file.write_all(data).await?;
        file.flush().await
    }

    async fn read_at(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        let mut state = self.state.lock().await;
        if let HandleState::Pending = *state {
            *state = HandleState::Open(self.open_file().await?);
        }
        let HandleState::Open(file) = &mut *state else {
            return Err(self.closed_error());
        };

        trace!(
            "read {} bytes at {} in {}",
            length,
            offset,
            self.path.display()
        );
        file.seek(SeekFrom::Start(offset)).await?;
        // Sized by the bytes present, not by the request
        let mut buffer = Vec::new();
        (&mut *file).take(length).read_to_end(&mut buffer).await?;
        if (buffer.len() as u64) < length {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!(
                    "read {} of {} bytes at {} in {}",
                    buffer.len(),
                    length,
                    offset,
                    self.path.display()
                ),
            ));
        }
        Ok(buffer)
    }

    async fn close(&self) -> io::Result<()> {
        let mut state = self.state.lock().await;
        if let HandleState::Open(file) = &mut *state {
            file.flush().await?;
            debug!("Closed backing file {}", self.path.display());
        }
        *state = HandleState::Closed;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_then_read() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = FileHandle::new(temp_dir.path().join("data"));

        handle.write_at(4, b"abcd").await.unwrap();
        let bytes = handle.read_at(4, 4).await.unwrap();
        assert_eq!(bytes, b"abcd");

        // Writing past the end leaves a zero-filled gap
        let gap = handle.read_at(0, 4).await.unwrap();
        assert_eq!(gap, vec![0u8; 4]);
    }

    #[tokio::test]
    async fn test_open_is_deferred() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("lazy");
        let handle = FileHandle::new(&path);

        assert!(!path.exists());
        handle.write_at(0, b"x").await.unwrap();
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_short_read_is_eof() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = FileHandle::new(temp_dir.path().join("short"));

        handle.write_at(0, b"abc").await.unwrap();
        let error = handle.read_at(0, 10).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_huge_read_of_short_file_is_eof() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = FileHandle::new(temp_dir.path().join("huge"));

        handle.write_at(0, b"abc").await.unwrap();
        let error = handle.read_at(0, 1 << 44).await.unwrap_err();
        assert_eq!(error.kind(), io::ErrorKind::UnexpectedEof);
    }

    #[tokio::test]
    async fn test_use_after_close() {
        let temp_dir = tempfile::tempdir().unwrap();
        let handle = FileHandle::new(temp_dir.path().join("closed"));

        handle.write_at(0, b"abc").await.unwrap();
        handle.close().await.unwrap();
        handle.close().await.unwrap();

        assert!(handle.write_at(0, b"abc").await.is_err());
        assert!(handle.read_at(0, 3).await.is_err());
    }

    #[tokio::test]
    async fn test_existing_content_is_kept() {
        let temp_dir = tempfile::tempdir().unwrap();
        let path = temp_dir.path().join("existing");
        std::fs::write(&path, b"0123456789").unwrap();

        let handle = FileHandle::new(&path);
        handle.write_at(2, b"ab").await.unwrap();
        handle.close().await.unwrap();

        assert_eq!(std::fs::read(&path).unwrap(), b"01ab456789");
    }
}
