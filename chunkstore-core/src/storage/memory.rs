//! In-memory storage backend for testing.
//!
//! Keeps file contents in a shared map, counts calls into the backend and can
//! inject failures, which makes initialization races and partial writes
//! observable without touching the disk.

use std::collections::{HashMap, HashSet};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::backend::{RemoveFailure, RetryPolicy, StorageBackend, retry_removal};
use super::handle::RandomAccessFile;

type FileTable = Arc<Mutex<HashMap<PathBuf, Vec<u8>>>>;

/// Backend that keeps all files in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    files: FileTable,
    directories: Mutex<HashSet<PathBuf>>,
    failing_writes: Arc<Mutex<HashSet<PathBuf>>>,
    fail_ensure_dir: AtomicBool,
    ensure_dir_delay: Mutex<Duration>,
    busy_removals: AtomicU32,
    ensure_dir_calls: AtomicUsize,
    open_calls: AtomicUsize,
    remove_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every directory creation fail with permission denied.
    pub fn fail_ensure_dir(&self) {
        self.fail_ensure_dir.store(true, Ordering::SeqCst);
    }

    /// Delays directory creation so concurrent callers pile up behind it.
    pub fn set_ensure_dir_delay(&self, delay: Duration) {
        *self.ensure_dir_delay.lock() = delay;
    }

    /// Makes writes to `path` fail.
    pub fn fail_writes_to(&self, path: impl Into<PathBuf>) {
        self.failing_writes.lock().insert(path.into());
    }

    /// Makes the next `count` removal attempts report a busy resource.
    pub fn set_busy_removals(&self, count: u32) {
        self.busy_removals.store(count, Ordering::SeqCst);
    }

    pub fn file_contents(&self, path: impl AsRef<Path>) -> Option<Vec<u8>> {
        self.files.lock().get(path.as_ref()).cloned()
    }

    pub fn has_directory(&self, path: impl AsRef<Path>) -> bool {
        self.directories.lock().contains(path.as_ref())
    }

    pub fn ensure_dir_calls(&self) -> usize {
        self.ensure_dir_calls.load(Ordering::SeqCst)
    }

    pub fn open_calls(&self) -> usize {
        self.open_calls.load(Ordering::SeqCst)
    }

    pub fn remove_calls(&self) -> usize {
        self.remove_calls.load(Ordering::SeqCst)
    }

    fn try_remove(&self, path: &Path) -> io::Result<()> {
        self.remove_calls.fetch_add(1, Ordering::SeqCst);

        let busy = self
            .busy_removals
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if busy {
            return Err(io::Error::from(io::ErrorKind::ResourceBusy));
        }

        let mut files = self.files.lock();
        let mut directories = self.directories.lock();
        let before = files.len() + directories.len();
        files.retain(|file, _| !file.starts_with(path));
        directories.retain(|directory| !directory.starts_with(path));
        if files.len() + directories.len() == before {
            return Err(io::Error::from(io::ErrorKind::NotFound));
        }
        Ok(())
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        self.ensure_dir_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.ensure_dir_delay.lock();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.fail_ensure_dir.load(Ordering::SeqCst) {
            return Err(io::Error::from(io::ErrorKind::PermissionDenied));
        }
        self.directories.lock().extend(path.ancestors().map(Path::to_path_buf));
        Ok(())
    }

    fn open(&self, path: &Path) -> Arc<dyn RandomAccessFile> {
        self.open_calls.fetch_add(1, Ordering::SeqCst);
        Arc::new(MemoryFile {
            path: path.to_path_buf(),
            files: Arc::clone(&self.files),
            failing_writes: Arc::clone(&self.failing_writes),
            closed: AtomicBool::new(false),
        })
    }

    async fn remove_all(&self, path: &Path, policy: RetryPolicy) -> Result<(), RemoveFailure> {
        retry_removal(path, policy, || async { self.try_remove(path) }).await
    }
}

struct MemoryFile {
    path: PathBuf,
    files: FileTable,
    failing_writes: Arc<Mutex<HashSet<PathBuf>>>,
    closed: AtomicBool,
}

impl MemoryFile {
    fn check_open(&self) -> io::Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(io::Error::other(format!(
                "file handle for {} is closed",
                self.path.display()
            )))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl RandomAccessFile for MemoryFile {
    async fn write_at(&self, offset: u64, data: &[u8]) -> io::Result<()> {
        self.check_open()?;
        if self.failing_writes.lock().contains(&self.path) {
            return Err(io::Error::other(format!(
                "injected write failure for {}",
                self.path.display()
            )));
        }

        let mut files = self.files.lock();
        let contents = files.entry(self.path.clone()).or_default();
        let start = offset as usize;
        let end = start + data.len();
        if contents.len() < end {
            contents.resize(end, 0);
        }
        contents[start..end].copy_from_slice(data);
        Ok(())
    }

    async fn read_at(&self, offset: u64, length: u64) -> io::Result<Vec<u8>> {
        self.check_open()?;

        let files = self.files.lock();
        let contents = files.get(&self.path).map(Vec::as_slice).unwrap_or_default();
        let start = usize::try_from(offset).unwrap_or(usize::MAX);
        let end = usize::try_from(length)
            .ok()
            .and_then(|length| start.checked_add(length))
            .unwrap_or(usize::MAX);
        contents
            .get(start..end)
            .map(<[u8]>::to_vec)
            .ok_or_else(|| io::Error::from(io::ErrorKind::UnexpectedEof))
    }

    async fn close(&self) -> io::Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_file_sparse_write() {
        let backend = MemoryBackend::new();
        let file = backend.open(Path::new("/a"));

        file.write_at(3, b"xy").await.unwrap();

        assert_eq!(backend.file_contents("/a"), Some(vec![0, 0, 0, b'x', b'y']));
        assert_eq!(file.read_at(3, 2).await.unwrap(), b"xy");
        assert!(file.read_at(4, 2).await.is_err());
    }

    #[tokio::test]
    async fn test_remove_prefix() {
        let backend = MemoryBackend::new();
        backend.ensure_dir(Path::new("/root/sub")).await.unwrap();
        backend.open(Path::new("/root/sub/a")).write_at(0, b"a").await.unwrap();
        backend.open(Path::new("/other")).write_at(0, b"b").await.unwrap();

        backend
            .remove_all(Path::new("/root"), RetryPolicy::default())
            .await
            .unwrap();

        assert_eq!(backend.file_contents("/root/sub/a"), None);
        assert!(!backend.has_directory("/root/sub"));
        assert_eq!(backend.file_contents("/other"), Some(b"b".to_vec()));
    }
}
