//! Filesystem collaborators used by the chunk store
//!
//! The store only needs three primitives from its environment: idempotent
//! directory creation, lazily opened random-access handles and recursive
//! removal with a busy-retry policy.

use std::io;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::fs;
use tracing::{debug, warn};

use super::handle::{FileHandle, RandomAccessFile};
use crate::config::StoreConfig;

/// Bounded retry policy for removals that hit a busy resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    /// Pause between attempts
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 60,
            backoff: Duration::from_millis(100),
        }
    }
}

impl From<&StoreConfig> for RetryPolicy {
    fn from(config: &StoreConfig) -> Self {
        Self {
            max_attempts: config.destroy_retries.max(1),
            backoff: config.destroy_backoff,
        }
    }
}

/// Removal that could not be completed.
#[derive(Debug)]
pub struct RemoveFailure {
    /// Attempts made before giving up
    pub attempts: u32,
    pub source: io::Error,
}

/// Environment primitives required by the chunk store.
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Creates `path` and any missing parents. Succeeds if it already exists.
    ///
    /// # Errors
    ///
    /// - `std::io::Error` - If a directory could not be created
    async fn ensure_dir(&self, path: &Path) -> io::Result<()>;

    /// Returns a handle for `path`. The handle may defer the actual open
    /// until first use.
    fn open(&self, path: &Path) -> Arc<dyn RandomAccessFile>;

    /// Removes a file or directory tree. A missing path counts as removed.
    ///
    /// # Errors
    ///
    /// - `RemoveFailure` - If removal failed, or kept hitting a busy resource
    ///   until the policy ran out of attempts
    async fn remove_all(&self, path: &Path, policy: RetryPolicy) -> Result<(), RemoveFailure>;
}

/// Returns true for errors worth retrying during removal.
pub fn is_busy(error: &io::Error) -> bool {
    match error.kind() {
        io::ErrorKind::ResourceBusy | io::ErrorKind::DirectoryNotEmpty => true,
        io::ErrorKind::PermissionDenied => cfg!(windows),
        _ => false,
    }
}

/// Runs `remove` until it succeeds, fails hard, or the policy is exhausted.
///
/// # Errors
///
/// - `RemoveFailure` - With the last error seen and the number of attempts made
pub async fn retry_removal<F, Fut>(
    path: &Path,
    policy: RetryPolicy,
    mut remove: F,
) -> Result<(), RemoveFailure>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = io::Result<()>>,
{
    let mut attempts = 0;
    loop {
        attempts += 1;
        match remove().await {
            Ok(()) => return Ok(()),
            Err(error) if error.kind() == io::ErrorKind::NotFound => {
                debug!("{} already removed", path.display());
                return Ok(());
            }
            Err(error) if is_busy(&error) && attempts < policy.max_attempts => {
                warn!(
                    "Removing {} hit busy resource (attempt {}/{}): {}",
                    path.display(),
                    attempts,
                    policy.max_attempts,
                    error
                );
                tokio::time::sleep(policy.backoff).await;
            }
            Err(source) => return Err(RemoveFailure { attempts, source }),
        }
    }
}

/// Backend on top of the local filesystem via `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FsBackend;

#[async_trait]
impl StorageBackend for FsBackend {
    async fn ensure_dir(&self, path: &Path) -> io::Result<()> {
        fs::create_dir_all(path).await
    }

    fn open(&self, path: &Path) -> Arc<dyn RandomAccessFile> {
        Arc::new(FileHandle::new(path))
    }

    async fn remove_all(&self, path: &Path, policy: RetryPolicy) -> Result<(), RemoveFailure> {
        retry_removal(path, policy, || remove_path(path)).await
    }
}

async fn remove_path(path: &Path) -> io::Result<()> {
    let metadata = fs::symlink_metadata(path).await?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).await
    } else {
        fs::remove_file(path).await
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};

    use super::*;

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            backoff: Duration::from_millis(1),
        }
    }

    #[tokio::test]
    async fn test_remove_directory_tree() {
        let temp_dir = tempfile::tempdir().unwrap();
        let root = temp_dir.path().join("root");
        FsBackend.ensure_dir(&root.join("a/b")).await.unwrap();
        std::fs::write(root.join("a/b/file"), b"data").unwrap();

        FsBackend
            .remove_all(&root, RetryPolicy::default())
            .await
            .unwrap();

        assert!(!root.exists());
    }

    #[tokio::test]
    async fn test_remove_single_file() {
        let temp_dir = tempfile::tempdir().unwrap();
        let file = temp_dir.path().join("file");
        std::fs::write(&file, b"data").unwrap();

        FsBackend
            .remove_all(&file, RetryPolicy::default())
            .await
            .unwrap();

        assert!(!file.exists());
        assert!(temp_dir.path().exists());
    }

    #[tokio::test]
    async fn test_remove_missing_path() {
        let temp_dir = tempfile::tempdir().unwrap();
        let result = FsBackend
            .remove_all(&temp_dir.path().join("missing"), RetryPolicy::default())
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_busy_removal_is_retried() {
        let calls = AtomicU32::new(0);

        let result = retry_removal(Path::new("busy"), fast_policy(5), || {
            let call = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if call < 3 {
                    Err(io::Error::from(io::ErrorKind::ResourceBusy))
                } else {
                    Ok(())
                }
            }
        })
        .await;

        assert!(result.is_ok());
        assert_eq!(calls.load(Ordering::SeqCst), 4);
    }

    #[tokio::test]
    async fn test_busy_removal_gives_up() {
        let calls = AtomicU32::new(0);

        let result = retry_removal(Path::new("busy"), fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::from(io::ErrorKind::ResourceBusy)) }
        })
        .await;

        let failure = result.unwrap_err();
        assert_eq!(failure.attempts, 3);
        assert_eq!(failure.source.kind(), io::ErrorKind::ResourceBusy);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_hard_failure_is_not_retried() {
        let calls = AtomicU32::new(0);

        let result = retry_removal(Path::new("denied"), fast_policy(10), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(io::Error::from(io::ErrorKind::InvalidInput)) }
        })
        .await;

        assert_eq!(result.unwrap_err().attempts, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
