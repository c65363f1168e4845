//! Run-once initialization shared by concurrent callers
//!
//! The first caller drives the initialization future; every other caller,
//! whether it arrives while the future is running or after it settled,
//! receives a clone of the same result. Failures are memoized as well.

use std::future::Future;

use tokio::sync::OnceCell;

/// Memoized result of a single asynchronous initialization.
#[derive(Debug)]
pub struct LazyInit<T, E> {
    cell: OnceCell<Result<T, E>>,
}

impl<T, E> Default for LazyInit<T, E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T, E> LazyInit<T, E> {
    pub fn new() -> Self {
        Self {
            cell: OnceCell::new(),
        }
    }

    /// Returns the settled result, if initialization has finished.
    pub fn settled(&self) -> Option<&Result<T, E>> {
        self.cell.get()
    }
}

impl<T: Clone, E: Clone> LazyInit<T, E> {
    /// Runs `init` unless a result already exists or another caller is
    /// running it, then returns the shared result.
    ///
    /// If the caller driving `init` is dropped before completion, the next
    /// waiter takes over.
    pub async fn get_or_init<F, Fut>(&self, init: F) -> Result<T, E>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.cell.get_or_init(init).await.clone()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use futures::future::join_all;

    use super::*;

    #[tokio::test]
    async fn test_concurrent_callers_share_one_run() {
        let lazy: Arc<LazyInit<u32, String>> = Arc::new(LazyInit::new());
        let runs = Arc::new(AtomicUsize::new(0));

        let callers = (0..32).map(|_| {
            let lazy = Arc::clone(&lazy);
            let runs = Arc::clone(&runs);
            async move {
                lazy.get_or_init(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                    Ok(7)
                })
                .await
            }
        });

        let results = join_all(callers).await;
        assert!(results.iter().all(|result| *result == Ok(7)));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failure_is_memoized() {
        let lazy: LazyInit<u32, String> = LazyInit::new();
        let runs = AtomicUsize::new(0);

        for _ in 0..3 {
            let result = lazy
                .get_or_init(|| async {
                    runs.fetch_add(1, Ordering::SeqCst);
                    Err("permission denied".to_string())
                })
                .await;
            assert_eq!(result, Err("permission denied".to_string()));
        }

        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_settled_reports_state() {
        let lazy: LazyInit<u32, String> = LazyInit::new();
        assert!(lazy.settled().is_none());

        lazy.get_or_init(|| async { Ok(1) }).await.unwrap();
        assert_eq!(lazy.settled(), Some(&Ok(1)));
    }
}
