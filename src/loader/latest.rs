use std::future::Future;

use tokio::task::{JoinError, JoinHandle};

/// Holds at most one running task. Starting a new one aborts the previous,
/// so only the most recently started task can ever be joined.
pub struct LatestTask<T> {
    handle: Option<JoinHandle<T>>,
}

impl<T: Send + 'static> LatestTask<T> {
    pub fn new() -> Self {
        LatestTask { handle: None }
    }

    /// Spawns `fut`, aborting whatever was running. Returns true when a task
    /// was superseded.
    pub fn replace<F>(&mut self, fut: F) -> bool
    where
        F: Future<Output = T> + Send + 'static,
    {
        let superseded = self.cancel();
        self.handle = Some(tokio::spawn(fut));
        superseded
    }

    pub fn is_running(&self) -> bool {
        self.handle.is_some()
    }

    /// Aborts the running task, if any. Returns true when one was aborted.
    pub fn cancel(&mut self) -> bool {
        match self.handle.take() {
            Some(handle) => {
                handle.abort();
                true
            }
            None => false,
        }
    }

    /// Waits for the current task. Cancel safe: dropping this future leaves
    /// the task in place. Pending forever when nothing is running, so guard
    /// it with `is_running` inside `select!`.
    pub async fn join(&mut self) -> Result<T, JoinError> {
        match self.handle.as_mut() {
            Some(handle) => {
                let result = handle.await;
                self.handle = None;
                result
            }
            None => std::future::pending().await,
        }
    }
}

impl<T: Send + 'static> Default for LatestTask<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LatestTask<T> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}
