//! Owned, bounded worker pool for non-blocking callbacks and concurrent updates.

use std::future::Future;
use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tracing::warn;

/// At most `max_concurrency` spawned tasks run at once; [`UpdateWorkerPool::spawn`] waits
/// for a free slot. Clones share the same capacity.
#[derive(Clone, Debug)]
pub struct UpdateWorkerPool {
    semaphore: Arc<Semaphore>,
    max_concurrency: usize,
}

impl UpdateWorkerPool {
    /// `max_concurrency` is clamped to at least 1.
    pub fn new(max_concurrency: usize) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            semaphore: Arc::new(Semaphore::new(max_concurrency)),
            max_concurrency,
        }
    }

    pub fn max_concurrency(&self) -> usize {
        self.max_concurrency
    }

    /// Free slots right now.
    pub fn available(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// Waits for a free slot, then runs `task` on the tokio runtime holding that slot.
    pub async fn spawn<F>(&self, task: F) -> JoinHandle<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let permit = match self.semaphore.clone().acquire_owned().await {
            Ok(permit) => Some(permit),
            Err(_) => {
                warn!("worker pool closed, running task without a slot");
                None
            }
        };
        tokio::spawn(async move {
            let _permit = permit;
            task.await;
        })
    }

    /// Waits until every spawned task has finished.
    pub async fn wait_idle(&self) {
        let all = u32::try_from(self.max_concurrency).unwrap_or(u32::MAX);
        if let Ok(permits) = self.semaphore.acquire_many(all).await {
            drop(permits);
        }
    }
}

impl Default for UpdateWorkerPool {
    fn default() -> Self {
        Self::new(16)
    }
}
