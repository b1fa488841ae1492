use std::sync::Arc;
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

use svckit::errors::SyncError;

/// Caps outstanding destination writes across every table of a job.
#[derive(Debug, Clone)]
pub struct WritePool {
    permits: Arc<Semaphore>,
    size: usize,
}

impl WritePool {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            permits: Arc::new(Semaphore::new(size)),
            size,
        }
    }

    /// Wait for a free writer slot. The slot is released when the permit drops.
    pub async fn acquire(&self) -> Result<OwnedSemaphorePermit, SyncError> {
        self.permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|e| SyncError::Aborted(format!("Write pool closed: {}", e)))
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn available(&self) -> usize {
        self.permits.available_permits()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_returned_on_drop() {
        let pool = WritePool::new(2);
        assert_eq!(pool.size(), 2);

        let first = pool.acquire().await.unwrap();
        let _second = pool.acquire().await.unwrap();
        assert_eq!(pool.available(), 0);

        drop(first);
        assert_eq!(pool.available(), 1);
    }

    #[test]
    fn test_zero_size_becomes_one() {
        assert_eq!(WritePool::new(0).size(), 1);
    }
}
