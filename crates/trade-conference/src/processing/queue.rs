//! Bounded intake queue feeding the worker pool

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use super::registry::{JobRegistry, RegistryStats};
use crate::error::{Error, Result};
use crate::types::{ConferenceType, FileInput};

/// Intake side of the conference pipeline
pub struct ConferenceQueue {
    registry: Arc<JobRegistry>,
    sender: mpsc::Sender<Uuid>,
    capacity: usize,
    worker_count: usize,
}

impl ConferenceQueue {
    /// Create a queue holding up to `capacity` pending jobs
    pub fn new(
        registry: Arc<JobRegistry>,
        capacity: usize,
        worker_count: usize,
    ) -> (Self, mpsc::Receiver<Uuid>) {
        let capacity = capacity.max(1);
        let (sender, receiver) = mpsc::channel(capacity);

        let queue = Self {
            registry,
            sender,
            capacity,
            worker_count,
        };

        (queue, receiver)
    }

    /// Register a job and hand it to the workers.
    ///
    /// Waits for channel capacity before the job is registered, so a caller
    /// that gives up while waiting leaves nothing behind.
    pub async fn submit(&self, conference_type: ConferenceType, files: Vec<FileInput>) -> Result<Uuid> {
        let permit = self.sender.reserve().await.map_err(|_| {
            tracing::error!("Conference queue has no workers left");
            Error::QueueClosed
        })?;

        let id = self.registry.create(conference_type, files)?;
        permit.send(id);
        Ok(id)
    }

    pub fn stats(&self) -> QueueStats {
        QueueStats {
            jobs: self.registry.stats(),
            queued: self.capacity - self.sender.capacity(),
            queue_capacity: self.capacity,
            worker_count: self.worker_count,
        }
    }
}

/// Queue statistics
#[derive(Debug, Clone, Serialize)]
pub struct QueueStats {
    #[serde(flatten)]
    pub jobs: RegistryStats,
    /// Jobs waiting in the channel
    pub queued: usize,
    pub queue_capacity: usize,
    pub worker_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::JobStatus;
    use std::path::PathBuf;
    use std::time::Duration;

    fn one_file() -> Vec<FileInput> {
        vec![FileInput {
            filename: "invoice.pdf".to_string(),
            storage_ref: PathBuf::from("/uploads/invoice.pdf"),
        }]
    }

    #[tokio::test]
    async fn test_submit_enqueues_job_id() {
        let registry = Arc::new(JobRegistry::new());
        let (queue, mut receiver) = ConferenceQueue::new(registry.clone(), 4, 1);

        let id = queue.submit(ConferenceType::Invoice, one_file()).await.unwrap();

        assert_eq!(receiver.recv().await, Some(id));
        assert_eq!(registry.get(id).unwrap().status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn test_full_queue_applies_backpressure() {
        let registry = Arc::new(JobRegistry::new());
        let (queue, mut receiver) = ConferenceQueue::new(registry, 1, 1);

        queue.submit(ConferenceType::Invoice, one_file()).await.unwrap();
        assert_eq!(queue.stats().queued, 1);
        assert_eq!(queue.stats().jobs.pending, 1);

        let blocked = tokio::time::timeout(
            Duration::from_millis(50),
            queue.submit(ConferenceType::Invoice, one_file()),
        )
        .await;
        assert!(blocked.is_err());

        assert_eq!(queue.stats().jobs.total_jobs, 1);
        receiver.recv().await.unwrap();
        assert!(queue.submit(ConferenceType::Invoice, one_file()).await.is_ok());
    }

    #[tokio::test]
    async fn test_closed_queue_registers_nothing() {
        let registry = Arc::new(JobRegistry::new());
        let (queue, receiver) = ConferenceQueue::new(registry.clone(), 4, 1);
        drop(receiver);

        let result = queue.submit(ConferenceType::Invoice, one_file()).await;
        assert!(matches!(result, Err(Error::QueueClosed)));
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn test_invalid_request_releases_capacity() {
        let registry = Arc::new(JobRegistry::new());
        let (queue, _receiver) = ConferenceQueue::new(registry, 1, 1);

        let result = queue.submit(ConferenceType::Invoice, Vec::new()).await;
        assert!(matches!(result, Err(Error::InvalidRequest(_))));
        assert_eq!(queue.stats().queued, 0);
    }
}
