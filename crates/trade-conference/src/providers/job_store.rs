//! Durable job store trait

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::types::Job;

/// Best-effort durable backing for the job registry
///
/// The registry never reads through this trait; it only mirrors snapshots
/// into it. `get_job` exists for inspection and tests.
///
/// Implementations:
/// - `SqliteJobStore`: local SQLite file
/// - `NoopJobStore`: persistence disabled
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait JobStore: Send + Sync {
    /// Record a newly created job
    async fn insert_job(&self, job: &Job) -> Result<()>;

    /// Overwrite the stored snapshot of a job
    async fn update_job(&self, job: &Job) -> Result<()>;

    /// Load a stored snapshot
    async fn get_job(&self, id: Uuid) -> Result<Option<Job>>;

    /// Get store name for logging
    fn name(&self) -> &str;
}

/// Store that discards everything
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopJobStore;

#[async_trait]
impl JobStore for NoopJobStore {
    async fn insert_job(&self, _job: &Job) -> Result<()> {
        Ok(())
    }

    async fn update_job(&self, _job: &Job) -> Result<()> {
        Ok(())
    }

    async fn get_job(&self, _id: Uuid) -> Result<Option<Job>> {
        Ok(None)
    }

    fn name(&self) -> &str {
        "noop"
    }
}
