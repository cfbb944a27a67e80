//! Status API: read-only views over the registry

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;

use super::registry::JobRegistry;
use crate::error::Result;
use crate::types::{ConferenceType, Job, JobStatus};

/// Lightweight progress view for polling clients
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct JobStatusView {
    pub job_id: Uuid,
    pub conference_type: ConferenceType,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub percent_complete: f32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&Job> for JobStatusView {
    fn from(job: &Job) -> Self {
        Self {
            job_id: job.id,
            conference_type: job.conference_type,
            status: job.status,
            total_files: job.total_files,
            processed_files: job.processed_files,
            percent_complete: job.percent_complete(),
            created_at: job.created_at,
            updated_at: job.updated_at,
        }
    }
}

/// Read-only access to job progress and results
#[derive(Clone)]
pub struct StatusService {
    registry: Arc<JobRegistry>,
}

impl StatusService {
    pub fn new(registry: Arc<JobRegistry>) -> Self {
        Self { registry }
    }

    pub fn status(&self, id: Uuid) -> Result<JobStatusView> {
        self.registry.get(id).map(|job| JobStatusView::from(&job))
    }

    /// Full job snapshot including per-file results
    pub fn result(&self, id: Uuid) -> Result<Job> {
        self.registry.get(id)
    }

    /// Progress of every job, newest first
    pub fn list(&self) -> Vec<JobStatusView> {
        self.registry.list().iter().map(JobStatusView::from).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::types::{AnalysisResult, FileInput};
    use std::path::PathBuf;

    fn setup(file_count: usize) -> (Arc<JobRegistry>, StatusService, Uuid) {
        let registry = Arc::new(JobRegistry::new());
        let files = (0..file_count)
            .map(|i| FileInput {
                filename: format!("f{}.pdf", i),
                storage_ref: PathBuf::from(format!("/uploads/f{}.pdf", i)),
            })
            .collect();
        let id = registry.create(ConferenceType::Invoice, files).unwrap();
        let service = StatusService::new(registry.clone());
        (registry, service, id)
    }

    #[test]
    fn test_percent_complete() {
        let (registry, service, id) = setup(4);
        assert_eq!(service.status(id).unwrap().percent_complete, 0.0);

        registry
            .update(id, |job| {
                job.start()?;
                job.start_file(0)?;
                job.finish_file(0, AnalysisResult::failure("x", "y"), Vec::new())
            })
            .unwrap();

        let view = service.status(id).unwrap();
        assert_eq!(view.status, JobStatus::Processing);
        assert_eq!(view.processed_files, 1);
        assert_eq!(view.percent_complete, 25.0);
    }

    #[test]
    fn test_reads_are_idempotent() {
        let (_registry, service, id) = setup(2);
        assert_eq!(service.status(id).unwrap(), service.status(id).unwrap());
        assert_eq!(service.result(id).unwrap(), service.result(id).unwrap());
        assert_eq!(service.list().len(), 1);
    }

    #[test]
    fn test_unknown_job() {
        let (_registry, service, _) = setup(1);
        assert!(matches!(
            service.status(Uuid::new_v4()),
            Err(Error::JobNotFound(_))
        ));
    }
}
