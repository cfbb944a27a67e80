//! Job Registry: the in-memory source of truth for conference jobs
//!
//! Each job sits behind its own mutex so updates to different jobs never
//! contend. Snapshots are mirrored to the durable store through a single
//! ordered channel; the store is never read back.

use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::providers::JobStore;
use crate::types::{ConferenceType, FileInput, Job, JobStatus};

enum MirrorOp {
    Insert(Job),
    Update(Job),
}

/// Registry of all known jobs
pub struct JobRegistry {
    jobs: DashMap<Uuid, Arc<Mutex<Job>>>,
    mirror: Option<mpsc::UnboundedSender<MirrorOp>>,
}

impl JobRegistry {
    /// Registry without durable mirroring
    pub fn new() -> Self {
        Self {
            jobs: DashMap::new(),
            mirror: None,
        }
    }

    /// Registry mirroring into `store`; the returned task must be spawned
    pub fn with_mirror(store: Arc<dyn JobStore>) -> (Self, DurableMirror) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let registry = Self {
            jobs: DashMap::new(),
            mirror: Some(sender),
        };
        (registry, DurableMirror { store, receiver })
    }

    /// Register a new pending job
    pub fn create(&self, conference_type: ConferenceType, files: Vec<FileInput>) -> Result<Uuid> {
        if files.is_empty() {
            return Err(Error::InvalidRequest(
                "A conference needs at least one file".to_string(),
            ));
        }

        let job = Job::new(conference_type, files);
        let id = job.id;
        self.enqueue(MirrorOp::Insert(job.clone()));
        self.jobs.insert(id, Arc::new(Mutex::new(job)));

        tracing::info!("[{}] Created {} job", id, conference_type);
        Ok(id)
    }

    /// Snapshot of a job
    pub fn get(&self, id: Uuid) -> Result<Job> {
        let entry = self.entry(id)?;
        let job = entry.lock().clone();
        Ok(job)
    }

    /// Apply `mutator` under the job's lock.
    ///
    /// The mutator runs against a draft; nothing is committed (or mirrored)
    /// unless it returns `Ok`.
    pub fn update<F>(&self, id: Uuid, mutator: F) -> Result<Job>
    where
        F: FnOnce(&mut Job) -> Result<()>,
    {
        let entry = self.entry(id)?;
        let mut job = entry.lock();

        let mut draft = job.clone();
        mutator(&mut draft)?;
        *job = draft.clone();

        // Enqueued under the lock so mirror order matches commit order
        self.enqueue(MirrorOp::Update(draft.clone()));
        Ok(draft)
    }

    /// All jobs, newest first
    pub fn list(&self) -> Vec<Job> {
        let entries: Vec<Arc<Mutex<Job>>> =
            self.jobs.iter().map(|e| e.value().clone()).collect();
        let mut jobs: Vec<Job> = entries.iter().map(|e| e.lock().clone()).collect();
        jobs.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        jobs
    }

    /// Job counts by status
    pub fn stats(&self) -> RegistryStats {
        let mut stats = RegistryStats::default();
        for entry in self.jobs.iter() {
            stats.total_jobs += 1;
            match entry.value().lock().status {
                JobStatus::Pending => stats.pending += 1,
                JobStatus::Processing => stats.processing += 1,
                JobStatus::Completed => stats.completed += 1,
                JobStatus::Error => stats.error += 1,
            }
        }
        stats
    }

    fn entry(&self, id: Uuid) -> Result<Arc<Mutex<Job>>> {
        self.jobs
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(Error::JobNotFound(id))
    }

    fn enqueue(&self, op: MirrorOp) {
        let Some(sender) = &self.mirror else {
            return;
        };
        if sender.send(op).is_err() {
            tracing::debug!("Durable mirror is not running, snapshot dropped");
        }
    }
}

impl Default for JobRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Registry statistics
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct RegistryStats {
    pub total_jobs: usize,
    pub pending: usize,
    pub processing: usize,
    pub completed: usize,
    pub error: usize,
}

/// Drains registry snapshots into the durable store, in order
pub struct DurableMirror {
    store: Arc<dyn JobStore>,
    receiver: mpsc::UnboundedReceiver<MirrorOp>,
}

impl DurableMirror {
    /// Run until the registry is dropped
    pub async fn run(mut self) {
        tracing::info!("Durable mirror started ({} store)", self.store.name());

        while let Some(op) = self.receiver.recv().await {
            let (kind, id, result) = match op {
                MirrorOp::Insert(job) => ("insert", job.id, self.store.insert_job(&job).await),
                MirrorOp::Update(job) => ("update", job.id, self.store.update_job(&job).await),
            };
            if let Err(e) = result {
                tracing::warn!("[{}] Failed to mirror job {}: {}", id, kind, e);
            }
        }

        tracing::info!("Durable mirror stopped");
    }
}
