//! Background worker pool for conference jobs
//!
//! A job is owned by exactly one worker from start to finish, so its files
//! are analyzed strictly in order. Different jobs run on different workers.

use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::registry::JobRegistry;
use crate::analysis::DocumentAnalyzer;
use crate::types::AnalysisResult;

const SHUTDOWN_REASON: &str = "processing interrupted by shutdown";

/// Pool of conference workers sharing one intake channel
pub struct WorkerPool {
    registry: Arc<JobRegistry>,
    analyzer: Arc<DocumentAnalyzer>,
    worker_count: usize,
    shutdown: CancellationToken,
}

impl WorkerPool {
    pub fn new(
        registry: Arc<JobRegistry>,
        analyzer: Arc<DocumentAnalyzer>,
        worker_count: usize,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            registry,
            analyzer,
            worker_count: worker_count.max(1),
            shutdown,
        }
    }

    /// Spawn the workers; each runs until shutdown or until the queue closes
    pub fn spawn(self, receiver: mpsc::Receiver<Uuid>) -> Vec<JoinHandle<()>> {
        tracing::info!("Starting {} conference workers", self.worker_count);

        let receiver = Arc::new(Mutex::new(receiver));
        let pool = Arc::new(self);

        (0..pool.worker_count)
            .map(|worker_id| {
                let pool = pool.clone();
                let receiver = receiver.clone();
                tokio::spawn(async move { pool.run(worker_id, receiver).await })
            })
            .collect()
    }

    async fn run(&self, worker_id: usize, receiver: Arc<Mutex<mpsc::Receiver<Uuid>>>) {
        loop {
            let next = tokio::select! {
                biased;
                _ = self.shutdown.cancelled() => None,
                id = async { receiver.lock().await.recv().await } => id,
            };
            let Some(job_id) = next else {
                break;
            };

            tracing::info!("[{}] Worker {} picked up job", job_id, worker_id);
            self.process_job(job_id).await;
        }

        if self.shutdown.is_cancelled() {
            self.abort_queued(&receiver).await;
        }
        tracing::info!("Worker {} stopped", worker_id);
    }

    /// Close out jobs that were queued but never started
    async fn abort_queued(&self, receiver: &Mutex<mpsc::Receiver<Uuid>>) {
        let mut receiver = receiver.lock().await;
        while let Ok(job_id) = receiver.try_recv() {
            self.abort(job_id);
        }
    }

    async fn process_job(&self, job_id: Uuid) {
        let job = match self.registry.update(job_id, |job| job.start()) {
            Ok(job) => job,
            Err(e) => {
                tracing::error!("[{}] Cannot start job: {}", job_id, e);
                return;
            }
        };
        tracing::info!(
            "[{}] Processing {} job with {} files",
            job_id,
            job.conference_type,
            job.total_files
        );

        for (index, file) in job.files.iter().enumerate() {
            if self.shutdown.is_cancelled() {
                self.abort(job_id);
                return;
            }

            if let Err(e) = self.registry.update(job_id, |job| job.start_file(index)) {
                tracing::error!("[{}] Cannot start {}: {}", job_id, file.filename, e);
                continue;
            }

            let analysis = AssertUnwindSafe(self.analyzer.analyze(
                &file.filename,
                &file.storage_ref,
                job.conference_type,
            ))
            .catch_unwind()
            .await;

            let (result, attempts) = match analysis {
                Ok(outcome) => (outcome.result, outcome.attempts),
                Err(panic) => {
                    let message = panic_message(panic.as_ref());
                    tracing::error!(
                        "[{}] Analyzer panicked on {}: {}",
                        job_id,
                        file.filename,
                        message
                    );
                    (
                        AnalysisResult::failure("analyzer", format!("Analyzer panicked: {}", message)),
                        Vec::new(),
                    )
                }
            };

            let status = result.summary.status;
            match self
                .registry
                .update(job_id, move |job| job.finish_file(index, result, attempts))
            {
                Ok(job) => tracing::info!(
                    "[{}] {} finished with {} ({}/{})",
                    job_id,
                    file.filename,
                    status,
                    job.processed_files,
                    job.total_files
                ),
                Err(e) => tracing::error!("[{}] Cannot record {}: {}", job_id, file.filename, e),
            }
        }

        match self.registry.update(job_id, |job| job.complete()) {
            Ok(_) => tracing::info!("[{}] Job completed", job_id),
            Err(e) => {
                tracing::error!("[{}] Cannot complete job: {}", job_id, e);
                self.abort(job_id);
            }
        }
    }

    fn abort(&self, job_id: Uuid) {
        match self.registry.update(job_id, |job| job.abort(SHUTDOWN_REASON)) {
            Ok(_) => tracing::error!("[{}] Job aborted: {}", job_id, SHUTDOWN_REASON),
            Err(e) => tracing::error!("[{}] Cannot abort job: {}", job_id, e),
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
