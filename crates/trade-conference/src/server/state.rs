//! Application state for the conference server

use parking_lot::{Mutex, RwLock};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalyzerSettings, DocumentAnalyzer};
use crate::config::ConferenceConfig;
use crate::error::Result;
use crate::processing::{ConferenceQueue, JobRegistry, StatusService, WorkerPool};
use crate::providers::{DocumentAiClient, GeminiClient, JobStore, NoopJobStore};
use crate::storage::SqliteJobStore;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ConferenceConfig,
    queue: ConferenceQueue,
    status: StatusService,
    workers: Mutex<Vec<JoinHandle<()>>>,
    ready: RwLock<bool>,
}

impl AppState {
    /// Create state backed by the Gemini client
    pub async fn new(config: ConferenceConfig, shutdown: CancellationToken) -> Result<Self> {
        let client = Arc::new(GeminiClient::new(&config.ai)?);
        tracing::info!("Gemini client initialized (model: {})", config.ai.model);
        Self::with_client(config, client, shutdown)
    }

    /// Wire registry, durable mirror, analyzer and worker pool around `client`
    pub fn with_client(
        config: ConferenceConfig,
        client: Arc<dyn DocumentAiClient>,
        shutdown: CancellationToken,
    ) -> Result<Self> {
        let store: Arc<dyn JobStore> = if config.storage.enabled {
            let store = SqliteJobStore::new(&config.storage.database_path)?;
            tracing::info!(
                "Job store initialized at {}",
                config.storage.database_path.display()
            );
            Arc::new(store)
        } else {
            tracing::info!("Durable job store disabled");
            Arc::new(NoopJobStore)
        };

        let (registry, mirror) = JobRegistry::with_mirror(store);
        tokio::spawn(mirror.run());
        let registry = Arc::new(registry);

        let worker_count = config.processing.effective_worker_count();
        let (queue, receiver) = ConferenceQueue::new(
            registry.clone(),
            config.processing.queue_capacity,
            worker_count,
        );

        let analyzer = Arc::new(DocumentAnalyzer::new(
            client,
            AnalyzerSettings::from(&config.analyzer),
        ));

        let state = Self {
            inner: Arc::new(AppStateInner {
                status: StatusService::new(registry.clone()),
                queue,
                config,
                workers: Mutex::new(Vec::new()),
                ready: RwLock::new(false),
            }),
        };

        let handles = WorkerPool::new(registry, analyzer, worker_count, shutdown).spawn(receiver);
        *state.inner.workers.lock() = handles;
        state.set_ready(true);

        Ok(state)
    }

    pub fn config(&self) -> &ConferenceConfig {
        &self.inner.config
    }

    pub fn queue(&self) -> &ConferenceQueue {
        &self.inner.queue
    }

    pub fn status(&self) -> &StatusService {
        &self.inner.status
    }

    /// Check if the server is ready
    pub fn is_ready(&self) -> bool {
        *self.inner.ready.read()
    }

    /// Set ready state
    pub fn set_ready(&self, ready: bool) {
        *self.inner.ready.write() = ready;
    }

    /// Wait for workers to wind down after shutdown was requested
    pub async fn wait_for_workers(&self, grace: Duration) {
        self.set_ready(false);
        let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *self.inner.workers.lock());

        let all = futures::future::join_all(handles);
        if tokio::time::timeout(grace, all).await.is_err() {
            tracing::warn!("Workers still busy after {:?}, exiting anyway", grace);
        }
    }
}
