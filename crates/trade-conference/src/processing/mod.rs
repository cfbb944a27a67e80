//! Background processing: job registry, intake queue, workers and status

mod queue;
mod registry;
mod status;
mod worker;

pub use queue::{ConferenceQueue, QueueStats};
pub use registry::{DurableMirror, JobRegistry, RegistryStats};
pub use status::{JobStatusView, StatusService};
pub use worker::WorkerPool;
