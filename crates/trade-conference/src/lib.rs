//! trade-conference: asynchronous conference of trade-compliance documents
//!
//! Submitted invoices, packing lists and other foreign-trade documents are
//! analyzed in the background by an external AI document-understanding
//! service. Each file goes through a binary-then-text strategy ladder with
//! hard deadlines, and the AI's loosely structured output is validated into
//! typed findings that clients poll for over HTTP.

pub mod analysis;
pub mod config;
pub mod error;
pub mod ingestion;
pub mod processing;
pub mod providers;
pub mod server;
pub mod storage;
pub mod types;

pub use config::ConferenceConfig;
pub use error::{Error, Result};
pub use types::{
    analysis::{AnalysisResult, Finding, Summary, Verdict},
    job::{ConferenceType, FileRecord, Job, JobStatus},
};
