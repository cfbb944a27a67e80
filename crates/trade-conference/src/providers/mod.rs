//! Provider abstractions for the AI service and the durable job store
//!
//! Trait-based seams so the pipeline can run against Gemini and SQLite in
//! production and against mocks in tests.

pub mod ai;
pub mod gemini;
pub mod job_store;

pub use ai::{AiResponse, DocumentAiClient, DocumentPayload, StopReason};
pub use gemini::GeminiClient;
pub use job_store::{JobStore, NoopJobStore};
