//! Core types for the conference pipeline

pub mod analysis;
pub mod job;

pub use analysis::{AnalysisResult, Finding, FindingKind, LineItem, Summary, Verdict};
pub use job::{
    ConferenceType, FileInput, FileRecord, FileStatus, Job, JobStatus, Strategy, StrategyAttempt,
};
