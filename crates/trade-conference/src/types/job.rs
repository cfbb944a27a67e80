//! Job and file record types for conference processing

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use super::AnalysisResult;
use crate::error::{Error, Result};

/// Supported document categories
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ConferenceType {
    Invoice,
    PackingList,
    BillOfLading,
    CertificateOfOrigin,
    ImportDeclaration,
}

impl ConferenceType {
    /// Get display name
    pub fn display_name(&self) -> &'static str {
        match self {
            ConferenceType::Invoice => "Commercial Invoice",
            ConferenceType::PackingList => "Packing List",
            ConferenceType::BillOfLading => "Bill of Lading",
            ConferenceType::CertificateOfOrigin => "Certificate of Origin",
            ConferenceType::ImportDeclaration => "Import Declaration",
        }
    }

    /// Whether documents of this type carry a table of goods
    pub fn has_line_items(&self) -> bool {
        matches!(self, ConferenceType::Invoice | ConferenceType::PackingList)
    }
}

impl std::fmt::Display for ConferenceType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tag = match self {
            ConferenceType::Invoice => "invoice",
            ConferenceType::PackingList => "packing_list",
            ConferenceType::BillOfLading => "bill_of_lading",
            ConferenceType::CertificateOfOrigin => "certificate_of_origin",
            ConferenceType::ImportDeclaration => "import_declaration",
        };
        f.write_str(tag)
    }
}

/// Job status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Error)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Error => "error",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// File processing status
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Pending,
    Processing,
    Completed,
    Error,
}

impl FileStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, FileStatus::Completed | FileStatus::Error)
    }
}

impl std::fmt::Display for FileStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            FileStatus::Pending => "pending",
            FileStatus::Processing => "processing",
            FileStatus::Completed => "completed",
            FileStatus::Error => "error",
        };
        f.write_str(s)
    }
}

/// Analysis strategy used for one attempt
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    /// Raw document bytes sent to the AI service
    Binary,
    /// Locally extracted text sent as a prompt
    TextFallback,
}

/// Record of one rung of the strategy ladder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StrategyAttempt {
    pub strategy: Strategy,
    /// "accepted" or the escalation trigger (e.g. "timeout", "safety")
    pub outcome: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    pub duration_ms: u64,
}

/// Intake description of one already-persisted file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileInput {
    pub filename: String,
    pub storage_ref: PathBuf,
}

/// Per-file state within a job
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FileRecord {
    pub filename: String,
    /// Location of the persisted upload
    pub storage_ref: PathBuf,
    pub status: FileStatus,
    pub result: Option<AnalysisResult>,
    #[serde(default)]
    pub attempts: Vec<StrategyAttempt>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration_ms: Option<u64>,
}

impl FileRecord {
    pub fn new(input: FileInput) -> Self {
        Self {
            filename: input.filename,
            storage_ref: input.storage_ref,
            status: FileStatus::Pending,
            result: None,
            attempts: Vec::new(),
            started_at: None,
            completed_at: None,
            duration_ms: None,
        }
    }

    /// pending -> processing
    pub fn start(&mut self) -> Result<()> {
        if self.status != FileStatus::Pending {
            return Err(Error::invalid_transition(
                &self.filename,
                self.status,
                FileStatus::Processing,
            ));
        }
        self.status = FileStatus::Processing;
        self.started_at = Some(Utc::now());
        Ok(())
    }

    /// processing -> completed | error, attaching the result.
    ///
    /// The terminal status follows the result: an `error` summary marks the
    /// file as failed, anything else as completed.
    pub fn finish(&mut self, result: AnalysisResult, attempts: Vec<StrategyAttempt>) -> Result<()> {
        let next = if result.is_error() {
            FileStatus::Error
        } else {
            FileStatus::Completed
        };
        if self.status != FileStatus::Processing {
            return Err(Error::invalid_transition(&self.filename, self.status, next));
        }

        let now = Utc::now();
        self.status = next;
        self.result = Some(result);
        self.attempts = attempts;
        self.completed_at = Some(now);
        self.duration_ms = self
            .started_at
            .map(|started| (now - started).num_milliseconds().max(0) as u64);
        Ok(())
    }
}

/// One submitted batch of documents sharing a conference type
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Job {
    pub id: Uuid,
    pub conference_type: ConferenceType,
    pub status: JobStatus,
    pub total_files: usize,
    pub processed_files: usize,
    pub files: Vec<FileRecord>,
    /// Set only when the job as a whole was aborted
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Job {
    pub fn new(conference_type: ConferenceType, files: Vec<FileInput>) -> Self {
        let now = Utc::now();
        let files: Vec<FileRecord> = files.into_iter().map(FileRecord::new).collect();
        Self {
            id: Uuid::new_v4(),
            conference_type,
            status: JobStatus::Pending,
            total_files: files.len(),
            processed_files: 0,
            files,
            error: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// pending -> processing
    pub fn start(&mut self) -> Result<()> {
        if self.status != JobStatus::Pending {
            return Err(Error::invalid_transition(
                self.id.to_string(),
                self.status,
                JobStatus::Processing,
            ));
        }
        self.status = JobStatus::Processing;
        self.touch();
        Ok(())
    }

    /// Move file `index` to processing
    pub fn start_file(&mut self, index: usize) -> Result<()> {
        self.file_mut(index)?.start()?;
        self.touch();
        Ok(())
    }

    /// Attach a result to file `index` and count it as processed
    pub fn finish_file(
        &mut self,
        index: usize,
        result: AnalysisResult,
        attempts: Vec<StrategyAttempt>,
    ) -> Result<()> {
        self.file_mut(index)?.finish(result, attempts)?;
        self.processed_files = (self.processed_files + 1).min(self.total_files);
        self.touch();
        Ok(())
    }

    /// processing -> completed once every file is terminal
    pub fn complete(&mut self) -> Result<()> {
        if self.status != JobStatus::Processing {
            return Err(Error::invalid_transition(
                self.id.to_string(),
                self.status,
                JobStatus::Completed,
            ));
        }
        if let Some(open) = self.files.iter().find(|f| !f.status.is_terminal()) {
            return Err(Error::invalid_transition(
                &open.filename,
                open.status,
                JobStatus::Completed,
            ));
        }
        self.status = JobStatus::Completed;
        self.touch();
        Ok(())
    }

    /// Abort the job: every unfinished file gets an error result, then the
    /// job moves to `error` with all files accounted for.
    pub fn abort(&mut self, reason: &str) -> Result<()> {
        if self.status.is_terminal() {
            return Err(Error::invalid_transition(
                self.id.to_string(),
                self.status,
                JobStatus::Error,
            ));
        }

        for index in 0..self.files.len() {
            let file = &mut self.files[index];
            if file.status.is_terminal() {
                continue;
            }
            if file.status == FileStatus::Pending {
                file.start()?;
            }
            file.finish(AnalysisResult::failure("processing", reason), Vec::new())?;
            self.processed_files = (self.processed_files + 1).min(self.total_files);
        }

        self.status = JobStatus::Error;
        self.error = Some(reason.to_string());
        self.touch();
        Ok(())
    }

    /// Fraction of files processed, as a percentage
    pub fn percent_complete(&self) -> f32 {
        if self.total_files == 0 {
            return 0.0;
        }
        self.processed_files as f32 / self.total_files as f32 * 100.0
    }

    fn file_mut(&mut self, index: usize) -> Result<&mut FileRecord> {
        let id = self.id;
        self.files
            .get_mut(index)
            .ok_or_else(|| Error::internal(format!("Job {} has no file at index {}", id, index)))
    }

    fn touch(&mut self) {
        self.updated_at = Utc::now();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(name: &str) -> FileInput {
        FileInput {
            filename: name.to_string(),
            storage_ref: PathBuf::from(format!("/uploads/{}", name)),
        }
    }

    #[test]
    fn test_file_transitions_are_strict() {
        let mut file = FileRecord::new(input("a.pdf"));
        let ok = AnalysisResult::from_findings(
            crate::types::Verdict::Ok,
            "fine",
            Vec::new(),
            None,
            None,
        );

        assert!(file.finish(ok.clone(), Vec::new()).is_err());
        file.start().unwrap();
        assert!(file.start().is_err());
        file.finish(ok.clone(), Vec::new()).unwrap();
        assert_eq!(file.status, FileStatus::Completed);
        assert!(file.finish(ok, Vec::new()).is_err());
        assert!(file.duration_ms.is_some());
    }

    #[test]
    fn test_error_result_marks_file_error() {
        let mut file = FileRecord::new(input("a.pdf"));
        file.start().unwrap();
        file.finish(AnalysisResult::failure("parsing", "boom"), Vec::new())
            .unwrap();
        assert_eq!(file.status, FileStatus::Error);
    }

    #[test]
    fn test_complete_requires_terminal_files() {
        let mut job = Job::new(ConferenceType::Invoice, vec![input("a.pdf"), input("b.pdf")]);
        job.start().unwrap();
        job.start_file(0).unwrap();
        job.finish_file(0, AnalysisResult::failure("x", "y"), Vec::new())
            .unwrap();
        assert!(job.complete().is_err());
        assert_eq!(job.processed_files, 1);
        assert_eq!(job.percent_complete(), 50.0);
    }

    #[test]
    fn test_abort_accounts_for_every_file() {
        let mut job = Job::new(
            ConferenceType::PackingList,
            vec![input("a.pdf"), input("b.pdf"), input("c.pdf")],
        );
        job.start().unwrap();
        job.start_file(0).unwrap();
        job.abort("processing interrupted by shutdown").unwrap();

        assert_eq!(job.status, JobStatus::Error);
        assert_eq!(job.processed_files, job.total_files);
        assert!(job.files.iter().all(|f| f.status == FileStatus::Error));
        assert!(job.abort("again").is_err());
    }

    #[test]
    fn test_empty_job_percent_is_zero() {
        let job = Job::new(ConferenceType::Invoice, Vec::new());
        assert_eq!(job.percent_complete(), 0.0);
    }
}
