//! Configuration for the conference service

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};

/// Main service configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConferenceConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,
    /// AI document-understanding service
    #[serde(default)]
    pub ai: AiConfig,
    /// Strategy ladder budgets
    #[serde(default)]
    pub analyzer: AnalyzerConfig,
    /// Worker pool configuration
    #[serde(default)]
    pub processing: ProcessingConfig,
    /// Durable job store
    #[serde(default)]
    pub storage: StorageConfig,
}

impl ConferenceConfig {
    /// Load from an optional TOML file, then apply environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => {
                let raw = std::fs::read_to_string(path).map_err(|e| {
                    Error::Config(format!("Failed to read {}: {}", path.display(), e))
                })?;
                toml::from_str(&raw).map_err(|e| {
                    Error::Config(format!("Failed to parse {}: {}", path.display(), e))
                })?
            }
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    fn apply_env(&mut self, var: impl Fn(&str) -> Option<String>) -> Result<()> {
        if let Some(key) = var("GEMINI_API_KEY") {
            self.ai.api_key = Some(key);
        }
        if let Some(host) = var("CONFERENCE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = var("CONFERENCE_PORT") {
            self.server.port = port
                .parse()
                .map_err(|_| Error::Config(format!("Invalid CONFERENCE_PORT: {}", port)))?;
        }
        if let Some(path) = var("CONFERENCE_DB_PATH") {
            self.storage.database_path = PathBuf::from(path);
        }
        Ok(())
    }
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Host address
    pub host: String,
    /// Port number
    pub port: u16,
    /// Enable CORS
    pub enable_cors: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            enable_cors: true,
        }
    }
}

/// Gemini API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AiConfig {
    /// API key; usually supplied through GEMINI_API_KEY
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_base_url")]
    pub base_url: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
    /// Temperature for generation
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default = "default_max_output_tokens")]
    pub max_output_tokens: u32,
    /// Retries for 429/5xx responses
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
}

fn default_ai_base_url() -> String {
    "https://generativelanguage.googleapis.com/v1beta".to_string()
}
fn default_ai_model() -> String {
    "gemini-2.5-flash".to_string()
}
fn default_temperature() -> f32 { 0.1 }
fn default_max_output_tokens() -> u32 { 8192 }
fn default_max_retries() -> u32 { 2 }

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_ai_base_url(),
            model: default_ai_model(),
            temperature: default_temperature(),
            max_output_tokens: default_max_output_tokens(),
            max_retries: default_max_retries(),
        }
    }
}

/// Strategy ladder thresholds and deadlines
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyzerConfig {
    /// Files at or above this size skip the binary path (default: 8MB)
    #[serde(default = "default_binary_size_threshold")]
    pub binary_size_threshold: u64,
    #[serde(default = "default_binary_timeout")]
    pub binary_timeout_secs: u64,
    #[serde(default = "default_text_timeout")]
    pub text_timeout_secs: u64,
    /// Local text extraction budget
    #[serde(default = "default_extraction_timeout")]
    pub extraction_timeout_secs: u64,
    /// Extracted text is cut to this many chars before submission
    #[serde(default = "default_max_text_chars")]
    pub max_text_chars: usize,
    /// Responses shorter than this (after trim) count as empty
    #[serde(default = "default_min_response_chars")]
    pub min_response_chars: usize,
}

fn default_binary_size_threshold() -> u64 { 8 * 1024 * 1024 }   // 8MB
fn default_binary_timeout() -> u64 { 90 }
fn default_text_timeout() -> u64 { 60 }
fn default_extraction_timeout() -> u64 { 60 }
fn default_max_text_chars() -> usize { 30_000 }
fn default_min_response_chars() -> usize { 20 }

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            binary_size_threshold: default_binary_size_threshold(),
            binary_timeout_secs: default_binary_timeout(),
            text_timeout_secs: default_text_timeout(),
            extraction_timeout_secs: default_extraction_timeout(),
            max_text_chars: default_max_text_chars(),
            min_response_chars: default_min_response_chars(),
        }
    }
}

impl AnalyzerConfig {
    /// Resolved deadlines: (binary, text, extraction)
    pub fn timeouts(&self) -> (Duration, Duration, Duration) {
        (
            Duration::from_secs(self.binary_timeout_secs),
            Duration::from_secs(self.text_timeout_secs),
            Duration::from_secs(self.extraction_timeout_secs),
        )
    }
}

/// Processing configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessingConfig {
    /// Number of conference workers (default: CPU count, max 4)
    #[serde(default)]
    pub worker_count: Option<usize>,
    /// Pending jobs the intake channel holds before submit waits
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
}

fn default_queue_capacity() -> usize { 256 }

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            worker_count: None,
            queue_capacity: default_queue_capacity(),
        }
    }
}

impl ProcessingConfig {
    pub fn effective_worker_count(&self) -> usize {
        self.worker_count
            .unwrap_or_else(|| num_cpus::get().min(4))
            .max(1)
    }
}

/// Durable store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Mirror jobs into SQLite
    #[serde(default = "default_storage_enabled")]
    pub enabled: bool,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

fn default_storage_enabled() -> bool { true }

fn default_database_path() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("trade-conference")
        .join("jobs.db")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            enabled: default_storage_enabled(),
            database_path: default_database_path(),
        }
    }
}
