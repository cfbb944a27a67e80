//! AI document-understanding client trait

use async_trait::async_trait;

use crate::error::Result;

/// What gets submitted to the AI service
#[derive(Debug, Clone)]
pub enum DocumentPayload {
    /// Raw document bytes with their MIME type
    Binary { bytes: Vec<u8>, mime_type: String },
    /// Locally extracted plain text
    Text(String),
}

impl DocumentPayload {
    pub fn kind(&self) -> &'static str {
        match self {
            DocumentPayload::Binary { .. } => "binary",
            DocumentPayload::Text(_) => "text",
        }
    }
}

/// Why the service stopped generating
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopReason {
    Complete,
    /// Blocked by the service's content filter
    Safety,
    /// Output truncated at the token limit
    MaxTokens,
    Other(String),
}

impl StopReason {
    pub fn as_str(&self) -> &str {
        match self {
            StopReason::Complete => "complete",
            StopReason::Safety => "safety",
            StopReason::MaxTokens => "max_tokens",
            StopReason::Other(reason) => reason,
        }
    }
}

/// Raw AI response
#[derive(Debug, Clone)]
pub struct AiResponse {
    pub text: String,
    pub stop_reason: StopReason,
}

/// Trait for the external document-understanding service
///
/// Implementations:
/// - `GeminiClient`: Google Gemini `generateContent`
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentAiClient: Send + Sync {
    /// Submit a document (bytes or text) together with the analysis prompt
    async fn analyze(&self, payload: DocumentPayload, prompt: &str) -> Result<AiResponse>;

    /// Get provider name for logging
    fn name(&self) -> &str;
}
