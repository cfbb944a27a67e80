//! Document Analyzer: the binary-then-text strategy ladder
//!
//! Every file gets at most one binary attempt and at most one text
//! attempt. The analyzer always produces an [`AnalysisResult`]; AI, I/O
//! and extraction errors are folded into the result instead of returned.

use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::time::timeout;

use super::parser::{self, ParseOutcome};
use super::prompt::build_prompt;
use crate::config::AnalyzerConfig;
use crate::ingestion::{truncate_chars, TextExtractor};
use crate::providers::{AiResponse, DocumentAiClient, DocumentPayload, StopReason};
use crate::types::{AnalysisResult, ConferenceType, Strategy, StrategyAttempt};

/// Resolved analyzer thresholds
#[derive(Debug, Clone)]
pub struct AnalyzerSettings {
    pub binary_size_threshold: u64,
    pub binary_timeout: Duration,
    pub text_timeout: Duration,
    pub extraction_timeout: Duration,
    pub max_text_chars: usize,
    pub min_response_chars: usize,
}

impl From<&AnalyzerConfig> for AnalyzerSettings {
    fn from(config: &AnalyzerConfig) -> Self {
        let (binary_timeout, text_timeout, extraction_timeout) = config.timeouts();
        Self {
            binary_size_threshold: config.binary_size_threshold,
            binary_timeout,
            text_timeout,
            extraction_timeout,
            max_text_chars: config.max_text_chars,
            min_response_chars: config.min_response_chars,
        }
    }
}

/// Result of analyzing one file, with the ladder steps that ran
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub result: AnalysisResult,
    pub attempts: Vec<StrategyAttempt>,
}

/// Why a strategy was abandoned
#[derive(Debug, Clone, PartialEq)]
enum Escalation {
    Timeout(Duration),
    ClientError(String),
    Safety,
    MaxTokens,
    ShortResponse(usize),
    Unparseable(String),
    Unreadable(String),
    ExtractionFailed(String),
}

impl Escalation {
    fn label(&self) -> &'static str {
        match self {
            Escalation::Timeout(_) => "timeout",
            Escalation::ClientError(_) => "client_error",
            Escalation::Safety => "safety",
            Escalation::MaxTokens => "max_tokens",
            Escalation::ShortResponse(_) => "short_response",
            Escalation::Unparseable(_) => "unparseable",
            Escalation::Unreadable(_) => "unreadable",
            Escalation::ExtractionFailed(_) => "extraction_failed",
        }
    }

    fn detail(&self) -> Option<String> {
        match self {
            Escalation::Timeout(limit) => Some(format!("no response within {:?}", limit)),
            Escalation::ClientError(msg)
            | Escalation::Unparseable(msg)
            | Escalation::Unreadable(msg)
            | Escalation::ExtractionFailed(msg) => Some(msg.clone()),
            Escalation::ShortResponse(len) => Some(format!("{} chars", len)),
            Escalation::Safety | Escalation::MaxTokens => None,
        }
    }

    /// Terminal result when this escalation ends the ladder
    fn into_result(self) -> AnalysisResult {
        match self {
            Escalation::Safety => AnalysisResult::filtered(
                "The AI service refused to analyze this document on safety grounds",
            ),
            Escalation::Timeout(limit) => AnalysisResult::failure(
                "ai_timeout",
                format!("AI service did not respond within {:?}", limit),
            ),
            Escalation::ClientError(msg) => {
                AnalysisResult::failure("ai_service", format!("AI service error: {}", msg))
            }
            Escalation::MaxTokens => AnalysisResult::failure(
                "ai_response",
                "AI response was truncated at the output token limit",
            ),
            Escalation::ShortResponse(len) => AnalysisResult::failure(
                "ai_response",
                format!("AI response was empty or too short ({} chars)", len),
            ),
            Escalation::Unparseable(reason) => ParseOutcome::Failure(reason).into_result(),
            Escalation::Unreadable(msg) | Escalation::ExtractionFailed(msg) => {
                AnalysisResult::failure("extraction", msg)
            }
        }
    }
}

/// Runs the strategy ladder against an AI client
pub struct DocumentAnalyzer {
    client: Arc<dyn DocumentAiClient>,
    settings: AnalyzerSettings,
}

impl DocumentAnalyzer {
    pub fn new(client: Arc<dyn DocumentAiClient>, settings: AnalyzerSettings) -> Self {
        Self { client, settings }
    }

    /// Analyze one persisted file
    pub async fn analyze(
        &self,
        filename: &str,
        path: &Path,
        conference_type: ConferenceType,
    ) -> AnalysisOutcome {
        let prompt = build_prompt(conference_type);
        let mut attempts = Vec::with_capacity(2);

        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.len() < self.settings.binary_size_threshold => {
                let started = Instant::now();
                match self.binary_path(filename, path, &prompt).await {
                    Ok(result) => {
                        attempts.push(attempt(Strategy::Binary, "accepted", None, started));
                        return AnalysisOutcome { result, attempts };
                    }
                    Err(escalation) => {
                        tracing::warn!(
                            "Binary analysis of {} escalated to text fallback: {}",
                            filename,
                            escalation.label()
                        );
                        attempts.push(attempt(
                            Strategy::Binary,
                            escalation.label(),
                            escalation.detail(),
                            started,
                        ));
                    }
                }
            }
            Ok(meta) => {
                tracing::info!(
                    "{} is {} bytes (limit {}), using text fallback only",
                    filename,
                    meta.len(),
                    self.settings.binary_size_threshold
                );
            }
            Err(e) => {
                tracing::warn!("Cannot stat {}: {}", path.display(), e);
            }
        }

        let started = Instant::now();
        let (result, outcome, detail) = match self.text_path(filename, path, &prompt).await {
            Ok(ParseOutcome::Success(result)) => (result, "accepted", None),
            Ok(ParseOutcome::Failure(reason)) => (
                ParseOutcome::Failure(reason.clone()).into_result(),
                "unparseable",
                Some(reason),
            ),
            Err(escalation) => {
                tracing::warn!(
                    "Text fallback for {} failed: {}",
                    filename,
                    escalation.label()
                );
                let label = escalation.label();
                let detail = escalation.detail();
                (escalation.into_result(), label, detail)
            }
        };
        attempts.push(attempt(Strategy::TextFallback, outcome, detail, started));

        AnalysisOutcome { result, attempts }
    }

    async fn binary_path(
        &self,
        filename: &str,
        path: &Path,
        prompt: &str,
    ) -> Result<AnalysisResult, Escalation> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| Escalation::Unreadable(e.to_string()))?;
        let mime_type = mime_guess::from_path(filename)
            .first_or_octet_stream()
            .essence_str()
            .to_string();

        let response = self
            .call(
                DocumentPayload::Binary { bytes, mime_type },
                prompt,
                self.settings.binary_timeout,
            )
            .await?;

        match parser::parse(&response.text) {
            ParseOutcome::Success(result) => Ok(result),
            ParseOutcome::Failure(reason) => Err(Escalation::Unparseable(reason)),
        }
    }

    async fn text_path(
        &self,
        filename: &str,
        path: &Path,
        prompt: &str,
    ) -> Result<ParseOutcome, Escalation> {
        let data = tokio::fs::read(path).await.map_err(|e| {
            Escalation::Unreadable(format!("Cannot read stored file {}: {}", filename, e))
        })?;

        let name = filename.to_string();
        let extraction = tokio::task::spawn_blocking(move || TextExtractor::extract(&name, &data));
        let text = match timeout(self.settings.extraction_timeout, extraction).await {
            Ok(Ok(Ok(text))) => text,
            Ok(Ok(Err(e))) => return Err(Escalation::ExtractionFailed(e.to_string())),
            Ok(Err(join_error)) => {
                return Err(Escalation::ExtractionFailed(format!(
                    "Text extraction crashed: {}",
                    join_error
                )))
            }
            Err(_) => {
                return Err(Escalation::ExtractionFailed(format!(
                    "Text extraction timed out after {:?}",
                    self.settings.extraction_timeout
                )))
            }
        };

        let (text, truncated) = truncate_chars(&text, self.settings.max_text_chars);
        if truncated {
            tracing::debug!(
                "Truncated extracted text of {} to {} chars",
                filename,
                self.settings.max_text_chars
            );
        }

        let response = self
            .call(
                DocumentPayload::Text(text.to_string()),
                prompt,
                self.settings.text_timeout,
            )
            .await?;

        Ok(parser::parse(&response.text))
    }

    /// One bounded AI call; applies the stop-reason and length triggers
    async fn call(
        &self,
        payload: DocumentPayload,
        prompt: &str,
        limit: Duration,
    ) -> Result<AiResponse, Escalation> {
        let kind = payload.kind();
        let response = match timeout(limit, self.client.analyze(payload, prompt)).await {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => return Err(Escalation::ClientError(e.to_string())),
            Err(_) => {
                tracing::warn!("{} {} call exceeded {:?}", self.client.name(), kind, limit);
                return Err(Escalation::Timeout(limit));
            }
        };

        match response.stop_reason {
            StopReason::Safety => return Err(Escalation::Safety),
            StopReason::MaxTokens => return Err(Escalation::MaxTokens),
            StopReason::Complete | StopReason::Other(_) => {}
        }

        let len = response.text.trim().chars().count();
        if len < self.settings.min_response_chars {
            return Err(Escalation::ShortResponse(len));
        }
        Ok(response)
    }
}

fn attempt(
    strategy: Strategy,
    outcome: &str,
    detail: Option<String>,
    started: Instant,
) -> StrategyAttempt {
    StrategyAttempt {
        strategy,
        outcome: outcome.to_string(),
        detail,
        duration_ms: started.elapsed().as_millis() as u64,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::providers::ai::MockDocumentAiClient;
    use crate::types::{FindingKind, Verdict};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const OK_JSON: &str = r#"{"summary": {"status": "ok", "conclusion": "All fields present"}, "items": []}"#;

    enum Script {
        Reply(&'static str, StopReason),
        Fail,
        Hang,
    }

    /// Client with one fixed behavior per payload kind
    struct ScriptedClient {
        binary: Script,
        text: Script,
        binary_calls: AtomicUsize,
        text_calls: AtomicUsize,
    }

    impl ScriptedClient {
        fn new(binary: Script, text: Script) -> Arc<Self> {
            Arc::new(Self {
                binary,
                text,
                binary_calls: AtomicUsize::new(0),
                text_calls: AtomicUsize::new(0),
            })
        }

        fn calls(&self) -> (usize, usize) {
            (
                self.binary_calls.load(Ordering::SeqCst),
                self.text_calls.load(Ordering::SeqCst),
            )
        }
    }

    #[async_trait]
    impl DocumentAiClient for ScriptedClient {
        async fn analyze(&self, payload: DocumentPayload, _prompt: &str) -> crate::error::Result<AiResponse> {
            let script = match payload {
                DocumentPayload::Binary { .. } => {
                    self.binary_calls.fetch_add(1, Ordering::SeqCst);
                    &self.binary
                }
                DocumentPayload::Text(_) => {
                    self.text_calls.fetch_add(1, Ordering::SeqCst);
                    &self.text
                }
            };
            match script {
                Script::Reply(text, stop_reason) => Ok(AiResponse {
                    text: text.to_string(),
                    stop_reason: stop_reason.clone(),
                }),
                Script::Fail => Err(Error::ai("connection reset")),
                Script::Hang => {
                    tokio::time::sleep(Duration::from_secs(30)).await;
                    Err(Error::ai("unreachable"))
                }
            }
        }

        fn name(&self) -> &str {
            "scripted"
        }
    }

    fn settings() -> AnalyzerSettings {
        AnalyzerSettings {
            binary_size_threshold: 1024 * 1024,
            binary_timeout: Duration::from_millis(50),
            text_timeout: Duration::from_millis(500),
            extraction_timeout: Duration::from_secs(5),
            max_text_chars: 30_000,
            min_response_chars: 20,
        }
    }

    fn invoice_file() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("invoice.txt"),
            "Commercial Invoice 001\nIncoterm: FOB\nTotal: USD 1,200.00\n",
        )
        .unwrap();
        dir
    }

    async fn run(client: Arc<dyn DocumentAiClient>, settings: AnalyzerSettings) -> AnalysisOutcome {
        let dir = invoice_file();
        let analyzer = DocumentAnalyzer::new(client, settings);
        analyzer
            .analyze("invoice.txt", &dir.path().join("invoice.txt"), ConferenceType::Invoice)
            .await
    }

    #[tokio::test]
    async fn test_binary_success_skips_fallback() {
        let client = ScriptedClient::new(
            Script::Reply(OK_JSON, StopReason::Complete),
            Script::Fail,
        );
        let outcome = run(client.clone(), settings()).await;

        assert_eq!(outcome.result.summary.status, Verdict::Ok);
        assert_eq!(client.calls(), (1, 0));
        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].outcome, "accepted");
    }

    #[tokio::test]
    async fn test_binary_timeout_escalates_once() {
        let client = ScriptedClient::new(Script::Hang, Script::Reply(OK_JSON, StopReason::Complete));
        let started = Instant::now();
        let outcome = run(client.clone(), settings()).await;

        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(client.calls(), (1, 1));
        assert_eq!(outcome.result.summary.status, Verdict::Ok);
        assert_eq!(outcome.attempts[0].strategy, Strategy::Binary);
        assert_eq!(outcome.attempts[0].outcome, "timeout");
        assert_eq!(outcome.attempts[1].strategy, Strategy::TextFallback);
        assert_eq!(outcome.attempts[1].outcome, "accepted");
    }

    #[tokio::test]
    async fn test_safety_on_both_paths_is_filtered_alert() {
        let client = ScriptedClient::new(
            Script::Reply("", StopReason::Safety),
            Script::Reply("", StopReason::Safety),
        );
        let outcome = run(client.clone(), settings()).await;

        assert_eq!(client.calls(), (1, 1));
        assert_eq!(outcome.result.summary.status, Verdict::Alert);
        assert_eq!(outcome.result.items[0].field, "content_filter");
        assert_eq!(outcome.result.items[0].kind, FindingKind::Alert);
    }

    #[tokio::test]
    async fn test_both_paths_failing_is_error() {
        let client = ScriptedClient::new(Script::Fail, Script::Reply("{", StopReason::MaxTokens));
        let outcome = run(client, settings()).await;

        assert!(outcome.result.is_error());
        assert_eq!(outcome.result.summary.critical_error_count, 1);
        assert_eq!(outcome.attempts[0].outcome, "client_error");
        assert_eq!(outcome.attempts[1].outcome, "max_tokens");
    }

    #[tokio::test]
    async fn test_short_and_unparseable_responses_escalate() {
        let client = ScriptedClient::new(
            Script::Reply("ok", StopReason::Complete),
            Script::Reply("I could not find any structured data here.", StopReason::Complete),
        );
        let outcome = run(client.clone(), settings()).await;

        assert_eq!(client.calls(), (1, 1));
        assert_eq!(outcome.attempts[0].outcome, "short_response");
        assert_eq!(outcome.attempts[1].outcome, "unparseable");
        assert!(outcome.result.is_error());
        assert_eq!(outcome.result.items[0].field, "parsing");
    }

    #[tokio::test]
    async fn test_malformed_binary_json_escalates() {
        let client = ScriptedClient::new(
            Script::Reply("{\"summary\": {\"status\": \"ok\"", StopReason::Complete),
            Script::Reply(OK_JSON, StopReason::Complete),
        );
        let outcome = run(client.clone(), settings()).await;

        assert_eq!(client.calls(), (1, 1));
        assert_eq!(outcome.attempts[0].outcome, "unparseable");
        assert!(!outcome.result.is_error());
    }

    #[tokio::test]
    async fn test_oversized_file_uses_text_only() {
        let mut mock = MockDocumentAiClient::new();
        mock.expect_analyze()
            .withf(|payload, _| matches!(payload, DocumentPayload::Text(text) if text.contains("Incoterm: FOB")))
            .times(1)
            .returning(|_, _| {
                Ok(AiResponse {
                    text: OK_JSON.to_string(),
                    stop_reason: StopReason::Complete,
                })
            });

        let mut settings = settings();
        settings.binary_size_threshold = 8;
        let outcome = run(Arc::new(mock), settings).await;

        assert_eq!(outcome.attempts.len(), 1);
        assert_eq!(outcome.attempts[0].strategy, Strategy::TextFallback);
        assert!(!outcome.result.is_error());
    }

    #[tokio::test]
    async fn test_missing_file_is_extraction_error() {
        let mut mock = MockDocumentAiClient::new();
        mock.expect_analyze().times(0);

        let analyzer = DocumentAnalyzer::new(Arc::new(mock), settings());
        let outcome = analyzer
            .analyze("gone.pdf", Path::new("/nonexistent/gone.pdf"), ConferenceType::Invoice)
            .await;

        assert!(outcome.result.is_error());
        assert_eq!(outcome.result.items[0].field, "extraction");
        assert_eq!(outcome.attempts[0].outcome, "unreadable");
    }

    #[tokio::test]
    async fn test_text_is_truncated_before_submission() {
        let mut mock = MockDocumentAiClient::new();
        mock.expect_analyze()
            .withf(|payload, _| matches!(payload, DocumentPayload::Text(text) if text.chars().count() == 10))
            .times(1)
            .returning(|_, _| {
                Ok(AiResponse {
                    text: OK_JSON.to_string(),
                    stop_reason: StopReason::Complete,
                })
            });

        let mut settings = settings();
        settings.binary_size_threshold = 0;
        settings.max_text_chars = 10;
        let outcome = run(Arc::new(mock), settings).await;

        assert!(!outcome.result.is_error());
    }
}
