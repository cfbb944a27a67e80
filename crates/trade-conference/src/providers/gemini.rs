//! Gemini client for document analysis
//!
//! Speaks the public `generateContent` endpoint. Binary documents travel as
//! base64 inline data next to the prompt; extracted text is appended to the
//! prompt itself.

use async_trait::async_trait;
use base64::Engine;
use std::time::Duration;

use crate::config::AiConfig;
use crate::error::{Error, Result};
use crate::providers::ai::{AiResponse, DocumentAiClient, DocumentPayload, StopReason};

const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

/// Gemini client
pub struct GeminiClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    temperature: f32,
    max_output_tokens: u32,
    max_retries: u32,
}

impl GeminiClient {
    /// Create a new Gemini client; fails without an API key
    pub fn new(config: &AiConfig) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| Error::Config("Gemini API key is not configured".to_string()))?;

        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            temperature: config.temperature,
            max_output_tokens: config.max_output_tokens,
            max_retries: config.max_retries,
        })
    }

    /// Get the API endpoint URL
    fn endpoint(&self) -> String {
        format!("{}/models/{}:generateContent", self.base_url, self.model)
    }

    fn build_request(&self, payload: DocumentPayload, prompt: &str) -> GenerateRequest {
        let parts = match payload {
            DocumentPayload::Binary { bytes, mime_type } => vec![
                Part::InlineData {
                    inline_data: InlineData {
                        mime_type,
                        data: base64::engine::general_purpose::STANDARD.encode(bytes),
                    },
                },
                Part::Text {
                    text: prompt.to_string(),
                },
            ],
            DocumentPayload::Text(text) => vec![Part::Text {
                text: format!("{}\n\n## Document Text\n\n{}", prompt, text),
            }],
        };

        GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts,
            }],
            generation_config: GenerationConfig {
                temperature: self.temperature,
                max_output_tokens: self.max_output_tokens,
                response_mime_type: "application/json".to_string(),
            },
        }
    }
}

#[derive(serde::Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(serde::Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(serde::Serialize)]
#[serde(untagged)]
enum Part {
    Text {
        text: String,
    },
    InlineData {
        #[serde(rename = "inlineData")]
        inline_data: InlineData,
    },
}

#[derive(serde::Serialize)]
struct InlineData {
    #[serde(rename = "mimeType")]
    mime_type: String,
    data: String,
}

#[derive(serde::Serialize)]
struct GenerationConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
    #[serde(rename = "responseMimeType")]
    response_mime_type: String,
}

#[derive(serde::Deserialize, Default)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(rename = "promptFeedback", default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(serde::Deserialize)]
struct PromptFeedback {
    #[serde(rename = "blockReason", default)]
    block_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<ResponseContent>,
    #[serde(rename = "finishReason", default)]
    finish_reason: Option<String>,
}

#[derive(serde::Deserialize)]
struct ResponseContent {
    #[serde(default)]
    parts: Vec<ResponsePart>,
}

#[derive(serde::Deserialize)]
struct ResponsePart {
    #[serde(default)]
    text: Option<String>,
}

fn map_finish_reason(reason: Option<&str>) -> StopReason {
    match reason {
        None | Some("STOP") => StopReason::Complete,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            StopReason::Safety
        }
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some(other) => StopReason::Other(other.to_lowercase()),
    }
}

/// Collapse a Gemini response into text plus a stop reason
fn interpret(response: GenerateResponse) -> AiResponse {
    if let Some(reason) = response.prompt_feedback.and_then(|f| f.block_reason) {
        tracing::debug!("Gemini blocked prompt: {}", reason);
        return AiResponse {
            text: String::new(),
            stop_reason: StopReason::Safety,
        };
    }

    match response.candidates.into_iter().next() {
        Some(candidate) => {
            let text = candidate
                .content
                .map(|c| {
                    c.parts
                        .into_iter()
                        .filter_map(|p| p.text)
                        .collect::<Vec<_>>()
                        .join("")
                })
                .unwrap_or_default();
            AiResponse {
                text,
                stop_reason: map_finish_reason(candidate.finish_reason.as_deref()),
            }
        }
        None => AiResponse {
            text: String::new(),
            stop_reason: StopReason::Other("no_candidates".to_string()),
        },
    }
}

fn is_retryable(status: reqwest::StatusCode) -> bool {
    status == reqwest::StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

#[async_trait]
impl DocumentAiClient for GeminiClient {
    async fn analyze(&self, payload: DocumentPayload, prompt: &str) -> Result<AiResponse> {
        let request = self.build_request(payload, prompt);
        let mut attempt = 0u32;

        loop {
            let response = self
                .client
                .post(self.endpoint())
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
                .map_err(|e| Error::ai(format!("Gemini request failed: {}", e)))?;

            let status = response.status();
            if status.is_success() {
                let body: GenerateResponse = response
                    .json()
                    .await
                    .map_err(|e| Error::ai(format!("Failed to parse Gemini response: {}", e)))?;
                return Ok(interpret(body));
            }

            let body = response.text().await.unwrap_or_default();
            if is_retryable(status) && attempt < self.max_retries {
                let delay = RETRY_BASE_DELAY * 2u32.pow(attempt);
                tracing::warn!(
                    "Gemini returned {} (attempt {}), retrying in {:?}",
                    status,
                    attempt + 1,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            return Err(Error::ai(format!(
                "Gemini generation failed ({}): {}",
                status, body
            )));
        }
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(base_url: &str) -> AiConfig {
        AiConfig {
            api_key: Some("test-key".to_string()),
            base_url: base_url.to_string(),
            max_retries: 1,
            ..AiConfig::default()
        }
    }

    fn parse(body: &str) -> AiResponse {
        interpret(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn test_requires_api_key() {
        let mut cfg = config("http://localhost");
        cfg.api_key = None;
        assert!(matches!(GeminiClient::new(&cfg), Err(Error::Config(_))));
    }

    #[test]
    fn test_finish_reason_mapping() {
        let ok = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{\"a\":"},{"text":"1}"}]},"finishReason":"STOP"}]}"#,
        );
        assert_eq!(ok.stop_reason, StopReason::Complete);
        assert_eq!(ok.text, "{\"a\":1}");

        let safety = parse(r#"{"candidates":[{"finishReason":"SAFETY"}]}"#);
        assert_eq!(safety.stop_reason, StopReason::Safety);
        assert!(safety.text.is_empty());

        let truncated = parse(
            r#"{"candidates":[{"content":{"parts":[{"text":"{"}]},"finishReason":"MAX_TOKENS"}]}"#,
        );
        assert_eq!(truncated.stop_reason, StopReason::MaxTokens);

        assert_eq!(
            map_finish_reason(Some("MALFORMED_FUNCTION_CALL")),
            StopReason::Other("malformed_function_call".to_string())
        );
    }

    #[test]
    fn test_prompt_block_is_safety() {
        let blocked = parse(r#"{"promptFeedback":{"blockReason":"PROHIBITED_CONTENT"}}"#);
        assert_eq!(blocked.stop_reason, StopReason::Safety);
    }

    #[test]
    fn test_binary_request_shape() {
        let client = GeminiClient::new(&config("http://localhost/")).unwrap();
        let request = client.build_request(
            DocumentPayload::Binary {
                bytes: b"%PDF".to_vec(),
                mime_type: "application/pdf".to_string(),
            },
            "Analyze",
        );
        let json = serde_json::to_value(&request).unwrap();
        let parts = &json["contents"][0]["parts"];
        assert_eq!(parts[0]["inlineData"]["mimeType"], "application/pdf");
        assert_eq!(parts[0]["inlineData"]["data"], "JVBERg==");
        assert_eq!(parts[1]["text"], "Analyze");
        assert_eq!(json["generationConfig"]["responseMimeType"], "application/json");
        assert_eq!(
            client.endpoint(),
            "http://localhost/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_successful_call() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .match_header("x-goog-api-key", "test-key")
            .with_status(200)
            .with_body(r#"{"candidates":[{"content":{"parts":[{"text":"hello"}]},"finishReason":"STOP"}]}"#)
            .create_async()
            .await;

        let client = GeminiClient::new(&config(&server.url())).unwrap();
        let response = client
            .analyze(DocumentPayload::Text("body".to_string()), "prompt")
            .await
            .unwrap();

        assert_eq!(response.text, "hello");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_server_errors_are_retried_then_reported() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(503)
            .with_body("unavailable")
            .expect(2)
            .create_async()
            .await;

        let client = GeminiClient::new(&config(&server.url())).unwrap();
        let result = client
            .analyze(DocumentPayload::Text("body".to_string()), "prompt")
            .await;

        assert!(matches!(result, Err(Error::Ai(_))));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/models/gemini-2.5-flash:generateContent")
            .with_status(400)
            .expect(1)
            .create_async()
            .await;

        let client = GeminiClient::new(&config(&server.url())).unwrap();
        let result = client
            .analyze(DocumentPayload::Text("body".to_string()), "prompt")
            .await;

        assert!(result.is_err());
        mock.assert_async().await;
    }
}
