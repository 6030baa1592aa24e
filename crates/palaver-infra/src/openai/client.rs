//! OpenAiBackend -- concrete [`CompletionBackend`] for OpenAI-compatible APIs.
//!
//! Sends chat-style requests to `/chat/completions` and legacy
//! completion-style requests to `/completions` with bearer authentication.
//! One instance serves as the pipeline's primary and another as its
//! fallback; which endpoint gets hit is the pipeline's decision.
//!
//! The API key is wrapped in [`secrecy::SecretString`] and is never logged
//! or included in `Debug` output.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};

use palaver_core::llm::CompletionBackend;
use palaver_types::config::OpenAiConfig;
use palaver_types::llm::{LlmError, Message};

use super::types::{
    ApiErrorEnvelope, ChatCompletionRequest, ChatCompletionResponse, ChatMessage,
    LegacyCompletionRequest, LegacyCompletionResponse,
};

/// Maximum tokens requested from the legacy completion endpoint, which
/// unlike the chat endpoint has no usable default.
const LEGACY_MAX_TOKENS: u32 = 1024;

/// OpenAI-compatible completion backend.
///
/// The API key is stored as a [`SecretString`] and is only exposed when
/// constructing HTTP request headers.
#[derive(Clone)]
pub struct OpenAiBackend {
    client: reqwest::Client,
    api_key: SecretString,
    org_id: Option<String>,
    base_url: String,
    chat_model: String,
    legacy_model: String,
}

impl OpenAiBackend {
    pub fn new(config: &OpenAiConfig) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .expect("failed to create reqwest client");

        Self {
            client,
            api_key: SecretString::from(config.api_key.clone()),
            org_id: config.org_id.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            chat_model: config.chat_model.clone(),
            legacy_model: config.legacy_model.clone(),
        }
    }

    /// Build the full API URL for a given path.
    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn chat_request(&self, history: &[Message]) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.chat_model.clone(),
            messages: history
                .iter()
                .map(|m| ChatMessage {
                    role: m.role.to_string(),
                    content: m.content.clone(),
                })
                .collect(),
        }
    }

    fn legacy_request(&self, prompt: &str) -> LegacyCompletionRequest {
        LegacyCompletionRequest {
            model: self.legacy_model.clone(),
            prompt: prompt.to_string(),
            max_tokens: LEGACY_MAX_TOKENS,
        }
    }

    fn request(&self, path: &str) -> reqwest::RequestBuilder {
        let mut builder = self
            .client
            .post(self.url(path))
            .bearer_auth(self.api_key.expose_secret())
            .header("content-type", "application/json");
        if let Some(org) = &self.org_id {
            builder = builder.header("OpenAI-Organization", org);
        }
        builder
    }

    /// Map a non-success HTTP response to the backend error taxonomy.
    async fn failure(response: reqwest::Response) -> LlmError {
        let status = response.status().as_u16();
        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();
        classify_failure(status, retry_after_ms, &body)
    }
}

/// Classify an HTTP failure status plus body into an [`LlmError`].
///
/// The transient category (`Server`, `Overloaded`) is what triggers the
/// pipeline's single fallback hop, so the mapping here decides which
/// outages get a second chance.
fn classify_failure(status: u16, retry_after_ms: Option<u64>, body: &str) -> LlmError {
    // An explicit "server_error" body marks a transient failure even when
    // the status alone would be ambiguous.
    let error_type = serde_json::from_str::<ApiErrorEnvelope>(body)
        .ok()
        .and_then(|envelope| envelope.error.error_type);
    if error_type.as_deref() == Some("server_error") {
        return LlmError::Server(body.to_string());
    }

    match status {
        401 | 403 => LlmError::AuthenticationFailed,
        429 => LlmError::RateLimited { retry_after_ms },
        400 => LlmError::InvalidRequest(body.to_string()),
        503 => LlmError::Overloaded(body.to_string()),
        _ => LlmError::Server(format!("HTTP {status}: {body}")),
    }
}

// OpenAiBackend intentionally does NOT derive Debug so the secret key
// cannot leak through formatting.

impl CompletionBackend for OpenAiBackend {
    fn name(&self) -> &str {
        "openai"
    }

    async fn chat_complete(&self, history: &[Message]) -> Result<Vec<String>, LlmError> {
        let body = self.chat_request(history);

        let response = self
            .request("/chat/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Server(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let parsed: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|choice| choice.message.content)
            .collect())
    }

    async fn legacy_complete(&self, prompt: &str) -> Result<Vec<String>, LlmError> {
        let body = self.legacy_request(prompt);

        let response = self
            .request("/completions")
            .json(&body)
            .send()
            .await
            .map_err(|e| LlmError::Server(format!("HTTP request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(Self::failure(response).await);
        }

        let parsed: LegacyCompletionResponse = response
            .json()
            .await
            .map_err(|e| LlmError::Deserialization(format!("failed to parse response: {e}")))?;

        Ok(parsed
            .choices
            .into_iter()
            .map(|choice| choice.text)
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn backend() -> OpenAiBackend {
        OpenAiBackend::new(&OpenAiConfig {
            api_key: "sk-test".to_string(),
            org_id: None,
            base_url: "https://api.openai.com/v1/".to_string(),
            chat_model: "gpt-4o-mini".to_string(),
            legacy_model: "gpt-3.5-turbo-instruct".to_string(),
            timeout_secs: 60,
        })
    }

    #[test]
    fn test_url_building_strips_trailing_slash() {
        let backend = backend();
        assert_eq!(
            backend.url("/chat/completions"),
            "https://api.openai.com/v1/chat/completions"
        );
    }

    #[test]
    fn test_chat_request_shape() {
        let backend = backend();
        let history = vec![Message::system("seed"), Message::user("hello")];
        let req = backend.chat_request(&history);

        assert_eq!(req.model, "gpt-4o-mini");
        assert_eq!(req.messages.len(), 2);
        assert_eq!(req.messages[0].role, "system");
        assert_eq!(req.messages[1].content, "hello");
    }

    #[test]
    fn test_legacy_request_uses_raw_prompt() {
        let backend = backend();
        let req = backend.legacy_request("hello");

        assert_eq!(req.model, "gpt-3.5-turbo-instruct");
        assert_eq!(req.prompt, "hello");
        assert_eq!(req.max_tokens, LEGACY_MAX_TOKENS);
    }

    #[test]
    fn test_classify_authentication() {
        assert!(matches!(
            classify_failure(401, None, ""),
            LlmError::AuthenticationFailed
        ));
        assert!(matches!(
            classify_failure(403, None, ""),
            LlmError::AuthenticationFailed
        ));
    }

    #[test]
    fn test_classify_rate_limited_with_retry_after() {
        let err = classify_failure(429, Some(2000), "");
        match err {
            LlmError::RateLimited { retry_after_ms } => {
                assert_eq!(retry_after_ms, Some(2000));
            }
            other => panic!("expected RateLimited, got {other:?}"),
        }
        assert!(!classify_failure(429, None, "").is_transient());
    }

    #[test]
    fn test_classify_invalid_request() {
        let err = classify_failure(400, None, r#"{"error":{"message":"bad model"}}"#);
        assert!(matches!(err, LlmError::InvalidRequest(_)));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_classify_server_errors_are_transient() {
        assert!(classify_failure(500, None, "").is_transient());
        assert!(classify_failure(502, None, "").is_transient());
        assert!(classify_failure(503, None, "").is_transient());
    }

    #[test]
    fn test_classify_server_error_body_overrides_status() {
        // Some gateways surface backend trouble under a non-5xx status.
        let body = r#"{"error":{"type":"server_error","message":"The server had an error"}}"#;
        let err = classify_failure(400, None, body);
        assert!(matches!(err, LlmError::Server(_)));
        assert!(err.is_transient());
    }
}
