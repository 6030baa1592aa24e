//! OpenAI API wire types.
//!
//! These are the HTTP request/response structures for the two endpoints the
//! backend talks to: `/chat/completions` (chat-style) and `/completions`
//! (legacy completion-style). They are NOT the domain conversation types
//! from palaver-types -- those are backend-agnostic.

use serde::{Deserialize, Serialize};

/// Request body for `POST /chat/completions`.
#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
}

/// A single message in a chat-style request.
#[derive(Debug, Clone, Serialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

/// Response body from `POST /chat/completions`.
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    pub choices: Vec<ChatChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoice {
    pub message: ChatChoiceMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatChoiceMessage {
    pub content: String,
}

/// Request body for `POST /completions` (legacy).
#[derive(Debug, Clone, Serialize)]
pub struct LegacyCompletionRequest {
    pub model: String,
    pub prompt: String,
    pub max_tokens: u32,
}

/// Response body from `POST /completions`.
#[derive(Debug, Clone, Deserialize)]
pub struct LegacyCompletionResponse {
    pub choices: Vec<LegacyChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LegacyChoice {
    pub text: String,
}

/// Error envelope returned by the API on failure statuses.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiErrorEnvelope {
    pub error: ApiError,
}

/// An error from the OpenAI API.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiError {
    #[serde(rename = "type")]
    #[serde(default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}
