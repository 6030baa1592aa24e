//! Conversation message types and the LLM backend error taxonomy.
//!
//! `Message` is both the wire format sent to the completion backend and the
//! unit of persisted chat history, so its serde shape is part of the storage
//! contract: `{"role": "...", "content": "..."}` with lowercase roles.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Role of a message in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MessageRole::System => write!(f, "system"),
            MessageRole::User => write!(f, "user"),
            MessageRole::Assistant => write!(f, "assistant"),
        }
    }
}

impl FromStr for MessageRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "system" => Ok(MessageRole::System),
            "user" => Ok(MessageRole::User),
            "assistant" => Ok(MessageRole::Assistant),
            other => Err(format!("invalid message role: '{other}'")),
        }
    }
}

/// A single exchanged utterance. Immutable once created.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub role: MessageRole,
    pub content: String,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::System,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: MessageRole::Assistant,
            content: content.into(),
        }
    }
}

/// Errors from completion backend operations.
///
/// The transient/server category is the only one that triggers the pipeline's
/// single fallback hop; everything else fails the turn.
#[derive(Debug, thiserror::Error)]
pub enum LlmError {
    /// Server-side failure (5xx, or an API error body of type "server_error").
    #[error("backend server error: {0}")]
    Server(String),

    /// The backend is temporarily unable to take traffic.
    #[error("backend overloaded: {0}")]
    Overloaded(String),

    #[error("rate limited (retry after {retry_after_ms:?}ms)")]
    RateLimited { retry_after_ms: Option<u64> },

    #[error("authentication failed")]
    AuthenticationFailed,

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// The backend answered with zero candidate outputs.
    #[error("backend returned no candidates")]
    EmptyCompletion,

    /// The caller's deadline or cancellation signal fired mid-request.
    #[error("request cancelled")]
    Cancelled,
}

impl LlmError {
    /// Whether this error warrants the bounded chat-to-legacy fallback.
    ///
    /// Only server-side transient failures qualify. Rate limiting, auth and
    /// validation problems would hit the fallback backend just the same, and
    /// cancellation must never cause another request.
    pub fn is_transient(&self) -> bool {
        matches!(self, LlmError::Server(_) | LlmError::Overloaded(_))
    }
}
