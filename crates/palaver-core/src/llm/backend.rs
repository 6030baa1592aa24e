//! CompletionBackend trait definition.
//!
//! The remote completion service is consumed through this one capability:
//! a chat-style request carrying full history, and a legacy completion-style
//! request carrying a bare prompt. The pipeline holds two instances (primary
//! and fallback) and selects between them by its fallback rule alone.

use palaver_types::llm::{LlmError, Message};

/// Trait for remote completion backends.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in palaver-infra (e.g., `OpenAiBackend`).
///
/// Both operations return the candidate outputs of one completion; backends
/// may return more than one candidate per request.
pub trait CompletionBackend: Send + Sync {
    /// Human-readable backend name for logging (e.g., "openai-chat").
    fn name(&self) -> &str;

    /// Chat-style completion over the full conversation history.
    fn chat_complete(
        &self,
        history: &[Message],
    ) -> impl std::future::Future<Output = Result<Vec<String>, LlmError>> + Send;

    /// Legacy completion over a single prompt, without history.
    fn legacy_complete(
        &self,
        prompt: &str,
    ) -> impl std::future::Future<Output = Result<Vec<String>, LlmError>> + Send;
}
