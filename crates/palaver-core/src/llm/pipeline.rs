//! The completion request/fallback pipeline.
//!
//! One turn moves through `Idle -> AwaitingPrimary -> {Success |
//! AwaitingFallback} -> {Success | Failed}`: a chat-style request with the
//! full history goes to the primary backend, and a transient server-side
//! failure buys exactly one legacy completion-style retry of the same turn
//! against the fallback backend, carrying only the bare prompt. The fallback
//! trades context for availability; it is a bounded degradation, not a retry
//! loop.

use tokio_util::sync::CancellationToken;

use palaver_types::llm::{LlmError, Message};

use super::backend::CompletionBackend;

/// A successful turn: the reply text and the authoritative updated history.
#[derive(Debug)]
pub struct TurnReply {
    /// All candidate texts joined with a newline separator.
    pub text: String,
    /// The input history plus the user message and one assistant message
    /// per candidate.
    pub history: Vec<Message>,
}

/// A failed turn.
///
/// Carries the history with the user message already appended (and nothing
/// else) so the caller can decide whether to persist it.
#[derive(Debug, thiserror::Error)]
#[error("{error}")]
pub struct TurnFailure {
    pub history: Vec<Message>,
    #[source]
    pub error: LlmError,
}

/// Orchestrates one completion request with its single fallback hop.
pub struct CompletionPipeline<P, F> {
    primary: P,
    fallback: F,
}

impl<P: CompletionBackend, F: CompletionBackend> CompletionPipeline<P, F> {
    pub fn new(primary: P, fallback: F) -> Self {
        Self { primary, fallback }
    }

    /// Run one turn: append the prompt to the history, obtain candidates,
    /// append them as assistant messages, and produce the reply string.
    ///
    /// The cancellation token is honored around both remote calls;
    /// cancellation never triggers the fallback and is never retried.
    pub async fn complete(
        &self,
        prompt: &str,
        mut history: Vec<Message>,
        cancel: &CancellationToken,
    ) -> Result<TurnReply, TurnFailure> {
        history.push(Message::user(prompt));

        let primary = tokio::select! {
            () = cancel.cancelled() => Err(LlmError::Cancelled),
            res = self.primary.chat_complete(&history) => res,
        };

        let resolved = match primary {
            Ok(candidates) => Ok(candidates),
            Err(err) if err.is_transient() => {
                tracing::warn!(
                    backend = self.primary.name(),
                    error = %err,
                    "Primary backend failed, falling back to legacy completion"
                );
                tokio::select! {
                    () = cancel.cancelled() => Err(LlmError::Cancelled),
                    res = self.fallback.legacy_complete(prompt) => res,
                }
            }
            Err(err) => Err(err),
        };

        let candidates = match resolved {
            Ok(candidates) if candidates.is_empty() => {
                return Err(TurnFailure {
                    history,
                    error: LlmError::EmptyCompletion,
                });
            }
            Ok(candidates) => candidates,
            Err(error) => return Err(TurnFailure { history, error }),
        };

        for candidate in &candidates {
            history.push(Message::assistant(candidate.clone()));
        }

        Ok(TurnReply {
            text: candidates.join("\n"),
            history,
        })
    }
}
