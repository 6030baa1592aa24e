//! Conversation history lifecycle.
//!
//! A history is an ordered `Vec<Message>` keyed by conversation id. After
//! any reset its first element is the system-role seed; within a session it
//! only grows. The store holds it as a JSON array under `"chat:" + id`.

use palaver_types::error::StoreError;
use palaver_types::llm::Message;

use super::store::{SessionStore, chat_key};

/// A brand-new history: exactly the seed system message.
pub fn fresh(preset: &str) -> Vec<Message> {
    vec![Message::system(preset)]
}

/// Load the history for a conversation.
///
/// An absent key yields a fresh history; a malformed blob is a fatal
/// deserialization error; any other store failure is surfaced as-is.
pub async fn load<S: SessionStore>(
    store: &S,
    conversation_id: i64,
    preset: &str,
) -> Result<Vec<Message>, StoreError> {
    let key = chat_key(conversation_id);
    match store.get(&key).await? {
        Some(bytes) => {
            let history =
                serde_json::from_slice(&bytes).map_err(|e| StoreError::Deserialization {
                    key: key.clone(),
                    detail: e.to_string(),
                })?;
            tracing::debug!(conversation_id, "Loaded chat history from store");
            Ok(history)
        }
        None => {
            tracing::debug!(conversation_id, "No chat history in store, starting fresh");
            Ok(fresh(preset))
        }
    }
}

/// Persist the history under its namespaced key.
///
/// Failures are surfaced but already-applied in-memory state is not rolled
/// back; the caller decides what a failed save means for the turn.
pub async fn save<S: SessionStore>(
    store: &S,
    conversation_id: i64,
    history: &[Message],
) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(history).map_err(|e| StoreError::Backend(e.to_string()))?;
    store.put(&chat_key(conversation_id), &bytes).await?;
    tracing::debug!(conversation_id, "Saved chat history to store");
    Ok(())
}
