//! Inbound transport events.

use serde::{Deserialize, Serialize};

/// One incoming utterance, as delivered by the messaging transport.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InboundMessage {
    /// The conversation (private chat or group) the message arrived in.
    pub conversation_id: i64,
    /// The individual sender. Quota identity in private conversations.
    pub sender_id: i64,
    /// Whether the conversation is a one-to-one private chat.
    pub is_private: bool,
    /// The utterance text.
    pub text: String,
    /// Transport-level message id, used to reply in-thread.
    pub message_id: i32,
    /// Unix timestamp the transport assigned to the message.
    pub timestamp: i64,
}

impl InboundMessage {
    /// The identity that owns quota and history for this message.
    ///
    /// Private conversations are keyed by sender; group conversations share
    /// one user record keyed by the conversation itself.
    pub fn identity(&self) -> i64 {
        if self.is_private {
            self.sender_id
        } else {
            self.conversation_id
        }
    }
}
