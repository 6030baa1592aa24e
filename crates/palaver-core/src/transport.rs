//! Messaging transport port.

use palaver_types::error::TransportError;

/// Outbound side of the messaging transport.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// The Telegram implementation lives in the bot binary.
pub trait Responder: Send + Sync {
    /// Deliver `text` into a conversation, optionally replying to a
    /// specific transport message id.
    fn send(
        &self,
        conversation_id: i64,
        text: &str,
        in_reply_to: Option<i32>,
    ) -> impl std::future::Future<Output = Result<(), TransportError>> + Send;
}
