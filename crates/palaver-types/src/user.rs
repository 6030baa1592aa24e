//! Per-user quota and staleness state.
//!
//! One `User` record exists per end user, or per group conversation when the
//! transport is not private (group members share one quota and one history).
//! The serde field names are part of the storage contract.

use serde::{Deserialize, Serialize};

/// Sentinel quota value disabling the message ceiling.
pub const UNLIMITED_QUOTA: i64 = -1;

/// Durable per-user state, persisted under `"user:" + id`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Stable identifier of the owning user or group.
    pub id: i64,
    /// Conversation last associated with this user.
    pub chat_id: i64,
    /// Message ceiling; `-1` means unlimited.
    pub quota_limit: i64,
    /// Count of successfully completed exchanges. Never decremented.
    pub messages_sent: i64,
    /// Unix timestamp of the last successful exchange; 0 = never.
    pub last_message_ts: i64,
}

impl User {
    /// A user as created on first contact: no chat yet, nothing sent.
    pub fn new(id: i64, quota_limit: i64) -> Self {
        Self {
            id,
            chat_id: 0,
            quota_limit,
            messages_sent: 0,
            last_message_ts: 0,
        }
    }
}
