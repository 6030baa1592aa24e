//! Per-user quota and staleness policy.
//!
//! Both predicates are total over well-formed `User` records and have no
//! side effects; the orchestrator applies them at the top of every turn.

use std::time::Duration;

use palaver_types::user::{UNLIMITED_QUOTA, User};

/// Whether the user's conversation should be considered stale.
///
/// True when the last successful exchange was at least `timeout` ago, or
/// when the user has never completed an exchange (`last_message_ts == 0`).
/// The boundary is inclusive: exactly `timeout` counts as stale.
pub fn is_stale(user: &User, now: i64, timeout: Duration) -> bool {
    if user.last_message_ts == 0 {
        return true;
    }
    now - user.last_message_ts >= timeout.as_secs() as i64
}

/// Whether the user has exhausted their message ceiling.
///
/// A `quota_limit` of `-1` disables the ceiling entirely.
pub fn is_quota_reached(user: &User) -> bool {
    user.quota_limit != UNLIMITED_QUOTA && user.messages_sent >= user.quota_limit
}
