//! Session store port and user record persistence.
//!
//! The store is a plain byte-blob mapping; everything above it is JSON.
//! Keys are namespaced strings: `"user:" + id` and `"chat:" + id`.

use palaver_types::error::StoreError;
use palaver_types::user::User;

pub(crate) const USER_KEY_PREFIX: &str = "user:";
pub(crate) const CHAT_KEY_PREFIX: &str = "chat:";

/// Trait for durable session state storage.
///
/// Uses native async fn in traits (RPITIT, Rust 2024 edition).
/// Implementations live in palaver-infra (e.g., `SqliteSessionStore`).
pub trait SessionStore: Send + Sync {
    /// Get the blob under a key. `None` if the key does not exist.
    fn get(
        &self,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<Vec<u8>>, StoreError>> + Send;

    /// Write the blob under a key (upsert).
    fn put(
        &self,
        key: &str,
        value: &[u8],
    ) -> impl std::future::Future<Output = Result<(), StoreError>> + Send;
}

pub fn user_key(id: i64) -> String {
    format!("{USER_KEY_PREFIX}{id}")
}

pub fn chat_key(conversation_id: i64) -> String {
    format!("{CHAT_KEY_PREFIX}{conversation_id}")
}

/// Load a user record, creating a default one when absent.
///
/// A missing key is the normal first-contact path, not an error. A malformed
/// blob is surfaced as a deserialization error.
pub async fn load_user<S: SessionStore>(
    store: &S,
    id: i64,
    quota_default: i64,
) -> Result<User, StoreError> {
    let key = user_key(id);
    match store.get(&key).await? {
        Some(bytes) => {
            let user = serde_json::from_slice(&bytes).map_err(|e| StoreError::Deserialization {
                key: key.clone(),
                detail: e.to_string(),
            })?;
            tracing::debug!(user_id = id, "Loaded user from store");
            Ok(user)
        }
        None => {
            tracing::debug!(user_id = id, "User not in store, creating default");
            Ok(User::new(id, quota_default))
        }
    }
}

/// Persist a user record under its namespaced key.
pub async fn save_user<S: SessionStore>(store: &S, user: &User) -> Result<(), StoreError> {
    let bytes = serde_json::to_vec(user).map_err(|e| StoreError::Backend(e.to_string()))?;
    store.put(&user_key(user.id), &bytes).await?;
    tracing::debug!(user_id = user.id, "Saved user to store");
    Ok(())
}
