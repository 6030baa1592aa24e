//! In-memory `SessionStore` shared by the unit tests in this crate.

use std::collections::HashMap;
use std::sync::Mutex;

use palaver_types::error::StoreError;

use super::store::SessionStore;

#[derive(Default)]
pub struct MemoryStore {
    map: Mutex<HashMap<String, Vec<u8>>>,
    /// When set, every `put` fails with this message.
    pub fail_puts: Mutex<Option<String>>,
}

impl SessionStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.map.lock().unwrap().get(key).cloned())
    }

    async fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        if let Some(msg) = self.fail_puts.lock().unwrap().clone() {
            return Err(StoreError::Backend(msg));
        }
        self.map.lock().unwrap().insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

impl MemoryStore {
    pub fn raw(&self, key: &str) -> Option<Vec<u8>> {
        self.map.lock().unwrap().get(key).cloned()
    }
}
