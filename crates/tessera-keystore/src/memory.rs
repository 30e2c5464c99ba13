use std::collections::HashMap;
use std::sync::Mutex;

use crate::{SecureStore, StorageError};

/// Process-local store. Used by tests and by hosts without a keychain.
#[derive(Default)]
pub struct MemoryStore {
    values: Mutex<HashMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, String>>, StorageError> {
        self.values.lock().map_err(|_| StorageError::Internal {
            message: "failed to lock memory store".to_string(),
        })
    }
}

impl SecureStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.is_empty() {
            return Ok(());
        }
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        self.lock()?.remove(key);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_store_roundtrip() -> Result<(), StorageError> {
        let store = MemoryStore::new();
        store.save("device_token", "dvc_1")?;
        assert_eq!(store.load("device_token")?, Some("dvc_1".to_string()));
        store.delete("device_token")?;
        assert_eq!(store.load("device_token")?, None);
        Ok(())
    }

    #[test]
    fn empty_save_keeps_previous_value() -> Result<(), StorageError> {
        let store = MemoryStore::new();
        store.save("device_token", "dvc_1")?;
        store.save("device_token", "")?;
        assert_eq!(store.load("device_token")?, Some("dvc_1".to_string()));
        Ok(())
    }

    #[test]
    fn delete_missing_key_is_ok() {
        assert!(MemoryStore::new().delete("absent").is_ok());
    }
}
