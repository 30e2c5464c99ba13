use std::sync::{Arc, OnceLock};

use tessera_core::storage_keys;
use tessera_keystore::SecureStore;
use tracing::{debug, warn};
use uuid::Uuid;

/// Device id and device token, both kept in the secure store.
pub struct DeviceIdentity {
    store: Arc<dyn SecureStore>,
    device_id: OnceLock<String>,
}

impl DeviceIdentity {
    #[must_use]
    pub fn new(store: Arc<dyn SecureStore>) -> Self {
        Self {
            store,
            device_id: OnceLock::new(),
        }
    }

    /// Stable per-install identifier, generated on first use.
    pub fn device_id(&self) -> &str {
        self.device_id.get_or_init(|| self.load_or_create_device_id())
    }

    fn load_or_create_device_id(&self) -> String {
        match self.store.load(storage_keys::DEVICE_ID) {
            Ok(Some(id)) if !id.is_empty() => return id,
            Ok(_) => {}
            Err(err) => warn!(event = "device_id_load_failed", error = %err),
        }
        let id = Uuid::new_v4().to_string();
        if let Err(err) = self.store.save(storage_keys::DEVICE_ID, &id) {
            warn!(event = "device_id_save_failed", error = %err);
        }
        debug!(event = "device_id_generated", device_id = %id);
        id
    }

    pub fn device_token(&self) -> Option<String> {
        match self.store.load(storage_keys::DEVICE_TOKEN) {
            Ok(token) => token.filter(|token| !token.is_empty()),
            Err(err) => {
                warn!(event = "device_token_load_failed", error = %err);
                None
            }
        }
    }

    pub fn persist_device_token(&self, token: &str) {
        if let Err(err) = self.store.save(storage_keys::DEVICE_TOKEN, token) {
            warn!(event = "device_token_save_failed", error = %err);
        }
    }

    pub fn clear_device_token(&self) {
        if let Err(err) = self.store.delete(storage_keys::DEVICE_TOKEN) {
            warn!(event = "device_token_delete_failed", error = %err);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tessera_keystore::MemoryStore;

    #[test]
    fn device_id_is_generated_once_and_persisted() {
        let store: Arc<dyn SecureStore> = Arc::new(MemoryStore::new());
        let identity = DeviceIdentity::new(Arc::clone(&store));
        let id = identity.device_id().to_string();
        assert!(Uuid::parse_str(&id).is_ok());
        assert_eq!(identity.device_id(), id);
        assert_eq!(
            store.load(storage_keys::DEVICE_ID).expect("load"),
            Some(id.clone())
        );

        let reloaded = DeviceIdentity::new(store);
        assert_eq!(reloaded.device_id(), id);
    }

    #[test]
    fn device_token_round_trips_and_ignores_blank_values() {
        let identity = DeviceIdentity::new(Arc::new(MemoryStore::new()));
        assert_eq!(identity.device_token(), None);
        identity.persist_device_token("dvc_1");
        identity.persist_device_token("");
        assert_eq!(identity.device_token().as_deref(), Some("dvc_1"));
        identity.clear_device_token();
        assert_eq!(identity.device_token(), None);
    }
}
