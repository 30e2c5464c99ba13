use tracing::{debug, warn};

use crate::{SecureStore, StorageError};

/// OS keychain backed store. Every key becomes one keychain entry under the
/// configured service name.
pub struct KeyringStore {
    service: String,
}

impl KeyringStore {
    #[must_use]
    pub fn new(service: impl Into<String>) -> Self {
        Self {
            service: service.into(),
        }
    }

    fn entry(&self, key: &str) -> Result<keyring::Entry, StorageError> {
        keyring::Entry::new(&self.service, key).map_err(|err| StorageError::Unavailable {
            message: format!("failed to access keyring: {err}"),
        })
    }
}

impl SecureStore for KeyringStore {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError> {
        match self.entry(key)?.get_password() {
            Ok(value) => Ok(Some(value)),
            Err(keyring::Error::NoEntry) => Ok(None),
            Err(err) => Err(StorageError::Internal {
                message: format!("failed to load '{key}' from keychain: {err}"),
            }),
        }
    }

    fn save(&self, key: &str, value: &str) -> Result<(), StorageError> {
        if value.is_empty() {
            return Ok(());
        }
        self.entry(key)?
            .set_password(value)
            .map_err(|err| StorageError::Internal {
                message: format!("failed to store '{key}': {err}"),
            })?;
        debug!(service = %self.service, key, "stored value in keyring");
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StorageError> {
        match self.entry(key)?.delete_password() {
            Ok(()) | Err(keyring::Error::NoEntry) => Ok(()),
            Err(err) => {
                warn!(service = %self.service, key, "failed to delete keyring entry: {err}");
                Ok(())
            }
        }
    }
}
