//! Persistent string storage for device identifiers and device tokens.
//!
//! Saving an empty string is a no-op in every implementation, so a blank
//! header value can never wipe a stored token.

use thiserror::Error;

mod keychain;
mod memory;

pub use keychain::KeyringStore;
pub use memory::MemoryStore;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StorageError {
    #[error("storage unavailable: {message}")]
    Unavailable { message: String },
    #[error("internal error: {message}")]
    Internal { message: String },
}

pub trait SecureStore: Send + Sync {
    fn load(&self, key: &str) -> Result<Option<String>, StorageError>;
    fn save(&self, key: &str, value: &str) -> Result<(), StorageError>;
    fn delete(&self, key: &str) -> Result<(), StorageError>;
}

pub const DEFAULT_SERVICE: &str = "tessera";

#[must_use]
pub fn default_store() -> Box<dyn SecureStore> {
    Box::new(KeyringStore::new(DEFAULT_SERVICE))
}
