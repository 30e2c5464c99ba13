use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use chrono::{DateTime, Duration, Utc};
use tessera_core::TokenResource;
use tracing::debug;

/// `session_id`, or `session_id-template` for templated tokens.
#[must_use]
pub fn cache_key(session_id: &str, template: Option<&str>) -> String {
    match template {
        Some(template) => format!("{session_id}-{template}"),
        None => session_id.to_string(),
    }
}

#[derive(Debug, Clone)]
pub struct CacheEntry {
    pub token: Arc<TokenResource>,
    pub expires_at: DateTime<Utc>,
}

impl CacheEntry {
    /// A token whose expiry cannot be read is stored as already expired.
    #[must_use]
    pub fn from_token(token: Arc<TokenResource>) -> Self {
        let expires_at = match token.expires_at() {
            Ok(expires_at) => expires_at,
            Err(err) => {
                debug!(event = "token_expiry_unreadable", error = %err);
                DateTime::<Utc>::MIN_UTC
            }
        };
        Self { token, expires_at }
    }

    #[must_use]
    pub fn is_fresh(&self, now: DateTime<Utc>, buffer: Duration) -> bool {
        now.checked_add_signed(buffer)
            .is_some_and(|deadline| self.expires_at > deadline)
    }
}

#[derive(Clone, Default)]
pub struct TokenCache {
    entries: Arc<RwLock<HashMap<String, CacheEntry>>>,
}

impl TokenCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<CacheEntry> {
        self.entries
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .get(key)
            .cloned()
    }

    pub fn put(&self, key: impl Into<String>, entry: CacheEntry) {
        let mut guard = self.entries.write().unwrap_or_else(|err| err.into_inner());
        guard.insert(key.into(), entry);
    }

    pub fn remove(&self, key: &str) -> Option<CacheEntry> {
        let mut guard = self.entries.write().unwrap_or_else(|err| err.into_inner());
        guard.remove(key)
    }

    pub fn clear(&self) {
        let mut guard = self.entries.write().unwrap_or_else(|err| err.into_inner());
        guard.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(|err| err.into_inner())
            .len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
