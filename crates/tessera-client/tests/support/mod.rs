#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use chrono::Utc;
use tessera_client::{IntegrityError, IntegrityProvider, Sdk, SdkConfig};
use tessera_keystore::MemoryStore;

pub const ASSERTION_ONLY: &str =
    r#"{"errors":[{"code":"requires_assertion","message":"assert","long_message":"device assertion required"}],"clerk_trace_id":"trace_1"}"#;
pub const FULL_ATTESTATION: &str = r#"{"errors":[{"code":"requires_assertion","message":"assert","long_message":"attest first","meta":{"code":"requires_device_attestation"}}],"clerk_trace_id":"trace_2"}"#;

pub fn config_for(server_url: &str) -> SdkConfig {
    SdkConfig {
        base_url: Some(format!("{server_url}/v1")),
        application_id: "app_1".to_string(),
        ..SdkConfig::default()
    }
}

pub fn build_sdk(server_url: &str) -> (Sdk, Arc<MemoryStore>) {
    build_sdk_with(server_url, None)
}

pub fn build_sdk_with(
    server_url: &str,
    integrity: Option<Arc<dyn IntegrityProvider>>,
) -> (Sdk, Arc<MemoryStore>) {
    let store = Arc::new(MemoryStore::new());
    let mut builder = Sdk::builder(config_for(server_url)).store(store.clone());
    if let Some(integrity) = integrity {
        builder = builder.integrity(integrity);
    }
    (builder.build().expect("sdk"), store)
}

/// Unsigned JWT whose `exp` is `seconds` from now.
pub fn jwt_expiring_in(seconds: i64) -> String {
    let engine = base64::engine::general_purpose::URL_SAFE_NO_PAD;
    let payload = format!(
        r#"{{"sid":"sess_1","exp":{}}}"#,
        Utc::now().timestamp() + seconds
    );
    format!(
        "{}.{}.signature",
        engine.encode(r#"{"alg":"RS256","typ":"JWT"}"#),
        engine.encode(payload)
    )
}

pub fn token_body(jwt: &str) -> String {
    serde_json::json!({ "object": "token", "jwt": jwt }).to_string()
}

/// Deterministic integrity provider that counts its calls.
#[derive(Default)]
pub struct FakeIntegrity {
    pub attestations: AtomicUsize,
    pub assertions: AtomicUsize,
    pub delay: Duration,
}

impl FakeIntegrity {
    pub fn with_delay(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }

    pub fn attestations(&self) -> usize {
        self.attestations.load(Ordering::SeqCst)
    }

    pub fn assertions(&self) -> usize {
        self.assertions.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl IntegrityProvider for FakeIntegrity {
    async fn attest_device(&self, challenge: &str) -> Result<String, IntegrityError> {
        self.attestations.fetch_add(1, Ordering::SeqCst);
        Ok(format!("attest-{challenge}"))
    }

    async fn assertion_token(
        &self,
        client_id: &str,
        application_id: &str,
    ) -> Result<String, IntegrityError> {
        self.assertions.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("assert-{client_id}-{application_id}"))
    }
}
