use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IntegrityError {
    #[error("device integrity service is not available")]
    Unavailable,
    #[error("device integrity provider failed: {0}")]
    Provider(String),
}

/// Platform device-integrity service.
#[async_trait]
pub trait IntegrityProvider: Send + Sync {
    /// Attests this device against a server-issued challenge.
    async fn attest_device(&self, challenge: &str) -> Result<String, IntegrityError>;

    /// Short-lived assertion bound to the client and application.
    async fn assertion_token(
        &self,
        client_id: &str,
        application_id: &str,
    ) -> Result<String, IntegrityError>;
}

/// Used when the host registers no provider; remediation then never retries.
#[derive(Debug, Default, Clone, Copy)]
pub struct UnavailableIntegrity;

#[async_trait]
impl IntegrityProvider for UnavailableIntegrity {
    async fn attest_device(&self, _challenge: &str) -> Result<String, IntegrityError> {
        Err(IntegrityError::Unavailable)
    }

    async fn assertion_token(
        &self,
        _client_id: &str,
        _application_id: &str,
    ) -> Result<String, IntegrityError> {
        Err(IntegrityError::Unavailable)
    }
}
