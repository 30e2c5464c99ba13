//! Device assertion remediation.
//!
//! A `requires_assertion` error means the server wants proof that the calling
//! device is genuine before it accepts the request. The coordinator obtains an
//! assertion token from the platform [`IntegrityProvider`], submits it, and
//! tells the pipeline whether the original request is worth re-issuing. A
//! device that was never attested gets a one-time attestation first.
//!
//! At most one remediation runs at a time; concurrent requests that hit the
//! same error wait for the one in flight.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::Deserialize;
use tessera_core::{endpoints, error_codes, ApiResult, ErrorResponse, UnknownError};
use tracing::{debug, info, warn, Level};

use crate::api::{ApiClient, ResponseShape};
use crate::single_flight::SingleFlight;
use crate::state::ClientStateStore;
use crate::telemetry::Telemetry;
use crate::transport::{ApiRequest, ApiResponse};

mod integrity;

pub use integrity::{IntegrityError, IntegrityProvider, UnavailableIntegrity};

const REMEDIATION_KEY: &str = "device_assertion";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssertionRequirement {
    NoAssertionNeeded,
    AssertionOnly,
    FullAttestationThenAssertion,
}

impl AssertionRequirement {
    /// Reads an error body. Anything that does not decode needs no assertion.
    #[must_use]
    pub fn inspect(body: &[u8]) -> Self {
        let Ok(response) = serde_json::from_slice::<ErrorResponse>(body) else {
            return Self::NoAssertionNeeded;
        };
        match response.requires_assertion() {
            None => Self::NoAssertionNeeded,
            Some(error) if error.meta_code() == Some(error_codes::REQUIRES_DEVICE_ATTESTATION) => {
                Self::FullAttestationThenAssertion
            }
            Some(_) => Self::AssertionOnly,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RemediationDecision {
    NoRetry,
    Retry,
    /// Remediation succeeded but the request was the verification call itself.
    HandledNoRetry,
}

#[derive(Deserialize)]
struct AttestationChallenge {
    challenge: String,
}

#[derive(Clone)]
pub struct AssertionCoordinator {
    inner: Arc<Inner>,
}

struct Inner {
    api: ApiClient,
    integrity: Arc<dyn IntegrityProvider>,
    state: Arc<dyn ClientStateStore>,
    application_id: String,
    attested: AtomicBool,
    flight: SingleFlight<&'static str, (), ErrorResponse>,
    telemetry: Arc<dyn Telemetry>,
}

impl AssertionCoordinator {
    /// `api` must not route through an assertion stage of its own.
    #[must_use]
    pub fn new(
        api: ApiClient,
        integrity: Arc<dyn IntegrityProvider>,
        state: Arc<dyn ClientStateStore>,
        application_id: impl Into<String>,
        telemetry: Arc<dyn Telemetry>,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                api,
                integrity,
                state,
                application_id: application_id.into(),
                attested: AtomicBool::new(false),
                flight: SingleFlight::new(),
                telemetry,
            }),
        }
    }

    #[must_use]
    pub fn is_attested(&self) -> bool {
        self.inner.attested.load(Ordering::Acquire)
    }

    /// Inspects a failed response and remediates when it asks for an assertion.
    pub async fn handle(&self, request: &ApiRequest, response: &ApiResponse) -> RemediationDecision {
        let requirement = AssertionRequirement::inspect(&response.body);
        self.remediate(request, requirement).await
    }

    pub async fn remediate(
        &self,
        request: &ApiRequest,
        requirement: AssertionRequirement,
    ) -> RemediationDecision {
        if requirement == AssertionRequirement::NoAssertionNeeded {
            return RemediationDecision::NoRetry;
        }
        debug!(
            event = "assertion_required",
            request = %request.describe(),
            requirement = ?requirement
        );

        let inner = Arc::clone(&self.inner);
        let outcome = self
            .inner
            .flight
            .run_exclusive(REMEDIATION_KEY, move || async move {
                inner.run(requirement).await
            })
            .await;

        match outcome.into_result() {
            Ok(()) if request.path == endpoints::CLIENT_VERIFY => {
                info!(event = "assertion_handled", retry = false);
                RemediationDecision::HandledNoRetry
            }
            Ok(()) => {
                info!(event = "assertion_handled", retry = true);
                RemediationDecision::Retry
            }
            Err(failure) => {
                warn!(event = "assertion_failed", error = %failure);
                self.inner.telemetry.log(
                    Level::WARN,
                    format!("device assertion for {} failed: {failure}", request.describe()),
                );
                RemediationDecision::NoRetry
            }
        }
    }
}

impl Inner {
    async fn run(&self, requirement: AssertionRequirement) -> ApiResult<(), ErrorResponse> {
        let full = requirement == AssertionRequirement::FullAttestationThenAssertion;
        if full && !self.attested.load(Ordering::Acquire) {
            let attestation = self.attest_device().await;
            if !attestation.is_success() {
                return attestation;
            }
        }
        let assertion = self.assert_device().await;
        // The next request that asks for attestation attests again.
        if full && !assertion.is_success() && self.attested.swap(false, Ordering::AcqRel) {
            info!(event = "device_attestation_reset");
        }
        assertion
    }

    async fn attest_device(&self) -> ApiResult<(), ErrorResponse> {
        let challenge = match self
            .api
            .call::<AttestationChallenge>(
                ApiRequest::get(endpoints::DEVICE_ATTESTATION_CHALLENGES),
                ResponseShape::Plain,
            )
            .await
            .into_result()
        {
            Ok(challenge) => challenge.challenge,
            Err(failure) => return ApiResult::failure(failure),
        };
        let token = match self.integrity.attest_device(&challenge).await {
            Ok(token) => token,
            Err(err) => return integrity_failure(err),
        };
        let result = self
            .api
            .execute(ApiRequest::post(endpoints::DEVICE_ATTESTATION).with_form([("token", token)]))
            .await
            .map(|_| ());
        if result.is_success() {
            self.attested.store(true, Ordering::Release);
            info!(event = "device_attested");
        }
        result
    }

    async fn assert_device(&self) -> ApiResult<(), ErrorResponse> {
        let Some(client_id) = self.state.current_client_id() else {
            return ApiResult::unknown_failure(UnknownError::new(
                "no current client to assert for",
            ));
        };
        let token = match self
            .integrity
            .assertion_token(&client_id, &self.application_id)
            .await
        {
            Ok(token) => token,
            Err(err) => return integrity_failure(err),
        };
        self.api
            .execute(ApiRequest::post(endpoints::CLIENT_VERIFY).with_form([("token", token)]))
            .await
            .map(|_| ())
    }
}

fn integrity_failure(err: IntegrityError) -> ApiResult<(), ErrorResponse> {
    ApiResult::unknown_failure(UnknownError::new(err.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    use super::*;
    use crate::pipeline::test_support::{response, ScriptedTransport};
    use crate::pipeline::Pipeline;
    use crate::state::InMemoryClientState;
    use crate::telemetry::TracingTelemetry;
    use async_trait::async_trait;
    use tessera_core::{Client, NetworkError};

    const ASSERTION_ONLY: &str = r#"{"errors":[{"code":"requires_assertion","message":"assert"}]}"#;
    const FULL_ATTESTATION: &str = r#"{"errors":[{"code":"requires_assertion","meta":{"code":"requires_device_attestation"}}]}"#;

    #[derive(Default)]
    struct CountingIntegrity {
        attestations: AtomicUsize,
        assertions: AtomicUsize,
    }

    #[async_trait]
    impl IntegrityProvider for CountingIntegrity {
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
            tokio::time::sleep(Duration::from_millis(20)).await;
            Ok(format!("assert-{client_id}-{application_id}"))
        }
    }

    fn coordinator(
        responses: Vec<Result<ApiResponse, NetworkError>>,
        integrity: Arc<dyn IntegrityProvider>,
        client: Option<Client>,
    ) -> (AssertionCoordinator, Arc<ScriptedTransport>) {
        let transport = Arc::new(ScriptedTransport::new(responses));
        let api = ApiClient::new(
            Pipeline::builder(transport.clone()).build(),
            Arc::new(TracingTelemetry),
            false,
        );
        let state = Arc::new(InMemoryClientState::new());
        state.init(client);
        let coordinator =
            AssertionCoordinator::new(api, integrity, state, "app_1", Arc::new(TracingTelemetry));
        (coordinator, transport)
    }

    #[test]
    fn inspect_classifies_error_bodies() {
        assert_eq!(
            AssertionRequirement::inspect(ASSERTION_ONLY.as_bytes()),
            AssertionRequirement::AssertionOnly
        );
        assert_eq!(
            AssertionRequirement::inspect(FULL_ATTESTATION.as_bytes()),
            AssertionRequirement::FullAttestationThenAssertion
        );
        assert_eq!(
            AssertionRequirement::inspect(br#"{"errors":[{"code":"session_exists"}]}"#),
            AssertionRequirement::NoAssertionNeeded
        );
        assert_eq!(
            AssertionRequirement::inspect(b"<html>bad gateway</html>"),
            AssertionRequirement::NoAssertionNeeded
        );
    }

    #[tokio::test]
    async fn assertion_submits_token_and_asks_for_retry() {
        let integrity = Arc::new(CountingIntegrity::default());
        let (coordinator, transport) = coordinator(
            vec![Ok(response(200, "{}"))],
            integrity.clone(),
            Some(Client::new("client_1")),
        );
        let decision = coordinator
            .handle(&ApiRequest::get("/client"), &response(401, ASSERTION_ONLY))
            .await;
        assert_eq!(decision, RemediationDecision::Retry);

        let sent = transport.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].path, endpoints::CLIENT_VERIFY);
        assert!(matches!(
            &sent[0].body,
            crate::transport::RequestBody::Form(fields)
                if fields == &vec![("token".to_string(), "assert-client_1-app_1".to_string())]
        ));
        assert_eq!(integrity.attestations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn full_attestation_runs_once() {
        let integrity = Arc::new(CountingIntegrity::default());
        let (coordinator, transport) = coordinator(
            vec![
                Ok(response(200, r#"{"challenge":"ch_1"}"#)),
                Ok(response(200, "{}")),
                Ok(response(200, "{}")),
                Ok(response(200, "{}")),
            ],
            integrity.clone(),
            Some(Client::new("client_1")),
        );
        let request = ApiRequest::get("/client");
        let failed = response(401, FULL_ATTESTATION);
        assert_eq!(
            coordinator.handle(&request, &failed).await,
            RemediationDecision::Retry
        );
        assert!(coordinator.is_attested());
        assert_eq!(
            coordinator.handle(&request, &failed).await,
            RemediationDecision::Retry
        );

        let paths: Vec<_> = transport.sent().into_iter().map(|sent| sent.path).collect();
        assert_eq!(
            paths,
            vec![
                endpoints::DEVICE_ATTESTATION_CHALLENGES,
                endpoints::DEVICE_ATTESTATION,
                endpoints::CLIENT_VERIFY,
                endpoints::CLIENT_VERIFY,
            ]
        );
        assert_eq!(integrity.attestations.load(Ordering::SeqCst), 1);
        assert_eq!(integrity.assertions.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn rejected_assertion_after_attestation_request_attests_again() {
        let integrity = Arc::new(CountingIntegrity::default());
        let (coordinator, transport) = coordinator(
            vec![
                Ok(response(200, r#"{"challenge":"ch_1"}"#)),
                Ok(response(200, "{}")),
                Ok(response(200, "{}")),
                Ok(response(400, r#"{"errors":[{"code":"assertion_invalid"}]}"#)),
                Ok(response(200, r#"{"challenge":"ch_2"}"#)),
                Ok(response(200, "{}")),
                Ok(response(200, "{}")),
            ],
            integrity.clone(),
            Some(Client::new("client_1")),
        );
        let request = ApiRequest::get("/client");
        let failed = response(401, FULL_ATTESTATION);
        assert_eq!(
            coordinator.handle(&request, &failed).await,
            RemediationDecision::Retry
        );
        assert!(coordinator.is_attested());

        assert_eq!(
            coordinator.handle(&request, &failed).await,
            RemediationDecision::NoRetry
        );
        assert!(!coordinator.is_attested());

        assert_eq!(
            coordinator.handle(&request, &failed).await,
            RemediationDecision::Retry
        );
        assert!(coordinator.is_attested());
        assert_eq!(integrity.attestations.load(Ordering::SeqCst), 2);
        assert_eq!(transport.sent().len(), 7);
    }

    #[tokio::test]
    async fn rejected_plain_assertion_keeps_attestation() {
        let integrity = Arc::new(CountingIntegrity::default());
        let (coordinator, _) = coordinator(
            vec![
                Ok(response(200, r#"{"challenge":"ch_1"}"#)),
                Ok(response(200, "{}")),
                Ok(response(200, "{}")),
                Ok(response(400, r#"{"errors":[{"code":"assertion_invalid"}]}"#)),
            ],
            integrity,
            Some(Client::new("client_1")),
        );
        let request = ApiRequest::get("/client");
        coordinator
            .handle(&request, &response(401, FULL_ATTESTATION))
            .await;
        assert_eq!(
            coordinator
                .handle(&request, &response(401, ASSERTION_ONLY))
                .await,
            RemediationDecision::NoRetry
        );
        assert!(coordinator.is_attested());
    }

    #[tokio::test]
    async fn verify_endpoint_is_handled_without_retry() {
        let (coordinator, _) = coordinator(
            vec![Ok(response(200, "{}"))],
            Arc::new(CountingIntegrity::default()),
            Some(Client::new("client_1")),
        );
        let decision = coordinator
            .handle(
                &ApiRequest::post(endpoints::CLIENT_VERIFY),
                &response(401, ASSERTION_ONLY),
            )
            .await;
        assert_eq!(decision, RemediationDecision::HandledNoRetry);
    }

    #[tokio::test]
    async fn remediation_failures_never_retry() {
        let (unavailable, transport) = coordinator(
            Vec::new(),
            Arc::new(UnavailableIntegrity),
            Some(Client::new("client_1")),
        );
        let request = ApiRequest::get("/client");
        assert_eq!(
            unavailable.handle(&request, &response(401, ASSERTION_ONLY)).await,
            RemediationDecision::NoRetry
        );
        assert!(transport.sent().is_empty());

        let (no_client, _) = coordinator(Vec::new(), Arc::new(CountingIntegrity::default()), None);
        assert_eq!(
            no_client.handle(&request, &response(401, ASSERTION_ONLY)).await,
            RemediationDecision::NoRetry
        );

        let (rejected, _) = coordinator(
            vec![Ok(response(400, r#"{"errors":[{"code":"assertion_invalid"}]}"#))],
            Arc::new(CountingIntegrity::default()),
            Some(Client::new("client_1")),
        );
        assert_eq!(
            rejected.handle(&request, &response(401, ASSERTION_ONLY)).await,
            RemediationDecision::NoRetry
        );
    }

    #[tokio::test]
    async fn concurrent_remediations_share_one_assertion() {
        let integrity = Arc::new(CountingIntegrity::default());
        let (coordinator, transport) = coordinator(
            vec![Ok(response(200, "{}")), Ok(response(200, "{}"))],
            integrity.clone(),
            Some(Client::new("client_1")),
        );
        let first = ApiRequest::get("/client");
        let second = ApiRequest::get("/me");
        let failed = response(401, ASSERTION_ONLY);
        let (a, b) = tokio::join!(
            coordinator.handle(&first, &failed),
            coordinator.handle(&second, &failed),
        );
        assert_eq!(a, RemediationDecision::Retry);
        assert_eq!(b, RemediationDecision::Retry);
        assert_eq!(integrity.assertions.load(Ordering::SeqCst), 1);
        assert_eq!(transport.sent().len(), 1);
    }
}
