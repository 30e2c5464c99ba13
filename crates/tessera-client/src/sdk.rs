use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_core::{endpoints, ApiResult, Client, ErrorResponse, Session, TokenResource};
use tessera_keystore::SecureStore;
use tracing::info;

use crate::api::{ApiClient, ResponseShape};
use crate::assertion::{AssertionCoordinator, IntegrityProvider, UnavailableIntegrity};
use crate::config::{ConfigError, SdkConfig};
use crate::device::DeviceIdentity;
use crate::pipeline::{
    publish_client, AssertionStage, ClientSyncStage, DeviceTokenStage, HeaderStage, Pipeline,
    Stage,
};
use crate::state::{ClientStateStore, InMemoryClientState};
use crate::telemetry::{Telemetry, TracingTelemetry};
use crate::tokens::{GetTokenOptions, TokenCache, TokenFetcher};
use crate::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};

pub struct SdkBuilder {
    config: SdkConfig,
    store: Option<Arc<dyn SecureStore>>,
    integrity: Option<Arc<dyn IntegrityProvider>>,
    state: Option<Arc<dyn ClientStateStore>>,
    transport: Option<Arc<dyn Transport>>,
    telemetry: Option<Arc<dyn Telemetry>>,
}

impl SdkBuilder {
    #[must_use]
    pub fn new(config: SdkConfig) -> Self {
        Self {
            config,
            store: None,
            integrity: None,
            state: None,
            transport: None,
            telemetry: None,
        }
    }

    #[must_use]
    pub fn store(mut self, store: Arc<dyn SecureStore>) -> Self {
        self.store = Some(store);
        self
    }

    #[must_use]
    pub fn integrity(mut self, integrity: Arc<dyn IntegrityProvider>) -> Self {
        self.integrity = Some(integrity);
        self
    }

    #[must_use]
    pub fn client_state(mut self, state: Arc<dyn ClientStateStore>) -> Self {
        self.state = Some(state);
        self
    }

    #[must_use]
    pub fn transport(mut self, transport: Arc<dyn Transport>) -> Self {
        self.transport = Some(transport);
        self
    }

    #[must_use]
    pub fn telemetry(mut self, telemetry: Arc<dyn Telemetry>) -> Self {
        self.telemetry = Some(telemetry);
        self
    }

    pub fn build(self) -> Result<Sdk, ConfigError> {
        let config = self.config;
        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(HttpTransport::new(
                config.api_base_url()?,
                config.request_timeout(),
            )?),
        };
        let store: Arc<dyn SecureStore> = self
            .store
            .unwrap_or_else(|| Arc::from(tessera_keystore::default_store()));
        let integrity: Arc<dyn IntegrityProvider> = self
            .integrity
            .unwrap_or_else(|| Arc::new(UnavailableIntegrity));
        let state: Arc<dyn ClientStateStore> = self
            .state
            .unwrap_or_else(|| Arc::new(InMemoryClientState::new()));
        let telemetry: Arc<dyn Telemetry> =
            self.telemetry.unwrap_or_else(|| Arc::new(TracingTelemetry));

        let device = Arc::new(DeviceIdentity::new(store));
        let headers: Arc<dyn Stage> = Arc::new(HeaderStage::new(
            config.api_version.clone(),
            Arc::clone(&device),
            Arc::clone(&state),
        ));
        let device_token: Arc<dyn Stage> = Arc::new(DeviceTokenStage::new(Arc::clone(&device)));
        let client_sync: Arc<dyn Stage> = Arc::new(ClientSyncStage::new(Arc::clone(&state)));

        let remediation_pipeline = Pipeline::builder(Arc::clone(&transport))
            .stage(Arc::clone(&headers))
            .stage(Arc::clone(&device_token))
            .stage(Arc::clone(&client_sync))
            .build();
        let coordinator = AssertionCoordinator::new(
            ApiClient::new(remediation_pipeline, Arc::clone(&telemetry), config.debug),
            integrity,
            Arc::clone(&state),
            config.application_id.clone(),
            Arc::clone(&telemetry),
        );

        let pipeline = Pipeline::builder(transport)
            .stage(headers)
            .stage(device_token)
            .stage(Arc::new(AssertionStage::new(coordinator)))
            .stage(client_sync)
            .build();
        let api = ApiClient::new(pipeline, telemetry, config.debug);
        let tokens = TokenFetcher::new(
            api.clone(),
            TokenCache::new(),
            config.token_expiration_buffer(),
            config.token_timeout(),
        );
        info!(
            event = "sdk_ready",
            stages = ?api.pipeline().stage_names(),
            debug = config.debug
        );

        Ok(Sdk {
            api,
            tokens,
            state,
            device,
        })
    }
}

/// Entry point: one authenticated pipeline, its token fetcher and the shared
/// client snapshot.
#[derive(Clone)]
pub struct Sdk {
    api: ApiClient,
    tokens: TokenFetcher,
    state: Arc<dyn ClientStateStore>,
    device: Arc<DeviceIdentity>,
}

impl Sdk {
    #[must_use]
    pub fn builder(config: SdkConfig) -> SdkBuilder {
        SdkBuilder::new(config)
    }

    pub async fn get_token(
        &self,
        session: &Session,
        options: &GetTokenOptions,
    ) -> Option<Arc<TokenResource>> {
        self.tokens.get_token(session, options).await
    }

    /// Refreshes the client snapshot from the server. The fetched client is
    /// published through the same path as piggybacked ones, after the
    /// pipeline's own sync has run.
    pub async fn get_client(&self) -> ApiResult<Client, ErrorResponse> {
        let result = self
            .api
            .call::<Client>(ApiRequest::get(endpoints::CLIENT), ResponseShape::ClientPiggybacked)
            .await;
        if let Some(client) = result.value() {
            let client_id = publish_client(self.state.as_ref(), client.clone());
            info!(event = "client_synced", client_id = %client_id);
        }
        result
    }

    /// Ends every session on the server, then forgets them locally.
    pub async fn sign_out(&self) -> ApiResult<(), ErrorResponse> {
        let result = self
            .api
            .call::<Value>(ApiRequest::delete(endpoints::CLIENT_SESSIONS), ResponseShape::Plain)
            .await
            .map(|_| ());
        if result.is_success() {
            self.sign_out_local();
        }
        result
    }

    pub fn sign_out_local(&self) {
        self.state.clear();
        self.tokens.cache().clear();
        self.device.clear_device_token();
        info!(event = "signed_out");
    }

    /// Arbitrary call through the authenticated pipeline.
    pub async fn send<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        shape: ResponseShape,
    ) -> ApiResult<T, ErrorResponse> {
        self.api.call(request, shape).await
    }

    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse, ErrorResponse> {
        self.api.execute(request).await
    }

    #[must_use]
    pub fn client_state(&self) -> &Arc<dyn ClientStateStore> {
        &self.state
    }

    #[must_use]
    pub fn token_cache(&self) -> &TokenCache {
        self.tokens.cache()
    }

    #[must_use]
    pub fn device(&self) -> &DeviceIdentity {
        &self.device
    }

    #[must_use]
    pub fn pipeline_stages(&self) -> Vec<&'static str> {
        self.api.pipeline().stage_names()
    }
}
