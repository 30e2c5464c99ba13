//! Ordered request/response stages around a [`Transport`].
//!
//! Every stage prepares the outgoing request in order, then sees the response
//! in the same order. A stage may ask for the original request to be re-issued
//! once; the retried response then passes through every stage again, but a
//! second retry request is ignored.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use tessera_core::NetworkError;
use tracing::debug;

use crate::transport::{ApiRequest, ApiResponse, Transport};

mod assertion;
mod client_sync;
mod device_token;
mod headers;

pub use assertion::AssertionStage;
pub use client_sync::{publish_client, sync_client_from_body, ClientSyncStage};
pub use device_token::DeviceTokenStage;
pub use headers::HeaderStage;

/// What a stage sees alongside a response.
#[derive(Debug, Clone, Copy)]
pub struct Exchange<'a> {
    /// The request as the caller issued it, before any stage touched it.
    pub request: &'a ApiRequest,
    /// True once the request has been re-issued.
    pub retried: bool,
}

#[derive(Debug)]
pub enum StageFlow {
    Continue(ApiResponse),
    /// Re-issue the original request. The response is used as-is when a
    /// retry already happened.
    Retry(ApiResponse),
}

#[async_trait]
pub trait Stage: Send + Sync {
    fn name(&self) -> &'static str;

    fn prepare(&self, _request: &mut ApiRequest) {}

    async fn on_response(&self, _exchange: Exchange<'_>, response: ApiResponse) -> StageFlow {
        StageFlow::Continue(response)
    }
}

#[derive(Clone)]
pub struct Pipeline {
    transport: Arc<dyn Transport>,
    stages: Arc<[Arc<dyn Stage>]>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("stages", &self.stage_names())
            .finish()
    }
}

impl Pipeline {
    #[must_use]
    pub fn builder(transport: Arc<dyn Transport>) -> PipelineBuilder {
        PipelineBuilder {
            transport,
            stages: Vec::new(),
        }
    }

    #[must_use]
    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|stage| stage.name()).collect()
    }

    pub async fn send(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let mut response = self.execute(request).await?;
        let mut retried = false;
        let mut index = 0;
        while let Some(stage) = self.stages.get(index) {
            let exchange = Exchange { request, retried };
            match stage.on_response(exchange, response).await {
                StageFlow::Continue(next) => {
                    response = next;
                    index += 1;
                }
                StageFlow::Retry(next) if retried => {
                    debug!(event = "pipeline_retry_ignored", stage = stage.name());
                    response = next;
                    index += 1;
                }
                StageFlow::Retry(_) => {
                    debug!(
                        event = "pipeline_retry",
                        stage = stage.name(),
                        request = %request.describe()
                    );
                    retried = true;
                    response = self.execute(request).await?;
                    index = 0;
                }
            }
        }
        Ok(response)
    }

    async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
        let mut prepared = request.clone();
        for stage in self.stages.iter() {
            stage.prepare(&mut prepared);
        }
        self.transport.execute(&prepared).await
    }
}

pub struct PipelineBuilder {
    transport: Arc<dyn Transport>,
    stages: Vec<Arc<dyn Stage>>,
}

impl PipelineBuilder {
    #[must_use]
    pub fn stage(mut self, stage: Arc<dyn Stage>) -> Self {
        self.stages.push(stage);
        self
    }

    #[must_use]
    pub fn build(self) -> Pipeline {
        Pipeline {
            transport: self.transport,
            stages: self.stages.into(),
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;
    use reqwest::header::HeaderMap;
    use reqwest::StatusCode;

    /// Replays canned responses and records what it was asked to send.
    #[derive(Default)]
    pub struct ScriptedTransport {
        responses: Mutex<VecDeque<Result<ApiResponse, NetworkError>>>,
        pub sent: Mutex<Vec<ApiRequest>>,
    }

    impl ScriptedTransport {
        pub fn new(responses: Vec<Result<ApiResponse, NetworkError>>) -> Self {
            Self {
                responses: Mutex::new(responses.into()),
                sent: Mutex::new(Vec::new()),
            }
        }

        pub fn sent(&self) -> Vec<ApiRequest> {
            self.sent.lock().expect("sent lock").clone()
        }
    }

    #[async_trait]
    impl Transport for ScriptedTransport {
        async fn execute(&self, request: &ApiRequest) -> Result<ApiResponse, NetworkError> {
            self.sent.lock().expect("sent lock").push(request.clone());
            self.responses
                .lock()
                .expect("responses lock")
                .pop_front()
                .unwrap_or_else(|| Err(NetworkError::connect("script exhausted")))
        }
    }

    pub fn response(status: u16, body: &'static str) -> ApiResponse {
        let mut headers = HeaderMap::new();
        headers.insert(
            reqwest::header::CONTENT_TYPE,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        ApiResponse::new(
            StatusCode::from_u16(status).expect("status"),
            headers,
            body,
        )
    }
}
