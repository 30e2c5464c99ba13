//! Turns pipeline responses into [`ApiResult`]s.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde_json::Value;
use tessera_core::{ApiResult, ErrorResponse, TagKey, Tags, UnknownError};
use tracing::{debug, info, Level};

use crate::pipeline::Pipeline;
use crate::telemetry::Telemetry;
use crate::transport::{ApiRequest, ApiResponse};

/// How a successful body maps onto the caller's type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseShape {
    /// The body is the value.
    #[default]
    Plain,
    /// `{ "data": [..], "total_count": n }`, decoded from `data`.
    ListWrapped,
    /// `{ "response": .., "client": .. }`, decoded from `response`.
    ClientPiggybacked,
}

impl ResponseShape {
    pub fn decode<T: DeserializeOwned>(self, body: &[u8]) -> serde_json::Result<T> {
        match self {
            Self::Plain => serde_json::from_slice(body),
            Self::ListWrapped => Self::field(body, "data"),
            Self::ClientPiggybacked => Self::field(body, "response"),
        }
    }

    fn field<T: DeserializeOwned>(body: &[u8], name: &str) -> serde_json::Result<T> {
        let mut value: Value = serde_json::from_slice(body)?;
        let field = value.get_mut(name).map(Value::take).unwrap_or(Value::Null);
        serde_json::from_value(field)
    }
}

#[derive(Clone)]
pub struct ApiClient {
    pipeline: Pipeline,
    telemetry: Arc<dyn Telemetry>,
    verbose: bool,
}

impl ApiClient {
    #[must_use]
    pub fn new(pipeline: Pipeline, telemetry: Arc<dyn Telemetry>, verbose: bool) -> Self {
        Self {
            pipeline,
            telemetry,
            verbose,
        }
    }

    #[must_use]
    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Sends `request` and classifies the raw response.
    pub async fn execute(&self, request: ApiRequest) -> ApiResult<ApiResponse, ErrorResponse> {
        if self.verbose {
            info!(event = "api_request", request = %request.describe());
        } else {
            debug!(event = "api_request", request = %request.describe());
        }

        let result = match self.pipeline.send(&request).await {
            Ok(response) => {
                let tags = Tags::new()
                    .with(TagKey::ORIGINAL_REQUEST, request.clone())
                    .with(TagKey::RAW_RESPONSE, response.clone());
                classify(response).with_tags(&tags)
            }
            Err(err) => ApiResult::network_failure(err)
                .with_tags(&Tags::new().with(TagKey::ORIGINAL_REQUEST, request.clone())),
        };

        if let Some(failure) = result.failure_ref() {
            self.telemetry.log(
                Level::WARN,
                format!("{} failed: {failure}", request.describe()),
            );
        }
        result
    }

    /// Sends `request` and decodes a successful body according to `shape`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        shape: ResponseShape,
    ) -> ApiResult<T, ErrorResponse> {
        let raw = self.execute(request).await;
        let tags = raw.tags().clone();
        raw.fold(
            |response| match shape.decode::<T>(&response.body) {
                Ok(value) => ApiResult::success(value),
                Err(err) => ApiResult::unknown_failure(err),
            },
            ApiResult::failure,
        )
        .with_tags(&tags)
    }
}

fn classify(response: ApiResponse) -> ApiResult<ApiResponse, ErrorResponse> {
    let status = response.status.as_u16();
    if response.is_success() {
        return match embedded_errors(&response.body) {
            Some(errors) => ApiResult::api_failure(serde_json::from_value(errors).ok()),
            None => ApiResult::success(response),
        };
    }
    let error = serde_json::from_slice::<ErrorResponse>(&response.body).ok();
    ApiResult::try_http_failure(status, error).unwrap_or_else(|_| {
        ApiResult::unknown_failure(UnknownError::new(format!("unexpected status {status}")))
    })
}

/// The whole body, when it carries a non-empty top-level `errors` array.
fn embedded_errors(body: &[u8]) -> Option<Value> {
    let value: Value = serde_json::from_slice(body).ok()?;
    let has_errors = value
        .get("errors")
        .and_then(Value::as_array)
        .is_some_and(|errors| !errors.is_empty());
    has_errors.then_some(value)
}
