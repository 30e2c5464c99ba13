use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::{HeaderName, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use tessera_core::endpoints;
use tracing::warn;

use super::Stage;
use crate::device::DeviceIdentity;
use crate::state::ClientStateStore;
use crate::transport::{ApiRequest, RequestBody, FORM_CONTENT_TYPE};

pub const API_VERSION_HEADER: &str = "x-api-version";
pub const SDK_VERSION_HEADER: &str = "x-sdk-version";
pub const MOBILE_HEADER: &str = "x-mobile";
pub const DEVICE_ID_HEADER: &str = "x-native-device-id";
pub const CLIENT_ID_HEADER: &str = "x-client-id";
pub const NATIVE_QUERY_PARAM: &str = "_is_native";

pub fn sdk_version() -> String {
    format!("tessera-rust/{}", env!("CARGO_PKG_VERSION"))
}

/// Protocol headers, device identity and the native-client query marker.
pub struct HeaderStage {
    api_version: String,
    device: Arc<DeviceIdentity>,
    state: Arc<dyn ClientStateStore>,
}

impl HeaderStage {
    #[must_use]
    pub fn new(
        api_version: impl Into<String>,
        device: Arc<DeviceIdentity>,
        state: Arc<dyn ClientStateStore>,
    ) -> Self {
        Self {
            api_version: api_version.into(),
            device,
            state,
        }
    }
}

#[async_trait]
impl Stage for HeaderStage {
    fn name(&self) -> &'static str {
        "headers"
    }

    fn prepare(&self, request: &mut ApiRequest) {
        set_header(request, API_VERSION_HEADER, &self.api_version);
        set_header(request, SDK_VERSION_HEADER, &sdk_version());
        set_header(request, MOBILE_HEADER, "1");
        set_header(request, DEVICE_ID_HEADER, self.device.device_id());
        if let Some(client_id) = self.state.current_client_id() {
            set_header(request, CLIENT_ID_HEADER, &client_id);
        }
        if let Some(token) = self.device.device_token() {
            set_header(request, AUTHORIZATION.as_str(), &token);
        }

        if !request.query.iter().any(|(key, _)| key == NATIVE_QUERY_PARAM) {
            request
                .query
                .push((NATIVE_QUERY_PARAM.to_string(), "1".to_string()));
        }

        if request.path == endpoints::PROFILE_IMAGE {
            request.headers.remove(CONTENT_TYPE);
        } else if !matches!(request.body, RequestBody::Raw { .. })
            && !request.headers.contains_key(CONTENT_TYPE)
        {
            request
                .headers
                .insert(CONTENT_TYPE, HeaderValue::from_static(FORM_CONTENT_TYPE));
        }
    }
}

fn set_header(request: &mut ApiRequest, name: &str, value: &str) {
    let name = match HeaderName::from_bytes(name.as_bytes()) {
        Ok(name) => name,
        Err(err) => {
            warn!(event = "header_skipped", header = name, error = %err);
            return;
        }
    };
    match HeaderValue::from_str(value) {
        Ok(value) => {
            request.headers.insert(name, value);
        }
        Err(err) => warn!(event = "header_skipped", header = %name, error = %err),
    }
}
