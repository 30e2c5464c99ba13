use std::sync::Arc;

use async_trait::async_trait;
use reqwest::header::AUTHORIZATION;
use tracing::{debug, warn};

use super::{Exchange, Stage, StageFlow};
use crate::device::DeviceIdentity;
use crate::transport::ApiResponse;

/// Stores any `Authorization` header the server hands back, whatever the status.
pub struct DeviceTokenStage {
    device: Arc<DeviceIdentity>,
}

impl DeviceTokenStage {
    #[must_use]
    pub fn new(device: Arc<DeviceIdentity>) -> Self {
        Self { device }
    }
}

#[async_trait]
impl Stage for DeviceTokenStage {
    fn name(&self) -> &'static str {
        "device_token"
    }

    async fn on_response(&self, _exchange: Exchange<'_>, response: ApiResponse) -> StageFlow {
        if let Some(value) = response.headers.get(AUTHORIZATION) {
            match value.to_str() {
                Ok(token) => {
                    self.device.persist_device_token(token);
                    debug!(event = "device_token_updated", status = response.status.as_u16());
                }
                Err(err) => warn!(event = "device_token_unreadable", error = %err),
            }
        }
        StageFlow::Continue(response)
    }
}
