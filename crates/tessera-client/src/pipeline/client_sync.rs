use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tessera_core::Client;
use tracing::{info, warn};

use super::{Exchange, Stage, StageFlow};
use crate::state::ClientStateStore;
use crate::transport::ApiResponse;

/// Publishes the `client` object piggybacked on successful JSON responses.
pub struct ClientSyncStage {
    state: Arc<dyn ClientStateStore>,
}

impl ClientSyncStage {
    #[must_use]
    pub fn new(state: Arc<dyn ClientStateStore>) -> Self {
        Self { state }
    }
}

#[async_trait]
impl Stage for ClientSyncStage {
    fn name(&self) -> &'static str {
        "client_sync"
    }

    async fn on_response(&self, _exchange: Exchange<'_>, response: ApiResponse) -> StageFlow {
        if response.is_success() && response.is_json() {
            match sync_client_from_body(self.state.as_ref(), &response.body) {
                Ok(Some(client_id)) => info!(event = "client_synced", client_id = %client_id),
                Ok(None) => {}
                Err(err) => warn!(event = "client_sync_failed", error = %err),
            }
        }
        StageFlow::Continue(response)
    }
}

/// Returns the id of the published client, or `None` when the body carries
/// no client.
pub fn sync_client_from_body(
    state: &dyn ClientStateStore,
    body: &[u8],
) -> Result<Option<String>, serde_json::Error> {
    let mut value: Value = serde_json::from_slice(body)?;
    let client = match value.get_mut("client").map(Value::take) {
        Some(Value::Null) | None => return Ok(None),
        Some(client) => client,
    };
    let client: Client = serde_json::from_value(client)?;
    Ok(Some(publish_client(state, client)))
}

/// Replaces the shared snapshot with `client` and returns its id.
pub fn publish_client(state: &dyn ClientStateStore, client: Client) -> String {
    let id = client.id.clone();
    state.update(client);
    id
}
