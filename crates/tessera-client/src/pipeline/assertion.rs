use async_trait::async_trait;

use super::{Exchange, Stage, StageFlow};
use crate::assertion::{AssertionCoordinator, RemediationDecision};
use crate::transport::ApiResponse;

/// Remediates `requires_assertion` failures and asks for one retry.
pub struct AssertionStage {
    coordinator: AssertionCoordinator,
}

impl AssertionStage {
    #[must_use]
    pub fn new(coordinator: AssertionCoordinator) -> Self {
        Self { coordinator }
    }
}

#[async_trait]
impl Stage for AssertionStage {
    fn name(&self) -> &'static str {
        "assertion"
    }

    async fn on_response(&self, exchange: Exchange<'_>, response: ApiResponse) -> StageFlow {
        // A retried response is returned as-is, even if it asks again.
        if response.is_success() || exchange.retried {
            return StageFlow::Continue(response);
        }
        match self.coordinator.handle(exchange.request, &response).await {
            RemediationDecision::Retry => StageFlow::Retry(response),
            RemediationDecision::NoRetry | RemediationDecision::HandledNoRetry => {
                StageFlow::Continue(response)
            }
        }
    }
}
