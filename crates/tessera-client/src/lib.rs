#![allow(clippy::pedantic)]
#![allow(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![allow(clippy::missing_errors_doc)]

pub mod api;
pub mod assertion;
pub mod config;
pub mod device;
pub mod pipeline;
pub mod sdk;
pub mod single_flight;
pub mod state;
pub mod telemetry;
pub mod tokens;
pub mod transport;

pub use crate::api::{ApiClient, ResponseShape};
pub use crate::assertion::{
    AssertionCoordinator, AssertionRequirement, IntegrityError, IntegrityProvider,
    RemediationDecision, UnavailableIntegrity,
};
pub use crate::config::{ConfigError, KeyEnvironment, PublishableKey, SdkConfig};
pub use crate::device::DeviceIdentity;
pub use crate::pipeline::{Exchange, Pipeline, PipelineBuilder, Stage, StageFlow};
pub use crate::sdk::{Sdk, SdkBuilder};
pub use crate::single_flight::SingleFlight;
pub use crate::state::{ClientStateStore, InMemoryClientState};
pub use crate::telemetry::{Telemetry, TracingTelemetry};
pub use crate::tokens::{cache_key, CacheEntry, GetTokenOptions, TokenCache, TokenFetcher};
pub use crate::transport::{ApiRequest, ApiResponse, HttpTransport, RequestBody, Transport};
