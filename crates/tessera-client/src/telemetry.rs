use tracing::Level;

/// Fire-and-forget sink for failures worth reporting. Implementations must not
/// block; the pipeline never waits on them.
pub trait Telemetry: Send + Sync {
    fn log(&self, level: Level, message: String);
}

#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn log(&self, level: Level, message: String) {
        match level {
            Level::ERROR => tracing::error!(event = "telemetry", %message),
            Level::WARN => tracing::warn!(event = "telemetry", %message),
            Level::INFO => tracing::info!(event = "telemetry", %message),
            Level::DEBUG => tracing::debug!(event = "telemetry", %message),
            _ => tracing::trace!(event = "telemetry", %message),
        }
    }
}
