//! Fire-and-forget named-event telemetry.
//!
//! Pipeline code reports milestones (`image_compressed`, `gallery_created`,
//! `gallery_upload_complete`, `gallery_upload_error`) through the [`Telemetry`]
//! trait. Sinks must never fail the caller: there is no return value and no
//! retry. [`TracingTelemetry`] forwards events to `tracing` under the
//! `telemetry` target; [`NoopTelemetry`] drops them.

use serde_json::{Map, Value};
use std::sync::Arc;

/// A named event with flat key/value fields.
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryEvent {
    pub name: &'static str,
    pub fields: Map<String, Value>,
}

impl TelemetryEvent {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            fields: Map::new(),
        }
    }

    pub fn with(mut self, key: &str, value: impl Into<Value>) -> Self {
        self.fields.insert(key.to_string(), value.into());
        self
    }
}

pub trait Telemetry: Send + Sync {
    fn log_event(&self, event: TelemetryEvent);
}

/// Emits each event as an `info` log line with target `telemetry`.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingTelemetry;

impl Telemetry for TracingTelemetry {
    fn log_event(&self, event: TelemetryEvent) {
        // Bound outside the macro: its expansion shadows `Value` with `tracing::field::Value`.
        let fields = Value::Object(event.fields);
        tracing::info!(
            target: "telemetry",
            event = event.name,
            fields = %fields,
            "telemetry event"
        );
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NoopTelemetry;

impl Telemetry for NoopTelemetry {
    fn log_event(&self, _event: TelemetryEvent) {}
}

/// Shared handle used across the pipeline.
pub type SharedTelemetry = Arc<dyn Telemetry>;

pub fn noop() -> SharedTelemetry {
    Arc::new(NoopTelemetry)
}
