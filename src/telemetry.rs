//! ==============================================================================
//! telemetry.rs - notification payload and hub push
//! ==============================================================================
//!
//! purpose:
//!     builds the flat key-value payload downstream consumers (email bridge,
//!     webhook, hub) receive after each AQI computation, and pushes it to the
//!     configured hub URL. this core is agnostic to the final transport - it
//!     only produces the payload shape and one JSON POST.
//!
//! payload shape (flat, primitives only):
//!     node_id, timestamp_ms, aqi, dominant, category,
//!     aqi_<pollutant> per mapped sub-index, <pollutant> per raw value
//!
//! relationships:
//!     - called by: tasks.rs (after each background AQI computation)
//!     - config: config.rs (TelemetryConfig)
//!
//! ==============================================================================

use crate::config::TelemetryConfig;
use crate::domain::{AqiResult, Pollutant};
use crate::state::Snapshot;
use serde_json::{Map, Value};

/// Flattens one computation into the downstream payload. Absent pollutants
/// are omitted, never zero-filled.
pub fn build_payload(node_id: &str, result: &AqiResult, snapshot: &Snapshot) -> Value {
    let mut payload = Map::new();
    payload.insert("node_id".to_string(), Value::from(node_id));
    payload.insert(
        "timestamp_ms".to_string(),
        Value::from(chrono::Local::now().timestamp_millis()),
    );
    payload.insert("aqi".to_string(), Value::from(result.overall_index));
    payload.insert(
        "dominant".to_string(),
        Value::from(result.dominant.label()),
    );
    payload.insert(
        "category".to_string(),
        Value::from(result.category.label()),
    );
    for (pollutant, index) in &result.per_pollutant {
        payload.insert(format!("aqi_{}", pollutant.key()), Value::from(*index));
    }
    for pollutant in Pollutant::ALL {
        if let Some(concentration) = snapshot.concentration(pollutant) {
            payload.insert(pollutant.key().to_string(), Value::from(concentration));
        }
    }
    Value::Object(payload)
}

/// Pushes payloads to the hub. Push failures are logged and never propagate -
/// telemetry must not disturb the measurement loop.
pub struct TelemetryClient {
    client: reqwest::Client,
    hub_url: String,
    node_id: String,
}

impl TelemetryClient {
    /// `None` when telemetry is disabled or unconfigured.
    pub fn from_config(config: &TelemetryConfig) -> Option<Self> {
        if !config.enabled || config.hub_url.is_empty() {
            return None;
        }
        Some(Self {
            client: reqwest::Client::new(),
            hub_url: config.hub_url.clone(),
            node_id: config.node_id.clone(),
        })
    }

    pub async fn push(&self, result: &AqiResult, snapshot: &Snapshot) {
        let payload = build_payload(&self.node_id, result, snapshot);
        match self.client.post(&self.hub_url).json(&payload).send().await {
            Ok(response) if response.status().is_success() => {
                tracing::debug!("telemetry pushed to {}", self.hub_url);
            }
            Ok(response) => {
                tracing::warn!("hub rejected telemetry: {}", response.status());
            }
            Err(e) => {
                tracing::warn!("telemetry push failed: {}", e);
            }
        }
    }
}
