use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use serde_json::Value;

/// Identity fields declared at registration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdapterMetadata {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub version: String,
    pub description: String,
    /// Opaque configuration, untouched by the core.
    #[serde(default)]
    pub config: HashMap<String, Value>,
    /// Names of other adapters this one depends on.
    #[serde(default)]
    pub dependencies: Vec<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AdapterMetricsSnapshot {
    pub requests_total: u64,
    pub requests_failed: u64,
    pub active_connections: u64,
    pub recent_latency_ewma_millis: f64,
}
