//! `/v1/admin/*` handlers: health summary, metric snapshot, reload
//! submission, and reload history (the latter supplements spec.md's HTTP
//! surface table per SPEC_FULL.md §12, since spec.md §4.7 promises audit
//! history with nowhere in §6 to read it back from).

use std::collections::HashMap;

use gateway_adapter::http::HttpAdapter;
use gateway_adapter::metadata::AdapterMetadata;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::app::GatewayState;

pub fn health(state: &GatewayState) -> Value {
    let adapters: HashMap<String, Value> = state
        .registry
        .health()
        .into_iter()
        .map(|(id, adapter_state)| (id, json!(adapter_state)))
        .collect();

    let stats = state.memory_monitor.last_stats();
    json!({
        "status": if state.memory_monitor.over_threshold() { "degraded" } else { "ok" },
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "adapters": adapters,
        "memory": {
            "allocated_bytes": stats.allocated_bytes,
            "heap_bytes": stats.heap_bytes,
            "over_threshold": state.memory_monitor.over_threshold(),
        },
        "pool": {
            "active_tasks": state.pool.active_tasks(),
            "queued_tasks": state.pool.queued_tasks(),
        },
    })
}

pub fn metrics(state: &GatewayState) -> Value {
    let request_metrics = state.router.metrics().snapshot();
    json!({
        "mcp_requests_total": request_metrics.mcp_requests_total,
        "mcp_requests_failed_total": request_metrics.mcp_requests_failed_total,
        "worker_pool": {
            "active_tasks": state.pool.active_tasks(),
            "queued_tasks": state.pool.queued_tasks(),
            "available_capacity": state.pool.available_capacity(),
        },
        "memory": {
            "allocated_bytes": state.memory_monitor.last_stats().allocated_bytes,
            "over_threshold": state.memory_monitor.over_threshold(),
        },
    })
}

pub fn reloads(state: &GatewayState) -> Value {
    json!({
        "active": state.reload_controller.get_active_reloads(),
        "history": state.reload_controller.history(),
    })
}

/// Body accepted by `POST /v1/admin/reload`. The adapter implementations
/// themselves are an external collaborator (spec.md §1); this endpoint can
/// only swap in the one adapter variant the core knows how to construct
/// generically — an `HttpAdapter` proxy to a backend that already speaks
/// the back-edge dialect (spec.md §6).
#[derive(Debug, Deserialize)]
pub struct ReloadRequest {
    pub service_type: String,
    pub plugin_name: String,
    pub version: String,
    #[serde(default)]
    pub description: String,
    pub base_url: String,
    #[serde(default = "default_weight")]
    pub weight: f64,
    #[serde(default)]
    pub config: HashMap<String, Value>,
    #[serde(default)]
    pub dependencies: Vec<String>,
}

fn default_weight() -> f64 {
    1.0
}

pub async fn reload(state: &GatewayState, request: ReloadRequest) -> Result<Value, String> {
    let metadata = AdapterMetadata {
        id: format!("{}-{}", request.plugin_name, request.version),
        name: request.plugin_name.clone(),
        service_type: request.service_type.clone(),
        version: request.version.clone(),
        description: request.description,
        config: request.config.clone(),
        dependencies: request.dependencies,
    };
    let adapter = std::sync::Arc::new(HttpAdapter::new(metadata, request.base_url, reqwest::Client::new()));

    let op = state
        .reload_controller
        .reload(&request.service_type, &request.plugin_name, adapter, request.weight, request.config)
        .await
        .map_err(|e| e.to_string())?;

    Ok(json!(op))
}
