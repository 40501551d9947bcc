use async_trait::async_trait;
use gateway_context::context::RequestContext;
use gateway_protocol::content::AdapterContent;
use gateway_protocol::definitions::{CapabilityManifest, PromptDefinition, ResourceDefinition, ToolDefinition};
use serde_json::{json, Value};
use std::collections::HashMap;

use crate::capability::AdapterCapability;
use crate::error::AdapterError;
use crate::metadata::{AdapterMetadata, AdapterMetricsSnapshot};
use crate::state::{AdapterState, AdapterStateCell};

const GATEWAY_USER_AGENT: &str = concat!("mcp-gateway/", env!("CARGO_PKG_VERSION"));

/// Adapter proxying to a remote backend over the back-edge JSON-RPC dialect:
/// `/adapter/register`, `/adapter/health`,
/// `/adapter/capabilities`, `/tools/{name}/execute`, `/resources/read`.
pub struct HttpAdapter {
    metadata: AdapterMetadata,
    base_url: String,
    client: reqwest::Client,
    state: AdapterStateCell,
    manifest: parking_lot::RwLock<CapabilityManifest>,
    metrics: parking_lot::Mutex<AdapterMetricsSnapshot>,
}

impl HttpAdapter {
    pub fn new(metadata: AdapterMetadata, base_url: impl Into<String>, client: reqwest::Client) -> Self {
        Self {
            metadata,
            base_url: base_url.into(),
            client,
            state: AdapterStateCell::default(),
            manifest: parking_lot::RwLock::new(CapabilityManifest::default()),
            metrics: parking_lot::Mutex::new(AdapterMetricsSnapshot::default()),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url.trim_end_matches('/'), path)
    }

    fn request_error(context: &str, err: reqwest::Error) -> AdapterError {
        AdapterError::new("network_error", format!("{context}: {err}"), true)
            .with_suggestion("check backend connectivity")
    }

    fn status_error(context: &str, status: reqwest::StatusCode) -> AdapterError {
        let retryable = status.is_server_error();
        AdapterError::new("backend_error", format!("{context}: backend responded {status}"), retryable)
    }
}

#[async_trait]
impl AdapterCapability for HttpAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    fn status(&self) -> AdapterState {
        self.state.get()
    }

    async fn initialize(&self, config: HashMap<String, Value>) -> Result<(), AdapterError> {
        let response = self
            .client
            .post(self.url("/adapter/register"))
            .header("User-Agent", GATEWAY_USER_AGENT)
            .header("Accept", "application/json")
            .json(&json!({ "metadata": &self.metadata, "config": config }))
            .send()
            .await
            .map_err(|e| Self::request_error("register", e))?;

        if !response.status().is_success() {
            return Err(Self::status_error("register", response.status()));
        }

        let capabilities = self
            .client
            .get(self.url("/adapter/capabilities"))
            .header("User-Agent", GATEWAY_USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Self::request_error("capabilities", e))?
            .json::<CapabilityManifest>()
            .await
            .map_err(|e| AdapterError::new("invalid_manifest", e.to_string(), false))?;

        capabilities
            .validate()
            .map_err(|e| AdapterError::new("manifest_invalid", e.to_string(), false))?;
        *self.manifest.write() = capabilities;

        if !self.state.transition(AdapterState::Initialized) {
            return Err(AdapterError::new("invalid_state_transition", "cannot initialize from current state", false));
        }
        Ok(())
    }

    async fn start(&self, _ctx: &RequestContext) -> Result<(), AdapterError> {
        if !self.state.transition(AdapterState::Starting) {
            return Err(AdapterError::new("invalid_state_transition", "cannot start from current state", false));
        }
        if !self.state.transition(AdapterState::Running) {
            self.state.force_error();
            return Err(AdapterError::new("start_failed", "failed to reach running state", false));
        }
        Ok(())
    }

    async fn stop(&self, _ctx: &RequestContext) -> Result<(), AdapterError> {
        if self.state.get() == AdapterState::Running && !self.state.transition(AdapterState::Stopping) {
            return Err(AdapterError::new("invalid_state_transition", "cannot stop from current state", false));
        }
        self.state.transition(AdapterState::Stopped);
        Ok(())
    }

    fn quiesce(&self) -> bool {
        self.state.get() == AdapterState::Stopping || self.state.transition(AdapterState::Stopping)
    }

    fn get_tools(&self) -> Vec<ToolDefinition> {
        self.manifest.read().tools.clone()
    }

    fn get_resources(&self) -> Vec<ResourceDefinition> {
        self.manifest.read().resources.clone()
    }

    fn get_prompts(&self) -> Vec<PromptDefinition> {
        self.manifest.read().prompts.clone()
    }

    async fn execute_tool(&self, _ctx: &RequestContext, name: &str, arguments: Value) -> Result<AdapterContent, AdapterError> {
        let response = self
            .client
            .post(self.url(&format!("/tools/{name}/execute")))
            .header("User-Agent", GATEWAY_USER_AGENT)
            .header("Accept", "application/json")
            .json(&json!({ "arguments": arguments }))
            .send()
            .await
            .map_err(|e| Self::request_error("execute_tool", e));

        let mut metrics = self.metrics.lock();
        metrics.requests_total += 1;
        if response.is_err() {
            metrics.requests_failed += 1;
        }
        drop(metrics);

        let response = response?;
        if !response.status().is_success() {
            self.metrics.lock().requests_failed += 1;
            return Err(Self::status_error("execute_tool", response.status()));
        }
        response
            .json::<AdapterContent>()
            .await
            .map_err(|e| AdapterError::new("invalid_response", e.to_string(), false))
    }

    async fn get_resource(&self, _ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError> {
        let response = self
            .client
            .post(self.url("/resources/read"))
            .header("User-Agent", GATEWAY_USER_AGENT)
            .header("Accept", "application/json")
            .json(&json!({ "uri": uri }))
            .send()
            .await
            .map_err(|e| Self::request_error("get_resource", e))?;

        if !response.status().is_success() {
            return Err(Self::status_error("get_resource", response.status()));
        }
        response
            .json::<AdapterContent>()
            .await
            .map_err(|e| AdapterError::new("invalid_response", e.to_string(), false))
    }

    async fn health_check(&self, _ctx: &RequestContext) -> Result<(), AdapterError> {
        let response = self
            .client
            .get(self.url("/adapter/health"))
            .header("User-Agent", GATEWAY_USER_AGENT)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| Self::request_error("health_check", e))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(Self::status_error("health_check", response.status()))
        }
    }

    fn get_metrics(&self) -> AdapterMetricsSnapshot {
        self.metrics.lock().clone()
    }

    fn mark_unhealthy(&self) {
        self.state.force_error();
    }

    fn mark_recovered(&self) {
        self.state.recover_to_running();
    }
}
