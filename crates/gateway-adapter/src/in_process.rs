use async_trait::async_trait;
use gateway_context::context::RequestContext;
use gateway_protocol::content::AdapterContent;
use gateway_protocol::definitions::{CapabilityManifest, PromptDefinition, ResourceDefinition, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

use crate::capability::AdapterCapability;
use crate::error::AdapterError;
use crate::metadata::{AdapterMetadata, AdapterMetricsSnapshot};
use crate::state::{AdapterState, AdapterStateCell};

/// Business logic supplied by whatever embeds the gateway for an in-process
/// adapter. The adapter itself only owns lifecycle/state bookkeeping; tool
/// execution and resource reads are delegated here.
#[async_trait]
pub trait LocalToolHandler: Send + Sync {
    async fn execute_tool(&self, ctx: &RequestContext, name: &str, arguments: Value) -> Result<AdapterContent, AdapterError>;
    async fn read_resource(&self, ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError>;
    async fn health_check(&self, ctx: &RequestContext) -> Result<(), AdapterError> {
        let _ = ctx;
        Ok(())
    }
}

/// An adapter whose tools/resources run as local function calls in this
/// process.
pub struct InProcessAdapter {
    metadata: AdapterMetadata,
    manifest: CapabilityManifest,
    state: AdapterStateCell,
    handler: Arc<dyn LocalToolHandler>,
    metrics: parking_lot::Mutex<AdapterMetricsSnapshot>,
}

impl InProcessAdapter {
    pub fn new(metadata: AdapterMetadata, manifest: CapabilityManifest, handler: Arc<dyn LocalToolHandler>) -> Self {
        Self {
            metadata,
            manifest,
            state: AdapterStateCell::default(),
            handler,
            metrics: parking_lot::Mutex::new(AdapterMetricsSnapshot::default()),
        }
    }
}

#[async_trait]
impl AdapterCapability for InProcessAdapter {
    fn metadata(&self) -> &AdapterMetadata {
        &self.metadata
    }

    fn status(&self) -> AdapterState {
        self.state.get()
    }

    async fn initialize(&self, _config: HashMap<String, Value>) -> Result<(), AdapterError> {
        self.manifest
            .validate()
            .map_err(|e| AdapterError::new("manifest_invalid", e.to_string(), false))?;
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
        self.manifest.tools.clone()
    }

    fn get_resources(&self) -> Vec<ResourceDefinition> {
        self.manifest.resources.clone()
    }

    fn get_prompts(&self) -> Vec<PromptDefinition> {
        self.manifest.prompts.clone()
    }

    async fn execute_tool(&self, ctx: &RequestContext, name: &str, arguments: Value) -> Result<AdapterContent, AdapterError> {
        let result = self.handler.execute_tool(ctx, name, arguments).await;
        let mut metrics = self.metrics.lock();
        metrics.requests_total += 1;
        if result.is_err() {
            metrics.requests_failed += 1;
        }
        result
    }

    async fn get_resource(&self, ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError> {
        self.handler.read_resource(ctx, uri).await
    }

    async fn health_check(&self, ctx: &RequestContext) -> Result<(), AdapterError> {
        self.handler.health_check(ctx).await
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

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_context::context::{RequestIdentity, ResourceSnapshot};

    struct EchoHandler;

    #[async_trait]
    impl LocalToolHandler for EchoHandler {
        async fn execute_tool(&self, _ctx: &RequestContext, name: &str, _arguments: Value) -> Result<AdapterContent, AdapterError> {
            Ok(AdapterContent::single_text(format!("ran {name}")))
        }

        async fn read_resource(&self, _ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError> {
            Ok(AdapterContent::single_text(format!("read {uri}")))
        }
    }

    fn ctx() -> RequestContext {
        RequestContext::new(
            RequestIdentity::new(None, None, None, None),
            None,
            ResourceSnapshot { memory_bytes: 0, task_count: 0 },
        )
    }

    fn metadata() -> AdapterMetadata {
        AdapterMetadata {
            id: "weather-1".into(),
            name: "weather".into(),
            service_type: "tool_provider".into(),
            version: "1.0.0".into(),
            description: "weather".into(),
            config: HashMap::new(),
            dependencies: Vec::new(),
        }
    }

    #[tokio::test]
    async fn lifecycle_reaches_running_and_stops() {
        let adapter = InProcessAdapter::new(metadata(), CapabilityManifest::default(), Arc::new(EchoHandler));
        adapter.initialize(HashMap::new()).await.unwrap();
        adapter.start(&ctx()).await.unwrap();
        assert_eq!(adapter.status(), AdapterState::Running);

        adapter.stop(&ctx()).await.unwrap();
        assert_eq!(adapter.status(), AdapterState::Stopped);
    }

    #[tokio::test]
    async fn execute_tool_delegates_to_handler_and_counts_metrics() {
        let adapter = InProcessAdapter::new(metadata(), CapabilityManifest::default(), Arc::new(EchoHandler));
        adapter.initialize(HashMap::new()).await.unwrap();
        adapter.start(&ctx()).await.unwrap();

        let result = adapter.execute_tool(&ctx(), "get_weather", Value::Null).await.unwrap();
        assert_eq!(result.content.len(), 1);
        assert_eq!(adapter.get_metrics().requests_total, 1);
    }

    #[tokio::test]
    async fn cannot_start_before_initialize() {
        let adapter = InProcessAdapter::new(metadata(), CapabilityManifest::default(), Arc::new(EchoHandler));
        assert!(adapter.start(&ctx()).await.is_err());
    }
}
