use async_trait::async_trait;
use gateway_context::context::RequestContext;
use gateway_protocol::content::AdapterContent;
use gateway_protocol::definitions::{PromptDefinition, ResourceDefinition, ToolDefinition};
use serde_json::Value;
use std::collections::HashMap;

use crate::error::AdapterError;
use crate::metadata::{AdapterMetadata, AdapterMetricsSnapshot};
use crate::state::AdapterState;

/// The full capability surface every registered service implements:
/// metadata, lifecycle, capability enumeration, execution, and
/// observability. Avoid deep inheritance; the two concrete variants
/// (`InProcessAdapter`, `HttpAdapter`) compose this trait with a shared
/// state machine rather than subclassing a base type.
#[async_trait]
pub trait AdapterCapability: Send + Sync {
    fn metadata(&self) -> &AdapterMetadata;

    fn status(&self) -> AdapterState;

    async fn initialize(&self, config: HashMap<String, Value>) -> Result<(), AdapterError>;
    async fn start(&self, ctx: &RequestContext) -> Result<(), AdapterError>;
    async fn stop(&self, ctx: &RequestContext) -> Result<(), AdapterError>;

    /// Marks the adapter `stopping`: the registry stops selecting it but
    /// in-flight requests may continue.
    /// Idempotent; returns `false` only if the adapter isn't `running`.
    fn quiesce(&self) -> bool;

    fn get_tools(&self) -> Vec<ToolDefinition>;
    fn get_resources(&self) -> Vec<ResourceDefinition>;
    fn get_prompts(&self) -> Vec<PromptDefinition>;

    async fn execute_tool(&self, ctx: &RequestContext, name: &str, arguments: Value) -> Result<AdapterContent, AdapterError>;
    async fn get_resource(&self, ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError>;

    async fn health_check(&self, ctx: &RequestContext) -> Result<(), AdapterError>;
    fn get_metrics(&self) -> AdapterMetricsSnapshot;

    /// Forced into `error` by the registry's health-probe loop after three
    /// consecutive failed health checks.
    fn mark_unhealthy(&self);
    /// Recovers from `error` back to `running` after a successful probe.
    fn mark_recovered(&self);
}
