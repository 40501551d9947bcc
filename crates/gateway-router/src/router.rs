use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use gateway_adapter::capability::AdapterCapability;
use gateway_adapter::error::AdapterError;
use gateway_context::context::{RequestContext, RequestIdentity, ResourceSnapshot};
use gateway_jsonrpc::error::{JsonRpcError, JsonRpcErrorObject};
use gateway_jsonrpc::request::{JsonRpcEnvelope, RequestParams};
use gateway_jsonrpc::response::JsonRpcMessage;
use gateway_jsonrpc::types::RequestId;
use gateway_protocol::content::AdapterContent;
use gateway_protocol::error::{ErrorCategory, GatewayError};
use gateway_protocol::method;
use gateway_registry::record::RegisteredService;
use gateway_registry::registry::{RegistryError, SelectionCriteria, ServiceRegistry};
use gateway_resilience::memory_monitor::{MemoryMonitor, WaitError};
use gateway_resilience::worker_pool::{BoxedTask, SubmitOutcome, WorkerPool};
use serde_json::{json, Value};

use crate::config::RouterConfig;
use crate::dispatch::{self, RouteKind};
use crate::error::wrap_adapter_error;
use crate::metrics::RouterMetrics;

/// Identity hints lifted from transport-level headers; `None` fields let
/// `RequestIdentity::new` generate fresh ids.
#[derive(Debug, Clone, Default)]
pub struct RequestHeaders {
    pub trace_id: Option<String>,
    pub span_id: Option<String>,
    pub user_id: Option<String>,
    pub session_id: Option<String>,
}

/// Implements the seven-step pipeline: admission, parse & validate, route,
/// select, dispatch, retry, respond. One instance is shared across every
/// inbound connection.
#[derive(Clone)]
pub struct Router {
    registry: Arc<ServiceRegistry>,
    pool: WorkerPool,
    memory_monitor: MemoryMonitor,
    config: Arc<RouterConfig>,
    metrics: Arc<RouterMetrics>,
}

impl Router {
    pub fn new(registry: Arc<ServiceRegistry>, pool: WorkerPool, memory_monitor: MemoryMonitor, config: RouterConfig) -> Self {
        Self {
            registry,
            pool,
            memory_monitor,
            config: Arc::new(config),
            metrics: Arc::new(RouterMetrics::new()),
        }
    }

    pub fn metrics(&self) -> &RouterMetrics {
        &self.metrics
    }

    fn resource_snapshot(&self) -> ResourceSnapshot {
        ResourceSnapshot {
            memory_bytes: self.memory_monitor.last_stats().allocated_bytes,
            task_count: self.pool.active_tasks() as u64,
        }
    }

    /// Entry point for a single HTTP body. Returns `None` for notifications
    /// and for malformed-but-notification-shaped input (id-less requests get
    /// no response body per JSON-RPC 2.0); otherwise returns exactly one
    /// `JsonRpcMessage` to serialize back to the caller.
    pub async fn handle(&self, raw_body: &[u8], headers: RequestHeaders) -> Option<JsonRpcMessage> {
        self.metrics.record_request();

        // Step 1: admission. An oversized body is rejected the same way a
        // malformed envelope is (spec.md §8 Boundaries: "parse error"), since
        // it's never even attempted to be parsed.
        if raw_body.len() > self.config.max_request_size {
            self.metrics.record_failure();
            return Some(JsonRpcMessage::Error(JsonRpcError::parse_error()));
        }

        let identity = RequestIdentity::new(headers.trace_id, headers.span_id, headers.user_id, headers.session_id);
        let trace_id = identity.trace_id.clone();
        let ctx = Arc::new(RequestContext::new(identity, Some(self.config.request_timeout), self.resource_snapshot()));

        let admission_budget = ctx.remaining_timeout().unwrap_or(self.config.request_timeout);
        let admitted = tokio::time::timeout(admission_budget, self.memory_monitor.wait_if_needed(&ctx.cancellation_token())).await;
        match admitted {
            Ok(Ok(())) => {}
            Ok(Err(WaitError::Cancelled)) | Err(_) => {
                self.metrics.record_failure();
                ctx.add_breadcrumb("admission_rejected", json!({"reason": "memory_pressure"}));
                ctx.complete(self.resource_snapshot());
                let err = GatewayError::new(
                    ErrorCategory::Resource,
                    "gateway",
                    "admission",
                    "memory pressure did not subside before the admission deadline",
                )
                .with_retry_after(1);
                return Some(JsonRpcMessage::failure(None, err.to_error_object(&trace_id)));
            }
        }
        ctx.add_breadcrumb("admitted", json!({}));

        // Step 2: parse & validate.
        let envelope: JsonRpcEnvelope = match serde_json::from_slice(raw_body) {
            Ok(envelope) => envelope,
            Err(_) => {
                self.metrics.record_failure();
                ctx.complete(self.resource_snapshot());
                return Some(JsonRpcMessage::Error(JsonRpcError::parse_error()));
            }
        };
        ctx.add_breadcrumb("parsed", json!({"method": envelope.method}));

        if envelope.method.is_empty() {
            self.metrics.record_failure();
            ctx.complete(self.resource_snapshot());
            return Some(JsonRpcMessage::Error(JsonRpcError::invalid_request(envelope.id)));
        }

        if !method::is_known_method(&envelope.method) {
            tracing::warn!(method = %envelope.method, "unknown method, routing anyway");
        }

        if let Some(field) = method::missing_required_field(&envelope.method, envelope.params.as_ref()) {
            let err = JsonRpcErrorObject::invalid_params(&format!("missing required field '{field}'"), None);
            if envelope.is_notification() {
                self.metrics.record_failure();
                ctx.complete(self.resource_snapshot());
                return None;
            }
            self.metrics.record_failure();
            ctx.complete(self.resource_snapshot());
            return Some(JsonRpcMessage::failure(envelope.id, err));
        }

        // Step 3: route.
        let service_type = method::service_type_for(&envelope.method);
        let kind = dispatch::classify(&envelope.method, envelope.params.as_ref());
        let method_known = method::is_known_method(&envelope.method);
        ctx.add_breadcrumb("routed", json!({"service_type": service_type}));

        if envelope.is_notification() {
            let router = self.clone();
            let method_name = envelope.method.clone();
            tokio::spawn(async move {
                let _ = router.invoke(&ctx, &service_type, &method_name, kind, method_known).await;
                ctx.complete(router.resource_snapshot());
            });
            return None;
        }

        let id = envelope.id.unwrap_or(RequestId::Null);
        let result = self.invoke(&ctx, &service_type, &envelope.method, kind, method_known).await;
        ctx.complete(self.resource_snapshot());

        // Step 7: respond.
        match result {
            Ok(value) => Some(JsonRpcMessage::success(id, value)),
            Err(err) => {
                self.metrics.record_failure();
                Some(JsonRpcMessage::failure(Some(id), err.to_error_object(&trace_id)))
            }
        }
    }

    /// Steps 4-6 (select, dispatch, retry) plus the protocol-level methods
    /// that never touch an adapter.
    async fn invoke(
        &self,
        ctx: &Arc<RequestContext>,
        service_type: &str,
        method: &str,
        kind: RouteKind,
        method_known: bool,
    ) -> Result<Value, GatewayError> {
        match kind {
            RouteKind::Protocol => Ok(protocol_response(method)),
            RouteKind::ListTools => {
                let selection = self.select(service_type, method, method_known)?;
                Ok(json!({ "tools": selection.adapter.get_tools() }))
            }
            RouteKind::ListResources => {
                let selection = self.select(service_type, method, method_known)?;
                Ok(json!({ "resources": selection.adapter.get_resources() }))
            }
            RouteKind::ListPrompts => {
                let selection = self.select(service_type, method, method_known)?;
                Ok(json!({ "prompts": selection.adapter.get_prompts() }))
            }
            RouteKind::GetPrompt { name, arguments } => {
                let selection = self.select(service_type, method, method_known)?;
                let prompt = selection
                    .adapter
                    .get_prompts()
                    .into_iter()
                    .find(|p| p.name == name)
                    .ok_or_else(|| GatewayError::new(ErrorCategory::Validation, service_type, method, format!("no prompt named '{name}'")))?;
                let rendered = gateway_protocol::template::render(&prompt.template, &arguments)
                    .map_err(|e| GatewayError::new(ErrorCategory::Validation, service_type, method, e.to_string()))?;
                Ok(json!({
                    "messages": [{ "role": "user", "content": { "type": "text", "text": rendered } }]
                }))
            }
            kind @ (RouteKind::ExecuteTool { .. } | RouteKind::ReadResource { .. } | RouteKind::Generic { .. }) => {
                let tool_name = if let RouteKind::ExecuteTool { name, .. } = &kind { Some(name.clone()) } else { None };
                let content = self.dispatch_with_retry(ctx, service_type, method, kind, method_known).await?;
                if self.config.validate_responses {
                    if let Some(tool_name) = tool_name {
                        self.validate_response_schema(service_type, &tool_name, &content)?;
                    }
                }
                Ok(serde_json::to_value(content).unwrap_or(Value::Null))
            }
        }
    }

    /// Looks up a healthy adapter for `service_type`. When the *method* that
    /// produced this lookup isn't on the whitelist (`method_known == false`),
    /// an empty candidate set means the method itself doesn't exist rather
    /// than a known service being transiently unavailable, so it surfaces as
    /// `-32601 method_not_found` instead of `-32004 service_unavailable`.
    fn select(&self, service_type: &str, operation: &str, method_known: bool) -> Result<Arc<RegisteredService>, GatewayError> {
        self.registry
            .select_service(service_type, &SelectionCriteria { lb_strategy: self.config.lb_strategy, metadata: HashMap::new() })
            .map_err(|err| {
                if method_known {
                    service_unavailable(service_type, operation, &err)
                } else {
                    method_not_found(operation)
                }
            })
    }

    /// Best-effort structural check of a `tools/call` response against the
    /// tool's declared `outputSchema`, gated behind `config.validate_responses`.
    /// Looks the tool definition up through a fresh selection rather than the
    /// adapter instance that actually served the request — every adapter
    /// registered for a service type is expected to honor the same
    /// declared shape, and dispatch may have retried across instances.
    /// Silently passes if no manifest, tool, or schema can be found: this is
    /// a response-shape check, not a routing decision.
    fn validate_response_schema(&self, service_type: &str, tool_name: &str, content: &AdapterContent) -> Result<(), GatewayError> {
        let Ok(selection) = self.select(service_type, tool_name, true) else { return Ok(()) };
        let Some(tool) = selection.adapter.get_tools().into_iter().find(|t| t.name == tool_name) else { return Ok(()) };
        let Some(schema) = &tool.output_schema else { return Ok(()) };
        let Some(structured) = content.content.iter().find_map(|block| match block {
            gateway_protocol::content::ContentBlock::Structured { data, .. } => Some(data),
            _ => None,
        }) else {
            return Ok(());
        };

        gateway_protocol::schema::validate(schema, structured).map_err(|err| {
            GatewayError::new(ErrorCategory::Internal, service_type, tool_name, format!("response failed output schema validation: {err}"))
        })
    }

    /// Steps 5-6: dispatch within the selected adapter's breaker and the
    /// worker pool, retrying with linear backoff on a retryable failure and
    /// re-selecting (possibly a different instance) between attempts.
    async fn dispatch_with_retry(
        &self,
        ctx: &Arc<RequestContext>,
        service_type: &str,
        operation: &str,
        kind: RouteKind,
        method_known: bool,
    ) -> Result<AdapterContent, GatewayError> {
        let max_attempts = if self.config.retry_enabled { self.config.retry_attempts.max(1) } else { 1 };
        let mut last_err: Option<GatewayError> = None;

        for attempt in 1..=max_attempts {
            let selection = match self.select(service_type, operation, method_known) {
                Ok(selection) => selection,
                Err(err) => {
                    last_err = Some(err);
                    if attempt < max_attempts && last_err.as_ref().unwrap().retryable {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                        continue;
                    }
                    break;
                }
            };

            if selection.breaker.try_admit().is_err() {
                let err = GatewayError::new(ErrorCategory::Unavailable, service_type, operation, "circuit breaker open or saturated")
                    .with_retry_after(1);
                last_err = Some(err);
                if attempt < max_attempts {
                    tokio::time::sleep(self.config.retry_backoff * attempt).await;
                    continue;
                }
                break;
            }

            selection.begin_call();
            let started = Instant::now();
            let outcome = self.run_on_pool(ctx, Arc::clone(&selection.adapter), kind.clone()).await;

            match outcome {
                Ok(content) => {
                    selection.breaker.on_success();
                    selection.record_success(started.elapsed());
                    return Ok(content);
                }
                Err(adapter_err) => {
                    let gw_err = wrap_adapter_error(adapter_err, service_type, operation);
                    if gw_err.category.counts_toward_breaker() {
                        selection.breaker.on_failure();
                    }
                    selection.record_failure();
                    let retryable = gw_err.retryable;
                    last_err = Some(gw_err);
                    if retryable && attempt < max_attempts {
                        tokio::time::sleep(self.config.retry_backoff * attempt).await;
                        continue;
                    }
                    break;
                }
            }
        }

        Err(last_err.unwrap_or_else(|| GatewayError::new(ErrorCategory::Internal, service_type, operation, "dispatch exhausted with no recorded error")))
    }

    /// Wraps the actual adapter call in a `BoxedTask` submitted to the
    /// worker pool. `WorkerPool::submit` is fire-and-forget, so the result
    /// travels back over a one-shot channel paired with the submission.
    async fn run_on_pool(&self, ctx: &Arc<RequestContext>, adapter: Arc<dyn AdapterCapability>, kind: RouteKind) -> Result<AdapterContent, AdapterError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let cancellation = ctx.cancellation_token();
        let task_ctx = Arc::clone(ctx);
        let task: BoxedTask = Box::pin(async move {
            let result = call_adapter(adapter.as_ref(), &task_ctx, kind).await;
            let _ = tx.send(result);
        });

        match self.pool.submit(task, cancellation) {
            SubmitOutcome::Started | SubmitOutcome::Queued => match rx.await {
                Ok(result) => result,
                Err(_) => Err(AdapterError::new("pool_task_dropped", "worker pool task ended without producing a result", true)),
            },
            SubmitOutcome::PoolFull => Err(AdapterError::new("pool_full", "worker pool and its overflow queue are both full", true)),
            SubmitOutcome::PoolClosed => Err(AdapterError::new("pool_closed", "worker pool is no longer accepting submissions", false)),
        }
    }
}

async fn call_adapter(adapter: &dyn AdapterCapability, ctx: &RequestContext, kind: RouteKind) -> Result<AdapterContent, AdapterError> {
    match kind {
        RouteKind::ExecuteTool { name, arguments } => adapter.execute_tool(ctx, &name, arguments).await,
        RouteKind::ReadResource { uri } => adapter.get_resource(ctx, &uri).await,
        RouteKind::Generic { operation, arguments } => adapter.execute_tool(ctx, &operation, arguments).await,
        RouteKind::Protocol | RouteKind::ListTools | RouteKind::ListResources | RouteKind::ListPrompts | RouteKind::GetPrompt { .. } => {
            unreachable!("protocol/list/get-prompt kinds are answered before reaching the pool")
        }
    }
}

fn service_unavailable(service_type: &str, operation: &str, cause: &RegistryError) -> GatewayError {
    GatewayError::new(ErrorCategory::Unavailable, service_type, operation, format!("no healthy adapter available for '{service_type}'"))
        .with_cause(cause.to_string())
        .with_retry_after(1)
}

/// `-32601` per spec.md §8 scenario 2: a method outside the whitelist whose
/// prefix-derived service type has no registered adapter isn't a transiently
/// unavailable known service, it's a method that doesn't exist.
fn method_not_found(method: &str) -> GatewayError {
    let mut err = GatewayError::new(ErrorCategory::Validation, "gateway", method, format!("method '{method}' not found"))
        .with_code_override(-32601);
    err.retryable = false;
    err
}

fn protocol_response(method: &str) -> Value {
    match method {
        "initialize" => json!({
            "protocolVersion": "2024-11-05",
            "serverInfo": { "name": "mcp-gateway", "version": env!("CARGO_PKG_VERSION") },
            "capabilities": { "tools": {}, "resources": {}, "prompts": {} }
        }),
        "roots/list" => json!({ "roots": [] }),
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use gateway_adapter::in_process::{InProcessAdapter, LocalToolHandler};
    use gateway_adapter::metadata::AdapterMetadata;
    use gateway_protocol::definitions::{CapabilityManifest, ToolDefinition};
    use gateway_resilience::circuit_breaker::CircuitBreakerConfig;
    use gateway_resilience::memory_monitor::{MemoryMonitorConfig, MemorySampler, MemoryStats};
    use gateway_resilience::worker_pool::WorkerPoolConfig;
    use std::time::Duration;

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

    struct AlwaysFailsHandler;

    #[async_trait]
    impl LocalToolHandler for AlwaysFailsHandler {
        async fn execute_tool(&self, _ctx: &RequestContext, _name: &str, _arguments: Value) -> Result<AdapterContent, AdapterError> {
            Err(AdapterError::new("network_error", "backend unreachable", true))
        }
        async fn read_resource(&self, _ctx: &RequestContext, _uri: &str) -> Result<AdapterContent, AdapterError> {
            Err(AdapterError::new("network_error", "backend unreachable", true))
        }
    }

    struct ZeroSampler;
    impl MemorySampler for ZeroSampler {
        fn sample(&self) -> MemoryStats {
            MemoryStats::default()
        }
    }

    async fn router_with_adapter(handler: Arc<dyn LocalToolHandler>) -> Router {
        let registry = Arc::new(ServiceRegistry::new(CircuitBreakerConfig::default()));
        let adapter: Arc<dyn AdapterCapability> = Arc::new(InProcessAdapter::new(
            AdapterMetadata {
                id: "weather-1".into(),
                name: "weather".into(),
                service_type: "tool_provider".into(),
                version: "1.0.0".into(),
                description: "weather tools".into(),
                config: HashMap::new(),
                dependencies: Vec::new(),
            },
            CapabilityManifest {
                tools: vec![ToolDefinition {
                    name: "get_weather".into(),
                    description: "desc".into(),
                    input_schema: json!({"type": "object"}),
                    output_schema: None,
                }],
                ..Default::default()
            },
            handler,
        ));
        registry.register(adapter.clone(), 1.0).unwrap();
        adapter.initialize(HashMap::new()).await.unwrap();
        let ctx = RequestContext::new(RequestIdentity::new(None, None, None, None), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        adapter.start(&ctx).await.unwrap();

        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 4, queue_size: 4, task_timeout: Duration::from_secs(5) });
        let monitor = MemoryMonitor::with_sampler(MemoryMonitorConfig::default(), Box::new(ZeroSampler));
        Router::new(registry, pool, monitor, RouterConfig::default())
    }

    fn envelope(method: &str, params: Value) -> Vec<u8> {
        let mut body = json!({ "jsonrpc": "2.0", "id": 1, "method": method });
        if !params.is_null() {
            body["params"] = params;
        }
        serde_json::to_vec(&body).unwrap()
    }

    #[tokio::test]
    async fn tools_call_round_trips_through_the_pool() {
        let router = router_with_adapter(Arc::new(EchoHandler)).await;
        let body = envelope("tools/call", json!({"name": "get_weather", "arguments": {}}));
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Response(r) => {
                let value = r.result.into_value();
                assert_eq!(value["content"][0]["text"], "ran get_weather");
            }
            JsonRpcMessage::Error(e) => panic!("expected success, got {e:?}"),
        }
        assert_eq!(router.metrics().snapshot().mcp_requests_total, 1);
    }

    #[tokio::test]
    async fn unknown_method_is_routed_not_rejected() {
        let router = router_with_adapter(Arc::new(EchoHandler)).await;
        let body = envelope("tools/frobnicate", Value::Null);
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        // "tools/frobnicate" still goes through parse/route/select -- the
        // validator itself never rejects it -- but it derives service_type
        // "tools_provider", which has no registered adapter, and because the
        // method isn't on the whitelist that empty candidate set surfaces as
        // method_not_found rather than a transient service_unavailable.
        match response {
            JsonRpcMessage::Error(e) => {
                assert_eq!(e.error.code, -32601);
                let data = e.error.data.unwrap();
                assert_eq!(data["category"], "validation");
                assert_eq!(data["retryable"], false);
            }
            JsonRpcMessage::Response(_) => panic!("expected a method-not-found error"),
        }
    }

    #[tokio::test]
    async fn missing_required_field_is_invalid_params() {
        let router = router_with_adapter(Arc::new(EchoHandler)).await;
        let body = envelope("tools/call", Value::Null);
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Error(e) => assert_eq!(e.error.code, -32602),
            JsonRpcMessage::Response(_) => panic!("expected invalid_params"),
        }
    }

    #[tokio::test]
    async fn malformed_json_is_parse_error() {
        let router = router_with_adapter(Arc::new(EchoHandler)).await;
        let response = router.handle(b"not json", RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Error(e) => assert_eq!(e.error.code, -32700),
            JsonRpcMessage::Response(_) => panic!("expected parse_error"),
        }
    }

    #[tokio::test]
    async fn notifications_produce_no_response() {
        let router = router_with_adapter(Arc::new(EchoHandler)).await;
        let body = serde_json::to_vec(&json!({
            "jsonrpc": "2.0",
            "method": "notifications/initialized"
        }))
        .unwrap();
        assert!(router.handle(&body, RequestHeaders::default()).await.is_none());
    }

    #[tokio::test]
    async fn ping_is_answered_without_an_adapter() {
        let registry = Arc::new(ServiceRegistry::new(CircuitBreakerConfig::default()));
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 1, queue_size: 1, task_timeout: Duration::from_secs(5) });
        let monitor = MemoryMonitor::with_sampler(MemoryMonitorConfig::default(), Box::new(ZeroSampler));
        let router = Router::new(registry, pool, monitor, RouterConfig::default());

        let body = envelope("ping", Value::Null);
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        assert!(matches!(response, JsonRpcMessage::Response(_)));
    }

    #[tokio::test]
    async fn retryable_failure_is_retried_then_surfaced() {
        let router = router_with_adapter(Arc::new(AlwaysFailsHandler)).await;
        let body = envelope("tools/call", json!({"name": "get_weather", "arguments": {}}));
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Error(e) => {
                assert_eq!(e.error.code, -32005); // network category
            }
            JsonRpcMessage::Response(_) => panic!("expected a surfaced failure after retries"),
        }
    }

    struct StructuredHandler;

    #[async_trait]
    impl LocalToolHandler for StructuredHandler {
        async fn execute_tool(&self, _ctx: &RequestContext, _name: &str, _arguments: Value) -> Result<AdapterContent, AdapterError> {
            Ok(AdapterContent {
                content: vec![gateway_protocol::content::ContentBlock::structured(json!({"city": "nyc"}))],
                metadata: HashMap::new(),
            })
        }
        async fn read_resource(&self, _ctx: &RequestContext, uri: &str) -> Result<AdapterContent, AdapterError> {
            Ok(AdapterContent::single_text(format!("read {uri}")))
        }
    }

    async fn router_with_structured_adapter(output_schema: Option<Value>) -> Router {
        let registry = Arc::new(ServiceRegistry::new(CircuitBreakerConfig::default()));
        let adapter: Arc<dyn AdapterCapability> = Arc::new(InProcessAdapter::new(
            AdapterMetadata {
                id: "weather-1".into(),
                name: "weather".into(),
                service_type: "tool_provider".into(),
                version: "1.0.0".into(),
                description: "weather tools".into(),
                config: HashMap::new(),
                dependencies: Vec::new(),
            },
            CapabilityManifest {
                tools: vec![ToolDefinition {
                    name: "get_weather".into(),
                    description: "desc".into(),
                    input_schema: json!({"type": "object"}),
                    output_schema,
                }],
                ..Default::default()
            },
            Arc::new(StructuredHandler),
        ));
        registry.register(adapter.clone(), 1.0).unwrap();
        adapter.initialize(HashMap::new()).await.unwrap();
        let ctx = RequestContext::new(RequestIdentity::new(None, None, None, None), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        adapter.start(&ctx).await.unwrap();

        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 4, queue_size: 4, task_timeout: Duration::from_secs(5) });
        let monitor = MemoryMonitor::with_sampler(MemoryMonitorConfig::default(), Box::new(ZeroSampler));
        let mut config = RouterConfig::default();
        config.validate_responses = true;
        Router::new(registry, pool, monitor, config)
    }

    #[tokio::test]
    async fn response_matching_output_schema_passes_validation() {
        let router = router_with_structured_adapter(Some(json!({"type": "object", "required": ["city"]}))).await;
        let body = envelope("tools/call", json!({"name": "get_weather", "arguments": {}}));
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        assert!(matches!(response, JsonRpcMessage::Response(_)));
    }

    #[tokio::test]
    async fn response_violating_output_schema_is_rejected() {
        let router = router_with_structured_adapter(Some(json!({"type": "object", "required": ["temperature"]}))).await;
        let body = envelope("tools/call", json!({"name": "get_weather", "arguments": {}}));
        let response = router.handle(&body, RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Error(e) => assert_eq!(e.error.code, -32603),
            JsonRpcMessage::Response(_) => panic!("expected a schema validation failure"),
        }
    }

    #[tokio::test]
    async fn oversized_body_is_rejected_before_parsing() {
        let registry = Arc::new(ServiceRegistry::new(CircuitBreakerConfig::default()));
        let pool = WorkerPool::new(WorkerPoolConfig { max_workers: 1, queue_size: 1, task_timeout: Duration::from_secs(5) });
        let monitor = MemoryMonitor::with_sampler(MemoryMonitorConfig::default(), Box::new(ZeroSampler));
        let mut config = RouterConfig::default();
        config.max_request_size = 4;
        let router = Router::new(registry, pool, monitor, config);

        let response = router.handle(b"way too big", RequestHeaders::default()).await.unwrap();
        match response {
            JsonRpcMessage::Error(e) => assert_eq!(e.error.code, -32700),
            JsonRpcMessage::Response(_) => panic!("expected a parse error"),
        }
    }
}
