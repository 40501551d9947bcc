use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use gateway_adapter::capability::AdapterCapability;
use gateway_adapter::dependency_graph::{CycleError, DependencyGraph};
use gateway_adapter::state::AdapterState;
use gateway_context::context::RequestContext;
use gateway_resilience::circuit_breaker::{CircuitBreaker, CircuitBreakerConfig, CircuitState};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::record::RegisteredService;
use crate::strategy::{LbStrategy, LoadBalancer};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("adapter (type={0}, name={1}) is already registered")]
    DuplicateAdapter(String, String),
    #[error("no adapter id '{0}' is registered")]
    NotFound(String),
    #[error("no healthy adapter available for service type '{0}'")]
    ServiceUnavailable(String),
    #[error(transparent)]
    DependencyCycle(#[from] CycleError),
}

#[derive(Debug, Clone, Default)]
pub struct SelectionCriteria {
    pub lb_strategy: LbStrategy,
    pub metadata: HashMap<String, String>,
}

struct ByType {
    /// Adapter ids, kept sorted for round-robin determinism.
    ids: Vec<String>,
}

/// Tracks every registered adapter instance, their capabilities, health, and
/// load; selects among them under a configurable strategy.
pub struct ServiceRegistry {
    services: parking_lot::RwLock<HashMap<String, Arc<RegisteredService>>>,
    by_type: parking_lot::RwLock<HashMap<String, ByType>>,
    by_type_name: parking_lot::RwLock<HashMap<(String, String), String>>,
    dependencies: parking_lot::Mutex<DependencyGraph>,
    load_balancers: parking_lot::RwLock<HashMap<String, Arc<LoadBalancer>>>,
    breaker_config: CircuitBreakerConfig,
}

impl ServiceRegistry {
    pub fn new(breaker_config: CircuitBreakerConfig) -> Self {
        Self {
            services: parking_lot::RwLock::new(HashMap::new()),
            by_type: parking_lot::RwLock::new(HashMap::new()),
            by_type_name: parking_lot::RwLock::new(HashMap::new()),
            dependencies: parking_lot::Mutex::new(DependencyGraph::new()),
            load_balancers: parking_lot::RwLock::new(HashMap::new()),
            breaker_config,
        }
    }

    pub fn register(&self, adapter: Arc<dyn AdapterCapability>, weight: f64) -> Result<(), RegistryError> {
        let metadata = adapter.metadata().clone();
        let key = (metadata.service_type.clone(), metadata.name.clone());

        {
            let by_type_name = self.by_type_name.read();
            if by_type_name.contains_key(&key) {
                return Err(RegistryError::DuplicateAdapter(key.0, key.1));
            }
        }

        self.dependencies.lock().try_add(&metadata.name, &metadata.dependencies)?;

        let breaker = CircuitBreaker::new(self.breaker_config.clone());
        let record = Arc::new(RegisteredService::new(adapter, breaker, weight));

        self.services.write().insert(metadata.id.clone(), record);
        self.by_type_name.write().insert(key, metadata.id.clone());
        self.by_type
            .write()
            .entry(metadata.service_type.clone())
            .or_insert_with(|| ByType { ids: Vec::new() })
            .ids
            .push(metadata.id.clone());
        self.by_type.write().get_mut(&metadata.service_type).unwrap().ids.sort();
        self.load_balancers
            .write()
            .entry(metadata.service_type)
            .or_insert_with(|| Arc::new(LoadBalancer::new()));

        Ok(())
    }

    pub fn deregister(&self, id: &str) -> Result<(), RegistryError> {
        let mut services = self.services.write();
        let record = services.remove(id).ok_or_else(|| RegistryError::NotFound(id.to_string()))?;
        let metadata = record.adapter.metadata().clone();
        drop(services);

        self.by_type_name.write().remove(&(metadata.service_type.clone(), metadata.name.clone()));
        if let Some(bucket) = self.by_type.write().get_mut(&metadata.service_type) {
            bucket.ids.retain(|existing| existing != id);
        }
        self.dependencies.lock().remove(&metadata.name);
        Ok(())
    }

    pub fn get_load_balancer(&self, service_type: &str) -> Option<Arc<LoadBalancer>> {
        self.load_balancers.read().get(service_type).cloned()
    }

    /// Looks up a registered adapter by its `(type, name)` key, used by the
    /// hot-reload controller to find the adapter instance a reload targets
    /// without needing to know its generated `id`.
    pub fn find_by_name(&self, service_type: &str, name: &str) -> Option<Arc<RegisteredService>> {
        let id = self.by_type_name.read().get(&(service_type.to_string(), name.to_string()))?.clone();
        self.services.read().get(&id).cloned()
    }

    /// Names of adapters that declare a dependency on `name`.
    pub fn reverse_dependents(&self, name: &str) -> Vec<String> {
        self.dependencies.lock().reverse_dependents(name)
    }

    pub fn list_by_type(&self, service_type: &str) -> Vec<Arc<RegisteredService>> {
        let services = self.services.read();
        self.by_type
            .read()
            .get(service_type)
            .map(|bucket| bucket.ids.iter().filter_map(|id| services.get(id).cloned()).collect())
            .unwrap_or_default()
    }

    /// Selects a service for `service_type` under the given criteria; candidates
    /// must be `running` with a non-open breaker.
    pub fn select_service(&self, service_type: &str, criteria: &SelectionCriteria) -> Result<Arc<RegisteredService>, RegistryError> {
        let candidates = self.list_by_type(service_type);
        let eligible: Vec<&RegisteredService> = candidates
            .iter()
            .filter(|r| r.adapter.status().is_selectable() && r.breaker.state() != CircuitState::Open)
            .map(|r| r.as_ref())
            .collect();

        let lb = self
            .get_load_balancer(service_type)
            .ok_or_else(|| RegistryError::ServiceUnavailable(service_type.to_string()))?;

        let selected = lb
            .select(criteria.lb_strategy, &eligible)
            .ok_or_else(|| RegistryError::ServiceUnavailable(service_type.to_string()))?;

        candidates
            .into_iter()
            .find(|r| r.adapter.metadata().id == selected.adapter.metadata().id)
            .ok_or_else(|| RegistryError::ServiceUnavailable(service_type.to_string()))
    }

    pub fn health(&self) -> HashMap<String, AdapterState> {
        self.services
            .read()
            .iter()
            .map(|(id, record)| (id.clone(), record.adapter.status()))
            .collect()
    }

    /// Periodic health-probe loop: three consecutive failures transition an
    /// adapter to `error`; a subsequent success recovers it to `running`.
    pub async fn run_health_probes(&self, interval: Duration, shutdown: CancellationToken, ctx_factory: impl Fn() -> RequestContext) {
        let mut failure_counts: HashMap<String, u32> = HashMap::new();
        let mut ticker = tokio::time::interval(interval);
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => return,
                _ = ticker.tick() => {}
            }

            let snapshot: Vec<Arc<RegisteredService>> = self.services.read().values().cloned().collect();
            for record in snapshot {
                let id = record.adapter.metadata().id.clone();
                let ctx = ctx_factory();
                let result = record.adapter.health_check(&ctx).await;
                match result {
                    Ok(()) => {
                        failure_counts.remove(&id);
                        if record.adapter.status() == AdapterState::Error {
                            record.adapter.mark_recovered();
                            tracing::info!(adapter_id = %id, "adapter recovered after health probe");
                        }
                    }
                    Err(err) => {
                        let count = failure_counts.entry(id.clone()).or_insert(0);
                        *count += 1;
                        tracing::warn!(adapter_id = %id, failures = *count, error = %err, "health check failed");
                        if *count >= 3 {
                            record.adapter.mark_unhealthy();
                        }
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_adapter::in_process::{InProcessAdapter, LocalToolHandler};
    use gateway_adapter::metadata::AdapterMetadata;
    use gateway_context::context::{RequestIdentity, ResourceSnapshot};
    use gateway_protocol::definitions::CapabilityManifest;

    struct NoopHandler;
    #[async_trait::async_trait]
    impl LocalToolHandler for NoopHandler {
        async fn execute_tool(
            &self,
            _ctx: &RequestContext,
            _name: &str,
            _arguments: serde_json::Value,
        ) -> Result<gateway_protocol::content::AdapterContent, gateway_adapter::error::AdapterError> {
            unimplemented!()
        }
        async fn read_resource(
            &self,
            _ctx: &RequestContext,
            _uri: &str,
        ) -> Result<gateway_protocol::content::AdapterContent, gateway_adapter::error::AdapterError> {
            unimplemented!()
        }
    }

    fn adapter(id: &str, service_type: &str) -> Arc<dyn AdapterCapability> {
        Arc::new(InProcessAdapter::new(
            AdapterMetadata {
                id: id.into(),
                name: id.into(),
                service_type: service_type.into(),
                version: "1.0.0".into(),
                description: String::new(),
                config: HashMap::new(),
                dependencies: Vec::new(),
            },
            CapabilityManifest::default(),
            Arc::new(NoopHandler),
        ))
    }

    fn ctx() -> RequestContext {
        RequestContext::new(RequestIdentity::new(None, None, None, None), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 })
    }

    #[tokio::test]
    async fn select_service_excludes_non_running_adapters() {
        let registry = ServiceRegistry::new(CircuitBreakerConfig::default());
        let a = adapter("a1", "tool_provider");
        registry.register(a.clone(), 1.0).unwrap();
        a.initialize(HashMap::new()).await.unwrap();

        let err = registry.select_service("tool_provider", &SelectionCriteria::default()).unwrap_err();
        assert!(matches!(err, RegistryError::ServiceUnavailable(_)));

        a.start(&ctx()).await.unwrap();
        let selected = registry.select_service("tool_provider", &SelectionCriteria::default()).unwrap();
        assert_eq!(selected.adapter.metadata().id, "a1");
    }

    #[test]
    fn register_rejects_duplicate_type_name() {
        let registry = ServiceRegistry::new(CircuitBreakerConfig::default());
        registry.register(adapter("a1", "tool_provider"), 1.0).unwrap();
        let duplicate = Arc::new(InProcessAdapter::new(
            AdapterMetadata {
                id: "a2".into(),
                name: "a1".into(),
                service_type: "tool_provider".into(),
                version: "1.0.0".into(),
                description: String::new(),
                config: HashMap::new(),
                dependencies: Vec::new(),
            },
            CapabilityManifest::default(),
            Arc::new(NoopHandler),
        ));
        let err = registry.register(duplicate, 1.0).unwrap_err();
        assert!(matches!(err, RegistryError::DuplicateAdapter(_, _)));
    }

    #[test]
    fn deregister_removes_from_type_bucket() {
        let registry = ServiceRegistry::new(CircuitBreakerConfig::default());
        registry.register(adapter("a1", "tool_provider"), 1.0).unwrap();
        registry.deregister("a1").unwrap();
        assert!(registry.list_by_type("tool_provider").is_empty());
    }
}
