//! Wires the dependency-ordered singletons from SPEC_FULL.md §2: Logger →
//! Metrics → MemoryMonitor → WorkerPool → CircuitBreakerGroup → Registry →
//! HotReloadController → Router.

use std::sync::Arc;

use gateway_adapter::http::HttpAdapter;
use gateway_adapter::metadata::AdapterMetadata;
use gateway_http::app::GatewayState;
use gateway_reload::controller::{HotReloadController, ReloadConfig};
use gateway_registry::registry::ServiceRegistry;
use gateway_resilience::circuit_breaker::CircuitBreakerConfig;
use gateway_resilience::memory_monitor::{MemoryMonitor, MemoryMonitorConfig};
use gateway_resilience::worker_pool::{WorkerPool, WorkerPoolConfig};
use gateway_router::config::RouterConfig;
use gateway_router::router::Router;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

use crate::config::GatewayConfig;

pub struct Gateway {
    pub state: GatewayState,
    pub shutdown: CancellationToken,
}

impl Gateway {
    pub fn build(config: &GatewayConfig) -> Self {
        let memory_monitor = MemoryMonitor::new(MemoryMonitorConfig::from(&config.memory));
        let pool = WorkerPool::new(WorkerPoolConfig::from(&config.pool));
        let breaker_config = CircuitBreakerConfig::from(&config.breaker);
        let registry = Arc::new(ServiceRegistry::new(breaker_config));
        let reload_controller = Arc::new(HotReloadController::new(Arc::clone(&registry), ReloadConfig::from(&config.reload)));
        let router = Arc::new(Router::new(Arc::clone(&registry), pool.clone(), memory_monitor.clone(), RouterConfig::from(&config.router)));

        let state = GatewayState {
            router,
            registry,
            reload_controller,
            memory_monitor,
            pool,
            started_at: std::time::Instant::now(),
        };

        Self { state, shutdown: CancellationToken::new() }
    }

    /// Registers every adapter declared in config, in-process and started.
    /// Failures are logged, not fatal: a gateway with zero healthy adapters
    /// for a service type still answers protocol methods and surfaces
    /// `service_unavailable` for the rest, which is a legitimate runtime
    /// state (spec.md §4.1 step 4) rather than a startup failure.
    pub async fn register_configured_adapters(&self, config: &GatewayConfig) {
        for entry in &config.adapters {
            let metadata = AdapterMetadata {
                id: format!("{}-{}", entry.name, entry.version),
                name: entry.name.clone(),
                service_type: entry.service_type.clone(),
                version: entry.version.clone(),
                description: entry.description.clone(),
                config: entry.config.clone(),
                dependencies: entry.dependencies.clone(),
            };
            let adapter: Arc<dyn gateway_adapter::capability::AdapterCapability> =
                Arc::new(HttpAdapter::new(metadata, entry.base_url.clone(), reqwest::Client::new()));

            if let Err(err) = self.state.registry.register(Arc::clone(&adapter), entry.weight) {
                error!(plugin_name = %entry.name, error = %err, "failed to register configured adapter");
                continue;
            }
            if let Err(err) = adapter.initialize(entry.config.clone()).await {
                error!(plugin_name = %entry.name, error = %err, "adapter initialize() failed");
                continue;
            }
            let ctx = probe_ctx();
            if let Err(err) = adapter.start(&ctx).await {
                error!(plugin_name = %entry.name, error = %err, "adapter start() failed");
                continue;
            }
            info!(plugin_name = %entry.name, version = %entry.version, "adapter registered and running");
        }
    }

    /// Spawns the memory monitor's sampling loop and the registry's health
    /// probe loop; both run until `self.shutdown` fires.
    pub fn spawn_background_tasks(&self, health_check_interval: std::time::Duration) {
        let monitor = self.state.memory_monitor.clone();
        let monitor_shutdown = self.shutdown.clone();
        tokio::spawn(async move { monitor.run(monitor_shutdown).await });

        let registry = Arc::clone(&self.state.registry);
        let registry_shutdown = self.shutdown.clone();
        tokio::spawn(async move {
            registry.run_health_probes(health_check_interval, registry_shutdown, probe_ctx).await;
        });
    }
}

fn probe_ctx() -> gateway_context::context::RequestContext {
    gateway_context::context::RequestContext::new(
        gateway_context::context::RequestIdentity::new(None, None, None, None),
        None,
        gateway_context::context::ResourceSnapshot { memory_bytes: 0, task_count: 0 },
    )
}
