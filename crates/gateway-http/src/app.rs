//! Shared state handed to every connection: the router and the handful of
//! process-wide singletons the admin surface reports on.

use std::sync::Arc;
use std::time::Instant;

use gateway_reload::controller::HotReloadController;
use gateway_registry::registry::ServiceRegistry;
use gateway_resilience::memory_monitor::MemoryMonitor;
use gateway_resilience::worker_pool::WorkerPool;
use gateway_router::router::Router;

#[derive(Clone)]
pub struct GatewayState {
    pub router: Arc<Router>,
    pub registry: Arc<ServiceRegistry>,
    pub reload_controller: Arc<HotReloadController>,
    pub memory_monitor: MemoryMonitor,
    pub pool: WorkerPool,
    pub started_at: Instant,
}
