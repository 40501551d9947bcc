//! Reliability layer: per-adapter circuit breakers, the bounded worker pool,
//! and the memory-pressure monitor.

pub mod circuit_breaker;
pub mod memory_monitor;
pub mod worker_pool;

pub mod prelude {
    pub use crate::circuit_breaker::{
        AdmissionRejection, CircuitBreaker, CircuitBreakerConfig, CircuitState, Clock, ManualClock, MonotonicClock,
    };
    pub use crate::memory_monitor::{MemoryMonitor, MemoryMonitorConfig, MemorySampler, MemoryStats, WaitError};
    pub use crate::worker_pool::{BoxedTask, SubmitOutcome, WorkerPool, WorkerPoolConfig};
}
