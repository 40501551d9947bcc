use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use gateway_adapter::capability::AdapterCapability;
use gateway_resilience::circuit_breaker::CircuitBreaker;

/// An adapter reference plus the selection metadata the registry tracks
/// alongside it.
pub struct RegisteredService {
    pub adapter: Arc<dyn AdapterCapability>,
    pub breaker: CircuitBreaker,
    pub weight: f64,
    active_connections: AtomicU64,
    /// Latency EWMA in microseconds, stored as bits of the underlying f64
    /// so it can be updated without a lock on the hot path.
    recent_latency_ewma_micros_bits: AtomicU64,
    /// Recent error rate, same EWMA-over-bits encoding, used by the
    /// `weighted` strategy to scale declared weight.
    error_rate_bits: AtomicU64,
}

const EWMA_ALPHA: f64 = 0.2;

impl RegisteredService {
    pub fn new(adapter: Arc<dyn AdapterCapability>, breaker: CircuitBreaker, weight: f64) -> Self {
        Self {
            adapter,
            breaker,
            weight,
            active_connections: AtomicU64::new(0),
            recent_latency_ewma_micros_bits: AtomicU64::new(0f64.to_bits()),
            error_rate_bits: AtomicU64::new(0f64.to_bits()),
        }
    }

    pub fn active_connections(&self) -> u64 {
        self.active_connections.load(Ordering::Acquire)
    }

    pub fn recent_latency_ewma_micros(&self) -> f64 {
        f64::from_bits(self.recent_latency_ewma_micros_bits.load(Ordering::Acquire))
    }

    pub fn error_rate_recent(&self) -> f64 {
        f64::from_bits(self.error_rate_bits.load(Ordering::Acquire))
    }

    pub fn begin_call(&self) {
        self.active_connections.fetch_add(1, Ordering::AcqRel);
    }

    pub fn record_success(&self, duration: std::time::Duration) {
        self.active_connections.fetch_sub(1, Ordering::AcqRel);
        self.update_ewma(duration.as_micros() as f64);
        self.update_error_rate(0.0);
    }

    pub fn record_failure(&self) {
        self.active_connections.fetch_sub(1, Ordering::AcqRel);
        self.update_error_rate(1.0);
    }

    fn update_ewma(&self, sample: f64) {
        let _ = self.recent_latency_ewma_micros_bits.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let current = f64::from_bits(bits);
            let next = if current == 0.0 { sample } else { EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * current };
            Some(next.to_bits())
        });
    }

    fn update_error_rate(&self, sample: f64) {
        let _ = self.error_rate_bits.fetch_update(Ordering::AcqRel, Ordering::Acquire, |bits| {
            let current = f64::from_bits(bits);
            let next = EWMA_ALPHA * sample + (1.0 - EWMA_ALPHA) * current;
            Some(next.to_bits())
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gateway_adapter::in_process::{InProcessAdapter, LocalToolHandler};
    use gateway_adapter::metadata::AdapterMetadata;
    use gateway_protocol::definitions::CapabilityManifest;
    use gateway_resilience::circuit_breaker::CircuitBreakerConfig;
    use std::collections::HashMap;
    use std::time::Duration;

    struct NoopHandler;
    #[async_trait::async_trait]
    impl LocalToolHandler for NoopHandler {
        async fn execute_tool(
            &self,
            _ctx: &gateway_context::context::RequestContext,
            _name: &str,
            _arguments: serde_json::Value,
        ) -> Result<gateway_protocol::content::AdapterContent, gateway_adapter::error::AdapterError> {
            unimplemented!()
        }
        async fn read_resource(
            &self,
            _ctx: &gateway_context::context::RequestContext,
            _uri: &str,
        ) -> Result<gateway_protocol::content::AdapterContent, gateway_adapter::error::AdapterError> {
            unimplemented!()
        }
    }

    fn record() -> RegisteredService {
        let adapter = Arc::new(InProcessAdapter::new(
            AdapterMetadata {
                id: "a1".into(),
                name: "weather".into(),
                service_type: "tool_provider".into(),
                version: "1.0.0".into(),
                description: String::new(),
                config: HashMap::new(),
                dependencies: Vec::new(),
            },
            CapabilityManifest::default(),
            Arc::new(NoopHandler),
        ));
        RegisteredService::new(adapter, CircuitBreaker::new(CircuitBreakerConfig::default()), 1.0)
    }

    #[test]
    fn ewma_converges_toward_repeated_sample() {
        let r = record();
        r.begin_call();
        r.record_success(Duration::from_millis(10));
        for _ in 0..50 {
            r.begin_call();
            r.record_success(Duration::from_millis(10));
        }
        let ewma = r.recent_latency_ewma_micros();
        assert!((ewma - 10_000.0).abs() < 50.0);
    }

    #[test]
    fn error_rate_rises_on_failure() {
        let r = record();
        r.begin_call();
        r.record_failure();
        assert!(r.error_rate_recent() > 0.0);
    }
}
