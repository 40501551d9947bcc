use std::time::Duration;

use gateway_registry::strategy::LbStrategy;

/// Router-level tunables. Everything else a request needs (breaker, pool,
/// memory monitor settings) lives in its own crate's config type.
#[derive(Debug, Clone)]
pub struct RouterConfig {
    pub max_request_size: usize,
    pub retry_enabled: bool,
    pub retry_attempts: u32,
    pub retry_backoff: Duration,
    pub lb_strategy: LbStrategy,
    /// Upper bound on a single request's admission-to-response time;
    /// becomes the `RequestContext` deadline when the caller sets none.
    pub request_timeout: Duration,
    /// Structurally validates `tools/call` responses against the tool's
    /// declared `outputSchema` when one is present. Defaults to
    /// `cfg!(debug_assertions)`; `gateway-server`'s YAML config can override
    /// either way via `router.validate_responses`.
    pub validate_responses: bool,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            max_request_size: 1 << 20,
            retry_enabled: true,
            retry_attempts: 2,
            retry_backoff: Duration::from_millis(100),
            lb_strategy: LbStrategy::RoundRobin,
            request_timeout: Duration::from_secs(30),
            validate_responses: cfg!(debug_assertions),
        }
    }
}
