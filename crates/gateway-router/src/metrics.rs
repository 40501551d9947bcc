use std::sync::atomic::{AtomicU64, Ordering};

/// Process-lifetime request counters, exposed verbatim by the admin metrics
/// endpoint.
#[derive(Debug, Default)]
pub struct RouterMetrics {
    requests_total: AtomicU64,
    requests_failed_total: AtomicU64,
}

#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct RouterMetricsSnapshot {
    pub mcp_requests_total: u64,
    pub mcp_requests_failed_total: u64,
}

impl RouterMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_request(&self) {
        self.requests_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_failure(&self) {
        self.requests_failed_total.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> RouterMetricsSnapshot {
        RouterMetricsSnapshot {
            mcp_requests_total: self.requests_total.load(Ordering::Relaxed),
            mcp_requests_failed_total: self.requests_failed_total.load(Ordering::Relaxed),
        }
    }
}
