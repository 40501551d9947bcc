use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::{Duration, Instant};

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use crate::breadcrumb::BreadcrumbTrail;

/// A request is flagged slow once it runs longer than this before
/// `complete()` is called.
const SLOW_REQUEST_THRESHOLD: Duration = Duration::from_secs(5);
/// A request that ends with more live tasks than it started with is flagged
/// as a possible task leak (the async analogue of a goroutine leak).
const TASK_LEAK_MARGIN: u64 = 0;
/// A request whose resident memory grew by more than this during its
/// lifetime is flagged high-memory.
const HIGH_MEMORY_DELTA_BYTES: i64 = 64 * 1024 * 1024;

/// Immutable identity carried by a request from admission to completion.
/// This is the only legal carrier of trace/span ids across component
/// boundaries: adapters and the resilience layer receive `&RequestContext`,
/// never the raw ids.
#[derive(Debug, Clone)]
pub struct RequestIdentity {
    pub request_id: String,
    pub trace_id: String,
    pub span_id: String,
    pub principal_id: Option<String>,
    pub session_id: Option<String>,
}

impl RequestIdentity {
    pub fn new(trace_id: Option<String>, span_id: Option<String>, principal_id: Option<String>, session_id: Option<String>) -> Self {
        Self {
            request_id: Uuid::new_v4().to_string(),
            trace_id: trace_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            span_id: span_id.unwrap_or_else(|| Uuid::new_v4().to_string()),
            principal_id,
            session_id,
        }
    }
}

/// Resource levels sampled at admission, compared against the levels at
/// completion to compute the deltas reported in the summary.
#[derive(Debug, Clone, Copy)]
pub struct ResourceSnapshot {
    pub memory_bytes: u64,
    pub task_count: u64,
}

/// The structured summary `Complete()` emits exactly once per request.
#[derive(Debug, Clone)]
pub struct CompletionSummary {
    pub request_id: String,
    pub duration: Duration,
    pub memory_delta_bytes: i64,
    pub breadcrumb_count: usize,
    pub warnings: Vec<&'static str>,
}

/// Per-request state threaded through the router, registry, breaker, pool,
/// and adapters. Created once by the router at admission; `complete()` must
/// be called exactly once, strictly after the final response byte is
/// written.
pub struct RequestContext {
    pub identity: RequestIdentity,
    created_at: Instant,
    deadline: Option<Instant>,
    cancellation: CancellationToken,
    breadcrumbs: BreadcrumbTrail,
    start_snapshot: ResourceSnapshot,
    completed: AtomicBool,
    attempt: AtomicU64,
}

impl RequestContext {
    pub fn new(identity: RequestIdentity, timeout: Option<Duration>, start_snapshot: ResourceSnapshot) -> Self {
        let created_at = Instant::now();
        Self {
            identity,
            created_at,
            deadline: timeout.map(|d| created_at + d),
            cancellation: CancellationToken::new(),
            breadcrumbs: BreadcrumbTrail::new(),
            start_snapshot,
            completed: AtomicBool::new(false),
            attempt: AtomicU64::new(0),
        }
    }

    pub fn add_breadcrumb(&self, operation: impl Into<String>, data: Value) {
        self.breadcrumbs.push(operation, data, Instant::now(), self.created_at);
    }

    pub fn breadcrumb_count(&self) -> usize {
        self.breadcrumbs.len()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancellation.clone()
    }

    pub fn cancel(&self) {
        self.cancellation.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }

    /// Time remaining before the request's root deadline, or `None` if no
    /// deadline was set. A per-task timeout should be the tighter of this
    /// and the task's own configured timeout.
    pub fn remaining_timeout(&self) -> Option<Duration> {
        self.deadline.map(|d| d.saturating_duration_since(Instant::now()))
    }

    pub fn next_attempt(&self) -> u64 {
        self.attempt.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn elapsed(&self) -> Duration {
        self.created_at.elapsed()
    }

    /// Finalizes the request exactly once. A second call logs a warning and
    /// returns `None` rather than panicking, since this runs on the
    /// response-writing hot path and must never itself crash the process.
    pub fn complete(&self, end_snapshot: ResourceSnapshot) -> Option<CompletionSummary> {
        if self.completed.swap(true, Ordering::SeqCst) {
            tracing::warn!(request_id = %self.identity.request_id, "complete() called more than once");
            return None;
        }

        let duration = self.created_at.elapsed();
        let memory_delta_bytes =
            end_snapshot.memory_bytes as i64 - self.start_snapshot.memory_bytes as i64;
        let breadcrumb_count = self.breadcrumbs.len();

        let mut warnings = Vec::new();
        if duration > SLOW_REQUEST_THRESHOLD {
            warnings.push("slow_request");
        }
        if end_snapshot.task_count > self.start_snapshot.task_count + TASK_LEAK_MARGIN {
            warnings.push("task_leak");
        }
        if memory_delta_bytes > HIGH_MEMORY_DELTA_BYTES {
            warnings.push("high_memory");
        }

        let summary = CompletionSummary {
            request_id: self.identity.request_id.clone(),
            duration,
            memory_delta_bytes,
            breadcrumb_count,
            warnings,
        };

        tracing::info!(
            request_id = %summary.request_id,
            duration_ms = summary.duration.as_millis() as u64,
            memory_delta_bytes = summary.memory_delta_bytes,
            breadcrumb_count = summary.breadcrumb_count,
            warnings = ?summary.warnings,
            "request completed"
        );

        Some(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn identity() -> RequestIdentity {
        RequestIdentity::new(None, None, None, None)
    }

    #[test]
    fn complete_is_exactly_once() {
        let ctx = RequestContext::new(identity(), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        let first = ctx.complete(ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        let second = ctx.complete(ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        assert!(first.is_some());
        assert!(second.is_none());
    }

    #[test]
    fn high_memory_delta_is_flagged() {
        let ctx = RequestContext::new(identity(), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        let summary = ctx
            .complete(ResourceSnapshot {
                memory_bytes: HIGH_MEMORY_DELTA_BYTES as u64 + 1,
                task_count: 0,
            })
            .unwrap();
        assert!(summary.warnings.contains(&"high_memory"));
    }

    #[test]
    fn breadcrumbs_accumulate_before_completion() {
        let ctx = RequestContext::new(identity(), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        ctx.add_breadcrumb("parse", json!({}));
        ctx.add_breadcrumb("route", json!({}));
        assert_eq!(ctx.breadcrumb_count(), 2);
    }

    #[test]
    fn cancellation_token_reflects_cancel_call() {
        let ctx = RequestContext::new(identity(), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        assert!(!ctx.is_cancelled());
        ctx.cancel();
        assert!(ctx.is_cancelled());
    }

    #[test]
    fn remaining_timeout_none_without_deadline() {
        let ctx = RequestContext::new(identity(), None, ResourceSnapshot { memory_bytes: 0, task_count: 0 });
        assert!(ctx.remaining_timeout().is_none());
    }

    #[test]
    fn remaining_timeout_some_with_deadline() {
        let ctx = RequestContext::new(
            identity(),
            Some(Duration::from_secs(30)),
            ResourceSnapshot { memory_bytes: 0, task_count: 0 },
        );
        assert!(ctx.remaining_timeout().unwrap() <= Duration::from_secs(30));
    }
}
