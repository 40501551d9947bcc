use serde_json::Value;
use std::time::{Duration, Instant};

/// A single timestamped entry in a request's breadcrumb trail. `delta` is
/// the time elapsed since the previous breadcrumb (or since context
/// creation, for the first one) so consumers don't need to reconstruct
/// timing by diffing absolute timestamps.
#[derive(Debug, Clone)]
pub struct Breadcrumb {
    pub operation: String,
    pub recorded_at: Instant,
    pub delta: Duration,
    pub data: Value,
}

/// Append-only, thread-safe trail. `push` is O(1): a single lock acquisition
/// and a `Vec::push`.
#[derive(Debug, Default)]
pub struct BreadcrumbTrail {
    entries: parking_lot::Mutex<Vec<Breadcrumb>>,
}

impl BreadcrumbTrail {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&self, operation: impl Into<String>, data: Value, now: Instant, origin: Instant) {
        let mut entries = self.entries.lock();
        let previous = entries.last().map(|b| b.recorded_at).unwrap_or(origin);
        entries.push(Breadcrumb {
            operation: operation.into(),
            recorded_at: now,
            delta: now.saturating_duration_since(previous),
            data,
        });
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot for diagnostics; breadcrumbs are never mutated after being
    /// pushed so a clone is a safe, consistent point-in-time read.
    pub fn snapshot(&self) -> Vec<Breadcrumb> {
        self.entries.lock().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_records_delta_from_previous_entry() {
        let trail = BreadcrumbTrail::new();
        let origin = Instant::now();
        trail.push("parse", json!({}), origin, origin);
        let later = origin + Duration::from_millis(50);
        trail.push("route", json!({}), later, origin);

        let snapshot = trail.snapshot();
        assert_eq!(snapshot.len(), 2);
        assert_eq!(snapshot[1].delta, Duration::from_millis(50));
    }

    #[test]
    fn trail_starts_empty() {
        let trail = BreadcrumbTrail::new();
        assert!(trail.is_empty());
    }
}
