use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU8, Ordering};

/// Adapter lifecycle state: transitions obey the
/// DAG `uninitialized → initialized → starting → running → stopping →
/// stopped`, with `error` reachable from any non-terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdapterState {
    Uninitialized,
    Initialized,
    Starting,
    Running,
    Stopping,
    Stopped,
    Error,
}

impl AdapterState {
    fn ordinal(self) -> u8 {
        match self {
            AdapterState::Uninitialized => 0,
            AdapterState::Initialized => 1,
            AdapterState::Starting => 2,
            AdapterState::Running => 3,
            AdapterState::Stopping => 4,
            AdapterState::Stopped => 5,
            AdapterState::Error => 6,
        }
    }

    fn from_ordinal(v: u8) -> Self {
        match v {
            0 => AdapterState::Uninitialized,
            1 => AdapterState::Initialized,
            2 => AdapterState::Starting,
            3 => AdapterState::Running,
            4 => AdapterState::Stopping,
            5 => AdapterState::Stopped,
            _ => AdapterState::Error,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, AdapterState::Stopped | AdapterState::Error)
    }

    /// Whether selection by the registry is legal in this state.
    pub fn is_selectable(self) -> bool {
        matches!(self, AdapterState::Running)
    }

    pub fn can_transition_to(self, next: AdapterState) -> bool {
        if next == AdapterState::Error {
            return !matches!(self, AdapterState::Stopped | AdapterState::Error);
        }
        matches!(
            (self, next),
            (AdapterState::Uninitialized, AdapterState::Initialized)
                | (AdapterState::Initialized, AdapterState::Starting)
                | (AdapterState::Starting, AdapterState::Running)
                | (AdapterState::Running, AdapterState::Stopping)
                | (AdapterState::Stopping, AdapterState::Stopped)
        )
    }
}

/// Atomic cell holding an `AdapterState`, shared across the registry, health
/// probe, and hot-reload controller.
#[derive(Debug)]
pub struct AdapterStateCell(AtomicU8);

impl AdapterStateCell {
    pub fn new(initial: AdapterState) -> Self {
        Self(AtomicU8::new(initial.ordinal()))
    }

    pub fn get(&self) -> AdapterState {
        AdapterState::from_ordinal(self.0.load(Ordering::Acquire))
    }

    /// Returns `true` and performs the transition iff it is legal from the
    /// current state.
    pub fn transition(&self, next: AdapterState) -> bool {
        let current = self.get();
        if !current.can_transition_to(next) {
            return false;
        }
        self.0.store(next.ordinal(), Ordering::Release);
        true
    }

    /// Forces `error` regardless of current state, as permitted from any
    /// non-terminal state.
    pub fn force_error(&self) {
        self.0.store(AdapterState::Error.ordinal(), Ordering::Release);
    }

    /// Recovers an adapter from `error` back to `running` after a
    /// successful health probe. The declared DAG has no path out of
    /// `error`; recovery is a deliberate, narrow exception to it, only
    /// taken by the registry's health-probe loop and only from `error`.
    pub fn recover_to_running(&self) -> bool {
        self.0
            .compare_exchange(
                AdapterState::Error.ordinal(),
                AdapterState::Running.ordinal(),
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .is_ok()
    }
}

impl Default for AdapterStateCell {
    fn default() -> Self {
        Self::new(AdapterState::Uninitialized)
    }
}
