//! Pool lifecycle state machine

use serde::Serialize;

/// Result of the one-time thread-safety check of the client library
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ThreadSafety {
    Unchecked,
    Safe,
    Unsafe,
}

/// Observable lifecycle status of a pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    /// Never successfully initialized
    Uninitialized,
    /// Operational, connections can be acquired
    Open,
    /// Closed with `close()`; no reconnect needed
    ClosedExplicit,
    /// Connectivity was lost without `close()`; reopen to reconnect
    ClosedLost,
}

/// Lifecycle flags, guarded by the pool's state `RwLock`.
///
/// `open && closed` never holds. `initialized` and `thread_safety` are
/// written once and never reset.
#[derive(Debug)]
pub(crate) struct PoolState {
    initialized: bool,
    thread_safety: ThreadSafety,
    open: bool,
    closed: bool,
}

impl PoolState {
    pub(crate) fn new() -> Self {
        Self {
            initialized: false,
            thread_safety: ThreadSafety::Unchecked,
            open: false,
            closed: true,
        }
    }

    pub(crate) fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub(crate) fn thread_safety(&self) -> ThreadSafety {
        self.thread_safety
    }

    pub(crate) fn is_open(&self) -> bool {
        self.open
    }

    pub(crate) fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn status(&self) -> PoolStatus {
        match (self.initialized, self.open, self.closed) {
            (false, _, _) => PoolStatus::Uninitialized,
            (true, true, _) => PoolStatus::Open,
            (true, false, true) => PoolStatus::ClosedExplicit,
            (true, false, false) => PoolStatus::ClosedLost,
        }
    }

    pub(crate) fn record_thread_safety(&mut self, safe: bool) {
        debug_assert_eq!(self.thread_safety, ThreadSafety::Unchecked);
        self.thread_safety = if safe {
            ThreadSafety::Safe
        } else {
            ThreadSafety::Unsafe
        };
    }

    pub(crate) fn mark_initialized(&mut self) {
        self.initialized = true;
    }

    pub(crate) fn mark_open(&mut self) {
        self.open = true;
        self.closed = false;
        self.check();
    }

    pub(crate) fn mark_closed(&mut self) {
        self.open = false;
        self.closed = true;
        self.check();
    }

    pub(crate) fn mark_lost(&mut self) {
        self.open = false;
        self.closed = false;
        self.check();
    }

    fn check(&self) {
        debug_assert!(!(self.open && self.closed), "pool both open and closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state_is_closed_and_uninitialized() {
        let state = PoolState::new();
        assert!(!state.is_open());
        assert!(state.is_closed());
        assert_eq!(state.status(), PoolStatus::Uninitialized);
        assert_eq!(state.thread_safety(), ThreadSafety::Unchecked);
    }

    #[test]
    fn test_transitions() {
        let mut state = PoolState::new();
        state.record_thread_safety(true);
        state.mark_initialized();
        assert_eq!(state.status(), PoolStatus::ClosedExplicit);

        state.mark_open();
        assert_eq!(state.status(), PoolStatus::Open);

        state.mark_lost();
        assert_eq!(state.status(), PoolStatus::ClosedLost);
        assert!(!state.is_open());
        assert!(!state.is_closed());

        state.mark_open();
        state.mark_closed();
        assert_eq!(state.status(), PoolStatus::ClosedExplicit);
    }
}
