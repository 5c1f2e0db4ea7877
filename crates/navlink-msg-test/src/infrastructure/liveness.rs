//! Heartbeat bookkeeping shared between a session's reader and its callers.
//!
//! The reader thread is the only socket reader, so callers never poll the
//! socket for heartbeats themselves.  The reader records each HEARTBEAT's
//! source system id here and wakes every waiter.

use std::collections::HashMap;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

/// Last heartbeat time per source system id.
#[derive(Debug, Default)]
pub struct LivenessBoard {
    seen: Mutex<HashMap<u8, Instant>>,
    changed: Condvar,
}

impl LivenessBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Notes a heartbeat from `system_id` and wakes waiters.
    pub fn record(&self, system_id: u8) {
        self.seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(system_id, Instant::now());
        self.changed.notify_all();
    }

    /// `true` once any heartbeat has been recorded.
    pub fn any(&self) -> bool {
        !self
            .seen
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_empty()
    }

    /// Blocks until `system_id` has been heard from, or `timeout` elapses.
    pub fn wait_for(&self, system_id: u8, timeout: Duration) -> bool {
        let guard = self.seen.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .changed
            .wait_timeout_while(guard, timeout, |seen| !seen.contains_key(&system_id))
            .unwrap_or_else(PoisonError::into_inner);
        guard.contains_key(&system_id)
    }
}
