//! Signal raised by the step loop when it observes the simulation mode
//!
//! Resetting a run must wait until the step loop has actually seen the world
//! switch back to static mode. The step loop calls [`ModeSignal::observe`] at
//! the start of every tick; a waiter either blocks on [`ModeSignal::wait_for`]
//! from another thread or polls [`ModeSignal::observed`] from its own tick.

use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

#[derive(Debug, Default)]
pub struct ModeSignal {
    /// Mode seen by the latest tick (`true` = dynamic), `None` before any tick
    observed: Mutex<Option<bool>>,
    changed: Condvar,
}

impl ModeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the mode the step loop is running in and wake waiters
    pub fn observe(&self, dynamic: bool) {
        let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
        *observed = Some(dynamic);
        self.changed.notify_all();
    }

    pub fn observed(&self) -> Option<bool> {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Forget the last observation so the next wait needs a fresh tick
    pub fn invalidate(&self) {
        *self.observed.lock().unwrap_or_else(PoisonError::into_inner) = None;
    }

    /// Block until the step loop reports `dynamic`, or `timeout` elapses
    ///
    /// Returns whether the mode was observed.
    pub fn wait_for(&self, dynamic: bool, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut observed = self.observed.lock().unwrap_or_else(PoisonError::into_inner);
        while *observed != Some(dynamic) {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            let (guard, _) = self
                .changed
                .wait_timeout(observed, deadline - now)
                .unwrap_or_else(PoisonError::into_inner);
            observed = guard;
        }
        true
    }
}
