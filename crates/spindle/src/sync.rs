//! Auto-reset event for cross-loop rendezvous
//!
//! A poster that must not continue until a task has run on another loop
//! posts the task with a clone of the event and waits on it. The event is
//! consumed by the waiter it releases.

use parking_lot::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Binary latch that resets itself when a waiter is released.
#[derive(Debug, Default)]
pub struct AutoResetEvent {
    signaled: Mutex<bool>,
    cond: Condvar,
}

impl AutoResetEvent {
    /// Create an unsignaled event
    pub fn new() -> Self {
        Self {
            signaled: Mutex::new(false),
            cond: Condvar::new(),
        }
    }

    /// Signal the event, releasing one current or future waiter.
    pub fn signal(&self) {
        let mut signaled = self.signaled.lock();
        *signaled = true;
        self.cond.notify_one();
    }

    /// Block until signaled, then reset.
    pub fn wait(&self) {
        let mut signaled = self.signaled.lock();
        while !*signaled {
            self.cond.wait(&mut signaled);
        }
        *signaled = false;
    }

    /// Block until signaled or `timeout` elapses.
    ///
    /// Returns `true` if the wait timed out; the signal is consumed otherwise.
    pub fn wait_with_timeout(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut signaled = self.signaled.lock();
        while !*signaled {
            if self.cond.wait_until(&mut signaled, deadline).timed_out() && !*signaled {
                return true;
            }
        }
        *signaled = false;
        false
    }

    /// Whether a signal is pending
    pub fn is_signaled(&self) -> bool {
        *self.signaled.lock()
    }

    /// Discard a pending signal
    pub fn reset(&self) {
        *self.signaled.lock() = false;
    }
}
