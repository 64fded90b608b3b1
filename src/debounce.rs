//! Trailing-edge debounce.
//!
//! [`Debouncer`] owns a single deadline. Every [`trigger`](Debouncer::trigger) cancels the
//! pending deadline and schedules a new one `delay` later; [`fire_due`](Debouncer::fire_due)
//! reports `true` exactly once when the quiet period has elapsed. Time is passed in by the
//! caller so the event loop (and tests) decide what "now" is.

use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
pub struct Debouncer {
    delay: Duration,
    deadline: Option<Instant>,
}

impl Debouncer {
    pub fn new(delay: Duration) -> Self {
        Self {
            delay,
            deadline: None,
        }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Cancel any pending deadline and reschedule from `now`.
    pub fn trigger(&mut self, now: Instant) {
        self.deadline = Some(now + self.delay);
    }

    pub fn cancel(&mut self) {
        self.deadline = None;
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    /// `true` once the deadline has passed; the debouncer is then idle again.
    pub fn fire_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(at) if now >= at => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}
