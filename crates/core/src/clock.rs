//! Millisecond uptime source handed to the telemetry log.  The core never
//! asks the OS for the time on its own.

use std::cell::Cell;
use std::time::Instant;

pub trait Clock {
    /// Milliseconds since the controller started.
    fn millis(&self) -> u64;
}

impl<C: Clock + ?Sized> Clock for &C {
    fn millis(&self) -> u64 {
        (**self).millis()
    }
}

/// Uptime measured from construction.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    started_at: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            started_at: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn millis(&self) -> u64 {
        self.started_at.elapsed().as_millis() as u64
    }
}

/// Hand-driven clock for tests and replay.
#[derive(Debug, Default)]
pub struct ManualClock {
    now_ms: Cell<u64>,
}

impl ManualClock {
    pub fn new(start_ms: u64) -> Self {
        Self {
            now_ms: Cell::new(start_ms),
        }
    }

    pub fn set(&self, ms: u64) {
        self.now_ms.set(ms);
    }

    pub fn advance(&self, ms: u64) {
        self.now_ms.set(self.now_ms.get().saturating_add(ms));
    }
}

impl Clock for ManualClock {
    fn millis(&self) -> u64 {
        self.now_ms.get()
    }
}
