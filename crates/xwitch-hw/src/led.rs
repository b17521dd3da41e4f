//! Status LED boundary.

use std::sync::atomic::{AtomicBool, Ordering};

/// Port for the board status LED. Lit once the unit knows its chain
/// position, dark after a reset.
pub trait StatusLed: Send + Sync {
    fn set(&self, on: bool);
    fn is_on(&self) -> bool;
}

/// In-memory LED.
pub struct SimLed {
    on: AtomicBool,
}

impl SimLed {
    pub fn new() -> Self {
        Self {
            on: AtomicBool::new(false),
        }
    }
}

impl Default for SimLed {
    fn default() -> Self {
        Self::new()
    }
}

impl StatusLed for SimLed {
    fn set(&self, on: bool) {
        self.on.store(on, Ordering::Relaxed);
    }

    fn is_on(&self) -> bool {
        self.on.load(Ordering::Relaxed)
    }
}
