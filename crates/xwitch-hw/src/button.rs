//! Manual override button boundary.
//!
//! The hardware delivers edges from the front-panel push button; the
//! watcher task polls accumulated edges and feeds them into the same
//! switch-authority path that remote commands use.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Port for the push-button edge source.
pub trait ButtonEvents: Send {
    /// Take all press edges accumulated since the last poll.
    fn poll_presses(&mut self) -> usize;
}

/// In-memory button. The [`SimButtonHandle`] side injects presses from
/// tests or a host shell.
pub struct SimButton {
    presses: Arc<AtomicUsize>,
}

/// Cloneable injector half of a [`SimButton`].
#[derive(Clone)]
pub struct SimButtonHandle {
    presses: Arc<AtomicUsize>,
}

impl SimButton {
    pub fn new() -> (Self, SimButtonHandle) {
        let presses = Arc::new(AtomicUsize::new(0));
        (
            Self {
                presses: presses.clone(),
            },
            SimButtonHandle { presses },
        )
    }
}

impl SimButtonHandle {
    /// Register one press edge.
    pub fn press(&self) {
        self.presses.fetch_add(1, Ordering::SeqCst);
    }
}

impl ButtonEvents for SimButton {
    fn poll_presses(&mut self) -> usize {
        self.presses.swap(0, Ordering::SeqCst)
    }
}
