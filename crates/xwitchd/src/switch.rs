//! Mux switch authority.
//!
//! The front-panel button and remote SET_SWITCH commands actuate the
//! same mux. Both paths go through one authority: callers are serialized
//! and applied in arrival order (last writer wins), and every actuation
//! lands in a bounded audit trail.

use std::sync::{Arc, Mutex};
use std::time::Instant;

use tokio::sync::broadcast;

use xwitch_hw::{ButtonEvents, MuxPosition, MuxSwitch, SwitchError};

use crate::queue::RingQueue;
use crate::unit::Shared;

/// Who asked for an actuation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuationSource {
    /// The local push button.
    Button,
    /// A SET_SWITCH frame from the upstream link.
    Host,
}

/// One applied actuation.
#[derive(Debug, Clone)]
pub struct Actuation {
    pub source: ActuationSource,
    pub position: MuxPosition,
    pub at: Instant,
}

pub(crate) struct SwitchAuthority {
    mux: Arc<dyn MuxSwitch>,
    audit: Mutex<RingQueue<Actuation>>,
}

impl SwitchAuthority {
    pub fn new(mux: Arc<dyn MuxSwitch>, audit_capacity: usize) -> Self {
        Self {
            mux,
            audit: Mutex::new(RingQueue::new(audit_capacity)),
        }
    }

    pub fn set(
        &self,
        source: ActuationSource,
        position: MuxPosition,
    ) -> Result<MuxPosition, SwitchError> {
        let mut audit = self.audit.lock().unwrap();
        self.apply(&mut audit, source, position)
    }

    pub fn toggle(&self, source: ActuationSource) -> Result<MuxPosition, SwitchError> {
        // Read and flip under the same lock, or two racing toggles
        // could collapse into one.
        let mut audit = self.audit.lock().unwrap();
        let next = self.mux.position().toggled();
        self.apply(&mut audit, source, next)
    }

    fn apply(
        &self,
        audit: &mut RingQueue<Actuation>,
        source: ActuationSource,
        position: MuxPosition,
    ) -> Result<MuxPosition, SwitchError> {
        self.mux.set_position(position)?;
        audit.push(Actuation {
            source,
            position,
            at: Instant::now(),
        });
        tracing::info!(?source, ?position, "mux actuated");
        Ok(position)
    }

    pub fn position(&self) -> MuxPosition {
        self.mux.position()
    }

    /// Snapshot of the retained actuations, oldest first.
    pub fn audit(&self) -> Vec<Actuation> {
        self.audit.lock().unwrap().iter().cloned().collect()
    }
}

// ── Button watcher ───────────────────────────────────────────────────────────

/// Polls the push-button edge source and feeds presses through the
/// authority, same as any remote command.
pub(crate) struct ButtonWatcher {
    shared: Arc<Shared>,
    button: Box<dyn ButtonEvents>,
    shutdown: broadcast::Receiver<()>,
}

impl ButtonWatcher {
    pub fn new(
        shared: Arc<Shared>,
        button: Box<dyn ButtonEvents>,
        shutdown: broadcast::Receiver<()>,
    ) -> Self {
        Self {
            shared,
            button,
            shutdown,
        }
    }

    pub async fn run(mut self) {
        let poll = self.shared.cfg.timing.poll_interval();
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!("button watcher shutting down");
                    return;
                }
                _ = tokio::time::sleep(poll) => {}
            }
            for _ in 0..self.button.poll_presses() {
                if let Err(e) = self.shared.switch.toggle(ActuationSource::Button) {
                    tracing::warn!(error = %e, "button toggle failed");
                }
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
