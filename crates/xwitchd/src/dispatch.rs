//! Receive dispatcher — the single background task translating raw
//! bytes into routed actions.
//!
//! Each iteration polls both serial endpoints, appends completed frames
//! to the per-direction queues under the lock, then pops one frame for
//! the router. It is the only writer of the raw queues and the only
//! reader that advances them. It never fails: decode noise is the
//! router's to swallow, read errors cost at most one poll.

use std::sync::Arc;

use tokio::sync::broadcast;

use crate::router;
use crate::unit::Shared;

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    shutdown: broadcast::Receiver<()>,
}

impl Dispatcher {
    pub fn new(shared: Arc<Shared>, shutdown: broadcast::Receiver<()>) -> Self {
        Self { shared, shutdown }
    }

    pub async fn run(mut self) {
        let poll = self.shared.cfg.timing.poll_interval();
        tracing::debug!("receive dispatcher started");
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!("receive dispatcher shutting down");
                    return;
                }
                _ = tokio::time::sleep(poll) => {}
            }

            let frames = self.shared.poll_links();
            let mut mb = self.shared.mailbox.lock().await;
            for (dir, raw) in frames {
                if mb.raw_mut(dir).push(raw) {
                    tracing::warn!(?dir, "receive queue overflow, oldest frame dropped");
                }
            }
            if let Some((raw, dir)) = mb.pop_raw() {
                router::route(&self.shared, &mut mb, raw, dir).await;
            }
        }
    }
}
