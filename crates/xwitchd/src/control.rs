//! Foreground control loop.
//!
//! Drains host-facing requests out of the decoded queue and answers
//! them upstream: switch actuation, switch status, chain length. Hub
//! returns pass through untouched — they belong to whichever relay call
//! is polling for them.

use std::sync::Arc;

use tokio::sync::broadcast;

use xwitch_core::chain::ChainState;
use xwitch_core::wire::{encode, CommandCode, Message, STATUS_ACK, STATUS_ERROR};
use xwitch_hw::MuxPosition;

use crate::link::Direction;
use crate::switch::ActuationSource;
use crate::unit::Shared;

pub(crate) struct ControlLoop {
    shared: Arc<Shared>,
    shutdown: broadcast::Receiver<()>,
}

impl ControlLoop {
    pub fn new(shared: Arc<Shared>, shutdown: broadcast::Receiver<()>) -> Self {
        Self { shared, shutdown }
    }

    pub async fn run(mut self) {
        let poll = self.shared.cfg.timing.poll_interval();
        loop {
            tokio::select! {
                _ = self.shutdown.recv() => {
                    tracing::debug!("control loop shutting down");
                    return;
                }
                _ = tokio::time::sleep(poll) => {}
            }

            let (requests, chain) = {
                let mut mb = self.shared.mailbox.lock().await;
                let mut requests = Vec::new();
                while let Some(inbound) = mb.decoded.take_where(|i| {
                    matches!(
                        i.msg.command,
                        CommandCode::SetSwitch | CommandCode::GetSwitch | CommandCode::GetTotalHubs
                    )
                }) {
                    tracing::trace!(from = ?inbound.from, command = ?inbound.msg.command, "request dequeued");
                    requests.push(inbound.msg);
                }
                (requests, mb.chain)
            };

            for msg in requests {
                self.serve(&msg, &chain);
            }
        }
    }

    /// Answer one request. Replies echo the request code with the value
    /// in arg1 and a status in arg2.
    fn serve(&self, msg: &Message, chain: &ChainState) {
        let reply = match msg.command {
            CommandCode::SetSwitch => {
                let position = MuxPosition::from_byte(msg.arg1);
                match self.shared.switch.set(ActuationSource::Host, position) {
                    Ok(applied) => encode(CommandCode::SetSwitch, applied.as_byte(), STATUS_ACK),
                    Err(e) => {
                        tracing::warn!(error = %e, "host switch actuation failed");
                        encode(CommandCode::SetSwitch, msg.arg1, STATUS_ERROR)
                    }
                }
            }
            CommandCode::GetSwitch => encode(
                CommandCode::GetSwitch,
                self.shared.switch.position().as_byte(),
                STATUS_ACK,
            ),
            CommandCode::GetTotalHubs => {
                if chain.total_hubs >= 0 {
                    encode(CommandCode::GetTotalHubs, chain.total_hubs as u8, STATUS_ACK)
                } else {
                    encode(CommandCode::GetTotalHubs, 0, STATUS_ERROR)
                }
            }
            _ => return,
        };

        if let Err(e) = self.shared.send(Direction::Upstream, reply) {
            tracing::warn!(error = %e, "control reply send failed");
        }
    }
}
