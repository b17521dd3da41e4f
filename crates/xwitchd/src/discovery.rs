//! Chain discovery, root side.
//!
//! The root claims index 0, probes downstream, and waits for the chain
//! length to bubble back. The mailbox lock is held for the entire scan
//! on purpose: discovery rewrites every unit's address, so routing
//! anything concurrently would only confuse the chain. The whole
//! appliance pauses; scans are rare.

use std::time::Instant;

use xwitch_core::chain::UNDISCOVERED;
use xwitch_core::config::LoneRootPolicy;
use xwitch_core::wire::{encode, CommandCode};

use crate::error::ChainError;
use crate::link::Direction;
use crate::pending::{self, Pending, Phase, Stage};
use crate::unit::Shared;

/// Run a full chain scan. Returns the discovered chain length; what a
/// silent downstream means is a policy decision, see
/// [`LoneRootPolicy`].
pub(crate) async fn dc_broadcast(shared: &Shared) -> Result<i16, ChainError> {
    let timing = &shared.cfg.timing;
    let mut mb = shared.mailbox.lock().await;

    mb.chain.reset();
    mb.chain.own_index = 0;
    shared.led.set(true);
    tracing::info!("chain scan started");

    shared.send(Direction::Downstream, encode(CommandCode::Scan, 0, 0))?;

    let mut scan = Pending::discovery(
        Instant::now(),
        timing.end_chain_timeout(),
        timing.broadcast_timeout(),
    );
    pending::drive(shared, &mut mb, Direction::Downstream, &mut scan).await;

    match scan.phase() {
        Phase::Done(msg) => {
            let total = i16::from(msg.arg1);
            mb.chain.total_hubs = total;
            tracing::info!(total_hubs = total, "chain scan complete");
            Ok(total)
        }
        Phase::TimedOut(Stage::Ack) => {
            let total = match shared.cfg.discovery.lone_root {
                LoneRootPolicy::SoleUnit => 1,
                LoneRootPolicy::Undiscovered => UNDISCOVERED,
            };
            mb.chain.total_hubs = total;
            tracing::info!(total_hubs = total, "no downstream ack, lone root");
            Ok(total)
        }
        Phase::TimedOut(Stage::Return) | Phase::AwaitingAck | Phase::AwaitingReturn => {
            Err(ChainError::ScanTimeout {
                timeout_ms: timing.broadcast_timeout_ms,
            })
        }
    }
}
