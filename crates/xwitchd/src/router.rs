//! Frame routing.
//!
//! A pure dispatch on (command code, arrival direction, chain state):
//! a frame either terminates at this unit, relays bit-for-bit to the
//! next hop, or lands in the decoded queue for a foreground consumer.
//! Malformed frames die here, silently.

use std::time::Instant;

use xwitch_core::wire::{
    decode, encode, CommandCode, Message, STATUS_ACK, STATUS_ERROR,
};
use xwitch_hw::{CHAIN_RESERVED_BIT, PORT_MASK};

use crate::link::{Direction, RawFrame};
use crate::pending::{self, Pending, Phase};
use crate::queue::{Inbound, Mailbox};
use crate::unit::Shared;

pub(crate) async fn route(shared: &Shared, mb: &mut Mailbox, raw: RawFrame, from: Direction) {
    let msg = match decode(&raw) {
        Ok(msg) => msg,
        Err(e) => {
            tracing::debug!(?from, frame = %hex::encode(raw), error = %e, "dropping malformed frame");
            return;
        }
    };
    tracing::trace!(?from, command = ?msg.command, arg1 = msg.arg1, arg2 = msg.arg2, "rx");

    match (msg.command, from) {
        (CommandCode::Scan, Direction::Upstream) => handle_scan(shared, mb, &msg).await,

        // An ack nobody is waiting for — its request already timed out.
        (CommandCode::Scan, Direction::Downstream) => {
            tracing::debug!("stray discovery ack dropped");
        }

        (CommandCode::ScanReturn, Direction::Downstream) => {
            mb.chain.total_hubs = i16::from(msg.arg1);
            tracing::info!(total_hubs = mb.chain.total_hubs, "chain length learned");
            relay(shared, Direction::Upstream, &raw);
        }

        (CommandCode::ScanReturn, Direction::Upstream) => {
            tracing::debug!("scan return from upstream dropped");
        }

        (CommandCode::GetHub | CommandCode::SetHub, _) => {
            handle_hub_request(shared, mb, &msg, &raw);
        }

        (CommandCode::GetHubReturn | CommandCode::SetHubReturn, Direction::Downstream)
            if mb.chain.own_index > 0 =>
        {
            relay(shared, Direction::Upstream, &raw);
        }

        // Everything else belongs to a foreground consumer.
        _ => {
            if mb.decoded.push(Inbound { msg, from }) {
                tracing::warn!("decoded queue overflow, oldest message dropped");
            }
        }
    }
}

/// A discovery probe from upstream: adopt the next index, pass the probe
/// on, ack the sender, then find out whether anyone is behind us.
async fn handle_scan(shared: &Shared, mb: &mut Mailbox, msg: &Message) {
    let own = i16::from(msg.arg1) + 1;
    mb.chain.reset();
    mb.chain.own_index = own;
    shared.led.set(true);
    tracing::info!(own_index = own, "chain position assigned");

    if let Err(e) = shared.send(Direction::Downstream, encode(CommandCode::Scan, own as u8, 0)) {
        tracing::warn!(error = %e, "scan relay failed");
    }
    if let Err(e) = shared.send(
        Direction::Upstream,
        encode(CommandCode::Scan, own as u8, STATUS_ACK),
    ) {
        tracing::warn!(error = %e, "scan ack failed");
    }

    let mut ack = Pending::scan_ack(Instant::now(), shared.cfg.timing.end_chain_timeout());
    pending::drive(shared, mb, Direction::Downstream, &mut ack).await;

    if let Phase::TimedOut(_) = ack.phase() {
        // Silence below: this unit ends the chain.
        let total = own + 1;
        mb.chain.total_hubs = total;
        tracing::info!(total_hubs = total, "end of chain, reporting length");
        if let Err(e) = shared.send(
            Direction::Upstream,
            encode(CommandCode::ScanReturn, total as u8, 0),
        ) {
            tracing::warn!(error = %e, "scan return send failed");
        }
    }
    // On an ack the neighbour took over; its scan return arrives through
    // normal routing later.
}

/// GET_HUB / SET_HUB: ours to execute, or someone else's to pass on.
fn handle_hub_request(shared: &Shared, mb: &mut Mailbox, msg: &Message, raw: &RawFrame) {
    if i16::from(msg.arg1) != mb.chain.own_index {
        relay(shared, Direction::Downstream, raw);
        return;
    }

    let reply = match msg.command {
        CommandCode::GetHub => match shared.hub.get_hub_channels() {
            Ok(mask) => encode(CommandCode::GetHubReturn, msg.arg1, mask),
            Err(e) => {
                tracing::debug!(error = %e, "local hub read failed");
                encode(CommandCode::GetHubReturn, msg.arg1, STATUS_ERROR)
            }
        },
        CommandCode::SetHub => {
            let mut mask = msg.arg2 & PORT_MASK;
            if mb.chain.is_mid_chain(mb.chain.own_index) {
                // The downstream link rides on this port; never let a
                // remote mask cut it.
                mask |= CHAIN_RESERVED_BIT;
            }
            match shared.hub.set_hub_channels(mask) {
                Ok(()) => encode(CommandCode::SetHubReturn, msg.arg1, STATUS_ACK),
                Err(e) => {
                    tracing::debug!(error = %e, "local hub update failed");
                    encode(CommandCode::SetHubReturn, msg.arg1, STATUS_ERROR)
                }
            }
        }
        _ => return,
    };

    if let Err(e) = shared.send(Direction::Upstream, reply) {
        tracing::warn!(error = %e, "hub reply send failed");
    }
}

/// Forward a frame untouched. The router never raises; a dead link only
/// costs this frame.
fn relay(shared: &Shared, dir: Direction, raw: &RawFrame) {
    tracing::trace!(?dir, frame = %hex::encode(raw), "relay");
    if let Err(e) = shared.relay_raw(dir, raw) {
        tracing::warn!(?dir, error = %e, "relay failed");
    }
}
