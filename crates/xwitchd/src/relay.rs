//! Addressed hub operations, root side.
//!
//! `get_hub_chain` and `set_hub_chain` are the host-facing view of the
//! whole chain: index 0 is served locally, anything further is one
//! GET_HUB/SET_HUB hop-relayed down and a matching return polled back
//! out of the decoded queue. Caller mistakes fail before any bytes are
//! sent.

use std::time::Instant;

use xwitch_core::chain::{ChainState, UNDISCOVERED};
use xwitch_core::wire::{encode, CommandCode, Message, STATUS_ACK, STATUS_ERROR};
use xwitch_hw::{CHAIN_RESERVED_BIT, PORT_COUNT};

use crate::error::ChainError;
use crate::link::Direction;
use crate::pending::{Pending, Phase};
use crate::unit::Shared;

pub(crate) fn mask_to_bits(mask: u8, width: usize) -> Vec<bool> {
    (0..width).map(|bit| mask & (1 << bit) != 0).collect()
}

pub(crate) fn bits_to_mask(bits: &[bool]) -> u8 {
    bits.iter()
        .enumerate()
        .fold(0, |mask, (bit, &on)| if on { mask | (1 << bit) } else { mask })
}

/// How many channels unit `index` exposes to the outside: mid-chain
/// units hide the chain-reserved port.
fn visible_width(chain: &ChainState, index: i16) -> usize {
    if chain.is_mid_chain(index) {
        PORT_COUNT - 1
    } else {
        PORT_COUNT
    }
}

/// Channel status of the unit at chain position `id`.
pub(crate) async fn get_hub_chain(shared: &Shared, id: i16) -> Result<Vec<bool>, ChainError> {
    if id < 0 {
        return Err(ChainError::Configuration(format!(
            "hub index {id} out of range"
        )));
    }
    let chain = shared.mailbox.lock().await.chain;

    // Local before anything else: the root answers for itself straight
    // off the hub IC, even before a scan has ever run.
    let local = id == chain.own_index || (chain.own_index == UNDISCOVERED && id == 0);
    if local {
        let mask = shared
            .hub
            .get_hub_channels()
            .map_err(|_| ChainError::HubNotReady { index: id })?;
        return Ok(mask_to_bits(mask, visible_width(&chain, id)));
    }

    if chain.total_hubs == UNDISCOVERED || id >= chain.total_hubs {
        return Err(ChainError::Configuration(format!(
            "hub index {id} out of range for chain of {}",
            chain.total_hubs.max(1)
        )));
    }

    shared.send(
        Direction::Downstream,
        encode(CommandCode::GetHub, id as u8, 0),
    )?;
    let reply = wait_hub_reply(shared, CommandCode::GetHubReturn, id).await?;
    if reply.arg2 == STATUS_ERROR {
        return Err(ChainError::HubNotReady { index: id });
    }
    Ok(mask_to_bits(reply.arg2, visible_width(&chain, id)))
}

/// Apply per-unit channel vectors across the chain, tail first.
///
/// `None` entries skip their unit. Vectors are 3 bits for mid-chain
/// units (the reserved channel is not theirs to give) and up to 4 for
/// the chain-terminal unit.
pub(crate) async fn set_hub_chain(
    shared: &Shared,
    vectors: &[Option<Vec<bool>>],
) -> Result<(), ChainError> {
    let chain = shared.mailbox.lock().await.chain;
    // An undiscovered chain still accepts a root-only update, matching
    // the local fast path of get_hub_chain.
    let total = if chain.total_hubs == UNDISCOVERED {
        1
    } else {
        chain.total_hubs
    };

    if vectors.len() > total as usize {
        return Err(ChainError::Configuration(format!(
            "{} vectors for a chain of {total}",
            vectors.len()
        )));
    }
    for (index, vector) in vectors.iter().enumerate() {
        let Some(bits) = vector else { continue };
        let width = if (index as i16) < total - 1 {
            PORT_COUNT - 1
        } else {
            PORT_COUNT
        };
        if bits.len() > width {
            return Err(ChainError::Configuration(format!(
                "unit {index} accepts at most {width} channels, got {}",
                bits.len()
            )));
        }
    }

    // Tail first: never reconfigure a hub that this update still has to
    // relay through.
    for index in (0..vectors.len()).rev() {
        let Some(bits) = &vectors[index] else {
            continue;
        };
        let mask = bits_to_mask(bits);
        if index == 0 {
            let mask = if chain.is_mid_chain(0) {
                mask | CHAIN_RESERVED_BIT
            } else {
                mask
            };
            shared
                .hub
                .set_hub_channels(mask)
                .map_err(|_| ChainError::HubNotReady { index: 0 })?;
            tracing::debug!(mask, "root hub updated");
        } else {
            shared.send(
                Direction::Downstream,
                encode(CommandCode::SetHub, index as u8, mask),
            )?;
            let reply = match wait_hub_reply(shared, CommandCode::SetHubReturn, index as i16).await
            {
                Ok(reply) => reply,
                // A silent unit mid-update leaves the chain half
                // applied; the caller sees that as a chain failure.
                Err(ChainError::Timeout { index, .. }) => {
                    return Err(ChainError::Failure { index })
                }
                Err(e) => return Err(e),
            };
            if reply.arg2 != STATUS_ACK {
                return Err(ChainError::Failure {
                    index: index as i16,
                });
            }
            tracing::debug!(unit = index, "hub update acked");
        }
    }
    Ok(())
}

/// Poll the decoded queue for a matching-index hub return. Stale
/// returns from abandoned requests are dropped; anything that is not a
/// hub return stays queued for its own consumer.
async fn wait_hub_reply(
    shared: &Shared,
    expected: CommandCode,
    id: i16,
) -> Result<Message, ChainError> {
    let timing = &shared.cfg.timing;
    let mut pending = Pending::hub_reply(expected, id as u8, Instant::now(), timing.end_chain_timeout());
    loop {
        {
            let mut mb = shared.mailbox.lock().await;
            while let Some(inbound) = mb.decoded.take_where(|i| {
                matches!(
                    i.msg.command,
                    CommandCode::GetHubReturn | CommandCode::SetHubReturn
                )
            }) {
                pending.observe(&inbound.msg, Instant::now());
                if let Phase::Done(reply) = pending.phase() {
                    return Ok(reply);
                }
                tracing::debug!(
                    command = ?inbound.msg.command,
                    index = inbound.msg.arg1,
                    "stale hub reply dropped"
                );
            }
        }
        pending.check_deadline(Instant::now());
        if matches!(pending.phase(), Phase::TimedOut(_)) {
            return Err(ChainError::Timeout {
                index: id,
                timeout_ms: timing.end_chain_timeout_ms,
            });
        }
        tokio::time::sleep(timing.poll_interval()).await;
    }
}
