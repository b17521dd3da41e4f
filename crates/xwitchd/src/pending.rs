//! Outstanding-request tracking.
//!
//! Every wait in the protocol — a discovery ack, a bubbled-up scan
//! return, an addressed get/set reply — is one [`Pending`] driven by
//! observed frames and a wall-clock deadline. The state machine itself
//! is pure, so timeout behavior tests run on synthetic instants instead
//! of real serial timing.

use std::time::{Duration, Instant};

use xwitch_core::wire::{decode, CommandCode, Message, STATUS_ACK};

use crate::link::{Direction, RawFrame};
use crate::queue::Mailbox;
use crate::unit::Shared;

/// Which wait a deadline elapsed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Stage {
    Ack,
    Return,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    AwaitingAck,
    AwaitingReturn,
    Done(Message),
    TimedOut(Stage),
}

#[derive(Debug, Clone, Copy)]
enum ExpectedReturn {
    /// The chain-length report ending a discovery scan.
    Scan,
    /// An addressed reply: this return code for this unit index.
    Hub { command: CommandCode, index: u8 },
}

/// One outstanding request.
#[derive(Debug)]
pub(crate) struct Pending {
    phase: Phase,
    expect_return: Option<ExpectedReturn>,
    deadline: Instant,
    return_timeout: Duration,
}

impl Pending {
    /// Root discovery: an ack within `ack_timeout`, then the scan return
    /// within `return_timeout` of the ack.
    pub fn discovery(now: Instant, ack_timeout: Duration, return_timeout: Duration) -> Self {
        Self {
            phase: Phase::AwaitingAck,
            expect_return: Some(ExpectedReturn::Scan),
            deadline: now + ack_timeout,
            return_timeout,
        }
    }

    /// A relayed probe's ack wait — absence marks the end of the chain.
    pub fn scan_ack(now: Instant, timeout: Duration) -> Self {
        Self {
            phase: Phase::AwaitingAck,
            expect_return: None,
            deadline: now + timeout,
            return_timeout: Duration::ZERO,
        }
    }

    /// An addressed get/set reply with a matching unit index.
    pub fn hub_reply(command: CommandCode, index: u8, now: Instant, timeout: Duration) -> Self {
        Self {
            phase: Phase::AwaitingReturn,
            expect_return: Some(ExpectedReturn::Hub { command, index }),
            deadline: now + timeout,
            return_timeout: Duration::ZERO,
        }
    }

    /// Feed one observed frame. Non-matching frames leave the state
    /// untouched.
    pub fn observe(&mut self, msg: &Message, now: Instant) {
        match self.phase {
            Phase::AwaitingAck => {
                if msg.command == CommandCode::Scan && msg.arg2 == STATUS_ACK {
                    match self.expect_return {
                        None => self.phase = Phase::Done(*msg),
                        Some(_) => {
                            self.phase = Phase::AwaitingReturn;
                            self.deadline = now + self.return_timeout;
                        }
                    }
                }
            }
            Phase::AwaitingReturn => {
                let matched = match self.expect_return {
                    Some(ExpectedReturn::Scan) => msg.command == CommandCode::ScanReturn,
                    Some(ExpectedReturn::Hub { command, index }) => {
                        msg.command == command && msg.arg1 == index
                    }
                    None => false,
                };
                if matched {
                    self.phase = Phase::Done(*msg);
                }
            }
            Phase::Done(_) | Phase::TimedOut(_) => {}
        }
    }

    /// Fail the current wait if its deadline has passed.
    pub fn check_deadline(&mut self, now: Instant) {
        if now < self.deadline {
            return;
        }
        match self.phase {
            Phase::AwaitingAck => self.phase = Phase::TimedOut(Stage::Ack),
            Phase::AwaitingReturn => self.phase = Phase::TimedOut(Stage::Return),
            Phase::Done(_) | Phase::TimedOut(_) => {}
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn settled(&self) -> bool {
        matches!(self.phase, Phase::Done(_) | Phase::TimedOut(_))
    }
}

// ── Lock-held polling ────────────────────────────────────────────────────────

/// Drive a [`Pending`] by polling the serial links directly, with the
/// mailbox lock held by the caller for the whole wait.
///
/// Frames from the watched direction feed the request; non-matching ones
/// are dropped — whoever is waiting owns that link for the duration.
/// Frames from the other direction are queued for normal routing once
/// the lock is released.
pub(crate) async fn drive(
    shared: &Shared,
    mb: &mut Mailbox,
    watch: Direction,
    pending: &mut Pending,
) {
    let poll = shared.cfg.timing.poll_interval();
    loop {
        // Frames that beat us into the queue count too.
        while let Some(raw) = mb.raw_mut(watch).pop() {
            observe_raw(pending, &raw, watch);
            if pending.settled() {
                return;
            }
        }
        for (dir, raw) in shared.poll_links() {
            if dir == watch {
                observe_raw(pending, &raw, dir);
            } else if mb.raw_mut(dir).push(raw) {
                tracing::warn!(?dir, "receive queue overflow, oldest frame dropped");
            }
        }
        pending.check_deadline(Instant::now());
        if pending.settled() {
            return;
        }
        tokio::time::sleep(poll).await;
    }
}

fn observe_raw(pending: &mut Pending, raw: &RawFrame, from: Direction) {
    match decode(raw) {
        Ok(msg) => {
            let before = pending.phase();
            pending.observe(&msg, Instant::now());
            if pending.phase() == before {
                tracing::trace!(?from, command = ?msg.command, "frame ignored while waiting");
            }
        }
        Err(e) => {
            tracing::debug!(?from, frame = %hex::encode(raw), error = %e, "dropping malformed frame");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
