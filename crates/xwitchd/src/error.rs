//! Protocol-level failures surfaced to foreground callers.
//!
//! Framing noise never appears here — the dispatcher absorbs it. What
//! does appear is never retried automatically; the caller owns the retry
//! decision, and a wedged chain calls for a fresh scan.

use crate::link::LinkError;

#[derive(Debug, thiserror::Error)]
pub enum ChainError {
    /// The local serial channel rejected a write.
    #[error(transparent)]
    Link(#[from] LinkError),

    /// An addressed unit never answered within the per-request deadline.
    #[error("no reply from unit {index} within {timeout_ms} ms")]
    Timeout { index: i16, timeout_ms: u64 },

    /// The scan was acked but the chain-length report never bubbled up.
    #[error("chain scan incomplete after {timeout_ms} ms")]
    ScanTimeout { timeout_ms: u64 },

    /// An addressed unit failed to apply a hub update, or went silent
    /// mid-update.
    #[error("unit {index} rejected the hub update")]
    Failure { index: i16 },

    /// The addressed unit's hub IC has not finished its register init.
    #[error("hub {index} is not ready")]
    HubNotReady { index: i16 },

    /// Caller-side mistake caught before any bytes hit the wire.
    #[error("{0}")]
    Configuration(String),
}
