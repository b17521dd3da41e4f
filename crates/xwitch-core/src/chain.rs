//! Chain position tracking.
//!
//! Every unit carries one of these records. It starts undiscovered at
//! boot, is rewritten by each discovery scan, and is read by relay logic
//! to decide whether a frame terminates here or travels on.

/// Sentinel for "not yet discovered". Used for both fields.
pub const UNDISCOVERED: i16 = -1;

/// A unit's knowledge of its place in the chain.
///
/// Written only by discovery and routing logic; foreground calls read it
/// through snapshots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChainState {
    /// This unit's position, 0 = root. [`UNDISCOVERED`] until a scan
    /// has passed through.
    pub own_index: i16,
    /// Total number of units in the chain. [`UNDISCOVERED`] until the
    /// scan return has bubbled back through this unit.
    pub total_hubs: i16,
}

impl ChainState {
    pub fn new() -> Self {
        Self {
            own_index: UNDISCOVERED,
            total_hubs: UNDISCOVERED,
        }
    }

    /// Forget everything. Called at boot and at the start of each scan.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn is_discovered(&self) -> bool {
        self.own_index != UNDISCOVERED && self.total_hubs != UNDISCOVERED
    }

    /// Whether this unit is the last in the chain. An undiscovered unit
    /// counts as terminal: with no known neighbour there is no link to
    /// protect.
    pub fn is_terminal(&self) -> bool {
        self.total_hubs == UNDISCOVERED || self.own_index == self.total_hubs - 1
    }

    /// Whether the unit at `index` sits mid-chain, i.e. keeps one hub
    /// channel reserved for the downstream link.
    pub fn is_mid_chain(&self, index: i16) -> bool {
        self.total_hubs != UNDISCOVERED && index < self.total_hubs - 1
    }
}

impl Default for ChainState {
    fn default() -> Self {
        Self::new()
    }
}
