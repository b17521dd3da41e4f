//! USB mux boundary — the 2:1 channel switch in front of the hub's
//! upstream port.

use std::sync::Mutex;

/// Which leg of the 2:1 mux is routed through. The silkscreen names the
/// legs 2-1 and 2-2.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MuxPosition {
    One,
    Two,
}

impl MuxPosition {
    /// The single-byte encoding used on the wire and in audit records.
    pub fn as_byte(self) -> u8 {
        match self {
            MuxPosition::One => 0,
            MuxPosition::Two => 1,
        }
    }

    pub fn from_byte(byte: u8) -> Self {
        if byte == 0 {
            MuxPosition::One
        } else {
            MuxPosition::Two
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            MuxPosition::One => MuxPosition::Two,
            MuxPosition::Two => MuxPosition::One,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SwitchError {
    #[error("mux actuation failed: {0}")]
    Actuation(String),
}

/// Port for the mux select line and its VBus relay.
pub trait MuxSwitch: Send + Sync {
    fn set_position(&self, position: MuxPosition) -> Result<(), SwitchError>;
    fn position(&self) -> MuxPosition;
}

/// In-memory mux, boots on leg 2-1 like the hardware.
pub struct SimMux {
    position: Mutex<MuxPosition>,
}

impl SimMux {
    pub fn new() -> Self {
        Self {
            position: Mutex::new(MuxPosition::One),
        }
    }
}

impl Default for SimMux {
    fn default() -> Self {
        Self::new()
    }
}

impl MuxSwitch for SimMux {
    fn set_position(&self, position: MuxPosition) -> Result<(), SwitchError> {
        *self.position.lock().unwrap() = position;
        Ok(())
    }

    fn position(&self) -> MuxPosition {
        *self.position.lock().unwrap()
    }
}
