//! xwitch wire format — the on-wire frame for the daisy-chain serial protocol.
//!
//! These types ARE the protocol. Every unit on the chain, whatever its
//! position, speaks exactly this 6-byte frame at 115200 baud. Changing
//! anything here is a breaking change for every deployed unit.
//!
//! The frame is #[repr(C, packed)] for deterministic layout and uses
//! zerocopy derives for safe, allocation-free serialization. There is no
//! unsafe code in this module.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, FromZeroes};

// ── Frame ────────────────────────────────────────────────────────────────────

/// First byte of every valid frame.
pub const CHAIN_MARKER: u8 = 0xDC;

/// Wire size of a frame in bytes. Fixed, no extensions.
pub const FRAME_LEN: usize = 6;

/// Generic acknowledgement status carried in `arg2`.
pub const STATUS_ACK: u8 = 0x01;

/// Error sentinel status carried in `arg2`. Distinguishable from any
/// 4-bit channel mask.
pub const STATUS_ERROR: u8 = 0xFF;

/// Divisor for the frame checksum: x^3 + x^2 + 1.
pub const CRC_POLY: u8 = 0b1101;

/// The raw 6-byte frame as it travels on the serial link.
///
/// Wire layout: `[0xDC, command, arg1, arg2, reserved, crc]`.
/// The crc byte holds the 3-bit remainder of dividing the first five
/// bytes by [`CRC_POLY`]; receivers reject a mismatch as framing noise.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsBytes, FromBytes, FromZeroes)]
#[repr(C, packed)]
pub struct Frame {
    pub marker: u8,
    pub command: u8,
    pub arg1: u8,
    pub arg2: u8,
    pub reserved: u8,
    pub crc: u8,
}

// Compile-time size guard. If this fails, the wire format has silently changed.
assert_eq_size!(Frame, [u8; 6]);

impl Frame {
    /// The frame as the exact byte sequence written to the link.
    pub fn to_bytes(self) -> [u8; FRAME_LEN] {
        let mut out = [0u8; FRAME_LEN];
        out.copy_from_slice(self.as_bytes());
        out
    }
}

// ── Command codes ────────────────────────────────────────────────────────────

/// Command byte of a frame.
///
/// Return variants are the request code with bit 4 set. SCAN has no
/// dedicated ack opcode: an ack is the probed unit echoing SCAN with
/// [`STATUS_ACK`] in arg2, told apart from a probe by arrival direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum CommandCode {
    /// Discovery probe travelling root→tail. arg1 = sender's chain index.
    Scan = 0x01,
    /// Apply a hub channel mask. arg1 = target index, arg2 = 4-bit mask.
    SetHub = 0x02,
    /// Read a hub channel mask. arg1 = target index.
    GetHub = 0x03,
    /// Actuate the local USB mux. arg1 = position (0 or 1).
    SetSwitch = 0x04,
    /// Report the local USB mux position.
    GetSwitch = 0x05,
    /// Report the discovered chain length.
    GetTotalHubs = 0x06,
    /// Discovery result travelling tail→root. arg1 = total chain length.
    ScanReturn = 0x11,
    /// SetHub outcome. arg1 = index, arg2 = STATUS_ACK or STATUS_ERROR.
    SetHubReturn = 0x12,
    /// GetHub outcome. arg1 = index, arg2 = mask (≤ 0x0F) or STATUS_ERROR.
    GetHubReturn = 0x13,
}

impl TryFrom<u8> for CommandCode {
    type Error = FramingError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(CommandCode::Scan),
            0x02 => Ok(CommandCode::SetHub),
            0x03 => Ok(CommandCode::GetHub),
            0x04 => Ok(CommandCode::SetSwitch),
            0x05 => Ok(CommandCode::GetSwitch),
            0x06 => Ok(CommandCode::GetTotalHubs),
            0x11 => Ok(CommandCode::ScanReturn),
            0x12 => Ok(CommandCode::SetHubReturn),
            0x13 => Ok(CommandCode::GetHubReturn),
            other => Err(FramingError::UnknownCommand(other)),
        }
    }
}

impl From<CommandCode> for u8 {
    fn from(c: CommandCode) -> u8 {
        c as u8
    }
}

impl CommandCode {
    /// The return variant a unit sends upstream after executing this
    /// request locally. None for codes that are not addressed requests.
    pub fn reply(self) -> Option<CommandCode> {
        match self {
            CommandCode::SetHub => Some(CommandCode::SetHubReturn),
            CommandCode::GetHub => Some(CommandCode::GetHubReturn),
            _ => None,
        }
    }
}

// ── Messages ─────────────────────────────────────────────────────────────────

/// A validated, decoded frame.
///
/// The marker and checksum are wire-level concerns; once [`decode`] has
/// accepted a frame, routing logic only ever sees this.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Message {
    pub command: CommandCode,
    pub arg1: u8,
    pub arg2: u8,
    pub reserved: u8,
}

impl Message {
    pub fn new(command: CommandCode, arg1: u8, arg2: u8) -> Self {
        Self {
            command,
            arg1,
            arg2,
            reserved: 0,
        }
    }

    /// Build the canonical frame for this message, checksum filled in.
    pub fn frame(&self) -> Frame {
        encode(self.command, self.arg1, self.arg2)
    }
}

/// Build the canonical 6-byte frame: marker, command, args, zero
/// reserved byte, and the checksum over the first five bytes.
pub fn encode(command: CommandCode, arg1: u8, arg2: u8) -> Frame {
    let mut frame = Frame {
        marker: CHAIN_MARKER,
        command: command.into(),
        arg1,
        arg2,
        reserved: 0,
        crc: 0,
    };
    frame.crc = checksum(&frame.as_bytes()[..FRAME_LEN - 1]);
    frame
}

/// Validate and decode a raw byte sequence into a [`Message`].
///
/// Fails when the length is not exactly 6, the marker byte is wrong, the
/// command byte is unknown, or the checksum disagrees. Callers drop
/// failed frames; framing errors are never surfaced past the link layer.
pub fn decode(bytes: &[u8]) -> Result<Message, FramingError> {
    if bytes.len() != FRAME_LEN {
        return Err(FramingError::BadLength(bytes.len()));
    }
    if bytes[0] != CHAIN_MARKER {
        return Err(FramingError::BadMarker(bytes[0]));
    }
    let want = checksum(&bytes[..FRAME_LEN - 1]);
    if bytes[FRAME_LEN - 1] != want {
        return Err(FramingError::BadChecksum {
            got: bytes[FRAME_LEN - 1],
            want,
        });
    }
    Ok(Message {
        command: CommandCode::try_from(bytes[1])?,
        arg1: bytes[2],
        arg2: bytes[3],
        reserved: bytes[4],
    })
}

/// Bit-serial polynomial division of `bytes` by [`CRC_POLY`].
///
/// Returns the 3-bit remainder after the message is shifted left by the
/// polynomial degree, i.e. a plain CRC-3 with zero init and no final xor.
pub fn checksum(bytes: &[u8]) -> u8 {
    let mut rem: u8 = 0;
    let mut div = |bit: u8| {
        rem = (rem << 1) | bit;
        if rem & 0b1000 != 0 {
            rem ^= CRC_POLY;
        }
    };
    for &byte in bytes {
        for shift in (0..8).rev() {
            div((byte >> shift) & 1);
        }
    }
    // Flush degree-many zero bits through the register.
    for _ in 0..3 {
        div(0);
    }
    rem & 0b0111
}

// ── Timing ───────────────────────────────────────────────────────────────────

/// How long a unit waits for its immediate downstream neighbour to ack a
/// discovery probe before declaring itself the end of the chain. Also the
/// per-request deadline for addressed get/set replies.
pub const END_CHAIN_TIMEOUT_MS: u64 = 1000;

/// How long the root waits for the chain-length report to bubble back up
/// once its immediate neighbour has acked the scan.
pub const BROADCAST_TIMEOUT_MS: u64 = 3000;

/// Serial link speed. Both directions, every unit.
pub const BAUD_RATE: u32 = 115_200;

// ── Errors ───────────────────────────────────────────────────────────────────

/// A byte sequence that is not a valid frame.
///
/// Framing errors are absorbed where they occur — the link is assumed
/// noisy — and never propagate to protocol callers.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum FramingError {
    #[error("frame length {0}, expected {}", FRAME_LEN)]
    BadLength(usize),

    #[error("bad chain marker: 0x{0:02x}")]
    BadMarker(u8),

    #[error("unknown command byte: 0x{0:02x}")]
    UnknownCommand(u8),

    #[error("checksum mismatch: got 0x{got:02x}, computed 0x{want:02x}")]
    BadChecksum { got: u8, want: u8 },
}

// ── Tests ────────────────────────────────────────────────────────────────────
