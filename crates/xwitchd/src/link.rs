//! Serial link layer — the two half-duplex endpoints of one unit.
//!
//! Ports are polled, never blocked on: `poll_read` returns whatever the
//! receive buffer holds right now, possibly nothing. Frames can arrive
//! split across polls or glued together, so each endpoint owns a
//! [`FrameAccumulator`] that reassembles exact 6-byte frames and
//! resynchronizes on the chain marker after line noise.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use xwitch_core::wire::{CHAIN_MARKER, FRAME_LEN};

/// Which serial endpoint a frame came from or goes to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Toward the host (root) or the previous unit.
    Upstream,
    /// Toward the next unit.
    Downstream,
}

impl Direction {
    pub fn opposite(self) -> Self {
        match self {
            Direction::Upstream => Direction::Downstream,
            Direction::Downstream => Direction::Upstream,
        }
    }
}

/// Exactly one frame's worth of raw bytes.
pub type RawFrame = [u8; FRAME_LEN];

#[derive(Debug, thiserror::Error)]
pub enum LinkError {
    #[error("failed to open {0}: {1}")]
    Open(String, serialport::Error),
    #[error("serial read failed: {0}")]
    Read(std::io::Error),
    #[error("serial write rejected: {0}")]
    Write(std::io::Error),
}

/// One polled serial endpoint.
pub trait RawSerial: Send {
    /// Non-blocking read of whatever is buffered, up to `buf.len()`
    /// bytes. Returns 0 when nothing is pending.
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError>;

    /// Write one frame's bytes in a single call.
    fn write_frame(&mut self, bytes: &RawFrame) -> Result<(), LinkError>;
}

// ── Frame accumulation ───────────────────────────────────────────────────────

/// Reassembles fixed-length frames from arbitrary serial read chunks.
#[derive(Debug, Default)]
pub struct FrameAccumulator {
    buf: VecDeque<u8>,
    discarded: u64,
}

impl FrameAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn feed(&mut self, bytes: &[u8]) {
        self.buf.extend(bytes);
    }

    /// Next complete frame, if one is buffered. Bytes ahead of a chain
    /// marker are noise and get discarded.
    pub fn next_frame(&mut self) -> Option<RawFrame> {
        while let Some(&byte) = self.buf.front() {
            if byte == CHAIN_MARKER {
                break;
            }
            self.buf.pop_front();
            self.discarded += 1;
        }
        if self.buf.len() < FRAME_LEN {
            return None;
        }
        let mut frame = [0u8; FRAME_LEN];
        for (slot, byte) in frame.iter_mut().zip(self.buf.drain(..FRAME_LEN)) {
            *slot = byte;
        }
        Some(frame)
    }

    /// Total noise bytes dropped while resynchronizing.
    pub fn discarded(&self) -> u64 {
        self.discarded
    }
}

// ── In-memory links ──────────────────────────────────────────────────────────

type ByteQueue = Arc<Mutex<VecDeque<u8>>>;

/// One end of a crossed in-memory serial pair. What one end writes, the
/// other reads. Used by the integration harness in place of hardware.
#[derive(Clone)]
pub struct MemSerial {
    rx: ByteQueue,
    tx: ByteQueue,
    connected: Arc<AtomicBool>,
}

/// Build a connected pair of in-memory serial endpoints.
pub fn mem_pair() -> (MemSerial, MemSerial) {
    let a: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));
    let b: ByteQueue = Arc::new(Mutex::new(VecDeque::new()));
    let connected = Arc::new(AtomicBool::new(true));
    (
        MemSerial {
            rx: a.clone(),
            tx: b.clone(),
            connected: connected.clone(),
        },
        MemSerial {
            rx: b,
            tx: a,
            connected,
        },
    )
}

impl MemSerial {
    /// Sever the pair. Subsequent writes from either end are rejected,
    /// modelling a pulled cable.
    pub fn disconnect(&self) {
        self.connected.store(false, Ordering::SeqCst);
    }

    /// Push arbitrary bytes toward the peer, bypassing framing. Lets
    /// tests put line noise on the wire.
    pub fn inject(&self, bytes: &[u8]) {
        self.tx.lock().unwrap().extend(bytes);
    }
}

impl RawSerial for MemSerial {
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        let mut rx = self.rx.lock().unwrap();
        let n = buf.len().min(rx.len());
        for slot in buf.iter_mut().take(n) {
            *slot = rx.pop_front().unwrap_or(0);
        }
        Ok(n)
    }

    fn write_frame(&mut self, bytes: &RawFrame) -> Result<(), LinkError> {
        if !self.connected.load(Ordering::SeqCst) {
            return Err(LinkError::Write(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "link disconnected",
            )));
        }
        self.tx.lock().unwrap().extend(bytes);
        Ok(())
    }
}

// ── Hardware links ───────────────────────────────────────────────────────────

/// A real serial device behind the [`RawSerial`] port.
pub struct SerialDevice {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialDevice {
    /// Open `path` at `baud` for polled reads. The 1 ms timeout makes
    /// an idle line indistinguishable from an empty buffer, which is
    /// exactly what `poll_read` wants.
    pub fn open(path: &str, baud: u32) -> Result<Self, LinkError> {
        let port = serialport::new(path, baud)
            .timeout(Duration::from_millis(1))
            .flow_control(serialport::FlowControl::None)
            .open()
            .map_err(|e| LinkError::Open(path.to_string(), e))?;
        Ok(Self { port })
    }
}

impl RawSerial for SerialDevice {
    fn poll_read(&mut self, buf: &mut [u8]) -> Result<usize, LinkError> {
        match self.port.read(buf) {
            Ok(n) => Ok(n),
            Err(e) if e.kind() == std::io::ErrorKind::TimedOut => Ok(0),
            Err(e) => Err(LinkError::Read(e)),
        }
    }

    fn write_frame(&mut self, bytes: &RawFrame) -> Result<(), LinkError> {
        self.port.write_all(bytes).map_err(LinkError::Write)?;
        self.port.flush().map_err(LinkError::Write)
    }
}

// ── Tests ────────────────────────────────────────────────────────────────────
