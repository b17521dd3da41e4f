//! xwitchd — the daisy-chain engine of one xwitch unit.
//!
//! A unit owns two polled serial endpoints, a receive dispatcher that
//! turns their bytes into routed frames, and the foreground protocol
//! operations: chain discovery and hub get/set addressed by chain
//! position. See [`unit::Unit`] for the entry point.

mod control;
mod dispatch;
mod discovery;
mod pending;
mod queue;
mod relay;
mod router;

pub mod error;
pub mod link;
pub mod switch;
pub mod unit;

pub use error::ChainError;
pub use link::{mem_pair, Direction, LinkError, MemSerial, RawSerial, SerialDevice};
pub use switch::{Actuation, ActuationSource};
pub use unit::{Unit, UnitParts};
