//! xwitch-core — wire format, chain state, and configuration shared by
//! every xwitch crate.

pub mod chain;
pub mod config;
pub mod wire;

pub use chain::{ChainState, UNDISCOVERED};
pub use wire::{decode, encode, CommandCode, Frame, FramingError, Message};
