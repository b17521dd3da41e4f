//! xwitch-hw — peripheral boundaries of one chain unit.
//!
//! Each peripheral is a port (trait) plus an in-memory adapter. The
//! protocol engine and the integration harness only ever program against
//! the ports; real GPIO/I2C/ADC bindings implement the same traits.

pub mod adc;
pub mod button;
pub mod hub;
pub mod led;
pub mod mux;

pub use adc::{AdcError, BusVoltage, SimAdc, VbusSensor};
pub use button::{ButtonEvents, SimButton, SimButtonHandle};
pub use hub::{HubChannels, HubError, MaskJournal, SimHub, CHAIN_RESERVED_BIT, PORT_COUNT, PORT_MASK};
pub use led::{SimLed, StatusLed};
pub use mux::{MuxPosition, MuxSwitch, SimMux, SwitchError};
