//! Hub channel driver boundary — the onboard USB2514B 4-port hub IC.
//!
//! The protocol engine only ever sees `set_hub_channels`/`get_hub_channels`
//! over a 4-bit port-enable mask. Register sequencing lives behind the
//! trait; the simulated adapter models the same configured/unconfigured
//! lifecycle the real IC has, so "peer not yet configured" failures are
//! reproducible in tests.

use std::sync::{Arc, Mutex};

/// Number of downstream-facing ports on the hub IC.
pub const PORT_COUNT: usize = 4;

/// All four port bits. Bit 0 = physical port 1 … bit 3 = physical port 4.
pub const PORT_MASK: u8 = 0x0F;

/// The hub port wired to the next unit downstream. On any non-terminal
/// unit this channel must stay enabled or the rest of the chain drops
/// off the bus, so it is forced on and hidden from external status.
pub const CHAIN_RESERVED_BIT: u8 = 0b1000;

/// USB2514B register map, as far as this firmware touches it.
pub mod usb2514 {
    /// I2C slave address. The USB251x expects MSB-first transfers.
    pub const SLAVE_ADDR: u8 = 0x2C;

    pub const VENDOR_ID_LSB: u8 = 0x00;
    pub const VENDOR_ID_MSB: u8 = 0x01;
    pub const PRODUCT_ID_LSB: u8 = 0x02;
    pub const PRODUCT_ID_MSB: u8 = 0x03;
    pub const DEVICE_ID_LSB: u8 = 0x04;
    pub const DEVICE_ID_MSB: u8 = 0x05;
    pub const CONFIG_DATA_B1: u8 = 0x06;
    pub const CONFIG_DATA_B2: u8 = 0x07;
    pub const CONFIG_DATA_B3: u8 = 0x08;
    /// Per-port disable bits, self-powered mode. This is the register
    /// the channel mask maps onto (inverted: 1 = disabled).
    pub const PORT_DISABLE_SELF: u8 = 0x0A;
    pub const MAX_POWER_BUS: u8 = 0x0D;
    /// Status/Command register, SMBus only.
    pub const STAT_CMD: u8 = 0xFF;

    /// (register, power-on value) pairs written during attach.
    pub const INIT_DEFAULTS: &[(u8, u8)] = &[
        (VENDOR_ID_LSB, 0x24),
        (VENDOR_ID_MSB, 0x04),
        (PRODUCT_ID_LSB, 0x14),
        (PRODUCT_ID_MSB, 0x25),
        (DEVICE_ID_LSB, 0xB3),
        (DEVICE_ID_MSB, 0x0B),
        (CONFIG_DATA_B1, 0x9B),
        (CONFIG_DATA_B2, 0x20),
        (CONFIG_DATA_B3, 0x02),
        (PORT_DISABLE_SELF, 0x00),
        (MAX_POWER_BUS, 0x32),
    ];
}

/// Errors from the hub IC boundary.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HubError {
    /// The IC has not been through its register init sequence yet.
    #[error("hub ic not configured")]
    NotReady,
    /// The I2C block transfer was rejected.
    #[error("hub i2c transfer failed: {0}")]
    Bus(String),
}

/// Port for the hub IC. Bit 0 = physical port 1 … bit 3 = physical port 4,
/// 1 = enabled.
pub trait HubChannels: Send + Sync {
    /// Apply a 4-bit port-enable mask. Bits above [`PORT_MASK`] are
    /// ignored by the IC.
    fn set_hub_channels(&self, mask: u8) -> Result<(), HubError>;

    /// Read back the current 4-bit port-enable mask.
    fn get_hub_channels(&self) -> Result<u8, HubError>;
}

/// Shared log of (unit id, mask) applications, in call order. Lets a
/// test harness assert cross-unit ordering of chain-wide updates.
pub type MaskJournal = Arc<Mutex<Vec<(usize, u8)>>>;

/// In-memory hub IC with the USB2514B register lifecycle.
pub struct SimHub {
    regs: Mutex<Option<Vec<(u8, u8)>>>,
    journal: Option<(usize, MaskJournal)>,
}

impl SimHub {
    /// A hub that has already been through register init, all ports
    /// enabled — the state a healthy unit reaches shortly after boot.
    pub fn new() -> Self {
        let hub = Self::unconfigured();
        hub.configure();
        hub
    }

    /// A hub still waiting for its init sequence. Every channel access
    /// fails with [`HubError::NotReady`] until [`configure`](Self::configure)
    /// runs.
    pub fn unconfigured() -> Self {
        Self {
            regs: Mutex::new(None),
            journal: None,
        }
    }

    /// Like [`new`](Self::new), but records every applied mask into a
    /// shared journal under the given unit id.
    pub fn with_journal(unit: usize, journal: MaskJournal) -> Self {
        let mut hub = Self::unconfigured();
        hub.journal = Some((unit, journal));
        hub.configure();
        hub
    }

    /// Run the register init sequence.
    pub fn configure(&self) {
        let mut regs = self.regs.lock().unwrap();
        *regs = Some(usb2514::INIT_DEFAULTS.to_vec());
    }

    /// Drop back to the unconfigured power-on state.
    pub fn power_cycle(&self) {
        let mut regs = self.regs.lock().unwrap();
        *regs = None;
    }

    fn write_reg(regs: &mut Vec<(u8, u8)>, addr: u8, value: u8) {
        match regs.iter_mut().find(|(a, _)| *a == addr) {
            Some(slot) => slot.1 = value,
            None => regs.push((addr, value)),
        }
    }

    fn read_reg(regs: &[(u8, u8)], addr: u8) -> u8 {
        regs.iter()
            .find(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .unwrap_or(0)
    }
}

impl Default for SimHub {
    fn default() -> Self {
        Self::new()
    }
}

impl HubChannels for SimHub {
    fn set_hub_channels(&self, mask: u8) -> Result<(), HubError> {
        let mut regs = self.regs.lock().unwrap();
        let regs = regs.as_mut().ok_or(HubError::NotReady)?;
        // The IC register holds disable bits.
        Self::write_reg(regs, usb2514::PORT_DISABLE_SELF, !mask & PORT_MASK);
        if let Some((unit, journal)) = &self.journal {
            journal.lock().unwrap().push((*unit, mask & PORT_MASK));
        }
        tracing::debug!(mask = mask & PORT_MASK, "hub mask applied");
        Ok(())
    }

    fn get_hub_channels(&self) -> Result<u8, HubError> {
        let regs = self.regs.lock().unwrap();
        let regs = regs.as_ref().ok_or(HubError::NotReady)?;
        Ok(!Self::read_reg(regs, usb2514::PORT_DISABLE_SELF) & PORT_MASK)
    }
}
