//! Bus-voltage sensing boundary.
//!
//! Two ADC channels watch VBus on the two mux legs through a resistor
//! divider. The conversion constants come from the board: 3.3 V
//! reference, 18/33 divider.

use std::sync::Mutex;

/// ADC reference voltage.
pub const ADC_REF_VOLTS: f32 = 3.3;

/// VBus divider ratio (measured node / actual bus voltage).
pub const ADC_DIVIDER_RATIO: f32 = 18.0 / 33.0;

/// Full-scale raw reading.
pub const ADC_FULL_SCALE: f32 = 65536.0;

/// Which VBus rail to sample.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VbusSensor {
    /// VBus on mux leg 2-1.
    MuxLegOne,
    /// VBus on mux leg 2-2.
    MuxLegTwo,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AdcError {
    #[error("adc conversion failed: {0}")]
    Conversion(String),
}

/// Port for the VBus sense ADCs.
pub trait BusVoltage: Send + Sync {
    /// Raw 16-bit conversion result for one sensor.
    fn read_raw(&self, sensor: VbusSensor) -> Result<u16, AdcError>;

    /// Bus voltage in volts, divider compensated.
    fn read_volts(&self, sensor: VbusSensor) -> Result<f32, AdcError> {
        let raw = self.read_raw(sensor)?;
        Ok(f32::from(raw) * ADC_REF_VOLTS / ADC_FULL_SCALE / ADC_DIVIDER_RATIO)
    }
}

/// In-memory ADC pair with settable raw counts.
pub struct SimAdc {
    raw: Mutex<[u16; 2]>,
}

impl SimAdc {
    pub fn new() -> Self {
        Self {
            raw: Mutex::new([0, 0]),
        }
    }

    /// Force a raw conversion value for one sensor.
    pub fn set_raw(&self, sensor: VbusSensor, raw: u16) {
        self.raw.lock().unwrap()[Self::index(sensor)] = raw;
    }

    fn index(sensor: VbusSensor) -> usize {
        match sensor {
            VbusSensor::MuxLegOne => 0,
            VbusSensor::MuxLegTwo => 1,
        }
    }
}

impl Default for SimAdc {
    fn default() -> Self {
        Self::new()
    }
}

impl BusVoltage for SimAdc {
    fn read_raw(&self, sensor: VbusSensor) -> Result<u16, AdcError> {
        Ok(self.raw.lock().unwrap()[Self::index(sensor)])
    }
}
