use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier for an I/O point within a configuration epoch.
///
/// Keys are unique within an [`crate::IoConfiguration`] and bounded to 32
/// bytes so they can be copied cheaply into runtime records without an
/// allocation on the hot path.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointId(String);

/// Maximum length, in bytes, of a [`PointId`].
pub const POINT_ID_MAX_LEN: usize = 32;

impl PointId {
    pub fn new(id: impl Into<String>) -> Result<Self, PointIdError> {
        let id = id.into();
        if id.is_empty() {
            return Err(PointIdError::Empty);
        }
        if id.len() > POINT_ID_MAX_LEN {
            return Err(PointIdError::TooLong(id.len()));
        }
        Ok(Self(id))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PointId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum PointIdError {
    #[error("point id must not be empty")]
    Empty,
    #[error("point id exceeds {POINT_ID_MAX_LEN} bytes (got {0})")]
    TooLong(usize),
}

/// Highest addressable GPIO pin number. Mirrors the `u64` bitmask the GPIO
/// driver tracks configured pins with — a pin number above this can never be
/// configured, so it's rejected at validation time rather than at first use.
pub const MAX_GPIO_PIN: u8 = 63;

/// Calibration metadata carried by a shift-register binary output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct OutputCalibration {
    pub flow_rate_ml_per_second: Option<f64>,
    pub emitter_count: Option<u32>,
    pub calibration_date: Option<String>,
    pub notes: Option<String>,
}

/// What an output point physically actuates. Purely descriptive — it does
/// not change conditioning or alarm behavior, only how higher layers present
/// and calibrate the point.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutputKind {
    Solenoid,
    Lighting,
    Pump,
    Fan,
    Heater,
    Generic,
}

/// The hardware address and access mode of an I/O point.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum PointKind {
    GpioAnalogIn {
        pin: u8,
    },
    GpioBinaryIn {
        pin: u8,
        pull_up: bool,
    },
    GpioBinaryOut {
        pin: u8,
    },
    ShiftRegBinaryIn {
        chip_index: u16,
        bit_index: u8,
    },
    ShiftRegBinaryOut {
        chip_index: u16,
        bit_index: u8,
        output_kind: OutputKind,
        #[serde(default)]
        calibration: OutputCalibration,
    },
}

impl PointKind {
    pub fn is_input(&self) -> bool {
        matches!(
            self,
            PointKind::GpioAnalogIn { .. }
                | PointKind::GpioBinaryIn { .. }
                | PointKind::ShiftRegBinaryIn { .. }
        )
    }

    pub fn is_output(&self) -> bool {
        !self.is_input()
    }

    pub fn is_analog(&self) -> bool {
        matches!(self, PointKind::GpioAnalogIn { .. })
    }

    pub fn is_binary(&self) -> bool {
        !self.is_analog()
    }

    /// A key uniquely identifying the physical address this point occupies,
    /// used to detect address conflicts at configuration validation time.
    pub fn hardware_address(&self) -> HardwareAddress {
        match *self {
            PointKind::GpioAnalogIn { pin } => HardwareAddress::GpioAnalog(pin),
            PointKind::GpioBinaryIn { pin, .. } => HardwareAddress::Gpio(pin),
            PointKind::GpioBinaryOut { pin } => HardwareAddress::Gpio(pin),
            PointKind::ShiftRegBinaryIn {
                chip_index,
                bit_index,
            } => HardwareAddress::ShiftRegIn(chip_index, bit_index),
            PointKind::ShiftRegBinaryOut {
                chip_index,
                bit_index,
                ..
            } => HardwareAddress::ShiftRegOut(chip_index, bit_index),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum HardwareAddress {
    Gpio(u8),
    GpioAnalog(u8),
    ShiftRegIn(u16, u8),
    ShiftRegOut(u16, u8),
}
