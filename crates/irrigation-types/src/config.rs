use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::alarm::AlarmConfig;
use crate::point::{PointId, PointKind, MAX_GPIO_PIN};
use crate::signal::SignalConfig;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoPointConfig {
    pub id: PointId,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub kind: PointKind,
    #[serde(default)]
    pub inverted: bool,
    #[serde(default)]
    pub range_min: f64,
    #[serde(default = "default_range_max")]
    pub range_max: f64,
    #[serde(default)]
    pub signal: SignalConfig,
    #[serde(default)]
    pub alarm: AlarmConfig,
}

fn default_range_max() -> f64 {
    1.0
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShiftRegisterWiring {
    pub out_clock_pin: u8,
    pub out_latch_pin: u8,
    pub out_data_pin: u8,
    #[serde(default)]
    pub out_enable_pin: Option<u8>,
    pub in_clock_pin: u8,
    pub in_load_pin: u8,
    pub in_data_pin: u8,
    #[serde(default)]
    pub num_output_chips: u16,
    #[serde(default)]
    pub num_input_chips: u16,
}

/// Current on-disk document format. Bumped whenever a field is added or
/// reinterpreted in a way that would change an older reader's behavior.
pub const CURRENT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IoConfiguration {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub wiring: ShiftRegisterWiring,
    /// Pins the board's ADC can actually sample. Empty means unrestricted
    /// (no board-specific ADC map configured), in which case any
    /// `GpioAnalogIn` pin within `MAX_GPIO_PIN` is accepted.
    #[serde(default)]
    pub adc_capable_pins: Vec<u8>,
    pub points: HashMap<PointId, IoPointConfig>,
}

fn default_schema_version() -> u32 {
    CURRENT_SCHEMA_VERSION
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigValidationError {
    #[error("unsupported schema_version {0}, reader supports up to {CURRENT_SCHEMA_VERSION}")]
    UnsupportedSchemaVersion(u32),
    #[error("point '{0}' has a duplicate id")]
    DuplicateId(String),
    #[error("point '{id}' conflicts with point '{other}' on the same hardware address")]
    ConflictingAddress { id: String, other: String },
    #[error("point '{0}' references shift register chip {1} but wiring only has {2} chips of that kind")]
    ChipOutOfBounds(String, u16, u16),
    #[error("point '{0}' references unknown pin {1} (must be <= {MAX_GPIO_PIN})")]
    UnknownPin(String, u8),
    #[error("point '{0}' reads analog pin {1}, which is not in the configured ADC-capable set")]
    NotAdcCapable(String, u8),
    #[error("point '{id}': {source}")]
    Signal {
        id: String,
        #[source]
        source: crate::signal::SignalConfigError,
    },
    #[error("point '{id}': {source}")]
    Alarm {
        id: String,
        #[source]
        source: crate::alarm::AlarmConfigError,
    },
}

impl IoConfiguration {
    pub fn validate(&self) -> Result<(), ConfigValidationError> {
        if self.schema_version > CURRENT_SCHEMA_VERSION {
            return Err(ConfigValidationError::UnsupportedSchemaVersion(
                self.schema_version,
            ));
        }

        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut seen_addresses: HashMap<crate::point::HardwareAddress, &str> = HashMap::new();

        for (key, point) in &self.points {
            if key.as_str() != point.id.as_str() {
                return Err(ConfigValidationError::DuplicateId(point.id.to_string()));
            }
            if !seen_ids.insert(point.id.as_str()) {
                return Err(ConfigValidationError::DuplicateId(point.id.to_string()));
            }

            let address = point.kind.hardware_address();
            if let Some(other) = seen_addresses.insert(address, point.id.as_str()) {
                return Err(ConfigValidationError::ConflictingAddress {
                    id: point.id.to_string(),
                    other: other.to_string(),
                });
            }

            match point.kind {
                PointKind::GpioAnalogIn { pin } => {
                    if pin > MAX_GPIO_PIN {
                        return Err(ConfigValidationError::UnknownPin(point.id.to_string(), pin));
                    }
                    if !self.adc_capable_pins.is_empty() && !self.adc_capable_pins.contains(&pin) {
                        return Err(ConfigValidationError::NotAdcCapable(point.id.to_string(), pin));
                    }
                }
                PointKind::GpioBinaryIn { pin, .. } | PointKind::GpioBinaryOut { pin } => {
                    if pin > MAX_GPIO_PIN {
                        return Err(ConfigValidationError::UnknownPin(point.id.to_string(), pin));
                    }
                }
                _ => {}
            }

            match point.kind {
                PointKind::ShiftRegBinaryIn { chip_index, .. } => {
                    if chip_index >= self.wiring.num_input_chips {
                        return Err(ConfigValidationError::ChipOutOfBounds(
                            point.id.to_string(),
                            chip_index,
                            self.wiring.num_input_chips,
                        ));
                    }
                }
                PointKind::ShiftRegBinaryOut { chip_index, .. } => {
                    if chip_index >= self.wiring.num_output_chips {
                        return Err(ConfigValidationError::ChipOutOfBounds(
                            point.id.to_string(),
                            chip_index,
                            self.wiring.num_output_chips,
                        ));
                    }
                }
                _ => {}
            }

            point
                .signal
                .validate()
                .map_err(|source| ConfigValidationError::Signal {
                    id: point.id.to_string(),
                    source,
                })?;
            point
                .alarm
                .validate()
                .map_err(|source| ConfigValidationError::Alarm {
                    id: point.id.to_string(),
                    source,
                })?;
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::point::OutputKind;

    fn wiring() -> ShiftRegisterWiring {
        ShiftRegisterWiring {
            out_clock_pin: 1,
            out_latch_pin: 2,
            out_data_pin: 3,
            out_enable_pin: Some(4),
            in_clock_pin: 5,
            in_load_pin: 6,
            in_data_pin: 7,
            num_output_chips: 1,
            num_input_chips: 1,
        }
    }

    fn point(id: &str, kind: PointKind) -> IoPointConfig {
        IoPointConfig {
            id: PointId::new(id).unwrap(),
            name: id.to_string(),
            description: String::new(),
            kind,
            inverted: false,
            range_min: 0.0,
            range_max: 1.0,
            signal: SignalConfig::default(),
            alarm: AlarmConfig::default(),
        }
    }

    #[test]
    fn rejects_conflicting_addresses() {
        let mut points = HashMap::new();
        let a = point("A", PointKind::GpioBinaryOut { pin: 5 });
        let b = point("B", PointKind::GpioBinaryOut { pin: 5 });
        points.insert(a.id.clone(), a);
        points.insert(b.id.clone(), b);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: Vec::new(),
            points,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::ConflictingAddress { .. })
        ));
    }

    #[test]
    fn rejects_chip_out_of_bounds() {
        let mut points = HashMap::new();
        let a = point(
            "R0",
            PointKind::ShiftRegBinaryOut {
                chip_index: 3,
                bit_index: 0,
                output_kind: OutputKind::Solenoid,
                calibration: Default::default(),
            },
        );
        points.insert(a.id.clone(), a);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: Vec::new(),
            points,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::ChipOutOfBounds(..))
        ));
    }

    #[test]
    fn accepts_well_formed_config() {
        let mut points = HashMap::new();
        let a = point(
            "R0",
            PointKind::ShiftRegBinaryOut {
                chip_index: 0,
                bit_index: 0,
                output_kind: OutputKind::Solenoid,
                calibration: Default::default(),
            },
        );
        points.insert(a.id.clone(), a);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: Vec::new(),
            points,
        };
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn rejects_pin_above_the_known_gpio_range() {
        let mut points = HashMap::new();
        let a = point("A", PointKind::GpioBinaryOut { pin: 200 });
        points.insert(a.id.clone(), a);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: Vec::new(),
            points,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::UnknownPin(..))
        ));
    }

    #[test]
    fn rejects_analog_pin_outside_the_configured_adc_capable_set() {
        let mut points = HashMap::new();
        let a = point("A", PointKind::GpioAnalogIn { pin: 10 });
        points.insert(a.id.clone(), a);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: vec![32, 33, 34],
            points,
        };
        assert!(matches!(
            cfg.validate(),
            Err(ConfigValidationError::NotAdcCapable(..))
        ));
    }

    #[test]
    fn accepts_analog_pin_in_the_configured_adc_capable_set() {
        let mut points = HashMap::new();
        let a = point("A", PointKind::GpioAnalogIn { pin: 32 });
        points.insert(a.id.clone(), a);
        let cfg = IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: vec![32, 33, 34],
            points,
        };
        assert!(cfg.validate().is_ok());
    }
}
