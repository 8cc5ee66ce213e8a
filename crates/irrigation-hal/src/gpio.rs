use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use thiserror::Error;

use crate::backend::{HardwareBackend, PinMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum GpioError {
    #[error("pin {0} is not configured as an output")]
    NotOutput(u8),
    #[error("pin {0} is not configured as a digital input")]
    NotDigitalInput(u8),
    #[error("pin {0} is not configured as an analog input")]
    NotAnalogInput(u8),
}

/// C3: tracks configured pins via bitmasks and enforces the safe-state rule
/// — every output pin is forced low before any consumer may read or write
/// it. Read/write/error counters are plain atomics rather than
/// mutex-guarded state, matching the single-writer discipline of the
/// polling thread that owns this driver.
pub struct GpioDriver {
    backend: Arc<dyn HardwareBackend>,
    output_mask: u64,
    input_mask: u64,
    analog_mask: u64,
    reads: AtomicU64,
    writes: AtomicU64,
    errors: AtomicU64,
}

impl GpioDriver {
    /// Configures the given pins and drives every output pin low, per the
    /// safe-state rule. Must run to completion before any `write`/`read`.
    pub fn new(
        backend: Arc<dyn HardwareBackend>,
        output_pins: &[u8],
        input_pins: &[(u8, bool)],
        analog_pins: &[u8],
    ) -> Self {
        let mut output_mask = 0u64;
        for &pin in output_pins {
            backend.configure_pin(pin, PinMode::Output);
            backend.write_pin(pin, false);
            output_mask |= 1 << pin;
        }

        let mut input_mask = 0u64;
        for &(pin, pull_up) in input_pins {
            let mode = if pull_up {
                PinMode::InputPullUp
            } else {
                PinMode::Input
            };
            backend.configure_pin(pin, mode);
            input_mask |= 1 << pin;
        }

        let mut analog_mask = 0u64;
        for &pin in analog_pins {
            backend.configure_pin(pin, PinMode::AnalogInput);
            analog_mask |= 1 << pin;
        }

        Self {
            backend,
            output_mask,
            input_mask,
            analog_mask,
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub fn write(&self, pin: u8, level: bool) -> Result<(), GpioError> {
        if self.output_mask & (1 << pin) == 0 {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(GpioError::NotOutput(pin));
        }
        self.backend.write_pin(pin, level);
        self.writes.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    pub fn read(&self, pin: u8) -> Result<bool, GpioError> {
        if self.input_mask & (1 << pin) == 0 {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(GpioError::NotDigitalInput(pin));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.backend.read_pin(pin))
    }

    pub fn read_analog(&self, pin: u8) -> Result<u16, GpioError> {
        if self.analog_mask & (1 << pin) == 0 {
            self.errors.fetch_add(1, Ordering::Relaxed);
            return Err(GpioError::NotAnalogInput(pin));
        }
        self.reads.fetch_add(1, Ordering::Relaxed);
        Ok(self.backend.read_analog(pin))
    }

    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    #[test]
    fn outputs_start_low_after_init() {
        let backend = Arc::new(SimulatedBackend::new());
        let driver = GpioDriver::new(backend.clone(), &[5], &[], &[]);
        assert!(!backend.read_pin(5));
        driver.write(5, true).unwrap();
        assert!(backend.read_pin(5));
    }

    #[test]
    fn write_to_unconfigured_pin_errors() {
        let backend = Arc::new(SimulatedBackend::new());
        let driver = GpioDriver::new(backend, &[5], &[], &[]);
        assert_eq!(driver.write(6, true), Err(GpioError::NotOutput(6)));
        assert_eq!(driver.errors(), 1);
    }

    #[test]
    fn read_analog_respects_configured_mask() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.set_analog_for_test(2, 1500);
        let driver = GpioDriver::new(backend, &[], &[], &[2]);
        assert_eq!(driver.read_analog(2), Ok(1500));
        assert!(driver.read_analog(3).is_err());
    }
}
