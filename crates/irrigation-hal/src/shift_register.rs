use std::sync::{Arc, Mutex};

use irrigation_types::ShiftRegisterWiring;
use thiserror::Error;

use crate::backend::{HardwareBackend, PinMode};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ShiftRegisterError {
    #[error("chip index {0} out of bounds for {1} output chips")]
    OutputChipOutOfBounds(u16, u16),
    #[error("chip index {0} out of bounds for {1} input chips")]
    InputChipOutOfBounds(u16, u16),
    #[error("bit index {0} out of bounds, must be 0..=7")]
    BitOutOfBounds(u8),
}

struct Mirrors {
    out_mirror: Vec<u8>,
    in_mirror: Vec<u8>,
}

/// C4: drives a chain of serial-in/parallel-out output chips and a chain of
/// parallel-in/serial-out input chips. `out_mirror`/`in_mirror` are the
/// in-process mirror of the hardware's shift-register state, guarded by a
/// single mutex so a bit-set and its commit are never interleaved with a
/// concurrent refresh.
pub struct ShiftRegisterDriver {
    backend: Arc<dyn HardwareBackend>,
    wiring: ShiftRegisterWiring,
    mirrors: Mutex<Mirrors>,
}

impl ShiftRegisterDriver {
    /// Runs the safe-state initialization sequence (§4.4) to completion:
    /// output-enable inactive, clock/latch/data configured low, mirror
    /// zeroed and committed, then output-enable asserted. Only after this
    /// returns may `set_bit` be called.
    pub fn new(backend: Arc<dyn HardwareBackend>, wiring: ShiftRegisterWiring) -> Self {
        if let Some(enable_pin) = wiring.out_enable_pin {
            backend.configure_pin(enable_pin, PinMode::Output);
            backend.write_pin(enable_pin, false);
        }

        backend.configure_pin(wiring.out_clock_pin, PinMode::Output);
        backend.configure_pin(wiring.out_latch_pin, PinMode::Output);
        backend.configure_pin(wiring.out_data_pin, PinMode::Output);
        backend.write_pin(wiring.out_clock_pin, false);
        backend.write_pin(wiring.out_latch_pin, false);
        backend.write_pin(wiring.out_data_pin, false);

        backend.configure_pin(wiring.in_clock_pin, PinMode::Output);
        backend.configure_pin(wiring.in_load_pin, PinMode::Output);
        backend.configure_pin(wiring.in_data_pin, PinMode::Input);
        backend.write_pin(wiring.in_clock_pin, false);
        backend.write_pin(wiring.in_load_pin, true);

        let driver = Self {
            backend,
            mirrors: Mutex::new(Mirrors {
                out_mirror: vec![0u8; wiring.num_output_chips as usize],
                in_mirror: vec![0u8; wiring.num_input_chips as usize],
            }),
            wiring,
        };

        {
            let mut guard = driver.mirrors.lock().unwrap();
            driver.commit_outputs_locked(&mut guard);
        }

        if let Some(enable_pin) = driver.wiring.out_enable_pin {
            driver.backend.write_pin(enable_pin, true);
        }

        driver
    }

    pub fn set_bit(&self, chip: u16, bit: u8, value: bool) -> Result<(), ShiftRegisterError> {
        if chip >= self.wiring.num_output_chips {
            return Err(ShiftRegisterError::OutputChipOutOfBounds(
                chip,
                self.wiring.num_output_chips,
            ));
        }
        if bit > 7 {
            return Err(ShiftRegisterError::BitOutOfBounds(bit));
        }
        let mut mirrors = self.mirrors.lock().unwrap();
        let byte = &mut mirrors.out_mirror[chip as usize];
        if value {
            *byte |= 1 << bit;
        } else {
            *byte &= !(1 << bit);
        }
        Ok(())
    }

    pub fn get_out_mirror(&self, chip: u16) -> Option<u8> {
        self.mirrors
            .lock()
            .unwrap()
            .out_mirror
            .get(chip as usize)
            .copied()
    }

    /// Drives the hardware from `out_mirror`: drop latch, shift `num_output_chips`
    /// bytes MSB-first starting from the last chip in the chain, raise latch.
    pub fn commit_outputs(&self) {
        let mut mirrors = self.mirrors.lock().unwrap();
        self.commit_outputs_locked(&mut mirrors);
    }

    fn commit_outputs_locked(&self, mirrors: &mut Mirrors) {
        self.backend.write_pin(self.wiring.out_latch_pin, false);

        for chip in (0..mirrors.out_mirror.len()).rev() {
            let byte = mirrors.out_mirror[chip];
            for bit in (0..8u8).rev() {
                let level = byte & (1 << bit) != 0;
                self.backend.write_pin(self.wiring.out_data_pin, level);
                self.backend.write_pin(self.wiring.out_clock_pin, true);
                self.backend.sleep_micros(1);
                self.backend.write_pin(self.wiring.out_clock_pin, false);
                self.backend.sleep_micros(1);
            }
        }

        self.backend.write_pin(self.wiring.out_latch_pin, true);
        self.backend.sleep_micros(5);
    }

    /// Pulses the load line and clocks `num_input_chips * 8` bits in from
    /// the hardware into `in_mirror`.
    pub fn refresh_inputs(&self) {
        let mut mirrors = self.mirrors.lock().unwrap();

        self.backend.write_pin(self.wiring.in_load_pin, false);
        self.backend.sleep_micros(5);
        self.backend.write_pin(self.wiring.in_load_pin, true);

        for chip in mirrors.in_mirror.iter_mut() {
            let mut byte = 0u8;
            for bit in (0..8u8).rev() {
                let level = self.backend.read_pin(self.wiring.in_data_pin);
                if level {
                    byte |= 1 << bit;
                }
                self.backend.write_pin(self.wiring.in_clock_pin, true);
                self.backend.sleep_micros(1);
                self.backend.write_pin(self.wiring.in_clock_pin, false);
                self.backend.sleep_micros(1);
            }
            *chip = byte;
        }
    }

    pub fn get_in_mirror(&self, chip: u16) -> Option<u8> {
        self.mirrors
            .lock()
            .unwrap()
            .in_mirror
            .get(chip as usize)
            .copied()
    }

    pub fn read_input_bit(&self, chip: u16, bit: u8) -> Result<bool, ShiftRegisterError> {
        if chip >= self.wiring.num_input_chips {
            return Err(ShiftRegisterError::InputChipOutOfBounds(
                chip,
                self.wiring.num_input_chips,
            ));
        }
        if bit > 7 {
            return Err(ShiftRegisterError::BitOutOfBounds(bit));
        }
        let byte = self.get_in_mirror(chip).unwrap_or(0);
        Ok(byte & (1 << bit) != 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SimulatedBackend;

    fn wiring() -> ShiftRegisterWiring {
        ShiftRegisterWiring {
            out_clock_pin: 0,
            out_latch_pin: 1,
            out_data_pin: 2,
            out_enable_pin: Some(3),
            in_clock_pin: 4,
            in_load_pin: 5,
            in_data_pin: 6,
            num_output_chips: 1,
            num_input_chips: 1,
        }
    }

    #[test]
    fn safe_state_init_zeroes_and_enables_output() {
        let backend = Arc::new(SimulatedBackend::new());
        let driver = ShiftRegisterDriver::new(backend.clone(), wiring());
        assert_eq!(driver.get_out_mirror(0), Some(0));
        assert!(backend.read_pin(3));
    }

    #[test]
    fn set_bit_then_commit_updates_mirror_only_on_commit() {
        let backend = Arc::new(SimulatedBackend::new());
        let driver = ShiftRegisterDriver::new(backend, wiring());
        driver.set_bit(0, 0, true).unwrap();
        assert_eq!(driver.get_out_mirror(0), Some(0x01));
        driver.commit_outputs();
        assert_eq!(driver.get_out_mirror(0), Some(0x01));
    }

    #[test]
    fn set_bit_out_of_bounds_chip_errors() {
        let backend = Arc::new(SimulatedBackend::new());
        let driver = ShiftRegisterDriver::new(backend, wiring());
        assert_eq!(
            driver.set_bit(5, 0, true),
            Err(ShiftRegisterError::OutputChipOutOfBounds(5, 1))
        );
    }

    #[test]
    fn refresh_inputs_reads_simulated_levels() {
        let backend = Arc::new(SimulatedBackend::new());
        backend.set_digital_for_test(6, true);
        let driver = ShiftRegisterDriver::new(backend, wiring());
        driver.refresh_inputs();
        // a constant-high data line clocks in all-ones
        assert_eq!(driver.get_in_mirror(0), Some(0xFF));
    }
}
