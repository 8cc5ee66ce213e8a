use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use irrigation_hal::memory::AllocPriority;
use irrigation_hal::{GpioDriver, HardwareBackend, ShiftRegisterDriver, TieredAllocator};
use irrigation_types::error::ControllerError;
use irrigation_types::point::PointKind;
use irrigation_types::runtime::PointRuntime;
use irrigation_types::{IoConfiguration, PointId};
use tracing::{debug, error, info, instrument, warn};

use crate::alarm;
use crate::clock::now_us;
use crate::signal;

/// Mutex acquisition budget applied to every reader/handler operation, per
/// the concurrency model's 100 ms rule. The polling thread, the sole writer
/// of `runtimes`, takes the lock unconditionally instead of budgeting it.
const MUTEX_BUDGET: Duration = Duration::from_millis(100);

fn lock_with_budget<T>(mutex: &Mutex<T>) -> Result<MutexGuard<'_, T>, ControllerError> {
    let deadline = Instant::now() + MUTEX_BUDGET;
    loop {
        if let Ok(guard) = mutex.try_lock() {
            return Ok(guard);
        }
        if Instant::now() >= deadline {
            return Err(ControllerError::Timeout("io mutex".to_string()));
        }
        std::thread::sleep(Duration::from_micros(200));
    }
}

struct IoState {
    config: Arc<IoConfiguration>,
    runtimes: HashMap<PointId, PointRuntime>,
    gpio: GpioDriver,
    shift_register: ShiftRegisterDriver,
}

fn build_drivers(
    backend: Arc<dyn HardwareBackend>,
    config: &IoConfiguration,
) -> (GpioDriver, ShiftRegisterDriver) {
    let mut output_pins = Vec::new();
    let mut input_pins = Vec::new();
    let mut analog_pins = Vec::new();

    for point in config.points.values() {
        match point.kind {
            PointKind::GpioAnalogIn { pin } => analog_pins.push(pin),
            PointKind::GpioBinaryIn { pin, pull_up } => input_pins.push((pin, pull_up)),
            PointKind::GpioBinaryOut { pin } => output_pins.push(pin),
            PointKind::ShiftRegBinaryIn { .. } | PointKind::ShiftRegBinaryOut { .. } => {}
        }
    }

    let gpio = GpioDriver::new(backend.clone(), &output_pins, &input_pins, &analog_pins);
    let shift_register = ShiftRegisterDriver::new(backend, config.wiring.clone());
    (gpio, shift_register)
}

fn build_runtimes(config: &IoConfiguration) -> HashMap<PointId, PointRuntime> {
    config
        .points
        .iter()
        .map(|(id, point)| {
            let sma_window = match point.signal.filter {
                irrigation_types::signal::Filter::SimpleMovingAverage { window } if window > 1 => {
                    Some(window as usize)
                }
                _ => None,
            };
            let history_capacity = point.alarm.history_size.max(1) as usize;
            (id.clone(), PointRuntime::new(sma_window, history_capacity))
        })
        .collect()
}

#[derive(Debug, Default, Clone, Copy)]
pub struct IoStatistics {
    pub update_cycles: u64,
    pub total_errors: u64,
    pub last_update_time_us: u64,
    pub polling_active: bool,
    pub active_point_count: u32,
}

/// C7: owns every point's runtime state exclusively, runs the hardware
/// polling loop, and mediates output writes with safe-state discipline.
pub struct IoManager {
    backend: Arc<dyn HardwareBackend>,
    state: Mutex<IoState>,
    stop: Arc<AtomicBool>,
    polling_active: Arc<AtomicBool>,
    update_cycles: AtomicU64,
    total_errors: AtomicU64,
    last_update_time_us: AtomicU64,
    poll_interval: Duration,
}

impl IoManager {
    pub fn new(
        backend: Arc<dyn HardwareBackend>,
        config: Arc<IoConfiguration>,
        poll_interval: Duration,
    ) -> Self {
        let (gpio, shift_register) = build_drivers(backend.clone(), &config);
        let runtimes = build_runtimes(&config);

        Self {
            backend,
            state: Mutex::new(IoState {
                config,
                runtimes,
                gpio,
                shift_register,
            }),
            stop: Arc::new(AtomicBool::new(false)),
            polling_active: Arc::new(AtomicBool::new(false)),
            update_cycles: AtomicU64::new(0),
            total_errors: AtomicU64::new(0),
            last_update_time_us: AtomicU64::new(0),
            poll_interval,
        }
    }

    /// Reads every configured input point, conditions it, and evaluates its
    /// alarms. Returns the number of hardware errors observed this cycle.
    /// This is the sole mutator of `runtimes` and takes the lock
    /// unconditionally rather than on a budget.
    #[instrument(skip(self))]
    pub fn update_inputs(&self) -> u64 {
        let mut state = self.state.lock().unwrap();
        state.shift_register.refresh_inputs();

        let now = now_us();
        let mut cycle_errors = 0u64;

        let point_ids: Vec<PointId> = state
            .config
            .points
            .iter()
            .filter(|(_, p)| p.kind.is_input())
            .map(|(id, _)| id.clone())
            .collect();

        for id in point_ids {
            let point = state.config.points.get(&id).unwrap().clone();
            let raw_result: Result<f64, String> = match point.kind {
                PointKind::GpioAnalogIn { pin } => state
                    .gpio
                    .read_analog(pin)
                    .map(|v| v as f64)
                    .map_err(|e| e.to_string()),
                PointKind::GpioBinaryIn { pin, .. } => state
                    .gpio
                    .read(pin)
                    .map(|v| if v { 1.0 } else { 0.0 })
                    .map_err(|e| e.to_string()),
                PointKind::ShiftRegBinaryIn {
                    chip_index,
                    bit_index,
                } => state
                    .shift_register
                    .read_input_bit(chip_index, bit_index)
                    .map(|v| if v { 1.0 } else { 0.0 })
                    .map_err(|e| e.to_string()),
                _ => unreachable!("non-input point filtered above"),
            };

            let runtime = state.runtimes.get_mut(&id).unwrap();
            let prev_conditioned = if runtime.update_count > 0 {
                Some(runtime.conditioned)
            } else {
                None
            };

            match raw_result {
                Ok(raw) => {
                    let conditioned = signal::condition(raw, &point.signal, &mut runtime.sma);
                    runtime.raw = raw;
                    runtime.conditioned = conditioned;
                    if point.kind.is_binary() {
                        runtime.digital = conditioned != 0.0;
                    }
                    runtime.error = false;
                    runtime.last_update_us = now;
                    runtime.update_count += 1;

                    alarm::evaluate(
                        conditioned,
                        prev_conditioned,
                        &point.alarm,
                        &mut runtime.alarms,
                        now,
                    );
                }
                Err(reason) => {
                    runtime.error = true;
                    runtime.error_count += 1;
                    cycle_errors += 1;
                    warn!(point = %id, error = %reason, "input read failed");
                }
            }
        }

        self.update_cycles.fetch_add(1, Ordering::Relaxed);
        self.total_errors.fetch_add(cycle_errors, Ordering::Relaxed);
        self.last_update_time_us.store(now, Ordering::Relaxed);
        cycle_errors
    }

    #[instrument(skip(self))]
    pub fn set_binary_output(&self, id: &PointId, desired: bool) -> Result<(), ControllerError> {
        let mut state = lock_with_budget(&self.state)?;
        let point = state
            .config
            .points
            .get(id)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;

        if !point.kind.is_output() {
            return Err(ControllerError::WrongKind(id.to_string()));
        }

        let hw_level = desired ^ point.inverted;

        match point.kind {
            PointKind::GpioBinaryOut { pin } => {
                state
                    .gpio
                    .write(pin, hw_level)
                    .map_err(|e| ControllerError::Hardware(e.to_string()))?;
            }
            PointKind::ShiftRegBinaryOut {
                chip_index,
                bit_index,
                ..
            } => {
                state
                    .shift_register
                    .set_bit(chip_index, bit_index, hw_level)
                    .map_err(|e| ControllerError::Hardware(e.to_string()))?;
                state.shift_register.commit_outputs();
            }
            _ => return Err(ControllerError::WrongKind(id.to_string())),
        }

        let now = now_us();
        let runtime = state.runtimes.get_mut(id).unwrap();
        runtime.digital = desired;
        runtime.raw = if desired { 1.0 } else { 0.0 };
        runtime.conditioned = runtime.raw;
        runtime.last_update_us = now;
        runtime.update_count += 1;

        info!(point = %id, state = desired, "output set");
        Ok(())
    }

    pub fn get_binary_output(&self, id: &PointId) -> Result<bool, ControllerError> {
        let state = lock_with_budget(&self.state)?;
        let point = state
            .config
            .points
            .get(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        if !point.kind.is_output() || point.kind.is_analog() {
            return Err(ControllerError::WrongKind(id.to_string()));
        }
        Ok(state.runtimes.get(id).unwrap().digital)
    }

    pub fn get_binary_input(&self, id: &PointId) -> Result<bool, ControllerError> {
        let state = lock_with_budget(&self.state)?;
        let point = state
            .config
            .points
            .get(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        if !point.kind.is_input() || point.kind.is_analog() {
            return Err(ControllerError::WrongKind(id.to_string()));
        }
        Ok(state.runtimes.get(id).unwrap().digital)
    }

    pub fn get_analog_raw(&self, id: &PointId) -> Result<f64, ControllerError> {
        let state = lock_with_budget(&self.state)?;
        let point = state
            .config
            .points
            .get(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        if !point.kind.is_analog() {
            return Err(ControllerError::WrongKind(id.to_string()));
        }
        Ok(state.runtimes.get(id).unwrap().raw)
    }

    pub fn get_analog_conditioned(&self, id: &PointId) -> Result<f64, ControllerError> {
        let state = lock_with_budget(&self.state)?;
        let point = state
            .config
            .points
            .get(id)
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))?;
        if !point.kind.is_analog() {
            return Err(ControllerError::WrongKind(id.to_string()));
        }
        Ok(state.runtimes.get(id).unwrap().conditioned)
    }

    pub fn get_runtime(&self, id: &PointId) -> Result<PointRuntime, ControllerError> {
        let state = lock_with_budget(&self.state)?;
        state
            .runtimes
            .get(id)
            .cloned()
            .ok_or_else(|| ControllerError::NotFound(id.to_string()))
    }

    pub fn list_point_ids(&self) -> Vec<PointId> {
        let state = self.state.lock().unwrap();
        state.config.points.keys().cloned().collect()
    }

    pub fn get_config(&self) -> Arc<IoConfiguration> {
        self.state.lock().unwrap().config.clone()
    }

    pub fn statistics(&self) -> IoStatistics {
        let active_point_count = self.state.lock().unwrap().config.points.len() as u32;
        IoStatistics {
            update_cycles: self.update_cycles.load(Ordering::Relaxed),
            total_errors: self.total_errors.load(Ordering::Relaxed),
            last_update_time_us: self.last_update_time_us.load(Ordering::Relaxed),
            polling_active: self.polling_active.load(Ordering::Relaxed),
            active_point_count,
        }
    }

    /// Stops polling (by holding the lock for the duration), rebuilds every
    /// driver and the runtime table from `new_config` — clearing SMA and
    /// alarm state — and enforces safe state on the rebuilt outputs before
    /// returning control to the poller.
    #[instrument(skip(self, new_config))]
    pub fn reload_config(&self, new_config: Arc<IoConfiguration>) -> Result<(), ControllerError> {
        let mut state = lock_with_budget(&self.state)?;
        let (gpio, shift_register) = build_drivers(self.backend.clone(), &new_config);
        let runtimes = build_runtimes(&new_config);

        state.gpio = gpio;
        state.shift_register = shift_register;
        state.runtimes = runtimes;
        state.config = new_config;

        info!(points = state.config.points.len(), "io manager reloaded configuration");
        Ok(())
    }

    /// Spawns the dedicated polling thread via the tiered allocator, placing
    /// its stack per the `Critical` policy and pinning it to `core` when
    /// given. Only after this call may `set_binary_output` be relied on to
    /// race safely with ongoing polls.
    pub fn start_polling(
        self: &Arc<Self>,
        allocator: &TieredAllocator,
        core: Option<core_affinity::CoreId>,
    ) -> Result<std::thread::JoinHandle<()>, irrigation_hal::memory::MemoryError> {
        let manager = self.clone();
        let stop = self.stop.clone();
        let polling_active = self.polling_active.clone();
        let interval = self.poll_interval;

        polling_active.store(true, Ordering::Relaxed);

        let handle = allocator.create_worker(
            "io-poller",
            32 * 1024,
            AllocPriority::Critical,
            core,
            move || {
                info!("io polling thread started");
                while !stop.load(Ordering::Relaxed) {
                    let tick_start = Instant::now();
                    manager.update_inputs();
                    let elapsed = tick_start.elapsed();
                    if elapsed < interval {
                        std::thread::sleep(interval - elapsed);
                    }
                }
                polling_active.store(false, Ordering::Relaxed);
                info!("io polling thread stopped");
            },
        )?;

        Ok(handle)
    }

    pub fn stop_polling(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    pub fn is_polling_active(&self) -> bool {
        self.polling_active.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_hal::backend::SimulatedBackend;
    use irrigation_types::config::{IoPointConfig, ShiftRegisterWiring};
    use irrigation_types::point::OutputKind;
    use irrigation_types::{AlarmConfig, SignalConfig};
    use std::collections::HashMap as StdHashMap;

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
            num_input_chips: 0,
        }
    }

    fn config_with_one_output() -> Arc<IoConfiguration> {
        let mut points = StdHashMap::new();
        let id = PointId::new("R0").unwrap();
        points.insert(
            id.clone(),
            IoPointConfig {
                id,
                name: "Zone 1".to_string(),
                description: String::new(),
                kind: PointKind::ShiftRegBinaryOut {
                    chip_index: 0,
                    bit_index: 0,
                    output_kind: OutputKind::Solenoid,
                    calibration: Default::default(),
                },
                inverted: false,
                range_min: 0.0,
                range_max: 1.0,
                signal: SignalConfig::default(),
                alarm: AlarmConfig::default(),
            },
        );
        Arc::new(IoConfiguration {
            schema_version: 1,
            wiring: wiring(),
            adc_capable_pins: Vec::new(),
            points,
        })
    }

    #[test]
    fn seed_scenario_output_safe_start() {
        let backend = Arc::new(SimulatedBackend::new());
        let manager = IoManager::new(backend, config_with_one_output(), Duration::from_secs(1));
        let id = PointId::new("R0").unwrap();
        assert_eq!(manager.get_binary_output(&id), Ok(false));
    }

    #[test]
    fn seed_scenario_command_path() {
        let backend = Arc::new(SimulatedBackend::new());
        let manager = IoManager::new(backend, config_with_one_output(), Duration::from_secs(1));
        let id = PointId::new("R0").unwrap();
        manager.set_binary_output(&id, true).unwrap();
        assert_eq!(manager.get_binary_output(&id), Ok(true));
        let runtime = manager.get_runtime(&id).unwrap();
        assert_eq!(runtime.update_count, 1);
    }

    #[test]
    fn set_binary_output_on_unknown_point_errors() {
        let backend = Arc::new(SimulatedBackend::new());
        let manager = IoManager::new(backend, config_with_one_output(), Duration::from_secs(1));
        let id = PointId::new("missing").unwrap();
        assert_eq!(
            manager.set_binary_output(&id, true),
            Err(ControllerError::NotFound("missing".to_string()))
        );
    }
}
