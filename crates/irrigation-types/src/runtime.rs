use crate::alarm::{AlarmState, ALARM_RULE_COUNT};
use crate::signal::MAX_SMA_WINDOW;

/// Ring-buffer state backing the simple-moving-average filter.
#[derive(Debug, Clone)]
pub struct SmaState {
    buffer: [f64; MAX_SMA_WINDOW as usize],
    window: usize,
    head: usize,
    count: usize,
    sum: f64,
}

impl SmaState {
    pub fn new(window: usize) -> Self {
        Self {
            buffer: [0.0; MAX_SMA_WINDOW as usize],
            window: window.clamp(1, MAX_SMA_WINDOW as usize),
            head: 0,
            count: 0,
            sum: 0.0,
        }
    }

    pub fn window(&self) -> usize {
        self.window
    }

    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    pub fn sum(&self) -> f64 {
        self.sum
    }

    /// Push a new sample, evicting the oldest when the buffer is full, and
    /// return the current moving average.
    pub fn push(&mut self, value: f64) -> f64 {
        if self.count < self.window {
            self.buffer[self.head] = value;
            self.head = (self.head + 1) % self.window;
            self.count += 1;
            self.sum += value;
        } else {
            let oldest = self.buffer[self.head];
            self.buffer[self.head] = value;
            self.head = (self.head + 1) % self.window;
            self.sum += value - oldest;
        }
        self.sum / self.count as f64
    }

    pub fn reset(&mut self) {
        self.buffer = [0.0; MAX_SMA_WINDOW as usize];
        self.head = 0;
        self.count = 0;
        self.sum = 0.0;
    }
}

/// Per-rule transition bookkeeping for a single point.
#[derive(Debug, Clone, Default)]
pub struct AlarmRuntime {
    pub active: [bool; ALARM_RULE_COUNT],
    pub state: [AlarmState; ALARM_RULE_COUNT],
    pub activation_count: [u32; ALARM_RULE_COUNT],
    pub first_activated_us: [u64; ALARM_RULE_COUNT],
    pub persistence_counter: [u32; ALARM_RULE_COUNT],
    pub clear_counter: [u32; ALARM_RULE_COUNT],
    pub history: Vec<f64>,
    pub history_head: usize,
    pub history_count: usize,
    pub consecutive_good: u32,
    pub trust_restored: bool,
}

impl AlarmRuntime {
    pub fn new(history_capacity: usize) -> Self {
        Self {
            history: vec![0.0; history_capacity.max(1)],
            trust_restored: true,
            ..Default::default()
        }
    }

    pub fn push_history(&mut self, value: f64) {
        let cap = self.history.len();
        self.history[self.history_head] = value;
        self.history_head = (self.history_head + 1) % cap;
        if self.history_count < cap {
            self.history_count += 1;
        }
    }

    /// The trailing `window` samples, oldest first, capped at what has
    /// actually been recorded.
    pub fn trailing(&self, window: usize) -> Vec<f64> {
        let n = window.min(self.history_count);
        let cap = self.history.len();
        (0..n)
            .map(|i| {
                let idx = (self.history_head + cap - n + i) % cap;
                self.history[idx]
            })
            .collect()
    }

    pub fn any_active(&self) -> bool {
        self.active.iter().any(|&a| a)
    }
}

/// Per-point mutable state owned exclusively by the I/O manager's polling
/// thread. Readers obtain copies under the I/O mutex.
#[derive(Debug, Clone)]
pub struct PointRuntime {
    pub raw: f64,
    pub conditioned: f64,
    pub digital: bool,
    pub error: bool,
    pub last_update_us: u64,
    pub update_count: u64,
    pub error_count: u64,
    pub sma: Option<SmaState>,
    pub alarms: AlarmRuntime,
}

impl PointRuntime {
    pub fn new(sma_window: Option<usize>, history_capacity: usize) -> Self {
        Self {
            raw: 0.0,
            conditioned: 0.0,
            digital: false,
            error: false,
            last_update_us: 0,
            update_count: 0,
            error_count: 0,
            sma: sma_window.map(SmaState::new),
            alarms: AlarmRuntime::new(history_capacity),
        }
    }

    pub fn alarm_active(&self) -> bool {
        self.alarms.any_active()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sma_window_one_returns_raw() {
        let mut sma = SmaState::new(1);
        assert_eq!(sma.push(5.0), 5.0);
        assert_eq!(sma.push(9.0), 9.0);
    }

    #[test]
    fn sma_tracks_running_average() {
        let mut sma = SmaState::new(3);
        assert_eq!(sma.push(1.0), 1.0);
        assert_eq!(sma.push(2.0), 1.5);
        assert_eq!(sma.push(3.0), 2.0);
        assert_eq!(sma.push(4.0), 3.0);
    }

    #[test]
    fn alarm_runtime_trailing_window_caps_at_capacity() {
        let mut rt = AlarmRuntime::new(4);
        for v in [1.0, 2.0, 3.0, 4.0, 5.0] {
            rt.push_history(v);
        }
        assert_eq!(rt.trailing(10), vec![2.0, 3.0, 4.0, 5.0]);
    }
}
