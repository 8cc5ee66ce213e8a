use serde::{Deserialize, Serialize};

/// Number of independent alarm rules evaluated per point, and the fixed
/// order their bits occupy in `PointRuntime::alarms`.
pub const ALARM_RULE_COUNT: usize = 4;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(usize)]
pub enum AlarmRuleKind {
    RateOfChange = 0,
    Disconnected = 1,
    MaxValue = 2,
    StuckSignal = 3,
}

impl AlarmRuleKind {
    pub const ALL: [AlarmRuleKind; ALARM_RULE_COUNT] = [
        AlarmRuleKind::RateOfChange,
        AlarmRuleKind::Disconnected,
        AlarmRuleKind::MaxValue,
        AlarmRuleKind::StuckSignal,
    ];

    pub fn index(self) -> usize {
        self as usize
    }
}

/// Per-rule parameters. Only the field(s) relevant to the rule are
/// meaningful; the others are ignored by the evaluator for that rule.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct AlarmRule {
    #[serde(default)]
    pub threshold: f64,
    #[serde(default)]
    pub window_samples: u16,
    #[serde(default)]
    pub delta_threshold: f64,
}

/// The four independent alarm checks plus their shared transition parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmRules {
    #[serde(default)]
    pub rate_of_change: AlarmRule,
    #[serde(default)]
    pub disconnected: AlarmRule,
    #[serde(default)]
    pub max_value: AlarmRule,
    #[serde(default)]
    pub stuck_signal: AlarmRule,

    #[serde(default = "default_persistence_samples")]
    pub persistence_samples: u16,
    #[serde(default)]
    pub clear_hysteresis_value: f64,
    #[serde(default = "default_clear_samples")]
    pub clear_samples: u16,
    #[serde(default)]
    pub requires_manual_reset: bool,
    #[serde(default = "default_consecutive_good")]
    pub consecutive_good_to_restore_trust: u32,
}

fn default_persistence_samples() -> u16 {
    1
}

fn default_clear_samples() -> u16 {
    1
}

fn default_consecutive_good() -> u32 {
    1
}

impl Default for AlarmRules {
    fn default() -> Self {
        Self {
            rate_of_change: AlarmRule::default(),
            disconnected: AlarmRule::default(),
            max_value: AlarmRule::default(),
            stuck_signal: AlarmRule::default(),
            persistence_samples: default_persistence_samples(),
            clear_hysteresis_value: 0.0,
            clear_samples: default_clear_samples(),
            requires_manual_reset: false,
            consecutive_good_to_restore_trust: default_consecutive_good(),
        }
    }
}

/// Maximum accepted `history_size`, even though `StuckSignal` only ever
/// consults the trailing `min(history_size, 20)` samples.
pub const MAX_HISTORY_SIZE: u32 = 1000;
pub const MIN_HISTORY_SIZE: u32 = 1;
/// Cap applied to the trailing window used by the `StuckSignal` rule,
/// regardless of the configured `history_size`.
pub const STUCK_SIGNAL_WINDOW_CAP: usize = 20;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AlarmConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_history_size")]
    pub history_size: u32,
    #[serde(default)]
    pub rules: AlarmRules,
}

fn default_true() -> bool {
    true
}

fn default_history_size() -> u32 {
    STUCK_SIGNAL_WINDOW_CAP as u32
}

impl Default for AlarmConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            history_size: default_history_size(),
            rules: AlarmRules::default(),
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum AlarmConfigError {
    #[error("history_size {0} out of range [{MIN_HISTORY_SIZE}, {MAX_HISTORY_SIZE}]")]
    HistorySizeOutOfRange(u32),
}

impl AlarmConfig {
    pub fn validate(&self) -> Result<(), AlarmConfigError> {
        if self.history_size < MIN_HISTORY_SIZE || self.history_size > MAX_HISTORY_SIZE {
            return Err(AlarmConfigError::HistorySizeOutOfRange(self.history_size));
        }
        Ok(())
    }

    /// Number of trailing samples the `StuckSignal` rule consults, honoring
    /// a smaller configured history but never exceeding the cap.
    pub fn stuck_signal_window(&self) -> usize {
        (self.history_size as usize).min(STUCK_SIGNAL_WINDOW_CAP)
    }
}

/// The lifecycle of a single alarm rule's evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AlarmState {
    Clear,
    Pending,
    Active,
    Clearing,
}

impl Default for AlarmState {
    fn default() -> Self {
        AlarmState::Clear
    }
}
