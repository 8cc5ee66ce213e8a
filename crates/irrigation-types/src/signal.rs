use serde::{Deserialize, Serialize};

/// Smoothing filter applied as the last stage of the signal pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Filter {
    None,
    SimpleMovingAverage { window: u8 },
}

impl Default for Filter {
    fn default() -> Self {
        Filter::None
    }
}

/// Maximum SMA window, matching the fixed-size ring buffer in [`crate::runtime::SmaState`].
pub const MAX_SMA_WINDOW: u8 = 16;

/// Maximum rounding precision, in decimal places.
pub const MAX_PRECISION: u8 = 6;

/// Bounds on the piecewise-linear lookup table's entry count.
pub const MIN_LOOKUP_LEN: usize = 2;
pub const MAX_LOOKUP_LEN: usize = 16;

/// A single `(x, y)` knot of a piecewise-linear lookup table.
pub type LookupPoint = (f64, f64);

/// Per-point signal conditioning configuration. See the conditioning pipeline
/// in `irrigation_io::signal` for the order these fields are applied in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignalConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub filter: Filter,
    #[serde(default = "default_one")]
    pub gain: f64,
    #[serde(default)]
    pub offset: f64,
    #[serde(default = "default_one")]
    pub scaling: f64,
    #[serde(default)]
    pub precision: u8,
    #[serde(default)]
    pub units: String,
    #[serde(default)]
    pub lookup: Option<Vec<LookupPoint>>,
}

fn default_true() -> bool {
    true
}

fn default_one() -> f64 {
    1.0
}

impl Default for SignalConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            filter: Filter::None,
            gain: 1.0,
            offset: 0.0,
            scaling: 1.0,
            precision: 0,
            units: String::new(),
            lookup: None,
        }
    }
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum SignalConfigError {
    #[error("sma window {0} out of range [1, {MAX_SMA_WINDOW}]")]
    SmaWindowOutOfRange(u8),
    #[error("precision {0} out of range [0, {MAX_PRECISION}]")]
    PrecisionOutOfRange(u8),
    #[error("lookup table must have at least {MIN_LOOKUP_LEN} entries, got {0}")]
    LookupTooShort(usize),
    #[error("lookup table must have at most {MAX_LOOKUP_LEN} entries, got {0}")]
    LookupTooLong(usize),
    #[error("lookup table x values must be strictly increasing at index {0}")]
    LookupNotMonotone(usize),
}

impl SignalConfig {
    pub fn validate(&self) -> Result<(), SignalConfigError> {
        if let Filter::SimpleMovingAverage { window } = self.filter {
            if window < 1 || window > MAX_SMA_WINDOW {
                return Err(SignalConfigError::SmaWindowOutOfRange(window));
            }
        }
        if self.precision > MAX_PRECISION {
            return Err(SignalConfigError::PrecisionOutOfRange(self.precision));
        }
        if let Some(table) = &self.lookup {
            if table.len() < MIN_LOOKUP_LEN {
                return Err(SignalConfigError::LookupTooShort(table.len()));
            }
            if table.len() > MAX_LOOKUP_LEN {
                return Err(SignalConfigError::LookupTooLong(table.len()));
            }
            for (i, pair) in table.windows(2).enumerate() {
                if pair[1].0 <= pair[0].0 {
                    return Err(SignalConfigError::LookupNotMonotone(i + 1));
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_lookup_table_with_too_few_entries() {
        let mut config = SignalConfig::default();
        config.lookup = Some(vec![(0.0, 0.0)]);
        assert_eq!(config.validate(), Err(SignalConfigError::LookupTooShort(1)));
    }

    #[test]
    fn rejects_lookup_table_with_too_many_entries() {
        let mut config = SignalConfig::default();
        config.lookup = Some((0..17).map(|i| (i as f64, i as f64)).collect());
        assert_eq!(config.validate(), Err(SignalConfigError::LookupTooLong(17)));
    }

    #[test]
    fn accepts_lookup_table_at_the_upper_bound() {
        let mut config = SignalConfig::default();
        config.lookup = Some((0..16).map(|i| (i as f64, i as f64)).collect());
        assert!(config.validate().is_ok());
    }
}
