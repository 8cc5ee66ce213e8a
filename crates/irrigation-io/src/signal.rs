use irrigation_types::runtime::SmaState;
use irrigation_types::signal::{Filter, SignalConfig};

/// Applies the fixed-order conditioning pipeline (offset, gain, scaling,
/// lookup, rounding, filter) to one raw sample. Pure aside from mutating the
/// point's own `sma` state, which the caller owns.
pub fn condition(raw: f64, config: &SignalConfig, sma: &mut Option<SmaState>) -> f64 {
    let mut v = raw + config.offset;
    v *= config.gain;
    v *= config.scaling;

    if let Some(table) = &config.lookup {
        v = interpolate(table, v);
    }

    v = round_half_away_from_zero(v, config.precision);

    if let Filter::SimpleMovingAverage { window } = config.filter {
        if window > 1 {
            let state = sma.get_or_insert_with(|| SmaState::new(window as usize));
            v = state.push(v);
        }
    }

    v
}

/// Piecewise-linear interpolation; inputs outside the table clamp to the
/// boundary output, and a coincident x returns the left endpoint's y.
fn interpolate(table: &[(f64, f64)], x: f64) -> f64 {
    if x <= table[0].0 {
        return table[0].1;
    }
    let last = table.len() - 1;
    if x >= table[last].0 {
        return table[last].1;
    }

    for window in table.windows(2) {
        let (x0, y0) = window[0];
        let (x1, y1) = window[1];
        if x >= x0 && x <= x1 {
            if (x1 - x0).abs() < f64::EPSILON {
                return y0;
            }
            let t = (x - x0) / (x1 - x0);
            return y0 + t * (y1 - y0);
        }
    }
    table[last].1
}

/// Rounds to `precision` decimal places, half-away-from-zero, on the scaled
/// integer rather than relying on float-format rounding.
fn round_half_away_from_zero(value: f64, precision: u8) -> f64 {
    let factor = 10f64.powi(precision as i32);
    let scaled = value * factor;
    let rounded = if scaled >= 0.0 {
        (scaled + 0.5).floor()
    } else {
        (scaled - 0.5).ceil()
    };
    rounded / factor
}

#[cfg(test)]
mod tests {
    use super::*;

    fn passthrough_config(precision: u8) -> SignalConfig {
        SignalConfig {
            enabled: true,
            filter: Filter::None,
            gain: 1.0,
            offset: 0.0,
            scaling: 1.0,
            precision,
            units: String::new(),
            lookup: None,
        }
    }

    #[test]
    fn passthrough_pipeline_rounds_integer_input() {
        let config = passthrough_config(2);
        let mut sma = None;
        assert_eq!(condition(7.0, &config, &mut sma), 7.0);
    }

    #[test]
    fn sma_window_one_returns_raw_every_time() {
        let mut config = passthrough_config(2);
        config.filter = Filter::SimpleMovingAverage { window: 1 };
        let mut sma = None;
        assert_eq!(condition(3.0, &config, &mut sma), 3.0);
        assert_eq!(condition(9.0, &config, &mut sma), 9.0);
    }

    #[test]
    fn seed_scenario_signal_pipeline_exact() {
        let mut config = passthrough_config(2);
        config.filter = Filter::SimpleMovingAverage { window: 3 };
        let mut sma = None;
        let outputs: Vec<f64> = [1.0, 2.0, 3.0, 4.0]
            .iter()
            .map(|&raw| condition(raw, &config, &mut sma))
            .collect();
        assert_eq!(outputs, vec![1.00, 1.50, 2.00, 3.00]);
    }

    #[test]
    fn lookup_clamps_outside_table_and_returns_knot_at_exact_match() {
        let mut config = passthrough_config(0);
        config.lookup = Some(vec![(0.0, 100.0), (10.0, 200.0), (20.0, 400.0)]);
        let mut sma = None;
        assert_eq!(condition(-5.0, &config, &mut sma), 100.0);
        assert_eq!(condition(25.0, &config, &mut sma), 400.0);
        assert_eq!(condition(10.0, &config, &mut sma), 200.0);
    }

    #[test]
    fn rounding_is_half_away_from_zero() {
        let config = passthrough_config(0);
        let mut sma = None;
        assert_eq!(condition(2.5, &config, &mut sma), 3.0);
        assert_eq!(condition(-2.5, &config, &mut sma), -3.0);
    }
}
