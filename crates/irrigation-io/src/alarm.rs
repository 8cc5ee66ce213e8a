use irrigation_types::alarm::{AlarmConfig, AlarmRuleKind, AlarmState};
use irrigation_types::runtime::AlarmRuntime;

/// C6: evaluates the four independent alarm rules for one point, once per
/// poll cycle, advancing each rule's `Clear -> Pending -> Active ->
/// Clearing -> Clear` state machine and the point's trust bookkeeping.
pub fn evaluate(
    conditioned: f64,
    prev_conditioned: Option<f64>,
    config: &AlarmConfig,
    runtime: &mut AlarmRuntime,
    now_us: u64,
) {
    if !config.enabled {
        return;
    }

    runtime.push_history(conditioned);
    let stuck_window = config.stuck_signal_window();

    for kind in AlarmRuleKind::ALL {
        let i = kind.index();
        let suspect = is_suspect(kind, conditioned, prev_conditioned, config, runtime, stuck_window);
        let clear_ready =
            is_clear_ready(kind, conditioned, prev_conditioned, config, runtime, stuck_window);

        match runtime.state[i] {
            AlarmState::Clear => {
                if suspect {
                    runtime.persistence_counter[i] = 1;
                    if runtime.persistence_counter[i] >= config.rules.persistence_samples as u32 {
                        activate(runtime, i, now_us);
                    } else {
                        runtime.state[i] = AlarmState::Pending;
                    }
                }
            }
            AlarmState::Pending => {
                if suspect {
                    runtime.persistence_counter[i] += 1;
                    if runtime.persistence_counter[i] >= config.rules.persistence_samples as u32 {
                        activate(runtime, i, now_us);
                    }
                } else {
                    runtime.persistence_counter[i] = 0;
                    runtime.state[i] = AlarmState::Clear;
                }
            }
            AlarmState::Active | AlarmState::Clearing => {
                if clear_ready {
                    runtime.clear_counter[i] += 1;
                    if runtime.clear_counter[i] >= config.rules.clear_samples as u32 {
                        if config.rules.requires_manual_reset {
                            runtime.state[i] = AlarmState::Active;
                        } else {
                            deactivate(runtime, i);
                        }
                    } else {
                        runtime.state[i] = AlarmState::Clearing;
                    }
                } else {
                    runtime.clear_counter[i] = 0;
                    runtime.state[i] = AlarmState::Active;
                }
            }
        }
    }

    if runtime.any_active() {
        runtime.consecutive_good = 0;
    } else {
        runtime.consecutive_good += 1;
        if runtime.consecutive_good >= config.rules.consecutive_good_to_restore_trust {
            runtime.trust_restored = true;
        }
    }
}

/// Manually acknowledges a rule that reached its clear threshold but is
/// held `Active` by `requires_manual_reset`.
pub fn acknowledge(runtime: &mut AlarmRuntime, kind: AlarmRuleKind) {
    deactivate(runtime, kind.index());
}

fn activate(runtime: &mut AlarmRuntime, i: usize, now_us: u64) {
    runtime.active[i] = true;
    runtime.activation_count[i] += 1;
    runtime.first_activated_us[i] = now_us;
    runtime.clear_counter[i] = 0;
    runtime.state[i] = AlarmState::Active;
    runtime.trust_restored = false;
    runtime.consecutive_good = 0;
}

fn deactivate(runtime: &mut AlarmRuntime, i: usize) {
    runtime.active[i] = false;
    runtime.persistence_counter[i] = 0;
    runtime.clear_counter[i] = 0;
    runtime.state[i] = AlarmState::Clear;
}

fn is_suspect(
    kind: AlarmRuleKind,
    conditioned: f64,
    prev_conditioned: Option<f64>,
    config: &AlarmConfig,
    runtime: &AlarmRuntime,
    stuck_window: usize,
) -> bool {
    match kind {
        AlarmRuleKind::RateOfChange => match prev_conditioned {
            Some(prev) => (conditioned - prev).abs() > config.rules.rate_of_change.threshold,
            None => false,
        },
        AlarmRuleKind::Disconnected => conditioned <= config.rules.disconnected.threshold,
        AlarmRuleKind::MaxValue => conditioned >= config.rules.max_value.threshold,
        AlarmRuleKind::StuckSignal => {
            let trailing = runtime.trailing(stuck_window);
            if trailing.len() < 2 {
                return false;
            }
            let max = trailing.iter().cloned().fold(f64::MIN, f64::max);
            let min = trailing.iter().cloned().fold(f64::MAX, f64::min);
            (max - min) < config.rules.stuck_signal.delta_threshold
        }
    }
}

fn is_clear_ready(
    kind: AlarmRuleKind,
    conditioned: f64,
    prev_conditioned: Option<f64>,
    config: &AlarmConfig,
    runtime: &AlarmRuntime,
    stuck_window: usize,
) -> bool {
    let hysteresis = config.rules.clear_hysteresis_value;
    match kind {
        AlarmRuleKind::RateOfChange => match prev_conditioned {
            Some(prev) => (conditioned - prev).abs() <= config.rules.rate_of_change.threshold,
            None => false,
        },
        AlarmRuleKind::Disconnected => conditioned > config.rules.disconnected.threshold + hysteresis,
        AlarmRuleKind::MaxValue => conditioned < config.rules.max_value.threshold - hysteresis,
        AlarmRuleKind::StuckSignal => {
            let trailing = runtime.trailing(stuck_window);
            if trailing.len() < 2 {
                return false;
            }
            let max = trailing.iter().cloned().fold(f64::MIN, f64::max);
            let min = trailing.iter().cloned().fold(f64::MAX, f64::min);
            (max - min) >= config.rules.stuck_signal.delta_threshold
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_types::alarm::{AlarmRule, AlarmRules};

    fn config(persistence: u16, clear: u16) -> AlarmConfig {
        AlarmConfig {
            enabled: true,
            history_size: 20,
            rules: AlarmRules {
                rate_of_change: AlarmRule {
                    threshold: 10.0,
                    ..Default::default()
                },
                disconnected: AlarmRule::default(),
                max_value: AlarmRule::default(),
                stuck_signal: AlarmRule::default(),
                persistence_samples: persistence,
                clear_hysteresis_value: 0.0,
                clear_samples: clear,
                requires_manual_reset: false,
                consecutive_good_to_restore_trust: 1,
            },
        }
    }

    #[test]
    fn rate_of_change_seed_scenario_never_raises() {
        let config = config(2, 2);
        let mut runtime = AlarmRuntime::new(20);
        let samples = [0.0, 0.0, 15.0, 20.0, 22.0, 22.0];
        let mut prev = None;
        for &sample in &samples {
            evaluate(sample, prev, &config, &mut runtime, 0);
            prev = Some(sample);
        }
        assert!(!runtime.active[AlarmRuleKind::RateOfChange.index()]);
    }

    #[test]
    fn rate_of_change_alarm_stays_active_while_signal_remains_erratic() {
        let config = config(1, 2);
        let mut runtime = AlarmRuntime::new(20);

        evaluate(0.0, None, &config, &mut runtime, 0);
        evaluate(50.0, Some(0.0), &config, &mut runtime, 10);
        assert!(runtime.active[AlarmRuleKind::RateOfChange.index()]);

        // Still jumping by more than the threshold every cycle: never
        // accumulates clear_counter no matter how many cycles pass.
        for (i, (sample, prev)) in [(100.0, 50.0), (50.0, 100.0), (100.0, 50.0)].into_iter().enumerate() {
            evaluate(sample, Some(prev), &config, &mut runtime, 20 + i as u64 * 10);
            assert!(runtime.active[AlarmRuleKind::RateOfChange.index()]);
        }

        // Now the signal settles: clears only after clear_samples of
        // genuinely non-suspect readings.
        evaluate(100.0, Some(100.0), &config, &mut runtime, 100);
        assert!(runtime.active[AlarmRuleKind::RateOfChange.index()]);
        evaluate(100.0, Some(100.0), &config, &mut runtime, 110);
        assert!(!runtime.active[AlarmRuleKind::RateOfChange.index()]);
    }

    #[test]
    fn first_sample_after_reset_never_triggers_rate_of_change() {
        let config = config(1, 1);
        let mut runtime = AlarmRuntime::new(20);
        evaluate(1000.0, None, &config, &mut runtime, 0);
        assert!(!runtime.active[AlarmRuleKind::RateOfChange.index()]);
    }

    #[test]
    fn activates_after_persistence_samples_reached() {
        let mut config = config(2, 1);
        config.rules.max_value.threshold = 100.0;
        let mut runtime = AlarmRuntime::new(20);
        evaluate(150.0, None, &config, &mut runtime, 10);
        assert!(!runtime.active[AlarmRuleKind::MaxValue.index()]);
        evaluate(150.0, Some(150.0), &config, &mut runtime, 20);
        assert!(runtime.active[AlarmRuleKind::MaxValue.index()]);
        assert_eq!(runtime.first_activated_us[AlarmRuleKind::MaxValue.index()], 20);
    }

    #[test]
    fn clears_after_clear_samples_with_hysteresis_margin() {
        let mut config = config(1, 2);
        config.rules.max_value.threshold = 100.0;
        config.rules.clear_hysteresis_value = 5.0;
        let mut runtime = AlarmRuntime::new(20);
        evaluate(150.0, None, &config, &mut runtime, 0);
        assert!(runtime.active[AlarmRuleKind::MaxValue.index()]);

        // Below threshold but inside the hysteresis band: not clear yet.
        evaluate(97.0, Some(150.0), &config, &mut runtime, 10);
        assert!(runtime.active[AlarmRuleKind::MaxValue.index()]);

        evaluate(90.0, Some(97.0), &config, &mut runtime, 20);
        evaluate(90.0, Some(90.0), &config, &mut runtime, 30);
        assert!(!runtime.active[AlarmRuleKind::MaxValue.index()]);
    }

    #[test]
    fn manual_reset_rule_stays_active_until_acknowledged() {
        let mut config = config(1, 1);
        config.rules.max_value.threshold = 100.0;
        config.rules.requires_manual_reset = true;
        let mut runtime = AlarmRuntime::new(20);
        evaluate(150.0, None, &config, &mut runtime, 0);
        evaluate(0.0, Some(150.0), &config, &mut runtime, 10);
        assert!(runtime.active[AlarmRuleKind::MaxValue.index()]);
        acknowledge(&mut runtime, AlarmRuleKind::MaxValue);
        assert!(!runtime.active[AlarmRuleKind::MaxValue.index()]);
    }

    #[test]
    fn trust_restored_after_consecutive_good_samples() {
        let mut config = config(1, 1);
        config.rules.max_value.threshold = 100.0;
        config.rules.consecutive_good_to_restore_trust = 2;
        let mut runtime = AlarmRuntime::new(20);
        evaluate(150.0, None, &config, &mut runtime, 0);
        evaluate(0.0, Some(150.0), &config, &mut runtime, 10);
        assert!(!runtime.active[AlarmRuleKind::MaxValue.index()]);
        assert!(!runtime.trust_restored);
        evaluate(0.0, Some(0.0), &config, &mut runtime, 20);
        assert!(runtime.trust_restored);
    }
}
