use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use irrigation_types::error::ControllerError;
use irrigation_types::priority::{Priority, PRIORITY_COUNT};
use irrigation_types::request::Request;
use tracing::{info, warn};

use crate::classifier::{self, Classification};
use crate::clock::now_us;
use crate::queue::QueueSet;

/// The system-mode state machine governing admission (§4.11). `Maintenance`
/// is orthogonal and can be entered from any of the other three states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SystemMode {
    Normal,
    LoadShedding,
    Emergency,
    Maintenance,
}

struct ModeState {
    mode: SystemMode,
    /// The mode `Maintenance` was entered from, so it can be restored on exit.
    pre_maintenance: SystemMode,
    emergency_entered_us: u64,
    emergency_ttl_us: u64,
}

#[derive(Debug, Default, Clone, Copy)]
pub struct PriorityStats {
    pub requests_by_priority: [u64; PRIORITY_COUNT],
    pub avg_processing_ms: [f64; PRIORITY_COUNT],
    pub dropped_count: u64,
    pub timeout_count: u64,
    pub emergency_activations: u64,
    pub load_shedding_activations: u64,
}

/// Returned when a request doesn't make it into a queue: either admission
/// rejected it outright, or the (possibly degraded) target queue was full.
/// The `QueueFull` case hands the request back so an emergency caller can
/// bypass the queue and execute directly, per §7's emergency-stop contract.
pub enum AdmissionError {
    Rejected(ControllerError),
    Full(Request),
}

/// C11: owns the classifier's admission decisions, the queue set, and the
/// system-mode state machine.
pub struct PriorityManager {
    queues: QueueSet,
    mode: Mutex<ModeState>,
    load_shedding_threshold_pct: f64,
    started_us: u64,
    stats: Mutex<PriorityStats>,
}

impl PriorityManager {
    pub fn new(queues: QueueSet, load_shedding_threshold_pct: f64) -> Self {
        Self {
            queues,
            mode: Mutex::new(ModeState {
                mode: SystemMode::Normal,
                pre_maintenance: SystemMode::Normal,
                emergency_entered_us: 0,
                emergency_ttl_us: 0,
            }),
            load_shedding_threshold_pct,
            started_us: now_us(),
            stats: Mutex::new(PriorityStats::default()),
        }
    }

    pub fn queues(&self) -> &QueueSet {
        &self.queues
    }

    pub fn mode(&self) -> SystemMode {
        self.mode.lock().unwrap().mode
    }

    pub fn load_percentage(&self) -> f64 {
        let total_capacity = self.queues.total_capacity() as f64;
        if total_capacity == 0.0 {
            return 0.0;
        }
        let pct = (self.queues.total_depth() as f64 / total_capacity) * 100.0;
        pct.clamp(0.0, 100.0)
    }

    pub fn enter_emergency(&self, ttl_us: u64) {
        let mut mode = self.mode.lock().unwrap();
        mode.mode = SystemMode::Emergency;
        mode.emergency_entered_us = now_us();
        mode.emergency_ttl_us = ttl_us;
        drop(mode);
        self.stats.lock().unwrap().emergency_activations += 1;
        warn!(ttl_us, "entered emergency mode");
    }

    pub fn exit_emergency(&self) {
        let mut mode = self.mode.lock().unwrap();
        if mode.mode == SystemMode::Emergency {
            mode.mode = SystemMode::Normal;
            info!("exited emergency mode, returned to normal");
        }
    }

    /// Checked periodically by a worker; transitions back to `Normal` once
    /// the TTL has elapsed.
    pub fn check_emergency_timeout(&self) -> bool {
        let mut mode = self.mode.lock().unwrap();
        if mode.mode != SystemMode::Emergency {
            return false;
        }
        let elapsed = now_us().saturating_sub(mode.emergency_entered_us);
        if elapsed > mode.emergency_ttl_us {
            mode.mode = SystemMode::Normal;
            info!("emergency ttl elapsed, returned to normal");
            true
        } else {
            false
        }
    }

    pub fn enable_load_shedding(&self, enabled: bool) {
        let mut mode = self.mode.lock().unwrap();
        if enabled {
            if mode.mode == SystemMode::Normal {
                mode.mode = SystemMode::LoadShedding;
                drop(mode);
                self.stats.lock().unwrap().load_shedding_activations += 1;
                warn!("entered load shedding mode");
                return;
            }
        } else if mode.mode == SystemMode::LoadShedding {
            mode.mode = SystemMode::Normal;
            info!("exited load shedding mode");
        }
    }

    pub fn enter_maintenance(&self) {
        let mut mode = self.mode.lock().unwrap();
        if mode.mode != SystemMode::Maintenance {
            mode.pre_maintenance = mode.mode;
            mode.mode = SystemMode::Maintenance;
            info!("entered maintenance mode");
        }
    }

    pub fn exit_maintenance(&self) {
        let mut mode = self.mode.lock().unwrap();
        if mode.mode == SystemMode::Maintenance {
            mode.mode = mode.pre_maintenance;
            info!(restored = ?mode.mode, "exited maintenance mode");
        }
    }

    /// Classifies the request and applies the mode-dependent admission rule
    /// from §4.8/§4.11, returning the (possibly degraded) classification or
    /// an admission rejection.
    pub fn classify_and_admit(&self, method: &str, uri: &str) -> Result<Classification, ControllerError> {
        let mut classification = classifier::classify(method, uri);
        let mode = self.mode();

        match mode {
            SystemMode::Emergency => {
                if classification.priority < Priority::IoCritical {
                    return Err(ControllerError::NotAllowed(
                        "system is in emergency mode".to_string(),
                    ));
                }
            }
            SystemMode::LoadShedding => {
                if classification.priority == Priority::Background {
                    return Err(ControllerError::NotAllowed(
                        "background requests are shed under load".to_string(),
                    ));
                }
                classification.priority = classification.priority.degrade_one_step();
            }
            SystemMode::Maintenance => {
                if classification.priority <= Priority::UiCritical {
                    return Err(ControllerError::NotAllowed(
                        "system is in maintenance mode".to_string(),
                    ));
                }
            }
            SystemMode::Normal => {}
        }

        Ok(classification)
    }

    /// Admits and enqueues `request` (whose priority should already reflect
    /// `classify_and_admit`'s degrade). On `QueueFull`, hands the request
    /// back rather than retrying a second degrade step.
    pub fn enqueue(&self, request: Request) -> Result<(), AdmissionError> {
        let priority = request.priority;
        match self.queues.enqueue(request) {
            Ok(()) => {
                self.stats.lock().unwrap().requests_by_priority[priority.index()] += 1;
                Ok(())
            }
            Err(rejected) => {
                self.stats.lock().unwrap().dropped_count += 1;
                Err(AdmissionError::Full(rejected))
            }
        }
    }

    pub fn record_processing_time(&self, priority: Priority, duration_ms: f64) {
        let mut stats = self.stats.lock().unwrap();
        let slot = &mut stats.avg_processing_ms[priority.index()];
        *slot = if *slot == 0.0 {
            duration_ms
        } else {
            (*slot + duration_ms) / 2.0
        };
    }

    pub fn record_timeout(&self) {
        self.stats.lock().unwrap().timeout_count += 1;
    }

    pub fn uptime_us(&self) -> u64 {
        now_us().saturating_sub(self.started_us)
    }

    pub fn statistics(&self) -> PriorityStats {
        *self.stats.lock().unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use irrigation_types::request::RequestId;

    fn request(priority: Priority) -> Request {
        Request::new(RequestId::from_bytes([1; 16]), "GET", "/x", priority, now_us(), 5000)
    }

    #[test]
    fn seed_scenario_emergency_admission() {
        let manager = PriorityManager::new(QueueSet::with_default_capacities(), 80.0);
        manager.enter_emergency(0);
        let classification = manager.classify_and_admit("POST", "/api/dashboard/summary");
        assert!(matches!(classification, Err(ControllerError::NotAllowed(_))));

        let classification = manager
            .classify_and_admit("POST", "/api/io/points/R0/set")
            .unwrap();
        assert_eq!(classification.priority, Priority::IoCritical);
    }

    #[test]
    fn load_shedding_degrades_ui_critical_and_sheds_background() {
        let manager = PriorityManager::new(QueueSet::with_default_capacities(), 80.0);
        manager.enable_load_shedding(true);

        let classification = manager.classify_and_admit("GET", "/api/io/points").unwrap();
        assert_eq!(classification.priority, Priority::Normal);

        let rejected = manager.classify_and_admit("GET", "/api/logs/today");
        assert!(matches!(rejected, Err(ControllerError::NotAllowed(_))));
    }

    #[test]
    fn maintenance_rejects_ui_and_below() {
        let manager = PriorityManager::new(QueueSet::with_default_capacities(), 80.0);
        manager.enter_maintenance();
        let rejected = manager.classify_and_admit("GET", "/api/io/points");
        assert!(matches!(rejected, Err(ControllerError::NotAllowed(_))));
    }

    #[test]
    fn seed_scenario_emergency_ttl_expiry_resumes_normal() {
        let manager = PriorityManager::new(QueueSet::with_default_capacities(), 80.0);
        manager.enter_emergency(0);
        assert_eq!(manager.mode(), SystemMode::Emergency);

        assert!(manager.check_emergency_timeout());
        assert_eq!(manager.mode(), SystemMode::Normal);

        let classification = manager.classify_and_admit("GET", "/api/dashboard/summary").unwrap();
        assert_eq!(classification.priority, Priority::UiCritical);
    }
}
