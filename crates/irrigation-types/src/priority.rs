use serde::{Deserialize, Serialize};

/// The six priority levels, ordered from lowest to highest so that
/// `Priority::Emergency > Priority::Background` holds via derived `Ord`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    Background,
    Normal,
    UiCritical,
    Authentication,
    IoCritical,
    Emergency,
}

/// Number of distinct priority levels, and the size of any array indexed by
/// priority.
pub const PRIORITY_COUNT: usize = 6;

impl Priority {
    pub const ALL: [Priority; PRIORITY_COUNT] = [
        Priority::Background,
        Priority::Normal,
        Priority::UiCritical,
        Priority::Authentication,
        Priority::IoCritical,
        Priority::Emergency,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    /// Degrade by exactly one step, per the load-shedding admission rule.
    /// `UiCritical` degrades to `Normal`; `Normal` degrades to `Background`;
    /// every other priority is unaffected.
    pub fn degrade_one_step(self) -> Priority {
        match self {
            Priority::UiCritical => Priority::Normal,
            Priority::Normal => Priority::Background,
            other => other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ordering_is_emergency_highest() {
        assert!(Priority::Emergency > Priority::IoCritical);
        assert!(Priority::IoCritical > Priority::Authentication);
        assert!(Priority::Authentication > Priority::UiCritical);
        assert!(Priority::UiCritical > Priority::Normal);
        assert!(Priority::Normal > Priority::Background);
    }

    #[test]
    fn degrade_one_step_matches_admission_rule() {
        assert_eq!(Priority::UiCritical.degrade_one_step(), Priority::Normal);
        assert_eq!(Priority::Normal.degrade_one_step(), Priority::Background);
        assert_eq!(
            Priority::Emergency.degrade_one_step(),
            Priority::Emergency
        );
    }
}
