use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use thiserror::Error;
use tracing::warn;

/// The two memory pools the controller draws from. A hosted process can't
/// actually carve internal-RAM vs. PSRAM the way the source firmware does,
/// so each tier is modeled as a budget of bytes the allocator enforces
/// rather than a distinct heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Fast,
    Large,
}

/// Allocation priority, determining placement policy (§4.2).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AllocPriority {
    Critical,
    Normal,
    LargeBuffer,
    Cache,
    TaskStack,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum MemoryError {
    #[error("tier {0:?} exhausted")]
    Exhausted(Tier),
}

/// Minimum stack size a created worker may request.
pub const MIN_STACK_SIZE: usize = 2 * 1024;

/// Threshold above which a `TaskStack` allocation prefers the large tier.
const TASK_STACK_LARGE_THRESHOLD: usize = 4 * 1024;

#[derive(Debug, Default)]
struct TierBudget {
    capacity: u64,
    used: AtomicU64,
}

impl TierBudget {
    fn new(capacity: u64) -> Self {
        Self {
            capacity,
            used: AtomicU64::new(0),
        }
    }

    fn try_reserve(&self, size: u64) -> bool {
        loop {
            let used = self.used.load(Ordering::Acquire);
            let next = used + size;
            if next > self.capacity {
                return false;
            }
            if self
                .used
                .compare_exchange(used, next, Ordering::AcqRel, Ordering::Acquire)
                .is_ok()
            {
                return true;
            }
        }
    }

    fn release(&self, size: u64) {
        self.used.fetch_sub(size, Ordering::AcqRel);
    }

    fn used(&self) -> u64 {
        self.used.load(Ordering::Acquire)
    }
}

#[derive(Debug, Default)]
pub struct AllocatorStats {
    pub successes: u64,
    pub failures: u64,
    pub fallbacks: u64,
}

/// A live allocation's accounting handle. Calling [`TieredAllocator::free`]
/// with it returns the bytes to the originating tier's budget.
#[derive(Debug, Clone, Copy)]
pub struct Allocation {
    pub tier: Tier,
    pub size: u64,
}

/// Models C2: `allocate`/`free` classified by priority into a fast
/// (internal-equivalent) and large (external-equivalent) budget, plus
/// `create_worker` which places a thread's stack per the same policy.
pub struct TieredAllocator {
    fast: TierBudget,
    large: TierBudget,
    stats: Mutex<AllocatorStats>,
}

impl TieredAllocator {
    pub fn new(fast_capacity: u64, large_capacity: u64) -> Self {
        Self {
            fast: TierBudget::new(fast_capacity),
            large: TierBudget::new(large_capacity),
            stats: Mutex::new(AllocatorStats::default()),
        }
    }

    pub fn fast_used(&self) -> u64 {
        self.fast.used()
    }

    pub fn large_used(&self) -> u64 {
        self.large.used()
    }

    pub fn stats(&self) -> AllocatorStats {
        let guard = self.stats.lock().unwrap();
        AllocatorStats {
            successes: guard.successes,
            failures: guard.failures,
            fallbacks: guard.fallbacks,
        }
    }

    fn record(&self, outcome: Outcome) {
        let mut stats = self.stats.lock().unwrap();
        match outcome {
            Outcome::Success => stats.successes += 1,
            Outcome::Failure => stats.failures += 1,
            Outcome::Fallback => {
                stats.successes += 1;
                stats.fallbacks += 1;
            }
        }
    }

    /// Placement policy from §4.2, applied before the fallback attempt.
    fn preferred_tier(priority: AllocPriority, size: u64) -> Tier {
        match priority {
            AllocPriority::Critical => Tier::Fast,
            AllocPriority::Normal => Tier::Fast,
            AllocPriority::LargeBuffer => Tier::Large,
            AllocPriority::Cache => Tier::Large,
            AllocPriority::TaskStack => {
                if size >= TASK_STACK_LARGE_THRESHOLD as u64 {
                    Tier::Large
                } else {
                    Tier::Fast
                }
            }
        }
    }

    fn falls_back(priority: AllocPriority) -> bool {
        !matches!(priority, AllocPriority::Critical)
    }

    pub fn allocate(&self, size: u64, priority: AllocPriority) -> Result<Allocation, MemoryError> {
        let preferred = Self::preferred_tier(priority, size);
        let alternate = match preferred {
            Tier::Fast => Tier::Large,
            Tier::Large => Tier::Fast,
        };

        let preferred_budget = self.budget(preferred);
        if preferred_budget.try_reserve(size) {
            self.record(Outcome::Success);
            return Ok(Allocation {
                tier: preferred,
                size,
            });
        }

        if Self::falls_back(priority) {
            let alt_budget = self.budget(alternate);
            if alt_budget.try_reserve(size) {
                warn!(?priority, ?preferred, ?alternate, size, "allocation fell back to alternate tier");
                self.record(Outcome::Fallback);
                return Ok(Allocation {
                    tier: alternate,
                    size,
                });
            }
        }

        self.record(Outcome::Failure);
        Err(MemoryError::Exhausted(preferred))
    }

    pub fn free(&self, allocation: Allocation) {
        self.budget(allocation.tier).release(allocation.size);
    }

    fn budget(&self, tier: Tier) -> &TierBudget {
        match tier {
            Tier::Fast => &self.fast,
            Tier::Large => &self.large,
        }
    }

    /// Spawns `body` on a new OS thread with a stack placed per `priority`'s
    /// policy, optionally pinned to `core`. Falls back to the fast tier with
    /// a logged warning if the large-tier stack budget can't be satisfied.
    pub fn create_worker<F>(
        &self,
        name: &str,
        stack_size: usize,
        priority: AllocPriority,
        core: Option<core_affinity::CoreId>,
        body: F,
    ) -> Result<std::thread::JoinHandle<()>, MemoryError>
    where
        F: FnOnce() + Send + 'static,
    {
        let stack_size = stack_size.max(MIN_STACK_SIZE);
        let allocation = self.allocate(stack_size as u64, priority)?;
        let allocator_tier = allocation.tier;

        let builder = std::thread::Builder::new()
            .name(name.to_string())
            .stack_size(stack_size);

        let handle = builder
            .spawn(move || {
                if let Some(core) = core {
                    core_affinity::set_for_current(core);
                }
                body();
            })
            .map_err(|_| MemoryError::Exhausted(allocator_tier))?;

        Ok(handle)
    }
}

enum Outcome {
    Success,
    Failure,
    Fallback,
}
