use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use irrigation_types::request::Request;
use irrigation_types::priority::{Priority, PRIORITY_COUNT};

use crate::clock::now_us;

struct BoundedQueue {
    capacity: usize,
    items: VecDeque<Request>,
}

impl BoundedQueue {
    fn new(capacity: usize) -> Self {
        Self {
            capacity,
            items: VecDeque::new(),
        }
    }
}

struct Inner {
    queues: [BoundedQueue; PRIORITY_COUNT],
}

/// Default per-priority bounded capacities, indexed the same way
/// `Priority::index()` orders the enum (Background..Emergency).
pub const DEFAULT_CAPACITIES: [usize; PRIORITY_COUNT] = [
    100, // Background
    200, // Normal
    100, // UiCritical
    50,  // Authentication
    100, // IoCritical
    50,  // Emergency
];

/// C9: six independent FIFO bounded queues, one per priority, with
/// strict-priority dequeue and bounded-timeout expiry sweeping.
pub struct QueueSet {
    inner: Mutex<Inner>,
    cond: Condvar,
    total_enqueued: AtomicU64,
    total_dequeued: AtomicU64,
    total_timeouts: AtomicU64,
}

impl QueueSet {
    pub fn new(capacities: [usize; PRIORITY_COUNT]) -> Self {
        let queues = capacities.map(BoundedQueue::new);
        Self {
            inner: Mutex::new(Inner { queues }),
            cond: Condvar::new(),
            total_enqueued: AtomicU64::new(0),
            total_dequeued: AtomicU64::new(0),
            total_timeouts: AtomicU64::new(0),
        }
    }

    pub fn with_default_capacities() -> Self {
        Self::new(DEFAULT_CAPACITIES)
    }

    /// Enqueues `request`, or hands it back (rather than dropping it) if the
    /// target priority's queue is at capacity.
    pub fn enqueue(&self, request: Request) -> Result<(), Request> {
        let mut inner = self.inner.lock().unwrap();
        let queue = &mut inner.queues[request.priority.index()];
        if queue.items.len() >= queue.capacity {
            return Err(request);
        }
        queue.items.push_back(request);
        self.total_enqueued.fetch_add(1, Ordering::Relaxed);
        drop(inner);
        self.cond.notify_all();
        Ok(())
    }

    /// Scans priorities from highest to lowest, returning the head of the
    /// first non-empty queue; blocks up to `wait_ms` if all are empty.
    pub fn dequeue_any(&self, wait_ms: u64) -> Option<Request> {
        self.dequeue_band(Priority::Background, Priority::Emergency, wait_ms)
    }

    pub fn dequeue_band(&self, lo: Priority, hi: Priority, wait_ms: u64) -> Option<Request> {
        let deadline = Instant::now() + Duration::from_millis(wait_ms);
        let mut inner = self.inner.lock().unwrap();
        loop {
            if let Some(request) = self.pop_highest_in_band(&mut inner, lo, hi) {
                return Some(request);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            let (next_inner, timeout_result) =
                self.cond.wait_timeout(inner, deadline - now).unwrap();
            inner = next_inner;
            if timeout_result.timed_out() {
                // one more check before giving up, in case notify raced the timeout
                if let Some(request) = self.pop_highest_in_band(&mut inner, lo, hi) {
                    return Some(request);
                }
                return None;
            }
        }
    }

    fn pop_highest_in_band(&self, inner: &mut Inner, lo: Priority, hi: Priority) -> Option<Request> {
        for priority in Priority::ALL.iter().rev() {
            if *priority < lo || *priority > hi {
                continue;
            }
            let queue = &mut inner.queues[priority.index()];
            if let Some(request) = queue.items.pop_front() {
                self.total_dequeued.fetch_add(1, Ordering::Relaxed);
                return Some(request);
            }
        }
        None
    }

    /// Removes and frees every request whose `timeout_ms` has elapsed since
    /// `enqueue_us`. Returns the number removed.
    pub fn cleanup_expired(&self) -> u32 {
        let now = now_us();
        let mut inner = self.inner.lock().unwrap();
        let mut removed = 0u32;
        for queue in inner.queues.iter_mut() {
            let before = queue.items.len();
            queue.items.retain(|req| !req.is_expired(now));
            removed += (before - queue.items.len()) as u32;
        }
        if removed > 0 {
            self.total_timeouts.fetch_add(removed as u64, Ordering::Relaxed);
        }
        removed
    }

    pub fn depth(&self, priority: Priority) -> usize {
        self.inner.lock().unwrap().queues[priority.index()].items.len()
    }

    pub fn capacity(&self, priority: Priority) -> usize {
        self.inner.lock().unwrap().queues[priority.index()].capacity
    }

    pub fn total_depth(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.queues.iter().map(|q| q.items.len()).sum()
    }

    pub fn total_capacity(&self) -> usize {
        let inner = self.inner.lock().unwrap();
        inner.queues.iter().map(|q| q.capacity).sum()
    }

    pub fn total_enqueued(&self) -> u64 {
        self.total_enqueued.load(Ordering::Relaxed)
    }

    pub fn total_dequeued(&self) -> u64 {
        self.total_dequeued.load(Ordering::Relaxed)
    }

    pub fn total_timeouts(&self) -> u64 {
        self.total_timeouts.load(Ordering::Relaxed)
    }
}
