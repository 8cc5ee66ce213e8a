use std::sync::OnceLock;
use std::time::Instant;

static START: OnceLock<Instant> = OnceLock::new();

/// Monotonic microsecond timestamp source, relative to first call. Every
/// consumer in this crate goes through this function rather than reading
/// the system clock directly, so a future swap to an injectable clock for
/// tests only touches this module.
pub fn now_us() -> u64 {
    let start = START.get_or_init(Instant::now);
    start.elapsed().as_micros() as u64
}
