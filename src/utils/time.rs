use lazy_static::lazy_static;
use std::fmt;
use std::time::Instant;
use time::OffsetDateTime;

lazy_static! {
    static ref PROCESS_START: Instant = Instant::now();
}

#[inline]
pub fn sleep_for_ms(ms: u64) {
    std::thread::sleep(std::time::Duration::from_millis(ms));
}

/// Seconds since the unix epoch, as stored in the shared concurrency hash.
#[inline]
pub fn curr_time_secs() -> i64 {
    OffsetDateTime::now_utc().unix_timestamp()
}

#[inline]
pub fn curr_time_millis() -> u64 {
    (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as u64
}

/// Seconds elapsed on a monotonic clock anchored at first use.
#[inline]
pub fn monotonic_time() -> f64 {
    PROCESS_START.elapsed().as_secs_f64()
}

/// Source of monotonic timestamps used for latency measurement.
pub trait Clock: Send + Sync + fmt::Debug {
    fn monotonic_time(&self) -> f64;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct MonotonicClock;

impl Clock for MonotonicClock {
    fn monotonic_time(&self) -> f64 {
        monotonic_time()
    }
}
