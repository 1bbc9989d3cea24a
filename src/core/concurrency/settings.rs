use crate::config::ConcurrencyLimitConfig;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

/// Dynamic concurrency limit configuration. Both values may change between
/// any two calls, so they are read fresh for every admission decision.
pub trait LimitSettings: Send + Sync + fmt::Debug {
    /// Allowed number of concurrent tracked RPCs across the fleet.
    fn concurrency_limit(&self) -> u64;
    /// Whether calls over the limit are rejected rather than only logged.
    fn enforce_mode_enabled(&self) -> bool;
}

/// Settings that operators can change at runtime, for example from an
/// application settings reload hook.
#[derive(Debug)]
pub struct DynamicLimitSettings {
    limit: AtomicU64,
    enforce: AtomicBool,
}

impl DynamicLimitSettings {
    pub fn new(limit: u64, enforce: bool) -> Self {
        Self {
            limit: AtomicU64::new(limit),
            enforce: AtomicBool::new(enforce),
        }
    }

    pub fn set_limit(&self, limit: u64) {
        self.limit.store(limit, Ordering::SeqCst);
    }

    pub fn set_enforce(&self, enforce: bool) {
        self.enforce.store(enforce, Ordering::SeqCst);
    }
}

impl From<&ConcurrencyLimitConfig> for DynamicLimitSettings {
    fn from(config: &ConcurrencyLimitConfig) -> Self {
        Self::new(config.limit, config.enforce)
    }
}

impl LimitSettings for DynamicLimitSettings {
    fn concurrency_limit(&self) -> u64 {
        self.limit.load(Ordering::SeqCst)
    }

    fn enforce_mode_enabled(&self) -> bool {
        self.enforce.load(Ordering::SeqCst)
    }
}
