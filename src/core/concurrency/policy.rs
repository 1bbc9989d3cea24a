use super::{extract_method_name, LimitSettings};
use crate::base::UNKNOWN;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};

/// Methods whose calls count against the concurrency limit.
pub const TRACKED_METHODS: [&str; 3] = ["BeginUpdate", "CommitUpdate", "RollbackUpdate"];

/// Decides which RPCs are tracked and exposes the current limit and mode.
#[derive(Debug)]
pub struct ConcurrencyLimitPolicy {
    settings: Arc<dyn LimitSettings>,
    // full method path => tracked; never evicted, the set of paths is small
    method_cache: RwLock<HashMap<String, bool>>,
}

impl ConcurrencyLimitPolicy {
    pub fn new(settings: Arc<dyn LimitSettings>) -> Self {
        Self {
            settings,
            method_cache: RwLock::new(HashMap::new()),
        }
    }

    pub fn is_tracked_rpc(&self, full_method_path: &str) -> bool {
        {
            let cache = self
                .method_cache
                .read()
                .unwrap_or_else(|poisoned| poisoned.into_inner());
            if let Some(tracked) = cache.get(full_method_path) {
                return *tracked;
            }
        }
        let method = extract_method_name(Some(full_method_path), UNKNOWN);
        let tracked = TRACKED_METHODS.contains(&method.as_str());
        self.method_cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(full_method_path.to_owned(), tracked);
        tracked
    }

    pub fn enforce_mode_enabled(&self) -> bool {
        self.settings.enforce_mode_enabled()
    }

    pub fn concurrency_limit(&self) -> u64 {
        self.settings.concurrency_limit()
    }

    pub fn settings(&self) -> &Arc<dyn LimitSettings> {
        &self.settings
    }

    pub fn reset_cache(&self) {
        self.method_cache
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clear();
    }

    pub(crate) fn cached_paths(&self) -> usize {
        self.method_cache
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}
