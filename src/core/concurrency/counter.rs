use super::{CounterStore, LimitSettings};
use crate::base::UNKNOWN;
use crate::config::{CONCURRENCY_LIMIT_KEY, STALE_REQUEST_TTL_SECS};
use crate::{correlation, logging, utils};
use std::fmt;
use std::sync::Arc;

/// Outcome of an admission attempt against the shared counter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Admission {
    /// A slot was taken; the id must be handed back through
    /// [`DistributedCounter::track_request_end`].
    Admitted(String),
    /// The limit was reached, nothing was recorded.
    Rejected,
}

impl Admission {
    pub fn request_id(&self) -> Option<&str> {
        match self {
            Admission::Admitted(id) => Some(id),
            Admission::Rejected => None,
        }
    }

    pub fn is_admitted(&self) -> bool {
        matches!(self, Admission::Admitted(_))
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CleanupResult {
    pub removed_count: u64,
}

/// Fleet-wide count of in-flight tracked RPCs, kept as one hash in a shared
/// store: field = request id, value = admission time in epoch seconds.
///
/// Every operation is total. A failing store never blocks a caller: counts
/// read as zero, admission succeeds without recording anything, removals and
/// sweeps do nothing.
pub struct DistributedCounter {
    store: Arc<dyn CounterStore>,
    settings: Arc<dyn LimitSettings>,
    key: String,
    ttl_secs: u64,
}

impl fmt::Debug for DistributedCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DistributedCounter")
            .field("key", &self.key)
            .field("ttl_secs", &self.ttl_secs)
            .field("settings", &self.settings)
            .finish()
    }
}

impl DistributedCounter {
    pub fn new(store: Arc<dyn CounterStore>, settings: Arc<dyn LimitSettings>) -> Self {
        Self {
            store,
            settings,
            key: CONCURRENCY_LIMIT_KEY.into(),
            ttl_secs: STALE_REQUEST_TTL_SECS,
        }
    }

    pub fn with_key(mut self, key: impl Into<String>) -> Self {
        self.key = key.into();
        self
    }

    pub fn with_ttl_secs(mut self, ttl_secs: u64) -> Self {
        self.ttl_secs = ttl_secs;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn settings(&self) -> &Arc<dyn LimitSettings> {
        &self.settings
    }

    pub fn current_count(&self) -> u64 {
        match self.store.count(&self.key) {
            Ok(count) => count,
            Err(err) => {
                logging::warn!(
                    "[ConcurrencyLimit] Failed to read current count, key {}, error {}",
                    self.key,
                    err
                );
                0
            }
        }
    }

    /// Takes a slot if fewer than the configured limit are in use. The check
    /// and the insert are a single atomic step in the store.
    pub fn try_admit(&self, method: Option<&str>) -> Admission {
        let limit = self.settings.concurrency_limit();
        let request_id = generate_request_id(method);
        match self.store.admit(
            &self.key,
            &request_id,
            utils::curr_time_secs(),
            limit,
            self.ttl_secs,
        ) {
            Ok(true) => Admission::Admitted(request_id),
            Ok(false) => Admission::Rejected,
            Err(err) => {
                logging::warn!(
                    "[ConcurrencyLimit] Store unavailable, admitting untracked, request_id {}, error {}",
                    request_id,
                    err
                );
                Admission::Admitted(request_id)
            }
        }
    }

    pub fn track_request_start(&self, method: Option<&str>) -> Option<String> {
        match self.try_admit(method) {
            Admission::Admitted(id) => Some(id),
            Admission::Rejected => None,
        }
    }

    pub fn track_request_end(&self, request_id: Option<&str>) {
        let request_id = match request_id {
            Some(id) => id,
            None => return,
        };
        if let Err(err) = self.store.remove(&self.key, request_id) {
            logging::warn!(
                "[ConcurrencyLimit] Failed to release slot, request_id {}, error {}",
                request_id,
                err
            );
        }
    }

    /// Drops entries older than the TTL, left behind by processes that died
    /// before releasing their slot. Meant to be run periodically by an
    /// external scheduler.
    pub fn cleanup_stale_requests(&self) -> CleanupResult {
        let entries = match self.store.entries(&self.key) {
            Ok(entries) => entries,
            Err(err) => {
                logging::warn!(
                    "[ConcurrencyLimit] Failed to scan for stale requests, key {}, error {}",
                    self.key,
                    err
                );
                return CleanupResult::default();
            }
        };
        let cutoff = utils::curr_time_secs() as f64 - self.ttl_secs as f64;
        let stale: Vec<String> = entries
            .into_iter()
            .filter(|(_, started_at)| match started_at.trim().parse::<f64>() {
                Ok(started_at) => started_at < cutoff,
                // unreadable timestamps count as stale
                Err(_) => true,
            })
            .map(|(request_id, _)| request_id)
            .collect();
        if stale.is_empty() {
            return CleanupResult::default();
        }
        match self.store.remove_many(&self.key, &stale) {
            Ok(removed_count) => {
                logging::info!(
                    "[ConcurrencyLimit] Removed stale requests, key {}, removed_count {}",
                    self.key,
                    removed_count
                );
                CleanupResult { removed_count }
            }
            Err(err) => {
                logging::warn!(
                    "[ConcurrencyLimit] Failed to remove stale requests, key {}, error {}",
                    self.key,
                    err
                );
                CleanupResult::default()
            }
        }
    }
}

/// `{pid}:{method}:{correlation_id}:{16 hex}`
fn generate_request_id(method: Option<&str>) -> String {
    format!(
        "{}:{}:{}:{:016x}",
        std::process::id(),
        extract_method_name(method, UNKNOWN),
        correlation::current().unwrap_or_else(|| "none".into()),
        rand::random::<u64>()
    )
}

/// The trailing method segment of an RPC path. Accepts `/pkg.Service/Method`,
/// `Service/Method` and bare `Method`; returns `fallback` when there is no
/// method segment.
pub fn extract_method_name(full_path: Option<&str>, fallback: &str) -> String {
    let full_path = match full_path {
        Some(path) if !path.is_empty() => path,
        _ => return fallback.to_owned(),
    };
    match full_path.rsplit('/').next() {
        Some(method) if !method.is_empty() => method.to_owned(),
        _ => fallback.to_owned(),
    }
}
