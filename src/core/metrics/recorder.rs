use super::{
    CounterMetric, HistogramMetric, MetricDefinition, MetricKind, MetricsBackend, RpcLabels,
    ERROR_TYPE_LABEL, RPC_LABEL_NAMES,
};
use crate::base::Code;
use crate::{logging, utils, Result};
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

pub const RPC_DURATION_SECONDS: &str = "topology_service_rpc_duration_seconds";
pub const RPC_REQUEST_SIZE_BYTES: &str = "topology_service_rpc_request_size_bytes";
pub const RPC_RESPONSE_SIZE_BYTES: &str = "topology_service_rpc_response_size_bytes";
pub const RPC_CALLS_TOTAL: &str = "topology_service_rpc_calls_total";
pub const RPC_FAILED_CALLS_TOTAL: &str = "topology_service_rpc_failed_calls_total";

pub const DURATION_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0,
];
pub const SIZE_BUCKETS: &[f64] = &[100.0, 1_000.0, 10_000.0, 100_000.0, 1_000_000.0];

fn rpc_label_names() -> Vec<&'static str> {
    RPC_LABEL_NAMES.to_vec()
}

pub fn rpc_duration_definition() -> MetricDefinition {
    MetricDefinition::new(
        RPC_DURATION_SECONDS,
        "RPC call duration in seconds",
        MetricKind::Histogram,
        rpc_label_names(),
    )
    .with_buckets(DURATION_BUCKETS)
}

pub fn request_size_definition() -> MetricDefinition {
    MetricDefinition::new(
        RPC_REQUEST_SIZE_BYTES,
        "RPC request size in bytes",
        MetricKind::Histogram,
        rpc_label_names(),
    )
    .with_buckets(SIZE_BUCKETS)
}

pub fn response_size_definition() -> MetricDefinition {
    MetricDefinition::new(
        RPC_RESPONSE_SIZE_BYTES,
        "RPC response size in bytes",
        MetricKind::Histogram,
        rpc_label_names(),
    )
    .with_buckets(SIZE_BUCKETS)
}

pub fn rpc_calls_definition() -> MetricDefinition {
    MetricDefinition::new(
        RPC_CALLS_TOTAL,
        "Total number of RPC calls",
        MetricKind::Counter,
        rpc_label_names(),
    )
}

pub fn failed_calls_definition() -> MetricDefinition {
    let mut label_names = rpc_label_names();
    label_names.push(ERROR_TYPE_LABEL);
    MetricDefinition::new(
        RPC_FAILED_CALLS_TOTAL,
        "Total number of failed RPC calls",
        MetricKind::Counter,
        label_names,
    )
}

/// The five RPC metric families of one client, plus the static labels
/// identifying it. Built once and shared.
pub struct Metrics {
    enabled: bool,
    cell_id: Option<String>,
    topology_service_address: Option<String>,
    rpc_duration: Arc<dyn HistogramMetric>,
    request_size: Arc<dyn HistogramMetric>,
    response_size: Arc<dyn HistogramMetric>,
    rpc_calls_total: Arc<dyn CounterMetric>,
    failed_calls_total: Arc<dyn CounterMetric>,
}

impl fmt::Debug for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Metrics")
            .field("enabled", &self.enabled)
            .field("cell_id", &self.cell_id)
            .field("topology_service_address", &self.topology_service_address)
            .finish()
    }
}

impl Metrics {
    pub fn new(
        backend: &dyn MetricsBackend,
        cell_id: Option<String>,
        topology_service_address: Option<String>,
    ) -> Result<Self> {
        Ok(Self {
            enabled: backend.enabled(),
            cell_id,
            topology_service_address,
            rpc_duration: backend.histogram(&rpc_duration_definition())?,
            request_size: backend.histogram(&request_size_definition())?,
            response_size: backend.histogram(&response_size_definition())?,
            rpc_calls_total: backend.counter(&rpc_calls_definition())?,
            failed_calls_total: backend.counter(&failed_calls_definition())?,
        })
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    pub fn build_labels(
        &self,
        service: Option<&str>,
        method: Option<&str>,
        status_code: Code,
    ) -> RpcLabels {
        RpcLabels::new(
            service,
            method,
            status_code,
            self.cell_id.as_deref(),
            self.topology_service_address.as_deref(),
        )
    }

    pub fn observe_rpc_duration(&self, labels: &RpcLabels, duration_seconds: f64) {
        guarded(RPC_DURATION_SECONDS, || {
            self.rpc_duration.observe(&labels.values(), duration_seconds)
        });
    }

    pub fn observe_request_size(&self, labels: &RpcLabels, size_bytes: usize) {
        guarded(RPC_REQUEST_SIZE_BYTES, || {
            self.request_size.observe(&labels.values(), size_bytes as f64)
        });
    }

    pub fn observe_response_size(&self, labels: &RpcLabels, size_bytes: usize) {
        guarded(RPC_RESPONSE_SIZE_BYTES, || {
            self.response_size.observe(&labels.values(), size_bytes as f64)
        });
    }

    pub fn increment_rpc_calls_total(&self, labels: &RpcLabels) {
        guarded(RPC_CALLS_TOTAL, || {
            self.rpc_calls_total.increment(&labels.values(), 1.0)
        });
    }

    pub fn increment_failed_calls_total(&self, labels: &RpcLabels, error_type: &str) {
        guarded(RPC_FAILED_CALLS_TOTAL, || {
            self.failed_calls_total
                .increment(&labels.values_with_error_type(error_type), 1.0)
        });
    }
}

// A broken metrics backend must never surface in the RPC path, whether it
// reports an error or panics.
fn guarded<F>(metric: &str, record: F)
where
    F: FnOnce() -> Result<()>,
{
    match panic::catch_unwind(AssertUnwindSafe(record)) {
        Ok(Ok(())) => {}
        Ok(Err(err)) => {
            logging::debug!("[RpcMetrics] Failed to record metric, metric {}, error {}", metric, err);
        }
        Err(payload) => {
            logging::debug!(
                "[RpcMetrics] Failed to record metric, metric {}, error {}",
                metric,
                utils::panic_message(payload.as_ref())
            );
        }
    }
}
