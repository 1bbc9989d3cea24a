use crate::{logging, Error, Result};
use prometheus::{CounterVec, HistogramOpts, HistogramVec, Opts, Registry};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Histogram,
    Counter,
    Gauge,
    Summary,
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            MetricKind::Histogram => "histogram",
            MetricKind::Counter => "counter",
            MetricKind::Gauge => "gauge",
            MetricKind::Summary => "summary",
        };
        f.write_str(name)
    }
}

/// Everything a backend needs to build one metric family.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricDefinition {
    pub name: &'static str,
    pub help: &'static str,
    pub kind: MetricKind,
    pub label_names: Vec<&'static str>,
    pub buckets: Option<&'static [f64]>,
}

impl MetricDefinition {
    pub fn new(
        name: &'static str,
        help: &'static str,
        kind: MetricKind,
        label_names: Vec<&'static str>,
    ) -> Self {
        Self {
            name,
            help,
            kind,
            label_names,
            buckets: None,
        }
    }

    pub fn with_buckets(mut self, buckets: &'static [f64]) -> Self {
        self.buckets = Some(buckets);
        self
    }

    /// Fails unless the definition is of `kind`.
    pub fn expect_kind(&self, kind: MetricKind) -> Result<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(unsupported(self.kind))
        }
    }
}

pub(crate) fn unsupported(kind: MetricKind) -> Error {
    Error::msg(format!("Unsupported metric type: {}", kind))
}

pub trait HistogramMetric: Send + Sync {
    /// `label_values` follow the definition's `label_names` order.
    fn observe(&self, label_values: &[String], value: f64) -> Result<()>;
}

pub trait CounterMetric: Send + Sync {
    fn increment(&self, label_values: &[String], by: f64) -> Result<()>;
}

/// Where metric families come from. Building the same definition twice
/// returns the same family.
pub trait MetricsBackend: Send + Sync {
    /// `false` when recording is switched off process-wide; the backend then
    /// hands out no-op metrics.
    fn enabled(&self) -> bool;
    fn histogram(&self, definition: &MetricDefinition) -> Result<Arc<dyn HistogramMetric>>;
    fn counter(&self, definition: &MetricDefinition) -> Result<Arc<dyn CounterMetric>>;
}

/// Accepts every observation and keeps nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullMetric;

impl HistogramMetric for NullMetric {
    fn observe(&self, _: &[String], _: f64) -> Result<()> {
        Ok(())
    }
}

impl CounterMetric for NullMetric {
    fn increment(&self, _: &[String], _: f64) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct NullBackend;

impl MetricsBackend for NullBackend {
    fn enabled(&self) -> bool {
        false
    }

    fn histogram(&self, definition: &MetricDefinition) -> Result<Arc<dyn HistogramMetric>> {
        definition.expect_kind(MetricKind::Histogram)?;
        Ok(Arc::new(NullMetric))
    }

    fn counter(&self, definition: &MetricDefinition) -> Result<Arc<dyn CounterMetric>> {
        definition.expect_kind(MetricKind::Counter)?;
        Ok(Arc::new(NullMetric))
    }
}

fn as_strs(label_values: &[String]) -> Vec<&str> {
    label_values.iter().map(String::as_str).collect()
}

impl HistogramMetric for HistogramVec {
    fn observe(&self, label_values: &[String], value: f64) -> Result<()> {
        self.get_metric_with_label_values(&as_strs(label_values))?
            .observe(value);
        Ok(())
    }
}

impl CounterMetric for CounterVec {
    fn increment(&self, label_values: &[String], by: f64) -> Result<()> {
        self.get_metric_with_label_values(&as_strs(label_values))?
            .inc_by(by);
        Ok(())
    }
}

#[derive(Clone)]
enum Family {
    Histogram(HistogramVec),
    Counter(CounterVec),
}

/// Metric families registered in a Prometheus [`Registry`].
pub struct PrometheusBackend {
    registry: Registry,
    families: Mutex<HashMap<&'static str, Family>>,
}

impl fmt::Debug for PrometheusBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrometheusBackend").finish()
    }
}

impl Default for PrometheusBackend {
    fn default() -> Self {
        Self::new(prometheus::default_registry().clone())
    }
}

impl PrometheusBackend {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            families: Mutex::new(HashMap::new()),
        }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    fn family<F>(&self, definition: &MetricDefinition, build: F) -> Result<Family>
    where
        F: FnOnce(&MetricDefinition) -> Result<Family>,
    {
        let mut families = self
            .families
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if let Some(family) = families.get(definition.name) {
            return Ok(family.clone());
        }
        let family = build(definition)?;
        let collector: Box<dyn prometheus::core::Collector> = match &family {
            Family::Histogram(h) => Box::new(h.clone()),
            Family::Counter(c) => Box::new(c.clone()),
        };
        self.registry.register(collector)?;
        logging::debug!(
            "[RpcMetrics] Registered metric family, name {}, kind {}",
            definition.name,
            definition.kind
        );
        families.insert(definition.name, family.clone());
        Ok(family)
    }
}

impl MetricsBackend for PrometheusBackend {
    fn enabled(&self) -> bool {
        true
    }

    fn histogram(&self, definition: &MetricDefinition) -> Result<Arc<dyn HistogramMetric>> {
        definition.expect_kind(MetricKind::Histogram)?;
        let family = self.family(definition, |d| {
            let mut opts = HistogramOpts::new(d.name, d.help);
            if let Some(buckets) = d.buckets {
                opts = opts.buckets(buckets.to_vec());
            }
            Ok(Family::Histogram(HistogramVec::new(opts, &d.label_names)?))
        })?;
        match family {
            Family::Histogram(h) => Ok(Arc::new(h)),
            Family::Counter(_) => Err(Error::msg(format!(
                "metric {} is already registered as a counter",
                definition.name
            ))),
        }
    }

    fn counter(&self, definition: &MetricDefinition) -> Result<Arc<dyn CounterMetric>> {
        definition.expect_kind(MetricKind::Counter)?;
        let family = self.family(definition, |d| {
            Ok(Family::Counter(CounterVec::new(
                Opts::new(d.name, d.help),
                &d.label_names,
            )?))
        })?;
        match family {
            Family::Counter(c) => Ok(Arc::new(c)),
            Family::Histogram(_) => Err(Error::msg(format!(
                "metric {} is already registered as a histogram",
                definition.name
            ))),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn histogram_def() -> MetricDefinition {
        MetricDefinition::new("test_latency_seconds", "latency", MetricKind::Histogram, vec!["a", "b"])
            .with_buckets(&[0.1, 1.0])
    }

    #[test]
    fn unsupported_kinds() {
        let backend = PrometheusBackend::new(Registry::new());
        let gauge = MetricDefinition::new("test_gauge", "gauge", MetricKind::Gauge, vec![]);
        let err = backend.counter(&gauge).err().unwrap();
        assert_eq!(err.to_string(), "Unsupported metric type: gauge");
        let summary = MetricDefinition::new("test_summary", "summary", MetricKind::Summary, vec![]);
        assert_eq!(
            backend.histogram(&summary).err().unwrap().to_string(),
            "Unsupported metric type: summary"
        );
        assert!(NullBackend.counter(&gauge).is_err());
    }

    #[test]
    fn families_are_built_once() {
        let registry = Registry::new();
        let backend = PrometheusBackend::new(registry.clone());
        let first = backend.histogram(&histogram_def()).unwrap();
        let second = backend.histogram(&histogram_def()).unwrap();
        first.observe(&["x".into(), "y".into()], 0.05).unwrap();
        second.observe(&["x".into(), "y".into()], 0.5).unwrap();

        let families = registry.gather();
        assert_eq!(families.len(), 1);
        let histogram = families[0].get_metric()[0].get_histogram();
        assert_eq!(histogram.get_sample_count(), 2);
        assert_eq!(histogram.get_bucket()[0].get_cumulative_count(), 1);
    }

    #[test]
    fn label_mismatch_is_an_error() {
        let backend = PrometheusBackend::new(Registry::new());
        let counter = backend
            .counter(&MetricDefinition::new("test_total", "calls", MetricKind::Counter, vec!["a"]))
            .unwrap();
        assert!(counter.increment(&["x".into(), "y".into()], 1.0).is_err());
        assert!(counter.increment(&["x".into()], 1.0).is_ok());
    }

    #[test]
    fn null_backend() {
        let backend = NullBackend;
        assert!(!backend.enabled());
        let histogram = backend.histogram(&histogram_def()).unwrap();
        assert!(histogram.observe(&[], 1.0).is_ok());
    }
}
