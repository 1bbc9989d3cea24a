use crate::base::{InterceptedClient, InterceptorChain, Metadata, Transport};
use crate::concurrency::{ConcurrencyLimitInterceptor, ConcurrencyLimitPolicy, DistributedCounter};
use crate::correlation::CorrelationInterceptor;
use crate::metadata::MetadataInjectionInterceptor;
use crate::metrics::{Metrics, MetricsInterceptor};
use crate::utils::{Clock, MonotonicClock};
use std::sync::Arc;

/// The long-lived pieces every stub of a process shares.
#[derive(Debug, Clone)]
pub struct ClientComponents {
    counter: Arc<DistributedCounter>,
    policy: Arc<ConcurrencyLimitPolicy>,
    metrics: Arc<Metrics>,
    metadata: Metadata,
    clock: Arc<dyn Clock>,
}

impl ClientComponents {
    /// The policy reads the same settings as the counter.
    pub fn new(counter: Arc<DistributedCounter>, metrics: Arc<Metrics>) -> Self {
        let policy = Arc::new(ConcurrencyLimitPolicy::new(counter.settings().clone()));
        Self {
            counter,
            policy,
            metrics,
            metadata: Metadata::new(),
            clock: Arc::new(MonotonicClock),
        }
    }

    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn counter(&self) -> &Arc<DistributedCounter> {
        &self.counter
    }

    pub fn policy(&self) -> &Arc<ConcurrencyLimitPolicy> {
        &self.policy
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }
}

/// The interceptors attached to every stub, outermost first: correlation,
/// metadata, concurrency limit, and metrics when the backend is enabled.
pub fn build_interceptors(components: &ClientComponents) -> InterceptorChain {
    let mut chain = InterceptorChain::new();
    chain.push(Arc::new(CorrelationInterceptor::new()));
    chain.push(Arc::new(MetadataInjectionInterceptor::new(
        components.metadata.clone(),
    )));
    chain.push(Arc::new(ConcurrencyLimitInterceptor::new(
        components.counter.clone(),
        components.policy.clone(),
    )));
    if components.metrics.enabled() {
        chain.push(Arc::new(
            MetricsInterceptor::new(components.metrics.clone()).with_clock(components.clock.clone()),
        ));
    }
    chain
}

/// A stub over `transport` with the full interceptor chain.
pub fn build_client(transport: Arc<dyn Transport>, components: &ClientComponents) -> InterceptedClient {
    InterceptedClient::new(transport, build_interceptors(components))
}
