use super::{classify_error, estimate_message_size, Metrics};
use crate::base::{
    status_of, BidiStreamNext, BoxMessage, ClientInterceptor, ClientStreamNext, Code, Message,
    Metadata, Requests, Responses, ServerStreamNext, UnaryNext, UNKNOWN,
};
use crate::utils::{Clock, MonotonicClock};
use crate::{Error, Result};
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Splits `/<service>/<method>`; anything else is `("unknown", "unknown")`.
pub fn extract_service_and_method(full_path: &str) -> (String, String) {
    let split = full_path
        .strip_prefix('/')
        .and_then(|path| path.split_once('/'))
        .filter(|(service, method)| {
            !service.is_empty() && !method.is_empty() && !method.contains('/')
        });
    match split {
        Some((service, method)) => (service.to_owned(), method.to_owned()),
        None => (UNKNOWN.to_owned(), UNKNOWN.to_owned()),
    }
}

/// One call being measured, from its start to its outcome.
struct CallRecord {
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
    service: Option<String>,
    method: Option<String>,
    start: f64,
}

impl CallRecord {
    fn start(metrics: &Arc<Metrics>, clock: &Arc<dyn Clock>, full_path: &str) -> Self {
        let start = clock.monotonic_time();
        let (service, method) = if metrics.enabled() {
            let (service, method) = extract_service_and_method(full_path);
            (Some(service), Some(method))
        } else {
            (None, None)
        };
        Self {
            metrics: metrics.clone(),
            clock: clock.clone(),
            service,
            method,
            start,
        }
    }

    fn elapsed(&self) -> f64 {
        self.clock.monotonic_time() - self.start
    }

    fn succeeded(self, request_bytes: usize, response_bytes: usize) {
        let duration = self.elapsed();
        let labels =
            self.metrics
                .build_labels(self.service.as_deref(), self.method.as_deref(), Code::Ok);
        self.metrics.increment_rpc_calls_total(&labels);
        self.metrics.observe_rpc_duration(&labels, duration);
        if request_bytes > 0 {
            self.metrics.observe_request_size(&labels, request_bytes);
        }
        if response_bytes > 0 {
            self.metrics.observe_response_size(&labels, response_bytes);
        }
    }

    fn failed(self, err: &Error) {
        let (code, error_type) = failure_of(err);
        self.ended_with(code, error_type);
    }

    fn ended_with(self, code: Code, error_type: &str) {
        let duration = self.elapsed();
        let labels =
            self.metrics
                .build_labels(self.service.as_deref(), self.method.as_deref(), code);
        self.metrics.increment_rpc_calls_total(&labels);
        self.metrics.increment_failed_calls_total(&labels, error_type);
        self.metrics.observe_rpc_duration(&labels, duration);
    }
}

fn failure_of(err: &Error) -> (Code, &'static str) {
    let code = status_of(err).map_or(Code::Unknown, |status| status.code());
    (code, classify_error(err))
}

type Outcome = std::result::Result<usize, (Code, &'static str)>;

/// A client-streaming call, recorded once the call has returned and the
/// request sequence is exhausted or dropped, whichever happens last.
struct PendingCall {
    call: Option<CallRecord>,
    request_bytes: Arc<AtomicUsize>,
    outcome: Mutex<Option<Outcome>>,
}

impl PendingCall {
    fn new(call: CallRecord, request_bytes: Arc<AtomicUsize>) -> Self {
        Self {
            call: Some(call),
            request_bytes,
            outcome: Mutex::new(None),
        }
    }

    fn resolve(&self, result: &Result<BoxMessage>) {
        let outcome = match result {
            Ok(response) => Ok(estimate_message_size(Some(response.as_ref()))),
            Err(err) => Err(failure_of(err)),
        };
        *self
            .outcome
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(outcome);
    }
}

impl Drop for PendingCall {
    fn drop(&mut self) {
        let outcome = self
            .outcome
            .get_mut()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .take();
        // a call that never resolved panicked inside the chain
        match (self.call.take(), outcome) {
            (Some(call), Some(Ok(response_bytes))) => {
                call.succeeded(self.request_bytes.load(Ordering::Relaxed), response_bytes)
            }
            (Some(call), Some(Err((code, error_type)))) => call.ended_with(code, error_type),
            _ => {}
        }
    }
}

/// Sums the estimated size of every request the transport pulls.
struct SizedRequests {
    inner: Requests,
    total: Arc<AtomicUsize>,
    pending: Option<Arc<PendingCall>>,
}

impl SizedRequests {
    fn wrap(
        inner: Requests,
        total: Arc<AtomicUsize>,
        pending: Option<Arc<PendingCall>>,
    ) -> Requests {
        Box::new(Self {
            inner,
            total,
            pending,
        })
    }
}

impl Iterator for SizedRequests {
    type Item = BoxMessage;

    fn next(&mut self) -> Option<Self::Item> {
        match self.inner.next() {
            Some(request) => {
                self.total
                    .fetch_add(estimate_message_size(Some(request.as_ref())), Ordering::Relaxed);
                Some(request)
            }
            None => {
                self.pending = None;
                None
            }
        }
    }
}

enum RequestBytes {
    Single(usize),
    Streamed(Arc<AtomicUsize>),
}

impl RequestBytes {
    fn get(&self) -> usize {
        match self {
            RequestBytes::Single(size) => *size,
            RequestBytes::Streamed(total) => total.load(Ordering::Relaxed),
        }
    }
}

/// Measures a response stream until the consumer is done with it. A stream
/// dropped before its end is recorded as cancelled.
pub struct MeteredStream {
    inner: Option<Responses>,
    call: Option<CallRecord>,
    request_bytes: RequestBytes,
    response_bytes: usize,
}

impl MeteredStream {
    fn new(inner: Responses, call: CallRecord, request_bytes: RequestBytes) -> Self {
        Self {
            inner: Some(inner),
            call: Some(call),
            request_bytes,
            response_bytes: 0,
        }
    }
}

impl Iterator for MeteredStream {
    type Item = Result<BoxMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        match inner.next() {
            Some(Ok(item)) => {
                self.response_bytes += estimate_message_size(Some(item.as_ref()));
                Some(Ok(item))
            }
            Some(Err(err)) => {
                self.inner = None;
                if let Some(call) = self.call.take() {
                    call.failed(&err);
                }
                Some(Err(err))
            }
            None => {
                self.inner = None;
                if let Some(call) = self.call.take() {
                    call.succeeded(self.request_bytes.get(), self.response_bytes);
                }
                None
            }
        }
    }
}

impl Drop for MeteredStream {
    fn drop(&mut self) {
        if let Some(call) = self.call.take() {
            call.ended_with(Code::Cancelled, "cancelled");
        }
    }
}

/// Records duration, payload sizes, calls and failures of every RPC.
pub struct MetricsInterceptor {
    metrics: Arc<Metrics>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for MetricsInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsInterceptor")
            .field("metrics", &self.metrics)
            .finish()
    }
}

impl MetricsInterceptor {
    pub const NAME: &'static str = "metrics";

    pub fn new(metrics: Arc<Metrics>) -> Self {
        Self {
            metrics,
            clock: Arc::new(MonotonicClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn metrics(&self) -> &Arc<Metrics> {
        &self.metrics
    }

    fn begin(&self, full_path: &str) -> CallRecord {
        CallRecord::start(&self.metrics, &self.clock, full_path)
    }

    fn finish_unary(
        call: CallRecord,
        request_bytes: usize,
        result: Result<BoxMessage>,
    ) -> Result<BoxMessage> {
        match result {
            Ok(response) => {
                call.succeeded(request_bytes, estimate_message_size(Some(response.as_ref())));
                Ok(response)
            }
            Err(err) => {
                call.failed(&err);
                Err(err)
            }
        }
    }

    fn finish_streaming(
        call: CallRecord,
        request_bytes: RequestBytes,
        result: Result<Option<Responses>>,
    ) -> Result<Option<Responses>> {
        match result {
            Ok(Some(responses)) => Ok(Some(Box::new(MeteredStream::new(
                responses,
                call,
                request_bytes,
            )))),
            Ok(None) => {
                call.succeeded(request_bytes.get(), 0);
                Ok(None)
            }
            Err(err) => {
                call.failed(&err);
                Err(err)
            }
        }
    }
}

impl ClientInterceptor for MetricsInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn request_response(
        &self,
        request: &dyn Message,
        method: &str,
        metadata: &mut Metadata,
        next: UnaryNext<'_>,
    ) -> Result<BoxMessage> {
        let call = self.begin(method);
        let request_bytes = estimate_message_size(Some(request));
        Self::finish_unary(call, request_bytes, next(metadata))
    }

    fn client_streamer(
        &self,
        requests: Requests,
        method: &str,
        metadata: &mut Metadata,
        next: ClientStreamNext<'_>,
    ) -> Result<BoxMessage> {
        let total = Arc::new(AtomicUsize::new(0));
        let pending = Arc::new(PendingCall::new(self.begin(method), total.clone()));
        let requests = SizedRequests::wrap(requests, total, Some(pending.clone()));
        let result = next(metadata, requests);
        pending.resolve(&result);
        drop(pending);
        result
    }

    fn server_streamer(
        &self,
        request: &dyn Message,
        method: &str,
        metadata: &mut Metadata,
        next: ServerStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        let call = self.begin(method);
        let request_bytes = RequestBytes::Single(estimate_message_size(Some(request)));
        Self::finish_streaming(call, request_bytes, next(metadata))
    }

    fn bidi_streamer(
        &self,
        requests: Requests,
        method: &str,
        metadata: &mut Metadata,
        next: BidiStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        let call = self.begin(method);
        let total = Arc::new(AtomicUsize::new(0));
        let requests = SizedRequests::wrap(requests, total.clone(), None);
        let result = next(metadata, requests);
        Self::finish_streaming(call, RequestBytes::Streamed(total), result)
    }
}
