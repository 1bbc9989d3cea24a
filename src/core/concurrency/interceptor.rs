use super::{ConcurrencyLimitPolicy, DistributedCounter};
use crate::base::{
    resource_exhausted, BidiStreamNext, BoxMessage, ClientInterceptor, ClientStreamNext, Message,
    Metadata, Requests, Responses, ServerStreamNext, UnaryNext,
};
use crate::{logging, Result};
use std::fmt;
use std::sync::Arc;

/// An admitted request's hold on a concurrency slot. The slot is handed back
/// exactly once, when the guard is dropped.
pub struct TrackedSlot {
    counter: Arc<DistributedCounter>,
    request_id: Option<String>,
}

impl TrackedSlot {
    pub fn new(counter: Arc<DistributedCounter>, request_id: String) -> Self {
        Self {
            counter,
            request_id: Some(request_id),
        }
    }

    pub fn request_id(&self) -> &str {
        self.request_id.as_deref().unwrap_or_default()
    }
}

impl fmt::Debug for TrackedSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TrackedSlot")
            .field("request_id", &self.request_id)
            .finish()
    }
}

impl Drop for TrackedSlot {
    fn drop(&mut self) {
        if let Some(request_id) = self.request_id.take() {
            self.counter.track_request_end(Some(&request_id));
        }
    }
}

/// A response stream that keeps its call's slot until the consumer is done
/// with it: the slot is released when the stream is exhausted, when it yields
/// its first error, or when it is dropped part way.
pub struct TrackedStream {
    inner: Option<Responses>,
    slot: Option<TrackedSlot>,
}

impl TrackedStream {
    pub fn new(inner: Responses, slot: TrackedSlot) -> Self {
        Self {
            inner: Some(inner),
            slot: Some(slot),
        }
    }

    fn finish(&mut self) {
        self.inner = None;
        self.slot = None;
    }
}

impl Iterator for TrackedStream {
    type Item = Result<BoxMessage>;

    fn next(&mut self) -> Option<Self::Item> {
        let inner = self.inner.as_mut()?;
        match inner.next() {
            Some(Ok(item)) => Some(Ok(item)),
            Some(Err(err)) => {
                if let Some(slot) = &self.slot {
                    logging::error!(
                        "[ConcurrencyLimit] Tracked stream failed, request_id {}, error {}",
                        slot.request_id(),
                        err
                    );
                }
                self.finish();
                Some(Err(err))
            }
            None => {
                self.finish();
                None
            }
        }
    }
}

/// A request sequence sharing its call's slot. The slot is released once the
/// call has returned and the sequence is exhausted or dropped, whichever
/// happens last.
struct TrackedRequests {
    inner: Requests,
    slot: Option<Arc<TrackedSlot>>,
}

impl Iterator for TrackedRequests {
    type Item = BoxMessage;

    fn next(&mut self) -> Option<Self::Item> {
        let request = self.inner.next();
        if request.is_none() {
            self.slot = None;
        }
        request
    }
}

/// Admits tracked RPCs against the fleet-wide concurrency limit.
///
/// Untracked methods pass straight through. Over the limit, a call is
/// rejected with `RESOURCE_EXHAUSTED` while enforcement is on, and only
/// logged otherwise.
pub struct ConcurrencyLimitInterceptor {
    counter: Arc<DistributedCounter>,
    policy: Arc<ConcurrencyLimitPolicy>,
}

impl ConcurrencyLimitInterceptor {
    pub const NAME: &'static str = "concurrency_limit";

    pub fn new(counter: Arc<DistributedCounter>, policy: Arc<ConcurrencyLimitPolicy>) -> Self {
        Self { counter, policy }
    }

    pub fn counter(&self) -> &Arc<DistributedCounter> {
        &self.counter
    }

    pub fn policy(&self) -> &Arc<ConcurrencyLimitPolicy> {
        &self.policy
    }

    /// `Ok(None)` means the call proceeds without holding a slot.
    fn admit(&self, method: &str) -> Result<Option<TrackedSlot>> {
        if method.is_empty() || !self.policy.is_tracked_rpc(method) {
            return Ok(None);
        }
        if let Some(request_id) = self.counter.track_request_start(Some(method)) {
            return Ok(Some(TrackedSlot::new(self.counter.clone(), request_id)));
        }
        if self.policy.enforce_mode_enabled() {
            return Err(resource_exhausted(method));
        }
        logging::warn!(
            "[ConcurrencyLimit] Concurrency limit would be exceeded, mode log_only, grpc_method {}, limit {}",
            method,
            self.policy.concurrency_limit()
        );
        Ok(None)
    }

    fn track_stream(slot: Option<TrackedSlot>, responses: Option<Responses>) -> Option<Responses> {
        match (slot, responses) {
            (Some(slot), Some(responses)) => Some(Box::new(TrackedStream::new(responses, slot))),
            // an absent sequence releases right here as the slot drops
            (_, responses) => responses,
        }
    }
}

impl fmt::Debug for ConcurrencyLimitInterceptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConcurrencyLimitInterceptor")
            .field("key", &self.counter.key())
            .field("policy", &self.policy)
            .finish()
    }
}

impl ClientInterceptor for ConcurrencyLimitInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn request_response(
        &self,
        _request: &dyn Message,
        method: &str,
        metadata: &mut Metadata,
        next: UnaryNext<'_>,
    ) -> Result<BoxMessage> {
        let _slot = self.admit(method)?;
        next(metadata)
    }

    fn client_streamer(
        &self,
        requests: Requests,
        method: &str,
        metadata: &mut Metadata,
        next: ClientStreamNext<'_>,
    ) -> Result<BoxMessage> {
        let slot = match self.admit(method)? {
            Some(slot) => Arc::new(slot),
            None => return next(metadata, requests),
        };
        // the transport may keep draining the sequence after it returns
        let requests: Requests = Box::new(TrackedRequests {
            inner: requests,
            slot: Some(slot.clone()),
        });
        let response = next(metadata, requests);
        drop(slot);
        response
    }

    fn server_streamer(
        &self,
        _request: &dyn Message,
        method: &str,
        metadata: &mut Metadata,
        next: ServerStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        let slot = self.admit(method)?;
        let responses = next(metadata)?;
        Ok(Self::track_stream(slot, responses))
    }

    fn bidi_streamer(
        &self,
        requests: Requests,
        method: &str,
        metadata: &mut Metadata,
        next: BidiStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        let slot = self.admit(method)?;
        let responses = next(metadata, requests)?;
        Ok(Self::track_stream(slot, responses))
    }
}
