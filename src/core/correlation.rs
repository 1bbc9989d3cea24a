//! Correlation ids tie an outbound RPC, its log lines and its concurrency
//! slot to the request that caused it. The id is scoped to the current thread.

use crate::base::{
    BidiStreamNext, BoxMessage, ClientInterceptor, ClientStreamNext, Message, Metadata, Requests,
    Responses, ServerStreamNext, UnaryNext,
};
use crate::Result;
use std::cell::RefCell;

/// Metadata key the correlation id travels under.
pub const CORRELATION_ID_KEY: &str = "x-gitlab-correlation-id";

std::thread_local! {
    static CURRENT: RefCell<Option<String>> = RefCell::new(None);
}

/// The correlation id active on this thread.
pub fn current() -> Option<String> {
    CURRENT.with(|c| c.borrow().clone())
}

/// Runs `f` with `id` as the active correlation id, restoring the previous
/// one afterwards, also when `f` panics.
pub fn with_correlation_id<R, F>(id: impl Into<String>, f: F) -> R
where
    F: FnOnce() -> R,
{
    struct Restore(Option<String>);
    impl Drop for Restore {
        fn drop(&mut self) {
            let previous = self.0.take();
            CURRENT.with(|c| *c.borrow_mut() = previous);
        }
    }

    let previous = CURRENT.with(|c| c.borrow_mut().replace(id.into()));
    let _restore = Restore(previous);
    f()
}

/// Propagates the active correlation id to the callee. Metadata already
/// carrying an id is left alone.
#[derive(Debug, Default, Clone, Copy)]
pub struct CorrelationInterceptor;

impl CorrelationInterceptor {
    pub const NAME: &'static str = "correlation";

    pub fn new() -> Self {
        Self
    }

    fn inject(&self, metadata: &mut Metadata) {
        if metadata.contains_key(CORRELATION_ID_KEY) {
            return;
        }
        if let Some(id) = current() {
            metadata.insert(CORRELATION_ID_KEY.to_owned(), id);
        }
    }
}

impl ClientInterceptor for CorrelationInterceptor {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn request_response(
        &self,
        _request: &dyn Message,
        _method: &str,
        metadata: &mut Metadata,
        next: UnaryNext<'_>,
    ) -> Result<BoxMessage> {
        self.inject(metadata);
        next(metadata)
    }

    fn client_streamer(
        &self,
        requests: Requests,
        _method: &str,
        metadata: &mut Metadata,
        next: ClientStreamNext<'_>,
    ) -> Result<BoxMessage> {
        self.inject(metadata);
        next(metadata, requests)
    }

    fn server_streamer(
        &self,
        _request: &dyn Message,
        _method: &str,
        metadata: &mut Metadata,
        next: ServerStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        self.inject(metadata);
        next(metadata)
    }

    fn bidi_streamer(
        &self,
        requests: Requests,
        _method: &str,
        metadata: &mut Metadata,
        next: BidiStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        self.inject(metadata);
        next(metadata, requests)
    }
}
