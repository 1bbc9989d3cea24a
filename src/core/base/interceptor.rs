use super::{BoxMessage, Message};
use crate::Result;
use std::collections::BTreeMap;

/// Outbound call metadata, keyed by lower-case header name.
pub type Metadata = BTreeMap<String, String>;

/// A lazily produced sequence of outbound requests.
pub type Requests = Box<dyn Iterator<Item = BoxMessage> + Send>;

/// A lazily consumed sequence of responses. An `Err` item terminates the stream.
pub type Responses = Box<dyn Iterator<Item = Result<BoxMessage>> + Send>;

// The continuation of the chain for each call shape. Invoking it runs the
// remaining interceptors and finally the transport.
pub type UnaryNext<'a> = Box<dyn FnOnce(&mut Metadata) -> Result<BoxMessage> + 'a>;
pub type ClientStreamNext<'a> =
    Box<dyn FnOnce(&mut Metadata, Requests) -> Result<BoxMessage> + 'a>;
pub type ServerStreamNext<'a> =
    Box<dyn FnOnce(&mut Metadata) -> Result<Option<Responses>> + 'a>;
pub type BidiStreamNext<'a> =
    Box<dyn FnOnce(&mut Metadata, Requests) -> Result<Option<Responses>> + 'a>;

/// A hook around every outbound call, one method per call shape.
///
/// Each method must either invoke `next` exactly once and return what it
/// yields (possibly wrapped), or return an error without invoking it.
/// The default implementations pass straight through.
///
/// A streaming call resolving to `Ok(None)` is a call whose response
/// sequence is absent, which interceptors must hand back as-is.
pub trait ClientInterceptor: Send + Sync {
    /// Stable identifier, used to inspect chain ordering.
    fn name(&self) -> &'static str;

    fn request_response(
        &self,
        _request: &dyn Message,
        _method: &str,
        metadata: &mut Metadata,
        next: UnaryNext<'_>,
    ) -> Result<BoxMessage> {
        next(metadata)
    }

    fn client_streamer(
        &self,
        requests: Requests,
        _method: &str,
        metadata: &mut Metadata,
        next: ClientStreamNext<'_>,
    ) -> Result<BoxMessage> {
        next(metadata, requests)
    }

    fn server_streamer(
        &self,
        _request: &dyn Message,
        _method: &str,
        metadata: &mut Metadata,
        next: ServerStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        next(metadata)
    }

    fn bidi_streamer(
        &self,
        requests: Requests,
        _method: &str,
        metadata: &mut Metadata,
        next: BidiStreamNext<'_>,
    ) -> Result<Option<Responses>> {
        next(metadata, requests)
    }
}
