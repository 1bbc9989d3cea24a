use super::{BoxMessage, InterceptorChain, Message, Metadata, Requests, Responses};
use crate::Result;
use std::sync::Arc;

/// The network end of the chain: performs the real RPC for each call shape.
pub trait Transport: Send + Sync {
    fn request_response(
        &self,
        method: &str,
        request: &dyn Message,
        metadata: &Metadata,
    ) -> Result<BoxMessage>;

    fn client_streamer(
        &self,
        method: &str,
        requests: Requests,
        metadata: &Metadata,
    ) -> Result<BoxMessage>;

    fn server_streamer(
        &self,
        method: &str,
        request: &dyn Message,
        metadata: &Metadata,
    ) -> Result<Option<Responses>>;

    fn bidi_streamer(
        &self,
        method: &str,
        requests: Requests,
        metadata: &Metadata,
    ) -> Result<Option<Responses>>;
}

/// A client stub: every call runs through the interceptor chain before
/// reaching the transport.
#[derive(Clone)]
pub struct InterceptedClient {
    transport: Arc<dyn Transport>,
    chain: InterceptorChain,
}

impl InterceptedClient {
    pub fn new(transport: Arc<dyn Transport>, chain: InterceptorChain) -> Self {
        Self { transport, chain }
    }

    pub fn chain(&self) -> &InterceptorChain {
        &self.chain
    }

    pub fn request_response(
        &self,
        method: &str,
        request: &dyn Message,
        mut metadata: Metadata,
    ) -> Result<BoxMessage> {
        let transport = &self.transport;
        self.chain.request_response(
            request,
            method,
            &mut metadata,
            Box::new(move |metadata: &mut Metadata| {
                transport.request_response(method, request, metadata)
            }),
        )
    }

    pub fn client_streamer(
        &self,
        method: &str,
        requests: Requests,
        mut metadata: Metadata,
    ) -> Result<BoxMessage> {
        let transport = &self.transport;
        self.chain.client_streamer(
            requests,
            method,
            &mut metadata,
            Box::new(move |metadata: &mut Metadata, requests: Requests| {
                transport.client_streamer(method, requests, metadata)
            }),
        )
    }

    pub fn server_streamer(
        &self,
        method: &str,
        request: &dyn Message,
        mut metadata: Metadata,
    ) -> Result<Option<Responses>> {
        let transport = &self.transport;
        self.chain.server_streamer(
            request,
            method,
            &mut metadata,
            Box::new(move |metadata: &mut Metadata| {
                transport.server_streamer(method, request, metadata)
            }),
        )
    }

    pub fn bidi_streamer(
        &self,
        method: &str,
        requests: Requests,
        mut metadata: Metadata,
    ) -> Result<Option<Responses>> {
        let transport = &self.transport;
        self.chain.bidi_streamer(
            requests,
            method,
            &mut metadata,
            Box::new(move |metadata: &mut Metadata, requests: Requests| {
                transport.bidi_streamer(method, requests, metadata)
            }),
        )
    }
}
