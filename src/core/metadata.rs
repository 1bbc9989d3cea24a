use crate::base::{
    BidiStreamNext, BoxMessage, ClientInterceptor, ClientStreamNext, Message, Metadata, Requests,
    Responses, ServerStreamNext, UnaryNext,
};
use crate::Result;

/// Adds a fixed set of entries to every outbound call. Entries already set
/// by an earlier interceptor win.
#[derive(Debug, Default, Clone)]
pub struct MetadataInjectionInterceptor {
    metadata: Metadata,
}

impl MetadataInjectionInterceptor {
    pub const NAME: &'static str = "metadata";

    pub fn new(metadata: Metadata) -> Self {
        Self { metadata }
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    fn inject(&self, outbound: &mut Metadata) {
        for (key, value) in &self.metadata {
            outbound
                .entry(key.clone())
                .or_insert_with(|| value.clone());
        }
    }
}

impl ClientInterceptor for MetadataInjectionInterceptor {
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
