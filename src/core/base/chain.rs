use super::{
    BidiStreamNext, BoxMessage, ClientInterceptor, ClientStreamNext, Message, Metadata, Requests,
    Responses, ServerStreamNext, UnaryNext, INTERCEPTOR_INIT,
};
use crate::Result;
use std::fmt;
use std::sync::Arc;

type InterceptorPtr = Arc<dyn ClientInterceptor>;

/// InterceptorChain holds the interceptors attached to an outbound stub.
/// The first interceptor is the outermost one: it sees the call first and
/// the outcome last.
#[derive(Clone)]
pub struct InterceptorChain {
    interceptors: Vec<InterceptorPtr>,
}

impl Default for InterceptorChain {
    fn default() -> Self {
        Self {
            interceptors: Vec::with_capacity(INTERCEPTOR_INIT),
        }
    }
}

impl fmt::Debug for InterceptorChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(self.names()).finish()
    }
}

impl InterceptorChain {
    pub fn new() -> Self {
        Default::default()
    }

    /// Appends an interceptor, innermost so far.
    pub fn push(&mut self, interceptor: InterceptorPtr) {
        self.interceptors.push(interceptor);
    }

    pub fn interceptors(&self) -> &[InterceptorPtr] {
        &self.interceptors
    }

    pub fn names(&self) -> Vec<&'static str> {
        self.interceptors.iter().map(|i| i.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.interceptors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.interceptors.is_empty()
    }

    pub fn request_response<'a>(
        &'a self,
        request: &'a dyn Message,
        method: &'a str,
        metadata: &mut Metadata,
        terminal: UnaryNext<'a>,
    ) -> Result<BoxMessage> {
        unary(&self.interceptors, request, method, metadata, terminal)
    }

    pub fn client_streamer<'a>(
        &'a self,
        requests: Requests,
        method: &'a str,
        metadata: &mut Metadata,
        terminal: ClientStreamNext<'a>,
    ) -> Result<BoxMessage> {
        client_streaming(&self.interceptors, requests, method, metadata, terminal)
    }

    pub fn server_streamer<'a>(
        &'a self,
        request: &'a dyn Message,
        method: &'a str,
        metadata: &mut Metadata,
        terminal: ServerStreamNext<'a>,
    ) -> Result<Option<Responses>> {
        server_streaming(&self.interceptors, request, method, metadata, terminal)
    }

    pub fn bidi_streamer<'a>(
        &'a self,
        requests: Requests,
        method: &'a str,
        metadata: &mut Metadata,
        terminal: BidiStreamNext<'a>,
    ) -> Result<Option<Responses>> {
        bidi_streaming(&self.interceptors, requests, method, metadata, terminal)
    }
}

fn unary<'a>(
    interceptors: &'a [InterceptorPtr],
    request: &'a dyn Message,
    method: &'a str,
    metadata: &mut Metadata,
    terminal: UnaryNext<'a>,
) -> Result<BoxMessage> {
    match interceptors.split_first() {
        None => terminal(metadata),
        Some((head, rest)) => head.request_response(
            request,
            method,
            metadata,
            Box::new(move |metadata: &mut Metadata| {
                unary(rest, request, method, metadata, terminal)
            }),
        ),
    }
}

fn client_streaming<'a>(
    interceptors: &'a [InterceptorPtr],
    requests: Requests,
    method: &'a str,
    metadata: &mut Metadata,
    terminal: ClientStreamNext<'a>,
) -> Result<BoxMessage> {
    match interceptors.split_first() {
        None => terminal(metadata, requests),
        Some((head, rest)) => head.client_streamer(
            requests,
            method,
            metadata,
            Box::new(move |metadata: &mut Metadata, requests: Requests| {
                client_streaming(rest, requests, method, metadata, terminal)
            }),
        ),
    }
}

fn server_streaming<'a>(
    interceptors: &'a [InterceptorPtr],
    request: &'a dyn Message,
    method: &'a str,
    metadata: &mut Metadata,
    terminal: ServerStreamNext<'a>,
) -> Result<Option<Responses>> {
    match interceptors.split_first() {
        None => terminal(metadata),
        Some((head, rest)) => head.server_streamer(
            request,
            method,
            metadata,
            Box::new(move |metadata: &mut Metadata| {
                server_streaming(rest, request, method, metadata, terminal)
            }),
        ),
    }
}

fn bidi_streaming<'a>(
    interceptors: &'a [InterceptorPtr],
    requests: Requests,
    method: &'a str,
    metadata: &mut Metadata,
    terminal: BidiStreamNext<'a>,
) -> Result<Option<Responses>> {
    match interceptors.split_first() {
        None => terminal(metadata, requests),
        Some((head, rest)) => head.bidi_streamer(
            requests,
            method,
            metadata,
            Box::new(move |metadata: &mut Metadata, requests: Requests| {
                bidi_streaming(rest, requests, method, metadata, terminal)
            }),
        ),
    }
}

#[cfg(test)]
pub(crate) mod test {
    use super::*;
    use std::sync::Mutex;

    /// Records when it is entered and left, and tags the metadata.
    pub(crate) struct Recorder {
        pub(crate) name: &'static str,
        pub(crate) events: Arc<Mutex<Vec<String>>>,
    }

    impl Recorder {
        fn record(&self, event: &str) {
            self.events
                .lock()
                .unwrap()
                .push(format!("{}:{}", self.name, event));
        }
    }

    impl ClientInterceptor for Recorder {
        fn name(&self) -> &'static str {
            self.name
        }

        fn request_response(
            &self,
            _request: &dyn Message,
            _method: &str,
            metadata: &mut Metadata,
            next: UnaryNext<'_>,
        ) -> Result<BoxMessage> {
            self.record("enter");
            metadata.insert(self.name.into(), "seen".into());
            let result = next(metadata);
            self.record("leave");
            result
        }

        fn client_streamer(
            &self,
            requests: Requests,
            _method: &str,
            metadata: &mut Metadata,
            next: ClientStreamNext<'_>,
        ) -> Result<BoxMessage> {
            self.record("enter");
            let result = next(metadata, requests);
            self.record("leave");
            result
        }
    }

    fn chain_of(names: &[&'static str], events: &Arc<Mutex<Vec<String>>>) -> InterceptorChain {
        let mut chain = InterceptorChain::new();
        for name in names {
            chain.push(Arc::new(Recorder {
                name: *name,
                events: events.clone(),
            }));
        }
        chain
    }

    #[test]
    fn unary_runs_first_to_last() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let chain = chain_of(&["outer", "inner"], &events);
        assert_eq!(chain.names(), vec!["outer", "inner"]);
        assert_eq!(chain.len(), 2);

        let request = String::from("req");
        let mut metadata = Metadata::new();
        let terminal_events = events.clone();
        let response = chain
            .request_response(
                &request,
                "/pkg.Service/Method",
                &mut metadata,
                Box::new(move |metadata: &mut Metadata| {
                    assert_eq!(metadata.len(), 2);
                    terminal_events.lock().unwrap().push("transport".into());
                    Ok(Box::new(String::from("resp")) as BoxMessage)
                }),
            )
            .unwrap();

        assert_eq!(
            crate::base::downcast_message::<String>(response.as_ref()).unwrap(),
            "resp"
        );
        assert_eq!(
            *events.lock().unwrap(),
            vec![
                "outer:enter",
                "inner:enter",
                "transport",
                "inner:leave",
                "outer:leave"
            ]
        );
    }

    #[test]
    fn empty_chain_calls_terminal() {
        let chain = InterceptorChain::new();
        assert!(chain.is_empty());
        let requests: Requests = Box::new(vec![Box::new(1u8.to_string()) as BoxMessage].into_iter());
        let mut metadata = Metadata::new();
        let response = chain
            .client_streamer(
                requests,
                "/pkg.Service/Upload",
                &mut metadata,
                Box::new(|_metadata: &mut Metadata, requests: Requests| {
                    Ok(Box::new(requests.count().to_string()) as BoxMessage)
                }),
            )
            .unwrap();
        assert_eq!(
            crate::base::downcast_message::<String>(response.as_ref()).unwrap(),
            "1"
        );
    }

    #[test]
    fn default_hooks_pass_through_streams() {
        struct Noop;
        impl ClientInterceptor for Noop {
            fn name(&self) -> &'static str {
                "noop"
            }
        }
        let mut chain = InterceptorChain::new();
        chain.push(Arc::new(Noop));
        let request = String::from("req");
        let mut metadata = Metadata::new();
        let responses = chain
            .server_streamer(
                &request,
                "/pkg.Service/Watch",
                &mut metadata,
                Box::new(|_metadata: &mut Metadata| Ok(None)),
            )
            .unwrap();
        assert!(responses.is_none());

        let requests: Requests = Box::new(std::iter::empty());
        let responses = chain
            .bidi_streamer(
                requests,
                "/pkg.Service/Chat",
                &mut metadata,
                Box::new(|_metadata: &mut Metadata, _requests: Requests| {
                    let items: Vec<Result<BoxMessage>> = vec![Ok(Box::new(String::from("a")) as BoxMessage)];
                    Ok(Some(Box::new(items.into_iter()) as Responses))
                }),
            )
            .unwrap()
            .unwrap();
        assert_eq!(responses.count(), 1);
    }
}
