use prometheus::Registry;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use topology_interceptors::base::{
    downcast_message, status_of, BoxMessage, Code, InterceptedClient, Message, Metadata, Requests,
    Responses, Status, Transport,
};
use topology_interceptors::concurrency::{DistributedCounter, DynamicLimitSettings, MemoryStore};
use topology_interceptors::correlation::{self, CORRELATION_ID_KEY};
use topology_interceptors::metrics::{Metrics, PrometheusBackend, RPC_CALLS_TOTAL, RPC_FAILED_CALLS_TOTAL};
use topology_interceptors::utils::sleep_for_ms;
use topology_interceptors::{api, ClientComponents, Error, Result};

const BEGIN_UPDATE: &str = "/gitlab.cells.topology_service.claims.v1.ClaimService/BeginUpdate";
const GET_CELL: &str = "/gitlab.cells.topology_service.CellService/GetCell";

/// Answers every call, recording what it saw.
#[derive(Default)]
struct FakeTransport {
    delay_ms: u64,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    calls: AtomicUsize,
    seen: Mutex<Vec<Metadata>>,
    counter: Mutex<Option<Arc<DistributedCounter>>>,
    counts_during_call: Mutex<Vec<u64>>,
}

impl FakeTransport {
    fn enter(&self, metadata: &Metadata) {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.seen.lock().unwrap().push(metadata.clone());
        if let Some(counter) = self.counter.lock().unwrap().as_ref() {
            self.counts_during_call
                .lock()
                .unwrap()
                .push(counter.current_count());
        }
        if self.delay_ms > 0 {
            sleep_for_ms(self.delay_ms);
        }
    }

    fn leave(&self) {
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }

    fn stream_for(method: &str) -> Result<Option<Responses>> {
        if method.ends_with("/Nothing") || method.ends_with("/CommitUpdate") {
            return Ok(None);
        }
        let items: Vec<Result<BoxMessage>> = vec![
            Ok(Box::new(String::from("cell-1"))),
            Err(Error::new(Status::unavailable("stream reset"))),
        ];
        Ok(Some(Box::new(items.into_iter())))
    }
}

impl Transport for FakeTransport {
    fn request_response(
        &self,
        method: &str,
        _request: &dyn Message,
        metadata: &Metadata,
    ) -> Result<BoxMessage> {
        self.enter(metadata);
        self.leave();
        Ok(Box::new(format!("reply to {}", method)))
    }

    fn client_streamer(
        &self,
        _method: &str,
        requests: Requests,
        metadata: &Metadata,
    ) -> Result<BoxMessage> {
        self.enter(metadata);
        let count = requests.count();
        self.leave();
        Ok(Box::new(count.to_string()))
    }

    fn server_streamer(
        &self,
        method: &str,
        _request: &dyn Message,
        metadata: &Metadata,
    ) -> Result<Option<Responses>> {
        self.enter(metadata);
        self.leave();
        Self::stream_for(method)
    }

    fn bidi_streamer(
        &self,
        method: &str,
        _requests: Requests,
        metadata: &Metadata,
    ) -> Result<Option<Responses>> {
        self.enter(metadata);
        self.leave();
        Self::stream_for(method)
    }
}

struct Setup {
    transport: Arc<FakeTransport>,
    counter: Arc<DistributedCounter>,
    registry: Registry,
    client: InterceptedClient,
}

fn setup(limit: u64, enforce: bool, delay_ms: u64) -> Setup {
    let counter = Arc::new(DistributedCounter::new(
        Arc::new(MemoryStore::new()),
        Arc::new(DynamicLimitSettings::new(limit, enforce)),
    ));
    let registry = Registry::new();
    let metrics = Metrics::new(
        &PrometheusBackend::new(registry.clone()),
        Some("cell-1".into()),
        Some("topology.example:443".into()),
    )
    .unwrap();
    let mut metadata = Metadata::new();
    metadata.insert("x-cell-role".into(), "primary".into());
    let components = ClientComponents::new(counter.clone(), Arc::new(metrics)).with_metadata(metadata);

    let transport = Arc::new(FakeTransport {
        delay_ms,
        counter: Mutex::new(Some(counter.clone())),
        ..Default::default()
    });
    let client = api::build_client(transport.clone(), &components);
    Setup {
        transport,
        counter,
        registry,
        client,
    }
}

fn counter_value(registry: &Registry, name: &str) -> f64 {
    registry
        .gather()
        .iter()
        .filter(|family| family.get_name() == name)
        .flat_map(|family| family.get_metric().iter())
        .map(|metric| metric.get_counter().get_value())
        .sum()
}

#[test]
fn chain_order_from_default_init() {
    let components = api::init_default().unwrap();
    assert_eq!(
        api::build_interceptors(&components).names(),
        vec!["correlation", "metadata", "concurrency_limit", "metrics"]
    );
}

#[test]
fn unary_call_through_the_chain() {
    let s = setup(2, true, 0);
    let response = correlation::with_correlation_id("req-42", || {
        s.client
            .request_response(BEGIN_UPDATE, &String::from("claim"), Metadata::new())
            .unwrap()
    });
    assert_eq!(
        downcast_message::<String>(response.as_ref()).unwrap(),
        &format!("reply to {}", BEGIN_UPDATE)
    );

    let seen = s.transport.seen.lock().unwrap();
    assert_eq!(seen[0].get(CORRELATION_ID_KEY).map(String::as_str), Some("req-42"));
    assert_eq!(seen[0].get("x-cell-role").map(String::as_str), Some("primary"));
    assert_eq!(*s.transport.counts_during_call.lock().unwrap(), vec![1]);
    assert_eq!(s.counter.current_count(), 0);
    assert_eq!(counter_value(&s.registry, RPC_CALLS_TOTAL), 1.0);
}

#[test]
fn untracked_calls_are_not_counted() {
    let s = setup(0, true, 0);
    s.client
        .request_response(GET_CELL, &String::from("cell"), Metadata::new())
        .unwrap();
    assert_eq!(*s.transport.counts_during_call.lock().unwrap(), vec![0]);
}

#[test]
fn enforced_limit_across_threads() {
    let limit = 3;
    let s = Arc::new(setup(limit, true, 5));
    let rejected = Arc::new(AtomicUsize::new(0));
    let mut handlers = Vec::new();
    for _ in 0..12 {
        let s = s.clone();
        let rejected = rejected.clone();
        handlers.push(std::thread::spawn(move || {
            for _ in 0..5 {
                match s
                    .client
                    .request_response(BEGIN_UPDATE, &String::from("claim"), Metadata::new())
                {
                    Ok(_) => {}
                    Err(err) => {
                        assert_eq!(status_of(&err).unwrap().code(), Code::ResourceExhausted);
                        rejected.fetch_add(1, Ordering::SeqCst);
                    }
                }
                sleep_for_ms(rand::random::<u64>() % 3);
            }
        }));
    }
    for h in handlers {
        h.join().expect("Couldn't join on the associated thread");
    }

    assert!(s.transport.max_in_flight.load(Ordering::SeqCst) as u64 <= limit);
    let calls = s.transport.calls.load(Ordering::SeqCst);
    assert_eq!(calls + rejected.load(Ordering::SeqCst), 60);
    assert_eq!(s.counter.current_count(), 0);
    // rejected calls stop before the metrics interceptor
    assert_eq!(counter_value(&s.registry, RPC_CALLS_TOTAL), calls as f64);
    assert_eq!(counter_value(&s.registry, RPC_FAILED_CALLS_TOTAL), 0.0);
}

#[test]
fn log_only_limit_lets_everything_through() {
    let s = Arc::new(setup(1, false, 2));
    let mut handlers = Vec::new();
    for _ in 0..6 {
        let s = s.clone();
        handlers.push(std::thread::spawn(move || {
            s.client
                .request_response(BEGIN_UPDATE, &String::from("claim"), Metadata::new())
                .unwrap();
        }));
    }
    for h in handlers {
        h.join().unwrap();
    }
    assert_eq!(s.transport.calls.load(Ordering::SeqCst), 6);
    assert_eq!(s.counter.current_count(), 0);
}

#[test]
fn server_stream_holds_slot_until_drained() {
    let s = setup(2, true, 0);
    let mut stream = s
        .client
        .server_streamer(BEGIN_UPDATE, &String::from("watch"), Metadata::new())
        .unwrap()
        .unwrap();
    assert_eq!(s.counter.current_count(), 1);

    let first = stream.next().unwrap().unwrap();
    assert_eq!(downcast_message::<String>(first.as_ref()).unwrap(), "cell-1");
    assert_eq!(s.counter.current_count(), 1);

    let err = stream.next().unwrap().unwrap_err();
    let status = status_of(&err).unwrap();
    assert_eq!(status.code(), Code::Unavailable);
    assert_eq!(status.message(), "stream reset");
    assert_eq!(s.counter.current_count(), 0);
    assert!(stream.next().is_none());
    assert_eq!(counter_value(&s.registry, RPC_FAILED_CALLS_TOTAL), 1.0);
}

#[test]
fn absent_streams_release_their_slot() {
    let s = setup(1, true, 0);
    let commit = "/gitlab.cells.topology_service.claims.v1.ClaimService/CommitUpdate";
    assert!(s
        .client
        .server_streamer(commit, &(), Metadata::new())
        .unwrap()
        .is_none());
    assert_eq!(s.counter.current_count(), 0);

    let requests: Requests = Box::new(std::iter::empty());
    assert!(s
        .client
        .bidi_streamer(commit, requests, Metadata::new())
        .unwrap()
        .is_none());
    assert_eq!(s.counter.current_count(), 0);
}

#[test]
fn dropped_bidi_stream_releases_its_slot() {
    let s = setup(1, true, 0);
    let requests: Requests = Box::new(vec![Box::new(String::from("ping")) as BoxMessage].into_iter());
    let mut stream = s
        .client
        .bidi_streamer(BEGIN_UPDATE, requests, Metadata::new())
        .unwrap()
        .unwrap();
    assert!(stream.next().unwrap().is_ok());
    assert_eq!(s.counter.current_count(), 1);
    drop(stream);
    assert_eq!(s.counter.current_count(), 0);
}

#[test]
fn client_stream_through_the_chain() {
    let s = setup(1, true, 0);
    let requests: Requests = Box::new(
        vec![
            Box::new(String::from("a")) as BoxMessage,
            Box::new(String::from("b")) as BoxMessage,
        ]
        .into_iter(),
    );
    let response = s
        .client
        .client_streamer(BEGIN_UPDATE, requests, Metadata::new())
        .unwrap();
    assert_eq!(downcast_message::<String>(response.as_ref()).unwrap(), "2");
    assert_eq!(*s.transport.counts_during_call.lock().unwrap(), vec![1]);
    assert_eq!(s.counter.current_count(), 0);
}
