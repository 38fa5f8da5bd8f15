//! End-to-end scenarios for the push dispatch pipeline, run under paused
//! tokio time with a scripted transport.
//!
//! Timing constants mirror a small deployment: debounce 100ms, retry
//! back-off 50ms + 50ms, retry budget 2, exchange timeout 500ms (stuck
//! threshold 1s).

use std::collections::{HashMap, VecDeque};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::time::sleep;

use pushvisor::{
    AssembleType, ClientTransport, ClientVersion, Datum, EventKind, GenerateError, JitterPolicy,
    PushConfig, PushDataGenerator, PushIntent, PushPayload, PushProcessor, Scope, Subscriber,
    TransportError,
};

/// One scripted transport response.
#[derive(Clone, Copy)]
enum Reply {
    Ok,
    FailConnected,
    Timeout,
    Disconnected,
    /// Never complete; the callback for this push is lost.
    Hang,
}

#[derive(Clone)]
struct Call {
    payload: String,
    #[allow(dead_code)]
    addr: SocketAddr,
}

/// Transport double: records every push and answers from a script.
///
/// An exhausted script answers `Ok`.
struct ScriptedTransport {
    calls: Mutex<Vec<Call>>,
    script: Mutex<VecDeque<Reply>>,
}

impl ScriptedTransport {
    fn new(script: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            script: Mutex::new(script.into()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    /// Data versions seen by the client, in delivery order.
    fn seen_versions(&self) -> Vec<u64> {
        self.calls()
            .iter()
            .map(|c| {
                let field = c
                    .payload
                    .split('|')
                    .find(|part| part.starts_with('v'))
                    .expect("payload carries a version field");
                field[1..].parse().unwrap()
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl ClientTransport for ScriptedTransport {
    async fn push(&self, payload: PushPayload, addr: SocketAddr) -> Result<(), TransportError> {
        self.calls.lock().unwrap().push(Call {
            payload: String::from_utf8(payload).unwrap(),
            addr,
        });
        let reply = self.script.lock().unwrap().pop_front().unwrap_or(Reply::Ok);
        match reply {
            Reply::Ok => Ok(()),
            Reply::FailConnected => Err(TransportError::Failed {
                reason: "connection reset by peer".to_string(),
            }),
            Reply::Timeout => Err(TransportError::Timeout {
                timeout: Duration::from_millis(500),
            }),
            Reply::Disconnected => Err(TransportError::Disconnected),
            Reply::Hang => std::future::pending().await,
        }
    }
}

/// Generator double: encodes data center, merged version, and push version
/// into a parseable payload.
struct EncodingGenerator;

impl PushDataGenerator for EncodingGenerator {
    fn merge_datum(
        &self,
        _subscriber: &Subscriber,
        data_center: &str,
        datum_map: &HashMap<String, Datum>,
    ) -> Result<Datum, GenerateError> {
        datum_map
            .get(data_center)
            .cloned()
            .ok_or(GenerateError::Merge {
                reason: format!("no datum for {data_center}"),
            })
    }

    fn create_push_data(
        &self,
        merged: Datum,
        _subscriber_map: &HashMap<String, Subscriber>,
        push_version: u64,
    ) -> Result<PushPayload, GenerateError> {
        Ok(format!("{}|v{}|pv{}", merged.data_center, merged.version, push_version).into_bytes())
    }
}

fn test_config() -> PushConfig {
    PushConfig {
        dispatch_workers: 2,
        dispatch_queue_capacity: 64,
        debounce: Duration::from_millis(100),
        exchange_timeout: Duration::from_millis(500),
        retry_times: 2,
        retry_first_delay: Duration::from_millis(50),
        retry_increment_delay: Duration::from_millis(50),
        retry_jitter: JitterPolicy::None,
        bus_capacity: 256,
        stop_push: false,
    }
}

fn spawn_processor(script: Vec<Reply>) -> (PushProcessor, Arc<ScriptedTransport>) {
    let transport = ScriptedTransport::new(script);
    let processor = PushProcessor::spawn(
        test_config(),
        Arc::new(EncodingGenerator),
        Arc::clone(&transport) as Arc<dyn ClientTransport>,
        Vec::new(),
    );
    (processor, transport)
}

fn subscriber(register_id: &str) -> Subscriber {
    Subscriber::new(
        register_id,
        "svc.example",
        Scope::DataCenter,
        AssembleType::Sub,
        ClientVersion::V2,
        "10.0.0.1:9600".parse().unwrap(),
    )
}

/// Builds an intent for data center "A" whose datum version equals the fetch
/// sequence start, so delivered payloads expose the snapshot they carry.
fn intent(no_delay: bool, push_version: u64, subs: &[Subscriber], seq: (u64, u64)) -> PushIntent {
    PushIntent {
        no_delay,
        push_version,
        data_center: "A".to_string(),
        addr: "10.0.0.1:12200".parse().unwrap(),
        subscriber_map: subs
            .iter()
            .map(|s| (s.register_id.clone(), s.clone()))
            .collect(),
        datum_map: HashMap::from([("A".to_string(), Datum::new("svc.example", "A", seq.0))]),
        fetch_seq_start: seq.0,
        fetch_seq_end: seq.1,
    }
}

#[tokio::test(start_paused = true)]
async fn single_push_succeeds_and_advances_versions() {
    let (processor, transport) = spawn_processor(vec![Reply::Ok]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(250)).await;

    assert_eq!(transport.calls().len(), 1);
    let received = sub.received("A").expect("version advanced");
    assert_eq!(received.push_version, 1);
    assert_eq!(
        (received.fetch_seq_start, received.fetch_seq_end),
        (10, 10)
    );
    assert_eq!(processor.in_flight_len(), 0);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn burst_coalesces_to_one_push_with_the_freshest_snapshot() {
    let (processor, transport) = spawn_processor(vec![]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(5)).await;
    assert!(processor.fire_push(intent(false, 2, &[sub.clone()], (11, 11))));
    sleep(Duration::from_millis(5)).await;
    assert!(processor.fire_push(intent(false, 3, &[sub.clone()], (12, 12))));
    assert_eq!(processor.pending_len(), 1);

    sleep(Duration::from_millis(300)).await;

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(transport.seen_versions(), vec![12]);
    assert!(transport.calls()[0].payload.contains("pv3"));

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn overlapping_range_is_rejected_and_first_task_still_dispatches() {
    let (processor, transport) = spawn_processor(vec![]);
    let sub = subscriber("s1");
    let mut events = processor.events();

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    // Starts before the pending snapshot ends: not strictly newer.
    assert!(!processor.fire_push(intent(false, 2, &[sub.clone()], (9, 11))));

    sleep(Duration::from_millis(300)).await;

    assert_eq!(transport.seen_versions(), vec![10]);

    let mut saw_conflict = false;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::ConflictPending {
            saw_conflict = true;
        }
    }
    assert!(saw_conflict);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn no_delay_replacement_preempts_the_debounce_window() {
    let (processor, transport) = spawn_processor(vec![]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    assert!(processor.fire_push(intent(true, 2, &[sub.clone()], (11, 11))));

    // Well inside the 100ms debounce window: the wake-up must have fired.
    sleep(Duration::from_millis(20)).await;

    assert_eq!(transport.calls().len(), 1);
    assert_eq!(transport.seen_versions(), vec![11]);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn connected_failure_is_retried_and_then_succeeds() {
    let (processor, transport) = spawn_processor(vec![Reply::FailConnected, Reply::Ok]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(500)).await;

    assert_eq!(transport.calls().len(), 2);
    let received = sub.received("A").expect("second attempt advanced versions");
    assert_eq!(received.push_version, 1);
    assert_eq!(processor.in_flight_len(), 0);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn retry_budget_bounds_total_dispatches() {
    let (processor, transport) = spawn_processor(vec![
        Reply::FailConnected,
        Reply::FailConnected,
        Reply::FailConnected,
        Reply::FailConnected,
    ]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_secs(2)).await;

    // Initial dispatch plus retry_times = 2 retries, never more.
    assert_eq!(transport.calls().len(), 3);
    assert!(sub.received("A").is_none());
    assert_eq!(processor.pending_len(), 0);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn disconnected_failure_is_not_retried() {
    let (processor, transport) = spawn_processor(vec![Reply::Disconnected]);
    let sub = subscriber("s1");
    let mut events = processor.events();

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(600)).await;

    assert_eq!(transport.calls().len(), 1);
    assert!(sub.received("A").is_none());

    let mut saw_closed = false;
    while let Ok(ev) = events.try_recv() {
        assert_ne!(ev.kind, EventKind::RetryScheduled);
        if ev.kind == EventKind::ChannelClosed {
            saw_closed = true;
        }
    }
    assert!(saw_closed);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn timeout_is_reported_distinctly_and_retried() {
    let (processor, transport) = spawn_processor(vec![Reply::Timeout, Reply::Ok]);
    let sub = subscriber("s1");
    let mut events = processor.events();

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(500)).await;

    assert_eq!(transport.calls().len(), 2);
    assert!(sub.received("A").is_some());

    let mut saw_timeout = false;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::PushTimeout {
            saw_timeout = true;
        }
    }
    assert!(saw_timeout);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stuck_prior_is_evicted_and_newer_task_proceeds() {
    let (processor, transport) = spawn_processor(vec![Reply::Hang, Reply::Ok]);
    let sub = subscriber("s1");
    let mut events = processor.events();

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(150)).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(processor.in_flight_len(), 1);

    // Past twice the exchange timeout, measured from the transport handoff.
    sleep(Duration::from_millis(1050)).await;
    assert!(processor.fire_push(intent(true, 2, &[sub.clone()], (11, 11))));
    sleep(Duration::from_millis(50)).await;

    assert_eq!(transport.calls().len(), 2);
    assert_eq!(transport.seen_versions(), vec![10, 11]);
    let received = sub.received("A").unwrap();
    assert_eq!(received.push_version, 2);

    let mut saw_eviction = false;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::StuckEvicted {
            saw_eviction = true;
        }
    }
    assert!(saw_eviction);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn in_flight_prior_within_window_defers_the_newer_task() {
    let (processor, transport) = spawn_processor(vec![Reply::Hang, Reply::Ok]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(true, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(20)).await;
    assert_eq!(transport.calls().len(), 1);

    // The prior is hung but still inside its callback window; the newer task
    // is deferred as a waiting retry, not dispatched.
    assert!(processor.fire_push(intent(true, 2, &[sub.clone()], (11, 11))));
    sleep(Duration::from_millis(60)).await;
    assert_eq!(transport.calls().len(), 1);

    // Waiting retries consume the budget; once exhausted the deferred task
    // is dropped while the prior still occupies the slot.
    sleep(Duration::from_millis(500)).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(processor.pending_len(), 0);

    // A fresh intent after the stuck threshold evicts the hung prior.
    sleep(Duration::from_millis(600)).await;
    assert!(processor.fire_push(intent(true, 3, &[sub.clone()], (12, 12))));
    sleep(Duration::from_millis(50)).await;
    assert_eq!(transport.seen_versions(), vec![10, 12]);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn stop_push_blocks_dispatch_and_parks_tasks() {
    let (processor, transport) = spawn_processor(vec![]);
    let sub = subscriber("s1");

    processor.set_stop_push(true);
    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    assert!(processor.fire_push(intent(true, 2, &[sub.clone()], (11, 11))));

    sleep(Duration::from_millis(500)).await;
    assert!(transport.calls().is_empty());
    assert_eq!(processor.pending_len(), 1);

    // Clearing the switch releases the parked task.
    processor.set_stop_push(false);
    sleep(Duration::from_millis(200)).await;
    assert_eq!(transport.calls().len(), 1);
    assert_eq!(transport.seen_versions(), vec![11]);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn delivered_sequence_is_monotonic_per_pushing_key() {
    let (processor, transport) = spawn_processor(vec![]);
    let sub = subscriber("s1");

    assert!(processor.fire_push(intent(false, 1, &[sub.clone()], (10, 10))));
    sleep(Duration::from_millis(250)).await;
    assert!(processor.fire_push(intent(false, 2, &[sub.clone()], (12, 13))));
    sleep(Duration::from_millis(250)).await;

    // A late snapshot from before the last delivery: the subscriber already
    // acknowledged past it, so the freshness gate drops it.
    assert!(processor.fire_push(intent(false, 3, &[sub.clone()], (11, 11))));
    sleep(Duration::from_millis(250)).await;

    assert_eq!(transport.seen_versions(), vec![10, 12]);
    let seen = transport.seen_versions();
    let mut sorted = seen.clone();
    sorted.sort_unstable();
    assert_eq!(seen, sorted);

    processor.shutdown().await;
}

#[tokio::test(start_paused = true)]
async fn invalid_intent_is_reported_not_propagated() {
    let (processor, transport) = spawn_processor(vec![]);
    let mut events = processor.events();

    // Empty subscriber map.
    assert!(!processor.fire_push(PushIntent {
        no_delay: false,
        push_version: 1,
        data_center: "A".to_string(),
        addr: "10.0.0.1:12200".parse().unwrap(),
        subscriber_map: HashMap::new(),
        datum_map: HashMap::new(),
        fetch_seq_start: 1,
        fetch_seq_end: 1,
    }));

    sleep(Duration::from_millis(200)).await;
    assert!(transport.calls().is_empty());

    let mut saw_invalid = false;
    while let Ok(ev) = events.try_recv() {
        if ev.kind == EventKind::InvalidIntent {
            saw_invalid = true;
        }
    }
    assert!(saw_invalid);

    processor.shutdown().await;
}
