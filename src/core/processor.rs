//! # PushProcessor: orchestrates the push dispatch pipeline.
//!
//! The [`PushProcessor`] owns the runtime components (pending buffer,
//! in-flight registry, watchdog, keyed dispatcher, event bus, observer
//! fan-out) and drives a push intent from `fire_push` to the transport
//! callback.
//!
//! ## Architecture
//! ```text
//! producer ──► fire_push ──► PendingBuffer (coalesce)
//!                                  │
//!                     watchdog (tick / wake-up, stop-push gate)
//!                                  │
//!                          KeyedDispatcher (serial per pushing key)
//!                                  │
//!                        execute: admit ─► merge/encode ─► install
//!                                  │
//!                        transport.push (spawned await)
//!                                  │
//!                  callback: version advance │ retry ─► PendingBuffer
//! ```
//!
//! ## Rules
//! - `fire_push` is non-blocking and never panics through; invalid intents
//!   are reported as `InvalidIntent` events and return `false`.
//! - The stop-push switch is consulted at watchdog entry and at dispatch
//!   entry; setting it stops new pushes while in-flight ones run out.
//! - At most one push is in flight per pushing key; freshness never
//!   regresses for a key (see [`PushCore::admit`]).
//! - Shutdown cancels the loops, joins them, and drains observer queues.

use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::config::PushConfig;
use crate::core::dispatcher::{spawn_workers, DispatchHandle};
use crate::core::{watchdog, Admission, InFlightEntry, InFlightTable, PendingBuffer};
use crate::error::TransportError;
use crate::events::{Bus, EventKind, PushEvent};
use crate::model::{versions, PushIntent, PushTask, PushingKey};
use crate::observers::{Observer, ObserverSet};
use crate::policies::RetryBackoff;
use crate::remote::{ClientTransport, PushDataGenerator};

/// Verdict of the freshness and stuck-push gate.
enum Verdict {
    /// The task may proceed to the transport.
    Cleared,
    /// The task is obsolete; drop it (already reported).
    Skip,
    /// A legitimate push is still awaiting its callback; retry later.
    Busy,
}

/// Shared state and algorithms of one processor.
///
/// Watchdog, dispatcher workers, and callback tasks all hold an `Arc` of
/// this; the processor facade is the only owner of the loop handles.
pub(crate) struct PushCore {
    pub(crate) cfg: PushConfig,
    pub(crate) pending: PendingBuffer,
    pub(crate) inflight: InFlightTable,
    pub(crate) bus: Bus,
    pub(crate) wake: Notify,
    pub(crate) dispatch: DispatchHandle,
    stop: AtomicBool,
    backoff: RetryBackoff,
    generator: Arc<dyn PushDataGenerator>,
    transport: Arc<dyn ClientTransport>,
}

impl PushCore {
    /// Whether the global stop-push switch is set.
    pub(crate) fn stop_push(&self) -> bool {
        self.stop.load(AtomicOrdering::Relaxed)
    }

    fn set_stop_push(&self, stop: bool) {
        self.stop.store(stop, AtomicOrdering::Relaxed);
    }

    /// Builds a task from a producer intent and offers it to the pending
    /// buffer. Validation failures are reported, never propagated.
    fn fire_intent(&self, intent: PushIntent) -> bool {
        match PushTask::build(intent, self.cfg.debounce) {
            Ok(task) => self.fire_task(task),
            Err(err) => {
                self.bus.publish(
                    PushEvent::now(EventKind::InvalidIntent)
                        .with_reason(err.as_label())
                        .with_error(err.to_string()),
                );
                false
            }
        }
    }

    /// Offers a task (fresh or retry) to the pending buffer.
    ///
    /// Returns `true` iff the task is now pending, as a new entry or as a
    /// replacement for an older one. A `no_delay` acceptance wakes the
    /// watchdog; the periodic tick covers the rest.
    fn fire_task(&self, task: PushTask) -> bool {
        let no_delay = task.no_delay;
        match self.pending.offer(task) {
            Admission::Fresh | Admission::Replaced => {
                if no_delay {
                    self.wake.notify_one();
                }
                true
            }
            Admission::Rejected {
                task,
                pending_seq_end,
            } => {
                self.bus.publish(
                    PushEvent::now(EventKind::ConflictPending)
                        .with_task(task.id)
                        .with_key(task.pending_key())
                        .with_error(format!(
                            "pending end {pending_seq_end} > incoming start {}",
                            task.fetch_seq_start
                        )),
                );
                false
            }
        }
    }

    /// Dispatch body, run serially per pushing key by the keyed workers.
    pub(crate) async fn execute(self: Arc<Self>, task: PushTask) {
        if self.stop_push() {
            return;
        }
        let key = task.pushing_key();
        match self.admit(&task, &key) {
            Verdict::Cleared => {}
            Verdict::Skip => return,
            Verdict::Busy => {
                self.retry(task, "waiting");
                return;
            }
        }

        let merged = match self
            .generator
            .merge_datum(&task.subscriber, &task.data_center, &task.datum_map)
        {
            Ok(merged) => merged,
            Err(err) => {
                self.report_generate_failure(&task, &key, err.as_label(), err.to_string());
                return;
            }
        };
        let payload = match self
            .generator
            .create_push_data(merged, &task.subscriber_map, task.push_version)
        {
            Ok(payload) => payload,
            Err(err) => {
                self.report_generate_failure(&task, &key, err.as_label(), err.to_string());
                return;
            }
        };

        let pushed_at = Instant::now();
        self.inflight.install(
            key.clone(),
            InFlightEntry {
                task_id: task.id,
                fetch_seq_start: task.fetch_seq_start,
                fetch_seq_end: task.fetch_seq_end,
                pushed_at,
            },
        );
        self.bus.publish(
            PushEvent::now(EventKind::Pushing)
                .with_task(task.id)
                .with_key(&key)
                .with_count(task.subscriber_map.len()),
        );

        let core = Arc::clone(&self);
        tokio::spawn(async move {
            let addr = task.subscriber.source_address;
            match core.transport.push(payload, addr).await {
                Ok(()) => core.on_success(task, key, pushed_at),
                Err(err) => core.on_failure(task, key, pushed_at, err),
            }
        });
    }

    /// Decides whether a task may proceed against the in-flight slot.
    ///
    /// - No prior in-flight: every subscriber must still want a snapshot
    ///   starting at `fetch_seq_start`; otherwise another path already
    ///   delivered past it and the task is skipped.
    /// - Prior present, task not strictly newer: skipped.
    /// - Prior present and stuck (no callback within twice the exchange
    ///   timeout): prior force-evicted, task proceeds.
    /// - Prior present inside its callback window: the task retries later.
    fn admit(&self, task: &PushTask, key: &PushingKey) -> Verdict {
        let Some(prev) = self.inflight.get(key) else {
            for sub in task.subscriber_map.values() {
                if !sub.check_version(&task.data_center, task.fetch_seq_start) {
                    self.bus.publish(
                        PushEvent::now(EventKind::StaleSkipped)
                            .with_task(task.id)
                            .with_key(key)
                            .with_error(format!("subscriber {}", sub.register_id)),
                    );
                    return Verdict::Skip;
                }
            }
            return Verdict::Cleared;
        };

        if !task.is_after(prev.fetch_seq_end) {
            self.bus.publish(
                PushEvent::now(EventKind::NotNewerSkipped)
                    .with_task(task.id)
                    .with_key(key)
                    .with_error(format!(
                        "in-flight {} ends at {}, incoming starts at {}",
                        prev.task_id, prev.fetch_seq_end, task.fetch_seq_start
                    )),
            );
            return Verdict::Skip;
        }

        let span = prev.pushed_at.elapsed();
        if span > self.cfg.stuck_threshold() {
            self.inflight.evict(key);
            self.bus.publish(
                PushEvent::now(EventKind::StuckEvicted)
                    .with_task(prev.task_id)
                    .with_key(key)
                    .with_span(span),
            );
            return Verdict::Cleared;
        }
        Verdict::Busy
    }

    /// Re-queues a task with back-off, up to the retry budget.
    ///
    /// The pending buffer's coalescing still applies: if a fresher intent
    /// arrived meanwhile, the retry loses the conflict and is dropped.
    fn retry(&self, mut task: PushTask, reason: &'static str) -> bool {
        task.retry_count += 1;
        let retry = task.retry_count;
        let id = task.id;

        if retry > self.cfg.retry_times {
            self.bus.publish(
                PushEvent::now(EventKind::RetryExhausted)
                    .with_task(id)
                    .with_reason(reason)
                    .with_retry(retry),
            );
            return false;
        }

        let delay = self.backoff.delay(retry);
        task.expire_after(delay);
        if self.fire_task(task) {
            self.bus.publish(
                PushEvent::now(EventKind::RetryScheduled)
                    .with_task(id)
                    .with_reason(reason)
                    .with_retry(retry)
                    .with_delay(delay),
            );
            true
        } else {
            false
        }
    }

    /// Success callback: advance every subscriber's acknowledged state,
    /// then release the in-flight slot.
    fn on_success(&self, task: PushTask, key: PushingKey, pushed_at: Instant) {
        let span = pushed_at.elapsed();
        let entry_versions = versions(&task.datum_map);
        for sub in task.subscriber_map.values() {
            let advanced = sub.check_and_update_version(
                &task.data_center,
                task.push_version,
                &entry_versions,
                task.fetch_seq_start,
                task.fetch_seq_end,
            );
            if !advanced {
                self.bus.publish(
                    PushEvent::now(EventKind::VersionSkipped)
                        .with_task(task.id)
                        .with_key(&key)
                        .with_error(format!("subscriber {}", sub.register_id)),
                );
            }
        }
        let cleaned = self.inflight.complete(&key, task.id);
        self.bus.publish(
            PushEvent::now(EventKind::PushSucceeded)
                .with_task(task.id)
                .with_key(&key)
                .with_span(span)
                .with_cleaned(cleaned),
        );
    }

    /// Failure callback: release the slot, then retry if the channel is
    /// still connected.
    fn on_failure(&self, task: PushTask, key: PushingKey, pushed_at: Instant, err: TransportError) {
        let span = pushed_at.elapsed();
        let cleaned = self.inflight.complete(&key, task.id);

        let kind = if err.is_timeout() {
            EventKind::PushTimeout
        } else {
            EventKind::PushFailed
        };
        self.bus.publish(
            PushEvent::now(kind)
                .with_task(task.id)
                .with_key(&key)
                .with_span(span)
                .with_cleaned(cleaned)
                .with_error(err.to_string()),
        );

        if err.is_connected() {
            self.retry(task, "callback_err");
        } else {
            self.bus.publish(
                PushEvent::now(EventKind::ChannelClosed)
                    .with_task(task.id)
                    .with_key(&key),
            );
        }
    }

    fn report_generate_failure(
        &self,
        task: &PushTask,
        key: &PushingKey,
        label: &'static str,
        error: String,
    ) {
        self.bus.publish(
            PushEvent::now(EventKind::PushFailed)
                .with_task(task.id)
                .with_key(key)
                .with_reason(label)
                .with_error(error),
        );
    }
}

/// Push dispatch processor.
///
/// Spawning one starts the watchdog, the dispatcher workers, and the
/// observer fan-out on the current tokio runtime. The processor is the
/// producer-facing surface of the crate:
///
/// ```no_run
/// use std::sync::Arc;
/// use pushvisor::{PushConfig, PushProcessor};
/// # use std::collections::HashMap;
/// # use std::net::SocketAddr;
/// # use pushvisor::{ClientTransport, Datum, GenerateError, PushDataGenerator,
/// #     PushPayload, Subscriber, TransportError};
/// # struct Gen;
/// # impl PushDataGenerator for Gen {
/// #     fn merge_datum(&self, _: &Subscriber, _: &str, _: &HashMap<String, Datum>)
/// #         -> Result<Datum, GenerateError> { unimplemented!() }
/// #     fn create_push_data(&self, _: Datum, _: &HashMap<String, Subscriber>, _: u64)
/// #         -> Result<PushPayload, GenerateError> { unimplemented!() }
/// # }
/// # struct Rpc;
/// # #[async_trait::async_trait]
/// # impl ClientTransport for Rpc {
/// #     async fn push(&self, _: PushPayload, _: SocketAddr)
/// #         -> Result<(), TransportError> { unimplemented!() }
/// # }
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let processor = PushProcessor::spawn(
///         PushConfig::default(),
///         Arc::new(Gen),
///         Arc::new(Rpc),
///         Vec::new(),
///     );
///
///     // producers call processor.fire_push(intent) from anywhere
///
///     processor.shutdown().await;
/// }
/// ```
pub struct PushProcessor {
    core: Arc<PushCore>,
    token: CancellationToken,
    watchdog: JoinHandle<()>,
    workers: Vec<JoinHandle<()>>,
    listener: JoinHandle<()>,
}

impl PushProcessor {
    /// Builds the processor and spawns its loops on the current runtime.
    pub fn spawn(
        cfg: PushConfig,
        generator: Arc<dyn PushDataGenerator>,
        transport: Arc<dyn ClientTransport>,
        observers: Vec<Arc<dyn Observer>>,
    ) -> Self {
        let token = CancellationToken::new();
        let bus = Bus::new(cfg.bus_capacity_clamped());

        // Listener first, so no early event is missed.
        let listener = Self::spawn_observer_listener(&bus, observers, &token);

        let (dispatch, receivers) =
            DispatchHandle::channels(cfg.workers_clamped(), cfg.queue_capacity_clamped());
        let core = Arc::new(PushCore {
            pending: PendingBuffer::new(),
            inflight: InFlightTable::new(),
            bus,
            wake: Notify::new(),
            dispatch,
            stop: AtomicBool::new(cfg.stop_push),
            backoff: cfg.retry_backoff(),
            generator,
            transport,
            cfg,
        });

        let workers = spawn_workers(&core, receivers, &token);
        let watchdog = tokio::spawn(watchdog::run(Arc::clone(&core), token.clone()));

        Self {
            core,
            token,
            watchdog,
            workers,
            listener,
        }
    }

    /// Fires a push intent into the core.
    ///
    /// Non-blocking and infallible from the caller's perspective: the intent
    /// is accepted (`true`) or reported-and-dropped (`false`). Coalescing may
    /// later replace it with a fresher intent for the same pending key.
    pub fn fire_push(&self, intent: PushIntent) -> bool {
        self.core.fire_intent(intent)
    }

    /// Subscribes to the event stream.
    pub fn events(&self) -> broadcast::Receiver<PushEvent> {
        self.core.bus.subscribe()
    }

    /// Sets the global stop-push switch.
    ///
    /// While set, the watchdog parks ready tasks and the dispatcher drops
    /// entries at execution; in-flight pushes run to completion.
    pub fn set_stop_push(&self, stop: bool) {
        self.core.set_stop_push(stop);
    }

    /// Whether the stop-push switch is currently set.
    pub fn stop_push(&self) -> bool {
        self.core.stop_push()
    }

    /// Number of tasks waiting in the pending buffer.
    pub fn pending_len(&self) -> usize {
        self.core.pending.len()
    }

    /// Number of pushes awaiting their transport callback.
    pub fn in_flight_len(&self) -> usize {
        self.core.inflight.len()
    }

    /// Stops the loops and drains observers.
    ///
    /// Pending tasks are discarded; in-flight callbacks that already left
    /// for the transport still finish on the runtime.
    pub async fn shutdown(self) {
        self.token.cancel();
        let _ = self.watchdog.await;
        for worker in self.workers {
            let _ = worker.await;
        }
        let _ = self.listener.await;
    }

    /// Forwards bus events to the observer fan-out until cancellation, then
    /// shuts the fan-out down.
    fn spawn_observer_listener(
        bus: &Bus,
        observers: Vec<Arc<dyn Observer>>,
        token: &CancellationToken,
    ) -> JoinHandle<()> {
        let mut rx = bus.subscribe();
        let set = ObserverSet::new(observers, bus.clone());
        let token = token.clone();

        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    msg = rx.recv() => match msg {
                        Ok(ev) => set.emit_arc(Arc::new(ev)),
                        Err(broadcast::error::RecvError::Closed) => break,
                        Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    }
                }
            }
            set.shutdown().await;
        })
    }
}
