//! # pushvisor
//!
//! **Pushvisor** is the push dispatch core of a service-registry session
//! server.
//!
//! Upstream components produce a noisy stream of *push intents*: each names
//! a destination client, a data center, a snapshot of data entries, the
//! interested subscribers, and a monotonic fetch sequence range. The core
//! turns that stream into an orderly sequence of actual pushes.
//!
//! ## Features
//!
//! | Area              | Description                                                        | Key types / traits                       |
//! |-------------------|--------------------------------------------------------------------|------------------------------------------|
//! | **Coalescing**    | Debounce rapid intents; only the freshest snapshot per key wins.   | [`PushIntent`], [`PendingKey`]           |
//! | **Serialization** | At most one in-flight push per destination interest.               | [`PushingKey`]                           |
//! | **Freshness**     | Sequence-based filtering suppresses out-of-order deliveries.       | [`Subscriber`], [`PushTask`]             |
//! | **Retry**         | Bounded linear back-off on transient transport failures.           | [`RetryBackoff`], [`JitterPolicy`]       |
//! | **Recovery**      | Stuck pushes are evicted when their callback never arrives.        | [`PushConfig::stuck_threshold`]          |
//! | **Observability** | Typed events on a broadcast bus, fanned out to observers.          | [`PushEvent`], [`EventKind`], [`Observer`] |
//! | **Seams**         | Merge/encode and client RPC stay outside the core.                 | [`PushDataGenerator`], [`ClientTransport`] |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in [`LogWriter`] observer _(demo/reference only)_.
//!
//! ## Flow
//! ```text
//! producer ──► fire_push ──► pending buffer ──► watchdog ──► keyed dispatcher
//!                 (coalesce, debounce)       (100ms tick)   (serial per key)
//!                                                                │
//!                              callback ◄── transport ◄── merge + encode
//!                        (version advance | retry with back-off)
//! ```
//!
//! ```no_run
//! use std::collections::HashMap;
//! use std::net::SocketAddr;
//! use std::sync::Arc;
//!
//! use pushvisor::{
//!     AssembleType, ClientTransport, ClientVersion, Datum, GenerateError, PushConfig,
//!     PushDataGenerator, PushIntent, PushPayload, PushProcessor, Scope, Subscriber,
//!     TransportError,
//! };
//!
//! struct Generator;
//!
//! impl PushDataGenerator for Generator {
//!     fn merge_datum(
//!         &self,
//!         _subscriber: &Subscriber,
//!         data_center: &str,
//!         datum_map: &HashMap<String, Datum>,
//!     ) -> Result<Datum, GenerateError> {
//!         datum_map.get(data_center).cloned().ok_or(GenerateError::Merge {
//!             reason: format!("no datum for {data_center}"),
//!         })
//!     }
//!
//!     fn create_push_data(
//!         &self,
//!         merged: Datum,
//!         _subscriber_map: &HashMap<String, Subscriber>,
//!         push_version: u64,
//!     ) -> Result<PushPayload, GenerateError> {
//!         Ok(format!("{}@{push_version}", merged.data_info_id).into_bytes())
//!     }
//! }
//!
//! struct Rpc;
//!
//! #[async_trait::async_trait]
//! impl ClientTransport for Rpc {
//!     async fn push(&self, _payload: PushPayload, _addr: SocketAddr) -> Result<(), TransportError> {
//!         Ok(())
//!     }
//! }
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let processor = PushProcessor::spawn(
//!         PushConfig::default(),
//!         Arc::new(Generator),
//!         Arc::new(Rpc),
//!         Vec::new(),
//!     );
//!
//!     let subscriber = Subscriber::new(
//!         "reg-1",
//!         "svc.example",
//!         Scope::DataCenter,
//!         AssembleType::Sub,
//!         ClientVersion::V2,
//!         "10.0.0.1:9600".parse().unwrap(),
//!     );
//!     processor.fire_push(PushIntent {
//!         no_delay: false,
//!         push_version: 1,
//!         data_center: "dc-a".to_string(),
//!         addr: "10.0.0.1:12200".parse().unwrap(),
//!         subscriber_map: HashMap::from([("reg-1".to_string(), subscriber)]),
//!         datum_map: HashMap::from([("dc-a".to_string(), Datum::new("svc.example", "dc-a", 1))]),
//!         fetch_seq_start: 10,
//!         fetch_seq_end: 10,
//!     });
//!
//!     processor.shutdown().await;
//! }
//! ```
//!
//! ---

mod config;
mod core;
mod error;
mod events;
mod model;
mod observers;
mod policies;
mod remote;

// ---- Public re-exports ----

pub use config::PushConfig;
pub use self::core::PushProcessor;
pub use error::{GenerateError, SubmitError, TaskError, TransportError};
pub use events::{EventKind, PushEvent, Severity};
pub use model::{
    versions, AssembleType, ClientVersion, DataEntry, Datum, PendingKey, PushIntent, PushTask,
    PushingKey, ReceivedVersion, Scope, Subscriber, TaskId,
};
pub use observers::Observer;
pub use policies::{JitterPolicy, RetryBackoff};
pub use remote::{ClientTransport, PushDataGenerator, PushPayload};

// Optional: expose a simple built-in log observer (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use observers::LogWriter;
