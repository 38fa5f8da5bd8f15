//! # Collaborator seams: payload generation and client transport.
//!
//! The core does not merge snapshots, encode wire payloads, or talk to
//! clients itself. Those concerns live behind two traits the embedding
//! session server implements:
//!
//! - [`PushDataGenerator`] turns a task's datum map into an opaque payload.
//!   Pure and side-effect-free; safe to call from any dispatcher worker.
//! - [`ClientTransport`] delivers a payload to a client address. The future
//!   resolving is the push callback: `Ok` finalizes the push, `Err` carries
//!   the failure class and channel state that drive the retry policy.

use std::collections::HashMap;
use std::net::SocketAddr;

use async_trait::async_trait;

use crate::error::{GenerateError, TransportError};
use crate::model::{Datum, Subscriber};

/// Opaque wire payload handed to the transport.
pub type PushPayload = Vec<u8>;

/// Merge and encode seam.
///
/// Implementations must be pure: the dispatcher may call them from several
/// workers at once and drops the result on any error.
pub trait PushDataGenerator: Send + Sync + 'static {
    /// Merges the datum snapshot for `data_center` on behalf of the
    /// representative subscriber.
    fn merge_datum(
        &self,
        subscriber: &Subscriber,
        data_center: &str,
        datum_map: &HashMap<String, Datum>,
    ) -> Result<Datum, GenerateError>;

    /// Encodes a merged datum into the wire payload for the subscribers on
    /// the connection.
    fn create_push_data(
        &self,
        merged: Datum,
        subscriber_map: &HashMap<String, Subscriber>,
        push_version: u64,
    ) -> Result<PushPayload, GenerateError>;
}

/// Asynchronous client push seam.
///
/// The returned future completes when the remote acknowledges or the
/// exchange fails; the core awaits it off the dispatcher workers, so an
/// implementation may take the full exchange timeout without stalling other
/// destinations.
#[async_trait]
pub trait ClientTransport: Send + Sync + 'static {
    /// Pushes a payload to `addr`.
    ///
    /// The error variant must reflect channel state accurately:
    /// [`TransportError::Disconnected`] suppresses retries, everything else
    /// is retried up to the budget.
    async fn push(&self, payload: PushPayload, addr: SocketAddr) -> Result<(), TransportError>;
}
