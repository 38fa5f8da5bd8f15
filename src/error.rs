//! # Error types used across the push dispatch seams.
//!
//! This module defines one error enum per collaborator boundary:
//!
//! - [`TaskError`] a push intent that fails construction-time validation.
//! - [`GenerateError`] the merge/encode step could not produce a payload.
//! - [`TransportError`] the asynchronous client push failed.
//! - [`SubmitError`] the keyed dispatcher rejected a submission.
//!
//! All types provide `as_label` for stable log/metric labels.
//! [`TransportError`] additionally reports channel state via `is_connected()`,
//! which decides whether a failed push is retried.

use std::time::Duration;

use thiserror::Error;

/// # Validation errors raised when building a [`PushTask`](crate::PushTask).
///
/// A producer that hands the core an inconsistent intent gets a loud, typed
/// rejection instead of a push keyed off arbitrary subscriber state.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TaskError {
    /// The intent carried no subscribers; there is nobody to push to.
    #[error("subscriber map is empty")]
    NoSubscribers,

    /// Subscribers on one intent disagree on the identity tuple that forms
    /// the pushing key.
    #[error("subscriber '{register_id}' does not match the representative identity tuple")]
    MixedSubscribers {
        /// The first subscriber found to deviate.
        register_id: String,
    },

    /// The fetch sequence range is inverted.
    #[error("fetch sequence range inverted: {start} > {end}")]
    InvalidFetchRange {
        /// Claimed range start.
        start: u64,
        /// Claimed range end.
        end: u64,
    },
}

impl TaskError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    pub fn as_label(&self) -> &'static str {
        match self {
            TaskError::NoSubscribers => "task_no_subscribers",
            TaskError::MixedSubscribers { .. } => "task_mixed_subscribers",
            TaskError::InvalidFetchRange { .. } => "task_invalid_fetch_range",
        }
    }
}

/// # Errors raised by the data generator seam.
///
/// Either step failing drops the task before anything is marked in flight.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum GenerateError {
    /// Merging the datum snapshot for the destination data center failed.
    #[error("failed to merge datum: {reason}")]
    Merge { reason: String },

    /// Encoding the merged datum into a wire payload failed.
    #[error("failed to encode push data: {reason}")]
    Encode { reason: String },
}

impl GenerateError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            GenerateError::Merge { .. } => "generate_merge",
            GenerateError::Encode { .. } => "generate_encode",
        }
    }
}

/// # Errors delivered by the transport callback.
///
/// The variant decides retry policy: anything still connected is retried up
/// to the budget, a disconnected channel is given up on silently (a later
/// intent re-establishes state).
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum TransportError {
    /// The remote did not answer within the exchange timeout.
    ///
    /// Reported distinctly from other failures: timeouts are the expected
    /// failure mode of a congested client.
    #[error("push invoke timed out after {timeout:?}")]
    Timeout { timeout: Duration },

    /// The push failed while the channel was still connected.
    #[error("push failed: {reason}")]
    Failed { reason: String },

    /// The channel to the client is gone.
    #[error("channel disconnected")]
    Disconnected,
}

impl TransportError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            TransportError::Timeout { .. } => "transport_timeout",
            TransportError::Failed { .. } => "transport_failed",
            TransportError::Disconnected => "transport_disconnected",
        }
    }

    /// Whether the channel was still connected when the failure surfaced.
    ///
    /// Connected failures are retried; disconnected ones are not.
    pub fn is_connected(&self) -> bool {
        !matches!(self, TransportError::Disconnected)
    }

    /// Whether this is the timeout variant (logged at expected-failure
    /// severity).
    pub fn is_timeout(&self) -> bool {
        matches!(self, TransportError::Timeout { .. })
    }
}

/// # Errors returned by the keyed dispatcher on submission.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitError {
    /// The lane queue for this pushing key is full.
    #[error("dispatch lane full")]
    Full,

    /// The dispatcher has shut down.
    #[error("dispatch lane closed")]
    Closed,
}

impl SubmitError {
    /// Returns a short stable label.
    pub fn as_label(&self) -> &'static str {
        match self {
            SubmitError::Full => "submit_full",
            SubmitError::Closed => "submit_closed",
        }
    }
}
