//! # Keyed dispatcher: per-pushing-key serial execution.
//!
//! A fixed pool of worker tasks, each owning one bounded mpsc lane. A task
//! is routed to the lane selected by a stable hash of its [`PushingKey`], so
//! every task for one key lands on the same worker and executes serially,
//! while distinct keys run in parallel across lanes.
//!
//! ## Rules
//! - Submission is `try_send`: a full lane rejects instead of blocking the
//!   watchdog; the dropped task is recreated by the next producer intent.
//! - Workers await the execution body inline, which is what serializes a
//!   key. The body itself hands the payload to the transport and returns
//!   without waiting for the callback.
//! - Workers stop on cancellation or when all senders are gone.

use std::hash::{DefaultHasher, Hash, Hasher};
use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::core::PushCore;
use crate::error::SubmitError;
use crate::model::{PushTask, PushingKey};

/// Selects the lane for a pushing key.
pub(crate) fn lane_of(key: &PushingKey, lanes: usize) -> usize {
    let mut hasher = DefaultHasher::new();
    key.hash(&mut hasher);
    (hasher.finish() as usize) % lanes
}

/// Cloneable handle for submitting tasks to the worker lanes.
#[derive(Clone)]
pub(crate) struct DispatchHandle {
    lanes: Vec<mpsc::Sender<PushTask>>,
}

impl DispatchHandle {
    /// Creates the lanes and their receivers.
    ///
    /// The receivers are handed to [`spawn_workers`]; the handle routes by
    /// key hash from then on.
    pub fn channels(workers: usize, capacity: usize) -> (Self, Vec<mpsc::Receiver<PushTask>>) {
        let mut lanes = Vec::with_capacity(workers);
        let mut receivers = Vec::with_capacity(workers);
        for _ in 0..workers {
            let (tx, rx) = mpsc::channel(capacity);
            lanes.push(tx);
            receivers.push(rx);
        }
        (Self { lanes }, receivers)
    }

    /// Submits a task to the lane owning its pushing key.
    ///
    /// Does not block; a full or closed lane drops the task and reports why.
    pub fn submit(&self, task: PushTask) -> Result<(), SubmitError> {
        let lane = lane_of(&task.pushing_key(), self.lanes.len());
        self.lanes[lane].try_send(task).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => SubmitError::Full,
            mpsc::error::TrySendError::Closed(_) => SubmitError::Closed,
        })
    }
}

/// Spawns one worker per receiver; each drains its lane until cancellation.
pub(crate) fn spawn_workers(
    core: &Arc<PushCore>,
    receivers: Vec<mpsc::Receiver<PushTask>>,
    token: &CancellationToken,
) -> Vec<JoinHandle<()>> {
    receivers
        .into_iter()
        .map(|mut rx| {
            let core = Arc::clone(core);
            let token = token.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = token.cancelled() => break,
                        next = rx.recv() => match next {
                            Some(task) => Arc::clone(&core).execute(task).await,
                            None => break,
                        }
                    }
                }
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{AssembleType, ClientVersion, Scope};

    fn key(data_info_id: &str, port: u16) -> PushingKey {
        PushingKey {
            data_info_id: data_info_id.to_string(),
            addr: format!("10.0.0.1:{port}").parse().unwrap(),
            scope: Scope::DataCenter,
            assemble_type: AssembleType::Sub,
            client_version: ClientVersion::V2,
        }
    }

    #[test]
    fn lane_selection_is_stable() {
        let k = key("svc.example", 12200);
        let first = lane_of(&k, 8);
        for _ in 0..16 {
            assert_eq!(lane_of(&k, 8), first);
        }
    }

    #[test]
    fn lane_selection_stays_in_bounds() {
        for port in 12200..12300 {
            assert!(lane_of(&key("svc.example", port), 3) < 3);
        }
    }
}
