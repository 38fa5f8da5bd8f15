//! # Watchdog: the single cooperative drain loop.
//!
//! One task per processor wakes every [`TICK`] or on an explicit signal,
//! transfers ready tasks out of the pending buffer, and submits them to the
//! keyed dispatcher.
//!
//! ## Rules
//! - Wake-ups are coalesced: any number of `notify_one` calls between
//!   iterations produce one extra iteration.
//! - A set stop-push switch makes the iteration a no-op; tasks stay pending
//!   and dispatch resumes when the switch clears.
//! - Submission failures are reported and the task is dropped; the next
//!   intent for the same pending key recreates it.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::{self, Instant};
use tokio_util::sync::CancellationToken;

use crate::core::PushCore;
use crate::events::{EventKind, PushEvent};

/// Fixed wake interval of the watchdog loop.
pub(crate) const TICK: Duration = Duration::from_millis(100);

/// Runs the watchdog until cancellation.
pub(crate) async fn run(core: Arc<PushCore>, token: CancellationToken) {
    loop {
        tokio::select! {
            _ = token.cancelled() => break,
            _ = core.wake.notified() => {}
            _ = time::sleep(TICK) => {}
        }

        if core.stop_push() {
            continue;
        }

        let ready = core.pending.drain_ready(Instant::now());
        if ready.is_empty() {
            continue;
        }
        core.bus
            .publish(PushEvent::now(EventKind::PendingDrained).with_count(ready.len()));

        for task in ready {
            let id = task.id;
            let key = task.pending_key();
            if let Err(err) = core.dispatch.submit(task) {
                core.bus.publish(
                    PushEvent::now(EventKind::SubmitRejected)
                        .with_task(id)
                        .with_key(key)
                        .with_error(err.to_string()),
                );
            }
        }
    }
}
