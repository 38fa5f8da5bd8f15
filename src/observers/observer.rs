//! # Event observer trait.
//!
//! Provides [`Observer`] the extension point for plugging logging and metrics
//! sinks into the push core.
//!
//! Each observer gets:
//! - **Dedicated worker task** (runs independently)
//! - **Bounded queue** (capacity via [`Observer::queue_capacity`])
//! - **Panic isolation** (panics caught, reported as `ObserverPanicked`)
//!
//! ## Rules
//! - Slow observers only affect themselves (queue overflow drops the event
//!   for that observer only and publishes `ObserverOverflow`)
//! - Panics are isolated; the push core keeps running
//! - Observers never block publishers or each other

use async_trait::async_trait;

use crate::events::PushEvent;

/// Event observer for push core observability.
///
/// Receives events through a dedicated worker task with a bounded queue.
///
/// ### Implementation requirements
/// - Use async I/O; slow processing only backs up this observer's queue
/// - Handle errors internally, do not panic
#[async_trait]
pub trait Observer: Send + Sync + 'static {
    /// Processes a single event.
    ///
    /// Called from the observer's worker task, sequentially, in FIFO order.
    async fn on_event(&self, event: &PushEvent);

    /// Returns the observer name for overflow and panic reporting.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }

    /// Returns the preferred queue capacity for this observer.
    fn queue_capacity(&self) -> usize {
        1024
    }
}
