//! Domain model: data snapshots, subscribers, and push tasks.

mod datum;
mod subscriber;
mod task;

pub use datum::{versions, DataEntry, Datum};
pub use subscriber::{AssembleType, ClientVersion, ReceivedVersion, Scope, Subscriber};
pub use task::{PendingKey, PushIntent, PushTask, PushingKey, TaskId};
