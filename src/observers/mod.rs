//! Observer plumbing: the trait, the fan-out set, and the built-in writer.

#[cfg(feature = "logging")]
mod log;
mod observer;
mod set;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use observer::Observer;
pub use set::ObserverSet;
