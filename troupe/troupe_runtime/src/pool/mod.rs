//! Threads of an actor system.
//!
//! - The worker pool dispatching messages to role callbacks
//! - The signal watcher interrupting the system on request

pub mod thread;
pub(crate) mod watcher;

pub use thread::PoolStats;
