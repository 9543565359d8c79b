#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

//! # Troupe Runtime
//!
//! A message-passing actor runtime on a fixed pool of OS threads.
//!
//! Actors are created with a [`Role`], a table of callbacks indexed by message
//! tag, and each owns a private mailbox and state. Workers take actors with
//! pending mail from a shared ready queue and run one message at a time, so
//! callbacks of one actor never overlap and see their messages in the order
//! they were sent.
//!
//! A system ends in one of two ways:
//!
//! - Natural termination: every actor received GODIE and drained its mailbox
//! - Interrupt: a configured signal or [`ActorSystem::interrupt`] stops the
//!   workers without draining mailboxes
//!
//! ```no_run
//! use std::sync::Arc;
//! use troupe_runtime::{ActorSystem, Message, Role, RuntimeConfig};
//!
//! const MSG_PING: u64 = 1;
//!
//! let role = Arc::new(Role::<(), u32>::new().on(MSG_PING, |ctx, _, _, n| {
//!     println!("ping {}", n);
//!     ctx.die().ok();
//! }));
//!
//! let system = ActorSystem::create(RuntimeConfig::default(), role)?;
//! system.send(system.root(), Message::user(MSG_PING, 7)).ok();
//! system.join();
//! # Ok::<(), troupe_runtime::RuntimeError>(())
//! ```

/// Actors, messages, roles and the system facade
pub mod actor;

/// Runtime configuration
pub mod config;

/// Error types
pub mod error;

/// Worker pool and signal watcher
pub mod pool;

/// Ready queue and scheduler status
pub mod scheduler;

// Re-export key types for easier access
pub use actor::{
    ActorId, ActorSystem, Context, MailboxPolicy, Message, MessageTag, Role, SystemHandle,
    MSG_GODIE, MSG_HELLO, MSG_SPAWN,
};
pub use config::RuntimeConfig;
pub use error::{Result, RuntimeError, SendError};
pub use pool::PoolStats;
pub use scheduler::SchedulerStatus;
