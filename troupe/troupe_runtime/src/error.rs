//! Error types for the troupe runtime.
//!
//! Errors fall into two groups. Races the caller is expected to tolerate
//! (sending to a finished actor, a full mailbox, an interrupted system) are
//! returned as [`SendError`]. Programming bugs and resource failures the runtime
//! cannot recover from go through [`fatal`], which logs a diagnostic and aborts
//! the process.

use std::path::PathBuf;

use log::error;
use thiserror::Error;

use crate::actor::message::{ActorId, MessageTag};

/// Error returned when a message cannot be delivered.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendError {
    /// No actor with this id was ever registered
    #[error("no such actor: {0}")]
    NoSuchActor(ActorId),

    /// The actor already accepted a GODIE message and takes no more mail
    #[error("actor {0} is finished and accepts no more messages")]
    ActorFinished(ActorId),

    /// The actor's bounded mailbox is at capacity
    #[error("mailbox of actor {actor} is full (capacity {capacity})")]
    MailboxFull {
        /// Receiving actor
        actor: ActorId,
        /// Configured mailbox capacity
        capacity: usize,
    },

    /// A user message carried a tag reserved for the runtime
    #[error("message tag {0:#x} is reserved for the runtime")]
    ReservedTag(MessageTag),

    /// The system was interrupted and accepts no more messages
    #[error("actor system has been interrupted")]
    Interrupted,
}

/// Errors raised while creating, configuring or tearing down a runtime.
#[derive(Error, Debug)]
pub enum RuntimeError {
    /// The configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Registering the signal watcher failed
    #[error("failed to register signal handlers: {0}")]
    Signal(#[source] std::io::Error),

    /// The scheduling queue was destroyed while still holding actor ids
    #[error("scheduling queue destroyed with {0} pending entries")]
    QueueNotEmpty(usize),

    /// A configuration file could not be read
    #[error("failed to read configuration file {path}: {source}")]
    ConfigFile {
        /// Path that was being read
        path: PathBuf,
        /// Underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A configuration document could not be parsed
    #[error("failed to parse configuration: {0}")]
    ConfigParse(#[from] toml::de::Error),
}

/// Result type for runtime operations.
pub type Result<T> = std::result::Result<T, RuntimeError>;

/// Report an unrecoverable error and abort the process.
///
/// Used for configuration bugs (an unregistered message tag) and for broken
/// runtime invariants, where continuing would void every guarantee the
/// runtime makes.
pub(crate) fn fatal(what: std::fmt::Arguments<'_>) -> ! {
    error!("fatal: {}", what);
    eprintln!("troupe: fatal: {}", what);
    std::process::abort()
}
