//! Actors: identifiers, messages, roles, mailboxes and the registry.
//!
//! This module provides the actor model of the runtime:
//!
//! - Typed messages with reserved HELLO, SPAWN and GODIE kinds
//! - Roles mapping message tags to callbacks
//! - Per-actor mailboxes with a configurable capacity policy
//! - The registry and the system facade

pub mod mailbox;
pub mod message;
pub mod registry;
pub mod role;
pub mod system;

// Re-export key types from mailbox
pub use mailbox::{Mailbox, MailboxError, MailboxPolicy};

// Re-export key types from message
pub use message::{is_reserved_tag, ActorId, Message, MessageTag, MSG_GODIE, MSG_HELLO, MSG_SPAWN};

// Re-export key types from registry
pub use registry::{Actor, ActorCell, Completion, Registry};

// Re-export key types from role
pub use role::{Callback, Context, HelloCallback, Role};

// Re-export key types from system
pub use system::{ActorSystem, SystemHandle};
