//! Actor identifiers and the messages exchanged between actors.

use std::fmt;
use std::sync::Arc;

use super::role::Role;

/// Numeric kind of a message.
pub type MessageTag = u64;

/// Delivered to every new actor; carries the id of its creator.
pub const MSG_HELLO: MessageTag = 0x0;

/// Asks the runtime to create a child actor with the attached role.
pub const MSG_SPAWN: MessageTag = 0x0605_7a6e;

/// Marks the receiving actor as terminating.
pub const MSG_GODIE: MessageTag = 0x60be_dead;

/// Whether `tag` belongs to the runtime rather than to role callbacks.
pub fn is_reserved_tag(tag: MessageTag) -> bool {
    tag == MSG_HELLO || tag == MSG_SPAWN || tag == MSG_GODIE
}

/// Identifier of an actor within one runtime.
///
/// Ids are assigned sequentially from zero and never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ActorId(pub usize);

impl ActorId {
    /// The actor created together with the system
    pub const ROOT: ActorId = ActorId(0);

    /// Slot of this actor in the registry
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A message addressed to an actor.
///
/// `S` is the private state type of the actors in a system and `P` the
/// application payload. The receiving callback takes ownership of the payload.
pub enum Message<S, P> {
    /// Greeting sent by the runtime to a freshly created actor
    Hello(ActorId),

    /// Request to create a child actor playing the given role
    Spawn(Arc<Role<S, P>>),

    /// Termination request; nothing sent after it is accepted
    GoDie,

    /// Application message dispatched through the actor's role
    User {
        /// Key of the role callback handling this message
        tag: MessageTag,
        /// Informational size of the payload in bytes
        payload_size: usize,
        /// The payload itself
        payload: P,
    },
}

impl<S, P> Message<S, P> {
    /// Build a user message, recording the in-memory size of `P`.
    ///
    /// `tag` must not be a reserved tag; sending such a message fails with
    /// [`SendError::ReservedTag`](crate::error::SendError::ReservedTag).
    pub fn user(tag: MessageTag, payload: P) -> Self {
        Self::User {
            tag,
            payload_size: std::mem::size_of::<P>(),
            payload,
        }
    }

    /// Tag of this message, including the reserved system tags.
    pub fn tag(&self) -> MessageTag {
        match self {
            Self::Hello(_) => MSG_HELLO,
            Self::Spawn(_) => MSG_SPAWN,
            Self::GoDie => MSG_GODIE,
            Self::User { tag, .. } => *tag,
        }
    }

    /// The reserved tag carried by a user message, if any
    pub(crate) fn misused_tag(&self) -> Option<MessageTag> {
        match self {
            Self::User { tag, .. } if is_reserved_tag(*tag) => Some(*tag),
            _ => None,
        }
    }

    /// Whether this is a termination request
    pub fn is_godie(&self) -> bool {
        matches!(self, Self::GoDie)
    }
}

impl<S, P> fmt::Debug for Message<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hello(creator) => f.debug_tuple("Hello").field(creator).finish(),
            Self::Spawn(role) => f.debug_tuple("Spawn").field(role).finish(),
            Self::GoDie => f.write_str("GoDie"),
            Self::User {
                tag, payload_size, ..
            } => f
                .debug_struct("User")
                .field("tag", tag)
                .field("payload_size", payload_size)
                .finish(),
        }
    }
}
