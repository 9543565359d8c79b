//! Roles: the callback tables actors are created with.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use super::message::{is_reserved_tag, ActorId, Message, MessageTag};
use super::system::SystemHandle;
use crate::error::SendError;

/// Callback bound to a user message tag.
///
/// Receives the actor context, the actor's private state, the informational
/// payload size and the payload.
pub type Callback<S, P> = Arc<dyn Fn(&Context<'_, S, P>, &mut Option<S>, usize, P) + Send + Sync>;

/// Callback run when an actor receives its HELLO message.
pub type HelloCallback<S, P> = Arc<dyn Fn(&Context<'_, S, P>, &mut Option<S>, ActorId) + Send + Sync>;

/// Table of message handlers.
///
/// Holds the optional HELLO handler and one callback per bound user tag.
/// Tags may be sparse.
pub struct Role<S, P> {
    hello: Option<HelloCallback<S, P>>,
    prompts: BTreeMap<MessageTag, Callback<S, P>>,
}

impl<S, P> Role<S, P> {
    /// Create a role with no handlers
    pub fn new() -> Self {
        Self {
            hello: None,
            prompts: BTreeMap::new(),
        }
    }

    /// Set the HELLO handler.
    pub fn on_hello<F>(mut self, f: F) -> Self
    where
        F: Fn(&Context<'_, S, P>, &mut Option<S>, ActorId) + Send + Sync + 'static,
    {
        self.hello = Some(Arc::new(f));
        self
    }

    /// Bind a callback to a user tag, replacing any earlier binding.
    ///
    /// # Panics
    ///
    /// Panics if `tag` is one of the reserved system tags.
    pub fn on<F>(mut self, tag: MessageTag, f: F) -> Self
    where
        F: Fn(&Context<'_, S, P>, &mut Option<S>, usize, P) + Send + Sync + 'static,
    {
        assert!(
            !is_reserved_tag(tag),
            "tag {:#x} is reserved for the runtime",
            tag
        );
        self.prompts.insert(tag, Arc::new(f));
        self
    }

    /// The HELLO handler, if any
    pub fn hello(&self) -> Option<&HelloCallback<S, P>> {
        self.hello.as_ref()
    }

    /// The callback bound to `tag`, if any
    pub fn prompt(&self, tag: MessageTag) -> Option<&Callback<S, P>> {
        self.prompts.get(&tag)
    }

    /// Number of bound user tags
    pub fn prompt_count(&self) -> usize {
        self.prompts.len()
    }
}

impl<S, P> Default for Role<S, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<S, P> fmt::Debug for Role<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Role")
            .field("hello", &self.hello.is_some())
            .field("tags", &self.prompts.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// What a callback knows about the actor it runs for.
///
/// Passed explicitly into every callback so roles can learn their own id and
/// talk to the rest of the system.
pub struct Context<'a, S, P> {
    id: ActorId,
    system: &'a SystemHandle<S, P>,
}

impl<'a, S, P> Context<'a, S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    pub(crate) fn new(id: ActorId, system: &'a SystemHandle<S, P>) -> Self {
        Self { id, system }
    }

    /// Id of the actor this callback runs for
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Send a message to any actor.
    pub fn send(&self, to: ActorId, message: Message<S, P>) -> Result<(), SendError> {
        self.system.send(to, message)
    }

    /// Send a message to this actor.
    pub fn send_self(&self, message: Message<S, P>) -> Result<(), SendError> {
        self.system.send(self.id, message)
    }

    /// Ask the runtime to create a child actor playing `role`.
    pub fn spawn(&self, role: Arc<Role<S, P>>) -> Result<(), SendError> {
        self.send_self(Message::Spawn(role))
    }

    /// Request termination of this actor.
    pub fn die(&self) -> Result<(), SendError> {
        self.send_self(Message::GoDie)
    }

    /// Handle to the whole system
    pub fn system(&self) -> &SystemHandle<S, P> {
        self.system
    }
}
