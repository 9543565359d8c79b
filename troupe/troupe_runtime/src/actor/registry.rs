//! Registry of the actors living in one system.
//!
//! Two kinds of lock guard the runtime's data. The system lock
//! (`Mutex<RegistryState>`) covers only registry metadata: the actor table,
//! its capacity, the finished counter and the interrupted flag. Each actor's
//! mailbox, flags and state sit behind that actor's own `Mutex<ActorCell>`.
//!
//! Registry methods never return a system guard. [`Registry::lookup`] clones
//! the actor's `Arc` and drops the guard before returning, so a caller can
//! never hold the system lock while taking an actor lock.

use log::debug;
use parking_lot::{Mutex, MutexGuard};
use std::fmt;
use std::sync::Arc;

use super::mailbox::{Mailbox, MailboxError, MailboxPolicy};
use super::message::{ActorId, Message};
use super::role::Role;
use crate::error::{fatal, SendError};

/// What the actor needs after a callback completed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Completion {
    /// Mail is waiting; the actor must be scheduled again
    Reschedule,
    /// Nothing to do until the next message arrives
    Idle,
    /// The actor drained its mailbox after a GODIE; counted exactly once
    Finished,
}

/// Mutable part of an actor, guarded by the actor lock
pub struct ActorCell<S, P> {
    mailbox: Mailbox<Message<S, P>>,
    state: Option<S>,
    busy: bool,
    goodbye: bool,
    finished: bool,
    released: bool,
}

impl<S, P> ActorCell<S, P> {
    fn new(policy: MailboxPolicy) -> Self {
        Self {
            mailbox: Mailbox::new(policy),
            state: None,
            busy: false,
            goodbye: false,
            finished: false,
            released: false,
        }
    }

    /// Queue a message for this actor.
    ///
    /// Returns whether the actor must be pushed onto the scheduling queue,
    /// which is the case exactly when it goes from idle and empty to having
    /// work.
    pub(crate) fn accept(&mut self, id: ActorId, message: Message<S, P>) -> Result<bool, SendError> {
        if self.goodbye {
            return Err(SendError::ActorFinished(id));
        }
        // Teardown already ran; a sender that resolved the actor before the
        // interrupt must not leave mail behind
        if self.released {
            return Err(SendError::Interrupted);
        }

        let needs_enqueue = !self.busy && self.mailbox.is_empty();
        let is_godie = message.is_godie();

        self.mailbox.push(message).map_err(|e| match e {
            MailboxError::Full(capacity) => SendError::MailboxFull {
                actor: id,
                capacity,
            },
            MailboxError::Empty => fatal(format_args!("push into mailbox of {} reported empty", id)),
        })?;

        if is_godie {
            self.goodbye = true;
        }

        Ok(needs_enqueue)
    }

    /// Take the next message and the actor's state for one dispatch.
    ///
    /// The actor stays busy until [`ActorCell::end`] hands the state back.
    pub(crate) fn begin(&mut self, id: ActorId) -> (Message<S, P>, Option<S>) {
        if self.busy {
            fatal(format_args!("actor {} scheduled while already busy", id));
        }
        let message = match self.mailbox.pop() {
            Ok(message) => message,
            Err(e) => fatal(format_args!("actor {} scheduled without mail: {}", id, e)),
        };
        self.busy = true;
        (message, self.state.take())
    }

    /// Mark the actor as terminating without queueing anything.
    pub(crate) fn say_goodbye(&mut self) {
        self.goodbye = true;
    }

    /// Return the state after a dispatch and decide what happens next.
    pub(crate) fn end(&mut self, state: Option<S>) -> Completion {
        self.state = state;
        self.busy = false;

        if !self.mailbox.is_empty() {
            Completion::Reschedule
        } else if self.goodbye && !self.finished {
            self.finished = true;
            Completion::Finished
        } else {
            Completion::Idle
        }
    }

    /// Discard queued mail and private state during teardown.
    ///
    /// Later deliveries are refused with [`SendError::Interrupted`].
    pub(crate) fn release(&mut self) -> usize {
        self.released = true;
        self.state = None;
        self.mailbox.drain()
    }

    /// Whether a worker currently runs this actor
    pub fn is_busy(&self) -> bool {
        self.busy
    }

    /// Whether the actor accepted a GODIE
    pub fn has_goodbye(&self) -> bool {
        self.goodbye
    }

    /// Whether the actor drained its mailbox after a GODIE
    pub fn is_finished(&self) -> bool {
        self.finished
    }
}

/// A registered actor
pub struct Actor<S, P> {
    id: ActorId,
    role: Arc<Role<S, P>>,
    cell: Mutex<ActorCell<S, P>>,
}

impl<S, P> Actor<S, P> {
    /// Id of this actor
    pub fn id(&self) -> ActorId {
        self.id
    }

    /// Role the actor was created with
    pub fn role(&self) -> &Arc<Role<S, P>> {
        &self.role
    }

    /// Acquire the actor lock
    pub(crate) fn lock(&self) -> MutexGuard<'_, ActorCell<S, P>> {
        self.cell.lock()
    }
}

impl<S, P> fmt::Debug for Actor<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Actor")
            .field("id", &self.id)
            .field("role", &self.role)
            .finish()
    }
}

/// Registry metadata, guarded by the system lock
struct RegistryState<S, P> {
    actors: Vec<Arc<Actor<S, P>>>,
    capacity: usize,
    finished: usize,
    interrupted: bool,
}

/// The set of actors of one system
pub struct Registry<S, P> {
    state: Mutex<RegistryState<S, P>>,
    policy: MailboxPolicy,
}

impl<S, P> Registry<S, P> {
    /// Create an empty registry with room for `initial_capacity` actors.
    pub fn new(initial_capacity: usize, policy: MailboxPolicy) -> Self {
        let capacity = initial_capacity.max(1);
        Self {
            state: Mutex::new(RegistryState {
                actors: Vec::with_capacity(capacity),
                capacity,
                finished: 0,
                interrupted: false,
            }),
            policy,
        }
    }

    /// Register the first actor of the system; it always gets id 0.
    pub fn create_initial(&self, role: Arc<Role<S, P>>) -> ActorId {
        let id = self.insert(role);
        if id != ActorId::ROOT {
            fatal(format_args!("initial actor registered as {}", id));
        }
        id
    }

    /// Register a child actor under the next sequential id.
    pub fn create_child(&self, role: Arc<Role<S, P>>) -> ActorId {
        self.insert(role)
    }

    fn insert(&self, role: Arc<Role<S, P>>) -> ActorId {
        let mut state = self.state.lock();

        if state.actors.len() == state.capacity {
            let grown = state.capacity * 2;
            let additional = grown - state.actors.len();
            state.actors.reserve_exact(additional);
            state.capacity = grown;
            debug!("Actor registry grown to capacity {}", grown);
        }

        let id = ActorId(state.actors.len());
        state.actors.push(Arc::new(Actor {
            id,
            role,
            cell: Mutex::new(ActorCell::new(self.policy)),
        }));
        id
    }

    /// Find a registered actor.
    pub fn lookup(&self, id: ActorId) -> Result<Arc<Actor<S, P>>, SendError> {
        let state = self.state.lock();
        state
            .actors
            .get(id.index())
            .cloned()
            .ok_or(SendError::NoSuchActor(id))
    }

    /// Find the receiver of a message, refusing once the system is interrupted.
    pub fn resolve(&self, id: ActorId) -> Result<Arc<Actor<S, P>>, SendError> {
        let state = self.state.lock();
        if state.interrupted {
            return Err(SendError::Interrupted);
        }
        state
            .actors
            .get(id.index())
            .cloned()
            .ok_or(SendError::NoSuchActor(id))
    }

    /// Count one more finished actor.
    ///
    /// Returns whether every registered actor is now finished.
    pub fn mark_finished(&self) -> bool {
        let mut state = self.state.lock();
        state.finished += 1;
        state.finished == state.actors.len()
    }

    /// Flag the system as interrupted; returns `false` if it already was.
    pub fn mark_interrupted(&self) -> bool {
        let mut state = self.state.lock();
        !std::mem::replace(&mut state.interrupted, true)
    }

    /// Whether the system was interrupted
    pub fn is_interrupted(&self) -> bool {
        self.state.lock().interrupted
    }

    /// Number of registered actors
    pub fn count(&self) -> usize {
        self.state.lock().actors.len()
    }

    /// Number of slots available before the next growth
    pub fn capacity(&self) -> usize {
        self.state.lock().capacity
    }

    /// Number of finished actors
    pub fn finished(&self) -> usize {
        self.state.lock().finished
    }

    /// Copy of the actor table, for walking every actor without the system lock.
    pub fn snapshot(&self) -> Vec<Arc<Actor<S, P>>> {
        self.state.lock().actors.clone()
    }
}

impl<S, P> fmt::Debug for Registry<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Registry")
            .field("count", &state.actors.len())
            .field("capacity", &state.capacity)
            .field("finished", &state.finished)
            .field("interrupted", &state.interrupted)
            .finish()
    }
}
