//! The actor system facade.
//!
//! [`ActorSystem`] owns the worker pool and the signal watcher of one runtime.
//! [`SystemHandle`] is the cheap, cloneable part used to send messages from
//! any thread, including from inside role callbacks.

use log::{debug, info, trace};
use std::fmt;
use std::sync::Arc;

use super::message::{ActorId, Message};
use super::registry::Registry;
use super::role::Role;
use crate::config::RuntimeConfig;
use crate::error::{Result, SendError};
use crate::pool::thread::{PoolCounters, PoolStats, WorkerPool};
use crate::pool::watcher::Watcher;
use crate::scheduler::ready_queue::{ReadyQueue, SchedulerStatus};

/// State shared by the facade, the workers and the watcher
pub(crate) struct SystemCore<S, P> {
    pub(crate) registry: Registry<S, P>,
    pub(crate) queue: ReadyQueue,
    pub(crate) counters: PoolCounters,
}

/// Cloneable handle to a running system
pub struct SystemHandle<S, P> {
    core: Arc<SystemCore<S, P>>,
}

impl<S, P> Clone for SystemHandle<S, P> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<S, P> SystemHandle<S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    fn new(config: &RuntimeConfig) -> Self {
        Self {
            core: Arc::new(SystemCore {
                registry: Registry::new(config.initial_actor_capacity, config.mailbox),
                queue: ReadyQueue::new(),
                counters: PoolCounters::default(),
            }),
        }
    }

    pub(crate) fn core(&self) -> &SystemCore<S, P> {
        &self.core
    }

    /// Deliver a message to an actor's mailbox.
    ///
    /// The actor is scheduled when this message gives an idle actor its
    /// first piece of work. Never blocks. User messages carrying a reserved
    /// tag are refused.
    pub fn send(&self, to: ActorId, message: Message<S, P>) -> std::result::Result<(), SendError> {
        if let Some(tag) = message.misused_tag() {
            return Err(SendError::ReservedTag(tag));
        }
        let actor = self.core.registry.resolve(to)?;
        let tag = message.tag();

        let needs_enqueue = actor.lock().accept(to, message)?;
        if needs_enqueue {
            self.core.queue.push(to);
        }

        trace!("Delivered message {:#x} to actor {}", tag, to);
        Ok(())
    }

    /// Stop the system now, abandoning undelivered messages.
    ///
    /// Every later `send` fails with [`SendError::Interrupted`].
    pub fn interrupt(&self) {
        if self.core.registry.mark_interrupted() {
            info!("Interrupting actor system");
        }
        self.core.queue.signal_all(SchedulerStatus::Interrupted);
    }

    /// Current scheduler status
    pub fn status(&self) -> SchedulerStatus {
        self.core.queue.status()
    }

    /// Number of registered actors
    pub fn actor_count(&self) -> usize {
        self.core.registry.count()
    }

    /// Snapshot of pool and registry statistics
    pub fn stats(&self) -> PoolStats {
        self.core.counters.snapshot(
            self.core.registry.count(),
            self.core.registry.finished(),
            self.core.queue.status(),
        )
    }
}

impl<S, P> fmt::Debug for SystemHandle<S, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SystemHandle")
            .field("registry", &self.core.registry)
            .field("status", &self.core.queue.status())
            .finish()
    }
}

/// A running actor system
pub struct ActorSystem<S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    handle: SystemHandle<S, P>,
    pool: Option<WorkerPool>,
    watcher: Option<Watcher>,
}

impl<S, P> ActorSystem<S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    /// Create a system with the default configuration
    pub fn new(initial_role: Arc<Role<S, P>>) -> Result<Self> {
        Self::create(RuntimeConfig::default(), initial_role)
    }

    /// Create a system whose only actor plays `initial_role`.
    ///
    /// The initial actor gets id 0 and a HELLO carrying its own id, since it
    /// has no creator. Workers and the signal watcher are running when this
    /// returns.
    pub fn create(config: RuntimeConfig, initial_role: Arc<Role<S, P>>) -> Result<Self> {
        config.validate()?;
        let signals = config.signal_numbers()?;

        let handle = SystemHandle::new(&config);
        let root = handle.core().registry.create_initial(initial_role);
        if let Err(e) = handle.send(root, Message::Hello(root)) {
            crate::error::fatal(format_args!("greeting the initial actor failed: {}", e));
        }

        let watcher = Watcher::start(handle.clone(), &signals)?;
        let pool = WorkerPool::start(handle.clone(), &config);

        info!(
            "Created actor system with {} worker threads ({:?} mailboxes)",
            config.worker_threads, config.mailbox
        );

        Ok(Self {
            handle,
            pool: Some(pool),
            watcher: Some(watcher),
        })
    }

    /// Id of the initial actor
    pub fn root(&self) -> ActorId {
        ActorId::ROOT
    }

    /// Deliver a message to an actor.
    pub fn send(&self, to: ActorId, message: Message<S, P>) -> std::result::Result<(), SendError> {
        self.handle.send(to, message)
    }

    /// Stop the system without draining mailboxes.
    pub fn interrupt(&self) {
        self.handle.interrupt();
    }

    /// Handle usable from other threads
    pub fn handle(&self) -> SystemHandle<S, P> {
        self.handle.clone()
    }

    /// Snapshot of pool and registry statistics
    pub fn stats(&self) -> PoolStats {
        self.handle.stats()
    }

    /// Current scheduler status
    pub fn status(&self) -> SchedulerStatus {
        self.handle.status()
    }

    /// Wait for every worker and the watcher to finish.
    ///
    /// Returns once the system terminated, either because every actor
    /// finished or because it was interrupted. Must not be called from a role
    /// callback.
    pub fn join(mut self) {
        if let Some(pool) = self.pool.take() {
            pool.join();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.join();
        }
        info!("Actor system joined");
    }
}

impl<S, P> Drop for ActorSystem<S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    fn drop(&mut self) {
        if self.pool.is_some() {
            // Workers would otherwise block forever on an empty queue
            self.handle.interrupt();
            debug!("Actor system dropped without join - workers exit on their own");
        }
    }
}

impl<S, P> fmt::Debug for ActorSystem<S, P>
where
    S: Send + 'static,
    P: Send + 'static,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ActorSystem")
            .field("handle", &self.handle)
            .field(
                "workers",
                &self.pool.as_ref().map_or(0, WorkerPool::worker_count),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actor::mailbox::MailboxPolicy;
    use crate::actor::message::{MSG_GODIE, MSG_HELLO, MSG_SPAWN};

    fn idle_handle(mailbox: MailboxPolicy) -> SystemHandle<(), u32> {
        let config = RuntimeConfig::default().with_mailbox(mailbox);
        let handle = SystemHandle::new(&config);
        handle
            .core()
            .registry
            .create_initial(Arc::new(Role::new().on(1, |_, _, _, _| {})));
        handle
    }

    #[test]
    fn test_bounded_send_without_workers() {
        let handle = idle_handle(MailboxPolicy::Bounded(2));

        assert_eq!(handle.send(ActorId::ROOT, Message::user(1, 1)), Ok(()));
        assert_eq!(handle.send(ActorId::ROOT, Message::user(1, 2)), Ok(()));
        assert_eq!(
            handle.send(ActorId::ROOT, Message::user(1, 3)),
            Err(SendError::MailboxFull {
                actor: ActorId::ROOT,
                capacity: 2
            })
        );

        // Only the first message scheduled the actor
        assert_eq!(handle.core().queue.len(), 1);
    }

    #[test]
    fn test_send_errors() {
        let handle = idle_handle(MailboxPolicy::Unbounded);

        assert_eq!(
            handle.send(ActorId(5), Message::user(1, 0)),
            Err(SendError::NoSuchActor(ActorId(5)))
        );

        handle.send(ActorId::ROOT, Message::GoDie).unwrap();
        assert_eq!(
            handle.send(ActorId::ROOT, Message::user(1, 0)),
            Err(SendError::ActorFinished(ActorId::ROOT))
        );

        handle.interrupt();
        assert_eq!(
            handle.send(ActorId::ROOT, Message::user(1, 0)),
            Err(SendError::Interrupted)
        );
        assert_eq!(handle.status(), SchedulerStatus::Interrupted);
    }

    #[test]
    fn test_reserved_tags_are_refused() {
        let handle = idle_handle(MailboxPolicy::Unbounded);

        for tag in [MSG_HELLO, MSG_SPAWN, MSG_GODIE] {
            assert_eq!(
                handle.send(ActorId::ROOT, Message::user(tag, 0)),
                Err(SendError::ReservedTag(tag))
            );
        }
        assert!(handle.core().queue.is_empty());

        // The actor was not marked as terminating
        assert_eq!(handle.send(ActorId::ROOT, Message::user(1, 0)), Ok(()));
        assert_eq!(handle.core().queue.len(), 1);
    }

    #[test]
    fn test_stats_without_workers() {
        let handle = idle_handle(MailboxPolicy::Unbounded);
        let stats = handle.stats();

        assert_eq!(stats.actors, 1);
        assert_eq!(stats.finished_actors, 0);
        assert_eq!(stats.busy_workers, 0);
        assert_eq!(stats.status, SchedulerStatus::Running);
    }
}
