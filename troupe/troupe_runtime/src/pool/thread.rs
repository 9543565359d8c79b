//! Worker pool executing actor callbacks.
//!
//! Each worker repeatedly takes an actor id from the scheduling queue, pulls
//! one message out of that actor's mailbox and dispatches it. An actor is
//! marked busy for the whole dispatch, so no two workers ever run callbacks
//! of the same actor at once. The last worker to exit tears the system down.

use log::{debug, error, info, trace, warn};
use parking_lot::Mutex;
use serde::Serialize;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use crate::actor::message::{ActorId, Message};
use crate::actor::registry::{Actor, Completion};
use crate::actor::role::{Context, Role};
use crate::actor::system::SystemHandle;
use crate::config::RuntimeConfig;
use crate::error::fatal;
use crate::scheduler::ready_queue::SchedulerStatus;

/// Statistics about the pool and the actors it serves
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Messages taken out of mailboxes and dispatched
    pub messages_dispatched: usize,

    /// Child actors created from SPAWN messages
    pub spawns: usize,

    /// Callbacks that panicked
    pub callbacks_panicked: usize,

    /// Workers currently running a dispatch
    pub busy_workers: usize,

    /// Total callback execution time (microseconds)
    pub total_execution_time_us: u64,

    /// Maximum callback execution time (microseconds)
    pub max_execution_time_us: u64,

    /// Registered actors
    pub actors: usize,

    /// Actors that drained their mailbox after a GODIE
    pub finished_actors: usize,

    /// Scheduler status at the time of the snapshot
    pub status: SchedulerStatus,
}

/// Live counters behind [`PoolStats`]
#[derive(Debug, Default)]
pub(crate) struct PoolCounters {
    messages_dispatched: AtomicUsize,
    spawns: AtomicUsize,
    callbacks_panicked: AtomicUsize,
    busy_workers: AtomicUsize,
    total_execution_time_us: AtomicUsize,
    max_execution_time_us: AtomicUsize,
}

impl PoolCounters {
    pub(crate) fn snapshot(
        &self,
        actors: usize,
        finished_actors: usize,
        status: SchedulerStatus,
    ) -> PoolStats {
        PoolStats {
            messages_dispatched: self.messages_dispatched.load(Ordering::Relaxed),
            spawns: self.spawns.load(Ordering::Relaxed),
            callbacks_panicked: self.callbacks_panicked.load(Ordering::Relaxed),
            busy_workers: self.busy_workers.load(Ordering::Relaxed),
            total_execution_time_us: self.total_execution_time_us.load(Ordering::Relaxed) as u64,
            max_execution_time_us: self.max_execution_time_us.load(Ordering::Relaxed) as u64,
            actors,
            finished_actors,
            status,
        }
    }

    fn record_execution(&self, exec_time_us: usize) {
        self.total_execution_time_us
            .fetch_add(exec_time_us, Ordering::Relaxed);

        // Update max execution time using compare-and-swap
        let mut current_max = self.max_execution_time_us.load(Ordering::Relaxed);
        while exec_time_us > current_max {
            match self.max_execution_time_us.compare_exchange(
                current_max,
                exec_time_us,
                Ordering::SeqCst,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => current_max = actual,
            }
        }
    }
}

/// Counts workers that reached their exit, under its own lock
#[derive(Debug)]
struct Lifecycle {
    exited: Mutex<usize>,
    size: usize,
}

impl Lifecycle {
    /// Record one exiting worker; true for the last one.
    fn exit(&self) -> bool {
        let mut exited = self.exited.lock();
        *exited += 1;
        *exited == self.size
    }
}

/// Worker context holding shared state for the worker loop
struct WorkerContext<S, P> {
    system: SystemHandle<S, P>,
    lifecycle: Arc<Lifecycle>,
}

/// Fixed set of worker threads serving one actor system
pub(crate) struct WorkerPool {
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Spawn `config.worker_threads` workers.
    ///
    /// Failing to create a thread is fatal: the pool cannot run without its
    /// full complement.
    pub(crate) fn start<S, P>(system: SystemHandle<S, P>, config: &RuntimeConfig) -> Self
    where
        S: Send + 'static,
        P: Send + 'static,
    {
        let lifecycle = Arc::new(Lifecycle {
            exited: Mutex::new(0),
            size: config.worker_threads,
        });

        let mut workers = Vec::with_capacity(config.worker_threads);

        for id in 0..config.worker_threads {
            let thread_name = format!("{}-{}", config.thread_name_prefix, id);
            let ctx = WorkerContext {
                system: system.clone(),
                lifecycle: Arc::clone(&lifecycle),
            };

            let handle = thread::Builder::new()
                .name(thread_name.clone())
                .spawn(move || worker_loop(id, ctx))
                .unwrap_or_else(|e| fatal(format_args!("failed to spawn {}: {}", thread_name, e)));

            workers.push(handle);
        }

        Self { workers }
    }

    /// Wait for every worker to exit.
    pub(crate) fn join(self) {
        for worker in self.workers {
            worker.join().unwrap_or_else(|e| {
                error!("Worker thread panicked during shutdown: {:?}", e);
            });
        }
        debug!("All workers joined");
    }

    /// Get the number of worker threads
    pub(crate) fn worker_count(&self) -> usize {
        self.workers.len()
    }
}

/// Worker thread main loop
fn worker_loop<S, P>(id: usize, ctx: WorkerContext<S, P>)
where
    S: Send + 'static,
    P: Send + 'static,
{
    debug!("Worker {}: Starting", id);

    while let Some(actor_id) = ctx.system.core().queue.pop() {
        dispatch(id, &ctx.system, actor_id);
    }

    debug!("Worker {}: Exiting", id);

    if ctx.lifecycle.exit() {
        teardown(&ctx.system);
    }
}

/// Run one message of `actor_id` and settle the actor afterwards.
fn dispatch<S, P>(worker: usize, system: &SystemHandle<S, P>, actor_id: ActorId)
where
    S: Send + 'static,
    P: Send + 'static,
{
    let core = system.core();
    let actor = core
        .registry
        .lookup(actor_id)
        .unwrap_or_else(|e| fatal(format_args!("scheduled unknown actor: {}", e)));

    let (message, mut state) = actor.lock().begin(actor_id);
    core.counters.busy_workers.fetch_add(1, Ordering::SeqCst);
    core.counters
        .messages_dispatched
        .fetch_add(1, Ordering::Relaxed);

    trace!(
        "Worker {}: Dispatching {:#x} to actor {}",
        worker,
        message.tag(),
        actor_id
    );

    let exec_start = Instant::now();
    let result = catch_unwind(AssertUnwindSafe(|| {
        run(system, &actor, message, &mut state);
    }));
    core.counters
        .record_execution(exec_start.elapsed().as_micros() as usize);

    if let Err(e) = result {
        let reason = e
            .downcast_ref::<&str>()
            .copied()
            .or_else(|| e.downcast_ref::<String>().map(String::as_str))
            .unwrap_or("<unknown panic>");
        error!(
            "Worker {}: Callback of actor {} panicked: {}",
            worker, actor_id, reason
        );
        core.counters
            .callbacks_panicked
            .fetch_add(1, Ordering::Relaxed);
    }

    computation_ended(system, &actor, state);
}

/// Act on one message: runtime handling for SPAWN and GODIE, role callbacks
/// for everything else.
fn run<S, P>(
    system: &SystemHandle<S, P>,
    actor: &Actor<S, P>,
    message: Message<S, P>,
    state: &mut Option<S>,
) where
    S: Send + 'static,
    P: Send + 'static,
{
    let id = actor.id();

    match message {
        Message::Spawn(role) => spawn_child(system, id, role),
        Message::GoDie => actor.lock().say_goodbye(),
        Message::Hello(creator) => match actor.role().hello() {
            Some(callback) => callback(&Context::new(id, system), state, creator),
            None => debug!("Actor {} has no HELLO handler", id),
        },
        Message::User {
            tag,
            payload_size,
            payload,
        } => match actor.role().prompt(tag) {
            Some(callback) => callback(&Context::new(id, system), state, payload_size, payload),
            None => fatal(format_args!(
                "actor {} received tag {:#x} missing from its role {:?}",
                id,
                tag,
                actor.role()
            )),
        },
    }
}

/// Create a child actor and greet it with its parent's id.
fn spawn_child<S, P>(system: &SystemHandle<S, P>, parent: ActorId, role: Arc<Role<S, P>>)
where
    S: Send + 'static,
    P: Send + 'static,
{
    let core = system.core();
    let child = core.registry.create_child(role);
    core.counters.spawns.fetch_add(1, Ordering::Relaxed);
    debug!("Actor {} spawned actor {}", parent, child);

    if let Err(e) = system.send(child, Message::Hello(parent)) {
        warn!("Greeting spawned actor {} failed: {}", child, e);
    }
}

/// Hand the state back after a dispatch and reschedule or retire the actor.
fn computation_ended<S, P>(system: &SystemHandle<S, P>, actor: &Actor<S, P>, state: Option<S>)
where
    S: Send + 'static,
    P: Send + 'static,
{
    let core = system.core();
    let id = actor.id();

    // The actor guard is released before the registry is touched
    let completion = actor.lock().end(state);
    core.counters.busy_workers.fetch_sub(1, Ordering::SeqCst);

    match completion {
        Completion::Reschedule => core.queue.push(id),
        Completion::Idle => {}
        Completion::Finished => {
            debug!("Actor {} finished", id);
            if core.registry.mark_finished() {
                info!("All {} actors finished", core.registry.count());
                core.queue.signal_all(SchedulerStatus::Draining);
            }
        }
    }
}

/// Release everything the actors still hold. Run by the last worker.
fn teardown<S, P>(system: &SystemHandle<S, P>)
where
    S: Send + 'static,
    P: Send + 'static,
{
    let core = system.core();

    let abandoned: usize = core
        .registry
        .snapshot()
        .iter()
        .map(|actor| actor.lock().release())
        .sum();
    if abandoned > 0 {
        warn!("Dropped {} undelivered messages", abandoned);
    }

    core.queue.discard_pending();
    if let Err(e) = core.queue.destroy() {
        error!("Scheduling queue teardown failed: {}", e);
    }

    info!(
        "Actor system torn down ({} actors, {} finished, {:?})",
        core.registry.count(),
        core.registry.finished(),
        core.queue.status()
    );
}
