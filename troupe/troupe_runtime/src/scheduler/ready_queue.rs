//! Blocking queue of actors with pending work.
//!
//! Workers block in [`ReadyQueue::pop`] until an actor id is available. The
//! queue carries a one-way status latch: once it leaves
//! [`SchedulerStatus::Running`] no waiter ever blocks again and no id is ever
//! handed out again, whether more ids get pushed or not.

use log::{debug, warn};
use parking_lot::{Condvar, Mutex};
use serde::Serialize;
use std::collections::VecDeque;

use crate::actor::message::ActorId;
use crate::error::{Result, RuntimeError};

/// Lifecycle of the scheduler
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum SchedulerStatus {
    /// Work is being handed out
    Running,
    /// Every actor finished; workers leave as they observe it
    Draining,
    /// An external interrupt stopped the system without draining mailboxes
    Interrupted,
}

impl SchedulerStatus {
    /// Whether workers still receive work
    pub fn is_running(self) -> bool {
        self == Self::Running
    }
}

#[derive(Debug)]
struct QueueState {
    ids: VecDeque<ActorId>,
    status: SchedulerStatus,
}

/// FIFO of actor ids shared by all workers
#[derive(Debug)]
pub struct ReadyQueue {
    state: Mutex<QueueState>,
    ready: Condvar,
}

impl ReadyQueue {
    /// Create an empty, running queue
    pub fn new() -> Self {
        Self {
            state: Mutex::new(QueueState {
                ids: VecDeque::new(),
                status: SchedulerStatus::Running,
            }),
            ready: Condvar::new(),
        }
    }

    /// Append an actor id and wake one waiting worker.
    ///
    /// Ids pushed after the queue was signalled are dropped: no worker would
    /// ever take them.
    pub fn push(&self, id: ActorId) {
        let mut state = self.state.lock();
        if !state.status.is_running() {
            return;
        }
        state.ids.push_back(id);
        drop(state);
        self.ready.notify_one();
    }

    /// Take the next actor id, blocking while the queue is empty.
    ///
    /// Returns `None` once the queue was signalled; that answer never changes.
    pub fn pop(&self) -> Option<ActorId> {
        let mut state = self.state.lock();
        loop {
            if !state.status.is_running() {
                return None;
            }
            if let Some(id) = state.ids.pop_front() {
                return Some(id);
            }
            self.ready.wait(&mut state);
        }
    }

    /// Stop handing out work and wake every waiter.
    ///
    /// The status only moves forward: a drained queue can still be
    /// interrupted, an interrupted one stays interrupted.
    pub fn signal_all(&self, status: SchedulerStatus) {
        let mut state = self.state.lock();
        if status > state.status {
            debug!("Scheduler status: {:?} -> {:?}", state.status, status);
            state.status = status;
        }
        drop(state);
        self.ready.notify_all();
    }

    /// Current status
    pub fn status(&self) -> SchedulerStatus {
        self.state.lock().status
    }

    /// Whether no id is queued
    pub fn is_empty(&self) -> bool {
        self.state.lock().ids.is_empty()
    }

    /// Number of queued ids
    pub fn len(&self) -> usize {
        self.state.lock().ids.len()
    }

    /// Forget ids that will never be served because the queue was signalled.
    ///
    /// Returns the number of dropped ids. Does nothing while running.
    pub fn discard_pending(&self) -> usize {
        let mut state = self.state.lock();
        if state.status.is_running() {
            return 0;
        }
        let dropped = state.ids.len();
        state.ids.clear();
        if dropped > 0 {
            warn!("Discarded {} scheduled actors after shutdown", dropped);
        }
        dropped
    }

    /// Check the queue can be released.
    ///
    /// Fails if ids are still queued, which means the caller tore the system
    /// down while work was still reachable.
    pub fn destroy(&self) -> Result<()> {
        let state = self.state.lock();
        if state.ids.is_empty() {
            Ok(())
        } else {
            Err(RuntimeError::QueueNotEmpty(state.ids.len()))
        }
    }
}

impl Default for ReadyQueue {
    fn default() -> Self {
        Self::new()
    }
}
