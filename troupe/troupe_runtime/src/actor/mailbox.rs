//! Per-actor mailbox.
//!
//! A mailbox is a plain FIFO owned by its actor and only touched while the
//! actor's lock is held, so it needs no synchronization of its own. Its
//! capacity policy is chosen once per system.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::fmt;
use thiserror::Error;

/// Error raised by mailbox operations
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxError {
    /// The mailbox is full (bounded capacity reached)
    #[error("mailbox is full (capacity {0})")]
    Full(usize),
    /// A message was requested from an empty mailbox
    #[error("mailbox is empty")]
    Empty,
}

/// Capacity policy shared by every mailbox of a system
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MailboxPolicy {
    /// Grows as needed; pushes never fail
    Unbounded,
    /// Fixed ring buffer; pushes past capacity are rejected
    Bounded(usize),
}

impl Default for MailboxPolicy {
    fn default() -> Self {
        Self::Unbounded
    }
}

/// FIFO of pending messages for one actor
pub struct Mailbox<M> {
    messages: VecDeque<M>,
    policy: MailboxPolicy,
}

impl<M> Mailbox<M> {
    /// Create an empty mailbox.
    ///
    /// Bounded mailboxes allocate their whole ring up front.
    pub fn new(policy: MailboxPolicy) -> Self {
        let messages = match policy {
            MailboxPolicy::Unbounded => VecDeque::new(),
            MailboxPolicy::Bounded(capacity) => VecDeque::with_capacity(capacity),
        };
        Self { messages, policy }
    }

    /// Append a message at the back.
    pub fn push(&mut self, message: M) -> Result<(), MailboxError> {
        if let MailboxPolicy::Bounded(capacity) = self.policy {
            if self.messages.len() >= capacity {
                return Err(MailboxError::Full(capacity));
            }
        }
        self.messages.push_back(message);
        Ok(())
    }

    /// Take the oldest message.
    pub fn pop(&mut self) -> Result<M, MailboxError> {
        self.messages.pop_front().ok_or(MailboxError::Empty)
    }

    /// Number of queued messages
    pub fn len(&self) -> usize {
        self.messages.len()
    }

    /// Whether no message is queued
    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    /// Maximum number of queued messages, `None` when unbounded
    pub fn capacity(&self) -> Option<usize> {
        match self.policy {
            MailboxPolicy::Unbounded => None,
            MailboxPolicy::Bounded(capacity) => Some(capacity),
        }
    }

    /// Drop every queued message, returning how many were discarded.
    pub fn drain(&mut self) -> usize {
        let dropped = self.messages.len();
        self.messages.clear();
        dropped
    }
}

impl<M> fmt::Debug for Mailbox<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Mailbox")
            .field("len", &self.messages.len())
            .field("policy", &self.policy)
            .finish()
    }
}
