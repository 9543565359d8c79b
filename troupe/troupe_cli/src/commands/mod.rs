//! Demo programs
//!
//! Each command builds its roles, runs an actor system to completion and
//! prints what the actors computed.

use std::thread;
use std::time::Duration;

use troupe_runtime::{ActorId, Message, SendError, SystemHandle};

pub mod factorial;
pub mod matrix;

const RETRY_DELAY: Duration = Duration::from_micros(200);

/// Send a message, waiting while the receiver's bounded mailbox is full.
///
/// `make` builds a fresh message for every attempt. Only `MailboxFull` is
/// retried, so the receiver must be able to drain without the caller's help.
pub fn deliver<S, P, F>(
    system: &SystemHandle<S, P>,
    to: ActorId,
    make: F,
) -> Result<(), SendError>
where
    S: Send + 'static,
    P: Send + 'static,
    F: Fn() -> Message<S, P>,
{
    loop {
        match system.send(to, make()) {
            Err(SendError::MailboxFull { .. }) => thread::sleep(RETRY_DELAY),
            other => return other,
        }
    }
}
