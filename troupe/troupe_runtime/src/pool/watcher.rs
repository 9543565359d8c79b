//! Dedicated thread turning OS signals into a system interrupt.
//!
//! Signals are consumed through `signal-hook`'s iterator, so only this thread
//! ever observes them; workers are never interrupted mid-callback.

use log::{debug, error, info};
use signal_hook::iterator::{Handle, Signals};
use std::thread::{self, JoinHandle};

use crate::actor::system::SystemHandle;
use crate::error::{fatal, Result, RuntimeError};

/// The signal watcher of one actor system
pub(crate) struct Watcher {
    handle: Handle,
    thread: Option<JoinHandle<()>>,
}

impl Watcher {
    /// Register `signals` and start watching them.
    ///
    /// Registration errors are returned; a failure to spawn the thread is
    /// fatal.
    pub(crate) fn start<S, P>(system: SystemHandle<S, P>, signals: &[i32]) -> Result<Self>
    where
        S: Send + 'static,
        P: Send + 'static,
    {
        let mut listener = Signals::new(signals).map_err(RuntimeError::Signal)?;
        let handle = listener.handle();

        let thread = thread::Builder::new()
            .name("troupe-signals".to_string())
            .spawn(move || {
                if let Some(signal) = listener.forever().next() {
                    info!("Received signal {}, interrupting actor system", signal);
                    system.interrupt();
                }
                debug!("Signal watcher exiting");
            })
            .unwrap_or_else(|e| fatal(format_args!("failed to spawn signal watcher: {}", e)));

        debug!("Watching signals {:?}", signals);

        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    /// Stop watching and wait for the thread to exit.
    pub(crate) fn join(mut self) {
        self.handle.close();
        if let Some(thread) = self.thread.take() {
            thread.join().unwrap_or_else(|e| {
                error!("Signal watcher panicked: {:?}", e);
            });
        }
    }
}

impl Drop for Watcher {
    fn drop(&mut self) {
        // Unregisters the signals and releases the thread if still waiting
        self.handle.close();
    }
}
