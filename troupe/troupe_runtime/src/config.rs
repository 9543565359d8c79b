//! Runtime configuration.
//!
//! Every field has a default, so a configuration file only needs the values
//! it changes:
//!
//! ```toml
//! worker_threads = 4
//! mailbox = { bounded = 64 }
//! signals = ["SIGINT", "SIGQUIT"]
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::actor::mailbox::MailboxPolicy;
use crate::error::{Result, RuntimeError};

/// Signals the watcher may listen for
const KNOWN_SIGNALS: &[(&str, i32)] = &[
    ("SIGINT", signal_hook::consts::SIGINT),
    ("SIGTERM", signal_hook::consts::SIGTERM),
    ("SIGQUIT", signal_hook::consts::SIGQUIT),
    ("SIGHUP", signal_hook::consts::SIGHUP),
    ("SIGUSR1", signal_hook::consts::SIGUSR1),
    ("SIGUSR2", signal_hook::consts::SIGUSR2),
];

/// Configuration of an actor system
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Number of worker threads in the pool
    pub worker_threads: usize,

    /// Capacity policy applied to every mailbox
    pub mailbox: MailboxPolicy,

    /// Actor slots allocated up front; doubled whenever full
    pub initial_actor_capacity: usize,

    /// Name prefix for worker threads
    pub thread_name_prefix: String,

    /// Signals that interrupt the system
    pub signals: Vec<String>,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            worker_threads: num_cpus::get(),
            mailbox: MailboxPolicy::Unbounded,
            initial_actor_capacity: 16,
            thread_name_prefix: "troupe-worker".to_string(),
            signals: vec!["SIGINT".to_string(), "SIGTERM".to_string()],
        }
    }
}

impl RuntimeConfig {
    /// Parse a configuration from TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| RuntimeError::ConfigFile {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Use `threads` workers
    pub fn with_worker_threads(mut self, threads: usize) -> Self {
        self.worker_threads = threads;
        self
    }

    /// Use the given mailbox policy
    pub fn with_mailbox(mut self, mailbox: MailboxPolicy) -> Self {
        self.mailbox = mailbox;
        self
    }

    /// Listen for the given signals
    pub fn with_signals<I, T>(mut self, signals: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<String>,
    {
        self.signals = signals.into_iter().map(Into::into).collect();
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.worker_threads == 0 {
            return Err(RuntimeError::InvalidConfig(
                "worker_threads must be at least 1".to_string(),
            ));
        }
        if self.initial_actor_capacity == 0 {
            return Err(RuntimeError::InvalidConfig(
                "initial_actor_capacity must be at least 1".to_string(),
            ));
        }
        if self.mailbox == MailboxPolicy::Bounded(0) {
            return Err(RuntimeError::InvalidConfig(
                "bounded mailbox capacity must be at least 1".to_string(),
            ));
        }
        self.signal_numbers()?;
        Ok(())
    }

    /// Resolve the configured signal names.
    pub fn signal_numbers(&self) -> Result<Vec<i32>> {
        self.signals
            .iter()
            .map(|name| {
                let wanted = name.trim().to_ascii_uppercase();
                KNOWN_SIGNALS
                    .iter()
                    .find(|(known, _)| *known == wanted)
                    .map(|(_, number)| *number)
                    .ok_or_else(|| RuntimeError::InvalidConfig(format!("unknown signal {}", name)))
            })
            .collect()
    }
}
