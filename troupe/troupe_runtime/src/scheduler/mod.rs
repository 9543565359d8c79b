//! Scheduling of actors onto workers.
//!
//! The ready queue holds the ids of actors with pending work and carries the
//! scheduler's one-way shutdown status.

pub mod ready_queue;

pub use ready_queue::{ReadyQueue, SchedulerStatus};
