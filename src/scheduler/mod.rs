//! Single-CPU round-robin scheduling core.
//!
//! - [`Dispatcher`]: drives the simulated clock; admission, execution, preemption, dispatch
//! - [`ReadyQueue`]: FIFO of admitted jobs awaiting the CPU
//! - [`Job`]: per-job control block and its terminal [`JobOutcome`]
//! - [`Statistics`]: counters turned into a [`StatsReport`] at shutdown

pub mod dispatcher;
pub mod job;
pub mod queue;
pub mod stats;

/// One discrete unit of simulated time
pub type Tick = u32;

pub use dispatcher::{Dispatcher, ShutdownFlush, TickEvent, TickReport};
pub use job::{Job, JobId, JobOutcome, JobState};
pub use queue::ReadyQueue;
pub use stats::{Statistics, StatsReport};
