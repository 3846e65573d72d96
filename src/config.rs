use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, SchedError};
use crate::memory::round_up_power_of_two;
use crate::scheduler::Tick;

/// Largest page pool the allocator will build
pub const MAX_PAGES: usize = 1 << 20;

/// Last tick whose number still fits a reply's signed end tick
pub const MAX_TOTAL_TICKS: Tick = i32::MAX as Tick;

/// Size of the simulated memory pool and the page granularity it is carved into.
///
/// Both values are rounded up to the next power of two when the allocator is
/// built; validation happens on the values as given.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MemoryConfig {
    /// Total pool size in bytes
    pub total_memory: usize,
    /// Page size in bytes
    pub page_size: usize,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            total_memory: 1024,
            page_size: 64,
        }
    }
}

impl MemoryConfig {
    pub fn new(total_memory: usize, page_size: usize) -> Self {
        Self {
            total_memory,
            page_size,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.total_memory < 2 {
            return Err(SchedError::Config(format!(
                "total memory must be at least 2 bytes, got {}",
                self.total_memory
            )));
        }
        if self.page_size < 1 {
            return Err(SchedError::Config(
                "page size must be at least 1 byte".to_string(),
            ));
        }
        if self.total_memory < self.page_size {
            return Err(SchedError::Config(format!(
                "page size {} exceeds total memory {}",
                self.page_size, self.total_memory
            )));
        }
        match self.page_count() {
            Some(pages) if pages <= MAX_PAGES => Ok(()),
            _ => Err(SchedError::Config(format!(
                "{} bytes in {} byte pages exceeds {} pages",
                self.total_memory, self.page_size, MAX_PAGES
            ))),
        }
    }

    /// Pages in the pool once both sizes are rounded up to powers of two
    pub fn page_count(&self) -> Option<usize> {
        let total = round_up_power_of_two(self.total_memory)?;
        let page = round_up_power_of_two(self.page_size)?;
        Some(total / page)
    }
}

#[derive(Debug, Clone)]
pub struct SchedulerConfig {
    pub memory: MemoryConfig,
    /// Maximum consecutive ticks a job may hold the CPU
    pub quantum: Tick,
    /// Number of ticks the server runs before flushing and exiting
    pub total_ticks: Tick,
    /// Wall-clock pacing between ticks; 0 runs ticks back to back
    pub tick_interval_ms: u64,
    /// Upper bound on a single reply delivery
    pub reply_timeout_ms: u64,
    /// Pending submissions buffered between the listener and the tick loop
    pub inbound_capacity: usize,
    /// Directory holding the submission socket and per-job reply sockets
    pub socket_dir: PathBuf,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            memory: MemoryConfig::default(),
            quantum: 4,
            total_ticks: 50,
            tick_interval_ms: 1000,
            reply_timeout_ms: 500,
            inbound_capacity: 64,
            socket_dir: PathBuf::from("."),
        }
    }
}

impl SchedulerConfig {
    pub fn new(memory: MemoryConfig, quantum: Tick) -> Self {
        Self {
            memory,
            quantum,
            ..Default::default()
        }
    }

    pub fn with_total_ticks(mut self, total_ticks: Tick) -> Self {
        self.total_ticks = total_ticks;
        self
    }

    pub fn with_tick_interval_ms(mut self, tick_interval_ms: u64) -> Self {
        self.tick_interval_ms = tick_interval_ms;
        self
    }

    pub fn with_socket_dir(mut self, socket_dir: impl Into<PathBuf>) -> Self {
        self.socket_dir = socket_dir.into();
        self
    }

    /// Reject every combination the scheduler cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.memory.validate()?;
        if self.quantum == 0 {
            return Err(SchedError::Config(
                "round-robin quantum must be positive".to_string(),
            ));
        }
        if self.total_ticks == 0 {
            return Err(SchedError::Config(
                "run duration must be at least one tick".to_string(),
            ));
        }
        if self.total_ticks > MAX_TOTAL_TICKS {
            return Err(SchedError::Config(format!(
                "run duration {} exceeds {} ticks",
                self.total_ticks, MAX_TOTAL_TICKS
            )));
        }
        if self.inbound_capacity == 0 {
            return Err(SchedError::Config(
                "inbound capacity must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_interval_ms)
    }

    pub fn reply_timeout(&self) -> Duration {
        Duration::from_millis(self.reply_timeout_ms)
    }
}
