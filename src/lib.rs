pub mod client;
pub mod config;
pub mod error;
pub mod memory;
pub mod scheduler;
pub mod server;
pub mod shutdown;
pub mod transport;

pub use config::{MemoryConfig, SchedulerConfig};
pub use error::{Result, SchedError};
pub use scheduler::Dispatcher;
pub use server::{SchedulerServer, ShutdownReport};
