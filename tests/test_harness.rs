//! Test harness for scheduler integration tests.
//!
//! Provides configuration shortcuts, a helper to drive a bare dispatcher, and
//! a socket-backed scheduler running in a temporary directory.

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use tempfile::TempDir;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use rr_sched::client::{submit_socket_path, Submitter};
use rr_sched::config::{MemoryConfig, SchedulerConfig};
use rr_sched::scheduler::{Dispatcher, TickReport};
use rr_sched::server::{self, ShutdownReport};
use rr_sched::transport::JobDescriptor;

/// Unpaced configuration, suitable for driving ticks as fast as possible
#[allow(dead_code)]
pub fn test_config(total_memory: usize, page_size: usize, quantum: u32) -> SchedulerConfig {
    SchedulerConfig::new(MemoryConfig::new(total_memory, page_size), quantum)
        .with_tick_interval_ms(0)
}

/// Submission whose reply channel is derived from `id`
#[allow(dead_code)]
pub fn job(id: u32, burst: u32, memory: u32) -> JobDescriptor {
    JobDescriptor::for_submitter(id, burst, memory)
}

/// Run `n` ticks with no arrivals
#[allow(dead_code)]
pub fn idle_ticks(dispatcher: &mut Dispatcher, n: u32) -> Vec<TickReport> {
    (0..n).map(|_| dispatcher.tick(None)).collect()
}

/// Handle to a scheduler serving Unix sockets from a temporary directory
#[allow(dead_code)]
pub struct TestServer {
    dir: TempDir,
    shutdown: CancellationToken,
    handle: JoinHandle<rr_sched::Result<ShutdownReport>>,
}

#[allow(dead_code)]
impl TestServer {
    /// Start serving with a short tick interval and a run long enough that
    /// only [`stop`](Self::stop) ends it.
    pub async fn start(total_memory: usize, page_size: usize, quantum: u32) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let config = SchedulerConfig::new(MemoryConfig::new(total_memory, page_size), quantum)
            .with_total_ticks(100_000)
            .with_tick_interval_ms(10)
            .with_socket_dir(dir.path());

        let shutdown = CancellationToken::new();
        let handle = tokio::spawn(server::serve(config, shutdown.clone()));

        let socket = submit_socket_path(dir.path());
        assert_eventually(
            || async { socket.exists() },
            Duration::from_secs(5),
            "submission socket never appeared",
        )
        .await;

        Self {
            dir,
            shutdown,
            handle,
        }
    }

    pub fn socket_dir(&self) -> &Path {
        self.dir.path()
    }

    pub fn submitter(&self) -> Submitter {
        Submitter::new(self.dir.path())
    }

    /// Cancel the run and wait for the shutdown flush to finish
    pub async fn stop(self) -> ShutdownReport {
        self.shutdown().await.0
    }

    /// Like [`stop`](Self::stop), but keeps the socket directory alive for inspection
    pub async fn shutdown(self) -> (ShutdownReport, TempDir) {
        self.shutdown.cancel();
        let report = tokio::time::timeout(Duration::from_secs(5), self.handle)
            .await
            .expect("scheduler did not stop in time")
            .expect("scheduler task panicked")
            .expect("scheduler failed");
        (report, self.dir)
    }
}

/// Wait for a condition to become true with timeout
#[allow(dead_code)]
pub async fn wait_for<F, Fut>(
    condition: F,
    timeout_duration: Duration,
    poll_interval: Duration,
) -> bool
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let start = tokio::time::Instant::now();
    while start.elapsed() < timeout_duration {
        if condition().await {
            return true;
        }
        tokio::time::sleep(poll_interval).await;
    }
    false
}

/// Assert a condition eventually becomes true
#[allow(dead_code)]
pub async fn assert_eventually<F, Fut>(condition: F, timeout_duration: Duration, message: &str)
where
    F: Fn() -> Fut,
    Fut: Future<Output = bool>,
{
    let result = wait_for(condition, timeout_duration, Duration::from_millis(10)).await;
    assert!(result, "{}", message);
}
