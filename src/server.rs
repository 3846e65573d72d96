use std::time::Duration;

use serde::Serialize;
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::scheduler::{Dispatcher, StatsReport};
use crate::transport::{JobDescriptor, ReplySink, SubmissionListener, UnixReplySink};

/// Outcome of a whole scheduler run.
#[derive(Debug, Clone, Serialize)]
pub struct ShutdownReport {
    pub stats: StatsReport,
    /// Jobs still running or ready when the run ended
    pub aborted: usize,
    pub replies_delivered: u64,
    pub replies_dropped: u64,
}

/// Drives a [`Dispatcher`] from an inbound channel and returns results
/// through a [`ReplySink`].
pub struct SchedulerServer<R: ReplySink> {
    config: SchedulerConfig,
    dispatcher: Dispatcher,
    inbound: mpsc::Receiver<JobDescriptor>,
    replies: R,
    delivered: u64,
    dropped: u64,
}

impl<R: ReplySink> SchedulerServer<R> {
    pub fn new(
        config: SchedulerConfig,
        inbound: mpsc::Receiver<JobDescriptor>,
        replies: R,
    ) -> Result<Self> {
        let dispatcher = Dispatcher::new(&config)?;
        Ok(Self {
            config,
            dispatcher,
            inbound,
            replies,
            delivered: 0,
            dropped: 0,
        })
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Run the configured number of ticks, or until `shutdown` is cancelled.
    ///
    /// Each tick:
    /// 1. Waits for the tick interval (skipped when the interval is zero)
    /// 2. Polls the inbound channel once without blocking
    /// 3. Advances the dispatcher by one tick
    /// 4. Delivers the tick's replies
    ///
    /// Cancellation is only observed between ticks. Afterwards every job still
    /// held is flushed back to its submitter as aborted.
    pub async fn run(mut self, shutdown: CancellationToken) -> ShutdownReport {
        let mut pacing = (!self.config.tick_interval().is_zero()).then(|| {
            let mut interval = tokio::time::interval(self.config.tick_interval());
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            interval
        });

        tracing::info!(
            total_ticks = self.config.total_ticks,
            tick_interval_ms = self.config.tick_interval_ms,
            "Starting scheduler loop"
        );

        while self.dispatcher.clock() < self.config.total_ticks {
            if shutdown.is_cancelled() {
                break;
            }
            match pacing.as_mut() {
                Some(interval) => {
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = interval.tick() => {}
                    }
                }
                None => tokio::task::yield_now().await,
            }

            let arrival = self.inbound.try_recv().ok();
            let report = self.dispatcher.tick(arrival);
            tracing::debug!(tick = report.tick, events = ?report.events, "Tick complete");

            for reply in &report.replies {
                self.deliver(reply).await;
            }
        }

        if shutdown.is_cancelled() {
            tracing::info!(tick = self.dispatcher.clock(), "Shutdown requested");
        }
        self.shutdown().await
    }

    async fn shutdown(self) -> ShutdownReport {
        let Self {
            config,
            dispatcher,
            mut inbound,
            replies,
            mut delivered,
            mut dropped,
        } = self;

        inbound.close();
        let flush = dispatcher.shutdown();
        let timeout = config.reply_timeout();
        for reply in &flush.replies {
            if deliver_reply(&replies, reply, timeout).await {
                delivered += 1;
            } else {
                dropped += 1;
            }
        }

        tracing::info!(
            utilization = flush.stats.utilization,
            average_turnaround = flush.stats.average_turnaround,
            average_wait = flush.stats.average_wait,
            aborted = flush.replies.len(),
            "Scheduler stopped"
        );

        ShutdownReport {
            stats: flush.stats,
            aborted: flush.replies.len(),
            replies_delivered: delivered,
            replies_dropped: dropped,
        }
    }

    async fn deliver(&mut self, reply: &JobDescriptor) {
        if deliver_reply(&self.replies, reply, self.config.reply_timeout()).await {
            self.delivered += 1;
        } else {
            self.dropped += 1;
        }
    }
}

/// Send one reply, giving up after `timeout`. Failures are logged, never retried.
async fn deliver_reply<R: ReplySink>(
    replies: &R,
    reply: &JobDescriptor,
    timeout: Duration,
) -> bool {
    match tokio::time::timeout(timeout, replies.deliver(reply)).await {
        Ok(Ok(())) => {
            tracing::debug!(job_id = reply.id, end_tick = reply.end_tick, "Job record returned");
            true
        }
        Ok(Err(e)) => {
            tracing::warn!(
                job_id = reply.id,
                channel = %reply.reply_channel,
                error = %e,
                "Unable to return job record, dropping it"
            );
            false
        }
        Err(_) => {
            tracing::warn!(
                job_id = reply.id,
                channel = %reply.reply_channel,
                "Timed out returning job record, dropping it"
            );
            false
        }
    }
}

/// Serve submissions over Unix sockets in `config.socket_dir` until the run ends.
pub async fn serve(config: SchedulerConfig, shutdown: CancellationToken) -> Result<ShutdownReport> {
    config.validate()?;

    let (tx, rx) = mpsc::channel(config.inbound_capacity);
    let listener = SubmissionListener::bind(&config.socket_dir)?;
    let replies = UnixReplySink::new(config.socket_dir.clone());
    let server = SchedulerServer::new(config, rx, replies)?;

    let listener_token = shutdown.child_token();
    let listener_handle = tokio::spawn(listener.run(tx, listener_token.clone()));

    let report = server.run(shutdown).await;

    listener_token.cancel();
    if let Err(e) = listener_handle.await {
        tracing::warn!(error = %e, "Submission listener task failed");
    }

    Ok(report)
}
