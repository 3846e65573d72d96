//! Integration tests for the tick loop over the in-process transport.
//!
//! These tests validate that:
//! - Completed and rejected jobs are answered through their reply routes
//! - At most one pending submission is admitted per tick
//! - Cancellation flushes outstanding jobs as aborted
//! - A missing, vanished or stalled reader never stops the loop

mod test_harness;

use std::time::Duration;

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use rr_sched::error::SchedError;
use rr_sched::scheduler::JobOutcome;
use rr_sched::server::SchedulerServer;
use rr_sched::transport::{local_channel, JobDescriptor, LocalReplies, ReplySink};
use test_harness::{job, test_config};

/// Reader that accepts the connection but never takes the record
struct StalledReader;

impl ReplySink for StalledReader {
    async fn deliver(&self, _reply: &JobDescriptor) -> rr_sched::Result<()> {
        std::future::pending().await
    }
}

#[tokio::test]
async fn test_completed_jobs_receive_replies() {
    let config = test_config(1024, 64, 4).with_total_ticks(20);
    let (submitter, inbound, replies) = local_channel(8);

    let rx_a = submitter.try_submit(job(1, 3, 100)).unwrap();
    let rx_b = submitter.try_submit(job(2, 2, 100)).unwrap();

    let server = SchedulerServer::new(config, inbound, replies.clone()).unwrap();
    let report = server.run(CancellationToken::new()).await;

    let a = rx_a.await.unwrap();
    assert_eq!(a.outcome(), Some(JobOutcome::Completed { end: 3 }));
    assert_eq!(a.start_tick, 0);
    assert_eq!(a.remaining_burst, 0);

    let b = rx_b.await.unwrap();
    assert_eq!(b.outcome(), Some(JobOutcome::Completed { end: 5 }));
    assert_eq!(b.start_tick, 1);
    assert_eq!(b.waiting(), Some(2));

    assert_eq!(report.stats.elapsed_ticks, 20);
    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.aborted, 0);
    assert_eq!(report.replies_delivered, 2);
    assert_eq!(report.replies_dropped, 0);
    assert_eq!(replies.pending(), 0);
}

#[tokio::test]
async fn test_rejected_job_answered_with_sentinel() {
    let config = test_config(128, 64, 4).with_total_ticks(5);
    let (submitter, inbound, replies) = local_channel(8);
    let rx = submitter.try_submit(job(1, 3, 200)).unwrap();

    let server = SchedulerServer::new(config, inbound, replies).unwrap();
    let report = server.run(CancellationToken::new()).await;

    let reply = rx.await.unwrap();
    assert_eq!(reply.end_tick, -1);
    assert_eq!(reply.outcome(), Some(JobOutcome::Rejected));
    assert_eq!(report.stats.completed, 0);
    assert_eq!(report.replies_delivered, 1);
}

#[tokio::test]
async fn test_one_submission_admitted_per_tick() {
    let config = test_config(1024, 64, 4).with_total_ticks(3);
    let (submitter, inbound, replies) = local_channel(8);

    let receivers: Vec<_> = (1..=4)
        .map(|id| submitter.try_submit(job(id, 100, 64)).unwrap())
        .collect();

    let server = SchedulerServer::new(config, inbound, replies.clone()).unwrap();
    let report = server.run(CancellationToken::new()).await;
    assert_eq!(report.aborted, 3);

    let mut receivers = receivers.into_iter();
    for expected_start in 0..3 {
        let reply = receivers.next().unwrap().await.unwrap();
        assert_eq!(reply.end_tick, 0);
        assert_eq!(reply.start_tick, expected_start);
    }

    // The fourth never made it off the inbound channel
    assert_eq!(replies.pending(), 1);
}

#[tokio::test]
async fn test_cancellation_flushes_outstanding_jobs() {
    let mut config = test_config(1024, 64, 4).with_total_ticks(100_000);
    config.tick_interval_ms = 5;
    let (submitter, inbound, replies) = local_channel(8);
    let rx = submitter.try_submit(job(1, 100_000, 64)).unwrap();

    let shutdown = CancellationToken::new();
    let server = SchedulerServer::new(config, inbound, replies).unwrap();
    let handle = tokio::spawn(server.run(shutdown.clone()));

    tokio::time::sleep(Duration::from_millis(100)).await;
    shutdown.cancel();

    let report = tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .expect("server did not stop")
        .unwrap();
    assert_eq!(report.aborted, 1);
    assert!(report.stats.elapsed_ticks > 0);
    assert!(report.stats.elapsed_ticks < 100_000);

    let reply = rx.await.unwrap();
    assert_eq!(reply.outcome(), Some(JobOutcome::Aborted));
    assert!(reply.remaining_burst < 100_000);
}

#[tokio::test]
async fn test_cancelled_before_start_runs_no_ticks() {
    let config = test_config(1024, 64, 4);
    let (_submitter, inbound, replies) = local_channel(8);

    let shutdown = CancellationToken::new();
    shutdown.cancel();

    let server = SchedulerServer::new(config, inbound, replies).unwrap();
    let report = server.run(shutdown).await;
    assert_eq!(report.stats.elapsed_ticks, 0);
    assert_eq!(report.aborted, 0);
}

#[tokio::test]
async fn test_unregistered_reply_route_is_dropped() {
    let config = test_config(1024, 64, 4).with_total_ticks(10);
    let (tx, rx) = mpsc::channel(8);
    let replies = LocalReplies::new();
    let kept = replies.register("reply_2.sock");

    // Nobody listens for job 1
    tx.try_send(job(1, 1, 64)).unwrap();
    tx.try_send(job(2, 1, 64)).unwrap();

    let server = SchedulerServer::new(config, rx, replies).unwrap();
    let report = server.run(CancellationToken::new()).await;

    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.replies_dropped, 1);
    assert_eq!(report.replies_delivered, 1);
    assert!(kept.await.unwrap().end_tick > 0);
}

#[tokio::test]
async fn test_departed_reader_does_not_stop_loop() {
    let config = test_config(1024, 64, 4).with_total_ticks(10);
    let (submitter, inbound, replies) = local_channel(8);

    drop(submitter.try_submit(job(1, 2, 64)).unwrap());
    let rx = submitter.try_submit(job(2, 2, 64)).unwrap();

    let server = SchedulerServer::new(config, inbound, replies).unwrap();
    let report = server.run(CancellationToken::new()).await;

    assert_eq!(report.replies_dropped, 1);
    assert_eq!(report.stats.completed, 2);
    assert_eq!(rx.await.unwrap().outcome(), Some(JobOutcome::Completed { end: 4 }));
}

#[tokio::test]
async fn test_stalled_reader_times_out_and_loop_continues() {
    let mut config = test_config(1024, 64, 4).with_total_ticks(6);
    config.reply_timeout_ms = 20;
    let (tx, rx) = mpsc::channel(8);

    tx.try_send(job(1, 1, 64)).unwrap();
    tx.try_send(job(2, 3, 64)).unwrap();

    let server = SchedulerServer::new(config, rx, StalledReader).unwrap();
    let run = server.run(CancellationToken::new());
    let report = tokio::time::timeout(Duration::from_secs(5), run)
        .await
        .expect("stalled delivery blocked the loop");

    // Job 1 completes on tick 1, job 2 on tick 4, both replies time out
    assert_eq!(report.stats.elapsed_ticks, 6);
    assert_eq!(report.stats.completed, 2);
    assert_eq!(report.replies_delivered, 0);
    assert_eq!(report.replies_dropped, 2);
}

#[tokio::test]
async fn test_full_inbound_channel_refuses_submission() {
    let (submitter, _inbound, _replies) = local_channel(1);
    submitter.try_submit(job(1, 1, 1)).unwrap();
    assert!(matches!(
        submitter.try_submit(job(2, 1, 1)),
        Err(SchedError::Channel { .. })
    ));
}

#[tokio::test]
async fn test_invalid_config_is_fatal() {
    let config = test_config(64, 128, 4);
    let (_submitter, inbound, replies) = local_channel(1);
    assert!(matches!(
        SchedulerServer::new(config, inbound, replies),
        Err(SchedError::Config(_))
    ));
}
