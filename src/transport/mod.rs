//! Boundary between the scheduler and its submitters.
//!
//! Submissions arrive on a bounded `mpsc` channel that the tick loop drains
//! with `try_recv`, one record per tick at most. Replies leave through a
//! [`ReplySink`], addressed by the reply channel name in each record.
//!
//! # Implementations
//!
//! - [`local`]: in-process submitters with a `oneshot` route per job
//! - [`unix`]: Unix domain sockets carrying fixed-size [`record`]s

pub mod local;
pub mod record;
pub mod unix;

use std::future::Future;

use crate::error::Result;

pub use local::{local_channel, LocalReplies, LocalSubmitter};
pub use record::{reply_channel_name, JobDescriptor, RECORD_SIZE, REPLY_CHANNEL_LEN};
pub use unix::{SubmissionListener, UnixReplySink, SUBMIT_SOCKET};

/// Delivers a finished job record back to its submitter.
///
/// Called at most once per job. A failure means the submitter never learns the
/// outcome; the caller logs it and moves on.
pub trait ReplySink {
    fn deliver(&self, reply: &JobDescriptor) -> impl Future<Output = Result<()>> + Send;
}
