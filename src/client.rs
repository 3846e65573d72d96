//! Submitter side of the Unix socket transport.
//!
//! A submitter listens on its own reply socket, writes one record to the
//! scheduler and waits for the record to come back with an end tick.

use std::path::{Path, PathBuf};
use std::time::Duration;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};

use crate::error::{Result, SchedError};
use crate::scheduler::{JobId, JobOutcome, Tick};
use crate::transport::unix::remove_stale;
use crate::transport::{JobDescriptor, UnixReplySink, RECORD_SIZE, SUBMIT_SOCKET};

/// How long a submitter waits for its reply unless told otherwise
pub const DEFAULT_REPLY_WAIT: Duration = Duration::from_secs(300);

#[derive(Debug, Clone)]
pub struct Submitter {
    socket_dir: PathBuf,
    reply_wait: Duration,
}

impl Submitter {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            reply_wait: DEFAULT_REPLY_WAIT,
        }
    }

    /// Give up on the reply after `reply_wait`, counted from the moment the
    /// record is sent.
    pub fn with_reply_wait(mut self, reply_wait: Duration) -> Self {
        self.reply_wait = reply_wait;
        self
    }

    /// Submit a job identified by this process id.
    pub async fn submit(&self, burst: Tick, memory_needed: u32) -> Result<JobDescriptor> {
        self.submit_as(std::process::id(), burst, memory_needed).await
    }

    /// Submit a job under an explicit identity; the reply channel is derived from it.
    pub async fn submit_as(
        &self,
        id: JobId,
        burst: Tick,
        memory_needed: u32,
    ) -> Result<JobDescriptor> {
        self.submit_descriptor(JobDescriptor::for_submitter(id, burst, memory_needed))
            .await
    }

    pub async fn submit_descriptor(&self, desc: JobDescriptor) -> Result<JobDescriptor> {
        desc.validate()?;
        let record = desc.encode()?;

        let reply_path =
            UnixReplySink::new(&self.socket_dir).channel_path(&desc.reply_channel)?;
        remove_stale(&reply_path)?;
        let reply_listener = UnixListener::bind(&reply_path)?;
        let _guard = SocketFile(reply_path);

        let submit_path = submit_socket_path(&self.socket_dir);
        let mut stream = UnixStream::connect(&submit_path)
            .await
            .map_err(|e| SchedError::channel(submit_path.display().to_string(), e))?;
        stream.write_all(&record).await?;
        stream.shutdown().await?;
        tracing::info!(
            job_id = desc.id,
            burst = desc.total_burst,
            memory = desc.memory_needed,
            "Job sent to scheduler"
        );

        let receive = async {
            let (mut reply_stream, _) = reply_listener.accept().await?;
            let mut buf = [0u8; RECORD_SIZE];
            reply_stream.read_exact(&mut buf).await?;
            Ok::<_, SchedError>(buf)
        };
        let buf = tokio::time::timeout(self.reply_wait, receive)
            .await
            .map_err(|_| {
                SchedError::channel(
                    &desc.reply_channel,
                    format!("no reply within {:?}", self.reply_wait),
                )
            })??;
        JobDescriptor::decode(&buf)
    }
}

/// Removes the reply socket when the submission finishes, however it finishes.
struct SocketFile(PathBuf);

impl Drop for SocketFile {
    fn drop(&mut self) {
        let _ = remove_stale(&self.0);
    }
}

/// Human-readable summary of a reply, as the submitter reports it.
pub fn describe_reply(reply: &JobDescriptor) -> String {
    match reply.outcome() {
        Some(JobOutcome::Rejected) => {
            format!("Job #{}: insufficient memory, job terminated", reply.id)
        }
        Some(JobOutcome::Aborted) => {
            format!("Job #{}: server shutdown, job terminated", reply.id)
        }
        Some(JobOutcome::Completed { end }) => format!(
            "Job #{} complete: arrived {}, ended {}, burst {}, turnaround {}, waiting {}",
            reply.id,
            reply.start_tick,
            end,
            reply.total_burst,
            reply.turnaround().unwrap_or_default(),
            reply.waiting().unwrap_or_default(),
        ),
        None => format!("Job #{}: unrecognized end tick {}", reply.id, reply.end_tick),
    }
}

/// Path of the scheduler's submission socket in `socket_dir`
pub fn submit_socket_path(socket_dir: &Path) -> PathBuf {
    socket_dir.join(SUBMIT_SOCKET)
}
