use std::io;
use std::path::{Path, PathBuf};

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use super::{JobDescriptor, ReplySink, RECORD_SIZE};
use crate::error::{Result, SchedError};

/// File name of the scheduler's submission socket inside the socket directory
pub const SUBMIT_SOCKET: &str = "rr_sched.sock";

/// Accepts submitter connections and forwards complete records to the tick loop.
#[derive(Debug)]
pub struct SubmissionListener {
    listener: UnixListener,
    path: PathBuf,
}

impl SubmissionListener {
    /// Bind `<socket_dir>/rr_sched.sock`, replacing a stale socket file.
    pub fn bind(socket_dir: &Path) -> Result<Self> {
        let path = socket_dir.join(SUBMIT_SOCKET);
        remove_stale(&path)?;
        let listener = UnixListener::bind(&path)?;
        tracing::info!(path = %path.display(), "Listening for job submissions");
        Ok(Self { listener, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Accept connections until `shutdown` fires, then remove the socket file.
    pub async fn run(self, inbound: mpsc::Sender<JobDescriptor>, shutdown: CancellationToken) {
        loop {
            tokio::select! {
                _ = shutdown.cancelled() => break,
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, _)) => {
                        let inbound = inbound.clone();
                        let shutdown = shutdown.clone();
                        tokio::spawn(async move {
                            read_submissions(stream, inbound, shutdown).await;
                        });
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, "Failed to accept submitter connection");
                    }
                },
            }
        }

        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove submission socket"
            );
        }
    }
}

/// Forward every complete record on `stream` until end-of-stream.
async fn read_submissions(
    mut stream: UnixStream,
    inbound: mpsc::Sender<JobDescriptor>,
    shutdown: CancellationToken,
) {
    loop {
        let mut buf = [0u8; RECORD_SIZE];
        let read = tokio::select! {
            _ = shutdown.cancelled() => return,
            read = read_record(&mut stream, &mut buf) => read,
        };

        match read {
            Ok(true) => {}
            Ok(false) => return,
            Err(e) => {
                tracing::warn!(error = %e, "Submission stream failed");
                return;
            }
        }

        let desc = match JobDescriptor::decode(&buf).and_then(|d| d.validate().map(|_| d)) {
            Ok(desc) => desc,
            Err(e) => {
                tracing::warn!(error = %e, "Discarding malformed submission");
                continue;
            }
        };

        tracing::info!(job_id = desc.id, "Received job submission");
        if inbound.send(desc).await.is_err() {
            // Tick loop has stopped
            return;
        }
    }
}

/// Fill `buf` with one record, continuing across short reads.
///
/// Returns `Ok(false)` at end-of-stream; a partially received record is
/// discarded.
async fn read_record(stream: &mut UnixStream, buf: &mut [u8; RECORD_SIZE]) -> io::Result<bool> {
    let mut filled = 0;
    while filled < RECORD_SIZE {
        let n = stream.read(&mut buf[filled..]).await?;
        if n == 0 {
            if filled > 0 {
                tracing::warn!(bytes = filled, "Discarding partial record at end of stream");
            }
            return Ok(false);
        }
        filled += n;
    }
    Ok(true)
}

/// Replies over per-job Unix sockets that the submitters listen on.
#[derive(Debug, Clone)]
pub struct UnixReplySink {
    socket_dir: PathBuf,
}

impl UnixReplySink {
    pub fn new(socket_dir: impl Into<PathBuf>) -> Self {
        Self {
            socket_dir: socket_dir.into(),
        }
    }

    /// Socket path for a reply channel name. Names must stay inside the socket
    /// directory.
    pub fn channel_path(&self, name: &str) -> Result<PathBuf> {
        if name.is_empty() || name.contains('/') || name == "." || name == ".." {
            return Err(SchedError::channel(name, "invalid reply channel name"));
        }
        Ok(self.socket_dir.join(name))
    }
}

impl ReplySink for UnixReplySink {
    async fn deliver(&self, reply: &JobDescriptor) -> Result<()> {
        let channel = reply.reply_channel.as_str();
        let path = self.channel_path(channel)?;
        let buf = reply.encode()?;

        let mut stream = UnixStream::connect(&path)
            .await
            .map_err(|e| SchedError::channel(channel, e))?;
        stream
            .write_all(&buf)
            .await
            .map_err(|e| SchedError::channel(channel, e))?;
        stream
            .shutdown()
            .await
            .map_err(|e| SchedError::channel(channel, e))?;
        Ok(())
    }
}

pub(crate) fn remove_stale(path: &Path) -> Result<()> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
