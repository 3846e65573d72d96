use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{mpsc, oneshot};

use super::{JobDescriptor, ReplySink};
use crate::error::{Result, SchedError};

/// Reply routes for submitters living in the scheduler's own process.
#[derive(Debug, Clone, Default)]
pub struct LocalReplies {
    routes: Arc<Mutex<HashMap<String, oneshot::Sender<JobDescriptor>>>>,
}

impl LocalReplies {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a reply channel under `name`, replacing any earlier route.
    pub fn register(&self, name: impl Into<String>) -> oneshot::Receiver<JobDescriptor> {
        let (tx, rx) = oneshot::channel();
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(name.into(), tx);
        rx
    }

    /// Number of routes still waiting for a reply
    pub fn pending(&self) -> usize {
        self.routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .len()
    }
}

impl ReplySink for LocalReplies {
    async fn deliver(&self, reply: &JobDescriptor) -> Result<()> {
        let route = self
            .routes
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .remove(&reply.reply_channel);

        let Some(tx) = route else {
            return Err(SchedError::channel(
                &reply.reply_channel,
                "no reader registered",
            ));
        };
        tx.send(reply.clone())
            .map_err(|_| SchedError::channel(&reply.reply_channel, "reader went away"))
    }
}

/// Handle an in-process submitter uses to hand jobs to the scheduler.
#[derive(Debug, Clone)]
pub struct LocalSubmitter {
    inbound: mpsc::Sender<JobDescriptor>,
    replies: LocalReplies,
}

impl LocalSubmitter {
    /// Submit and wait for room in the inbound channel.
    pub async fn submit(&self, desc: JobDescriptor) -> Result<oneshot::Receiver<JobDescriptor>> {
        let rx = self.replies.register(desc.reply_channel.clone());
        self.inbound
            .send(desc)
            .await
            .map_err(|_| SchedError::channel("inbound", "scheduler stopped"))?;
        Ok(rx)
    }

    /// Submit without waiting; fails if the inbound channel is full or closed.
    pub fn try_submit(&self, desc: JobDescriptor) -> Result<oneshot::Receiver<JobDescriptor>> {
        let rx = self.replies.register(desc.reply_channel.clone());
        self.inbound
            .try_send(desc)
            .map_err(|e| SchedError::channel("inbound", e))?;
        Ok(rx)
    }
}

/// Wire an in-process submitter to a scheduler inbound channel.
pub fn local_channel(
    capacity: usize,
) -> (LocalSubmitter, mpsc::Receiver<JobDescriptor>, LocalReplies) {
    let (tx, rx) = mpsc::channel(capacity);
    let replies = LocalReplies::new();
    let submitter = LocalSubmitter {
        inbound: tx,
        replies: replies.clone(),
    };
    (submitter, rx, replies)
}
