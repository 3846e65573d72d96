use std::collections::VecDeque;

use crate::scheduler::job::{Job, JobId};

/// FIFO of admitted jobs waiting for the CPU.
///
/// Only the dispatcher touches it, so there is no locking. Preempted jobs
/// rejoin at the tail with their remaining burst intact.
#[derive(Debug, Default)]
pub struct ReadyQueue {
    jobs: VecDeque<Job>,
}

impl ReadyQueue {
    /// Empty queue
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a job at the tail
    pub fn enqueue(&mut self, job: Job) {
        self.jobs.push_back(job);
    }

    /// Take the job at the head, if any
    pub fn dequeue(&mut self) -> Option<Job> {
        self.jobs.pop_front()
    }

    /// Number of jobs waiting
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    /// True when no job is waiting
    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// Job ids from head to tail
    pub fn ids(&self) -> Vec<JobId> {
        self.jobs.iter().map(|j| j.id).collect()
    }

    /// Waiting jobs from head to tail
    pub fn iter(&self) -> impl Iterator<Item = &Job> {
        self.jobs.iter()
    }
}
