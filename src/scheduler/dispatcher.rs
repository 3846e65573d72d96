use crate::config::SchedulerConfig;
use crate::error::Result;
use crate::memory::PageAllocator;
use crate::scheduler::job::{Job, JobId, JobOutcome, JobState};
use crate::scheduler::queue::ReadyQueue;
use crate::scheduler::stats::{Statistics, StatsReport};
use crate::scheduler::Tick;
use crate::transport::JobDescriptor;

/// Something that happened during a tick, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TickEvent {
    Admitted {
        job: JobId,
        pages: usize,
        fragmentation: usize,
    },
    Rejected {
        job: JobId,
    },
    /// Record failed validation and was dropped without a reply
    Discarded {
        job: JobId,
    },
    Completed {
        job: JobId,
        end: Tick,
    },
    Preempted {
        job: JobId,
        remaining: Tick,
    },
    Dispatched {
        job: JobId,
    },
}

/// Result of one tick: what happened and which records must go back to
/// their submitters.
#[derive(Debug)]
pub struct TickReport {
    pub tick: Tick,
    pub events: Vec<TickEvent>,
    pub replies: Vec<JobDescriptor>,
}

impl TickReport {
    fn new(tick: Tick) -> Self {
        Self {
            tick,
            events: Vec::new(),
            replies: Vec::new(),
        }
    }

    /// Job placed on the CPU this tick, if any
    pub fn dispatched(&self) -> Option<JobId> {
        self.events.iter().find_map(|e| match e {
            TickEvent::Dispatched { job } => Some(*job),
            _ => None,
        })
    }
}

/// Everything left over once the run ends.
#[derive(Debug)]
pub struct ShutdownFlush {
    /// One Aborted record per job still running or ready, in FIFO order
    pub replies: Vec<JobDescriptor>,
    pub stats: StatsReport,
}

/// Single-CPU round-robin dispatcher and the state it drives.
///
/// All scheduler state lives here and is only mutated through [`tick`](Self::tick)
/// and [`shutdown`](Self::shutdown).
#[derive(Debug)]
pub struct Dispatcher {
    clock: Tick,
    quantum: Tick,
    remaining_quantum: Tick,
    allocator: PageAllocator,
    ready: ReadyQueue,
    running: Option<Job>,
    stats: Statistics,
}

impl Dispatcher {
    pub fn new(config: &SchedulerConfig) -> Result<Self> {
        config.validate()?;
        let allocator = PageAllocator::new(config.memory)?;

        tracing::info!(
            total_memory = allocator.total_memory(),
            page_size = allocator.page_size(),
            pages = allocator.total_pages(),
            quantum = config.quantum,
            "Dispatcher initialized"
        );

        Ok(Self {
            clock: 0,
            quantum: config.quantum,
            remaining_quantum: config.quantum,
            allocator,
            ready: ReadyQueue::new(),
            running: None,
            stats: Statistics::default(),
        })
    }

    /// Advance the clock by one tick.
    ///
    /// Runs admission of `arrival`, wait accounting, execution of the running
    /// job and dispatch, strictly in that order.
    pub fn tick(&mut self, arrival: Option<JobDescriptor>) -> TickReport {
        let mut report = TickReport::new(self.clock);

        if let Some(desc) = arrival {
            self.admit(desc, &mut report);
        }

        self.stats.record_queue_length(self.ready.len());

        self.execute(&mut report);
        self.dispatch(&mut report);

        self.stats.record_tick();
        self.clock += 1;

        #[cfg(debug_assertions)]
        self.check_invariants();

        report
    }

    fn admit(&mut self, desc: JobDescriptor, report: &mut TickReport) {
        if let Err(e) = desc.validate() {
            tracing::warn!(job_id = desc.id, error = %e, "Discarding malformed job record");
            report.events.push(TickEvent::Discarded { job: desc.id });
            return;
        }

        let mut job = Job::from_descriptor(desc);
        job.start_tick = self.clock;

        match self.allocator.allocate(job.memory_needed) {
            Ok(block) => {
                let pages = block.page_count();
                let fragmentation = block.fragmentation();
                tracing::info!(
                    job_id = job.id,
                    arrived = job.start_tick,
                    burst = job.total_burst,
                    pages,
                    addresses = ?self.allocator.addresses(&block),
                    fragmentation,
                    "Job admitted to ready queue"
                );
                job.admit(block);
                report.events.push(TickEvent::Admitted {
                    job: job.id,
                    pages,
                    fragmentation,
                });
                self.ready.enqueue(job);
            }
            Err(e) => {
                tracing::info!(job_id = job.id, error = %e, "Job rejected");
                job.finish(JobOutcome::Rejected);
                report.events.push(TickEvent::Rejected { job: job.id });
                report.replies.push(job.to_descriptor());
            }
        }
    }

    fn execute(&mut self, report: &mut TickReport) {
        let finished = match self.running.as_mut() {
            Some(job) => {
                self.stats.record_active_tick();
                self.remaining_quantum = self.remaining_quantum.saturating_sub(1);
                let finished = job.run_tick();
                tracing::debug!(
                    job_id = job.id,
                    remaining_burst = job.remaining_burst(),
                    remaining_quantum = self.remaining_quantum,
                    "Job ran"
                );
                finished
            }
            None => return,
        };

        if finished {
            if let Some(job) = self.running.take() {
                self.complete(job, report);
            }
            // Reset even though the CPU is now idle; dispatch resets it again.
            self.remaining_quantum = self.quantum;
        } else if self.remaining_quantum == 0 {
            if let Some(mut job) = self.running.take() {
                tracing::debug!(
                    job_id = job.id,
                    remaining = job.remaining_burst(),
                    "Quantum expired, returning job to ready queue"
                );
                report.events.push(TickEvent::Preempted {
                    job: job.id,
                    remaining: job.remaining_burst(),
                });
                job.set_state(JobState::Ready);
                self.ready.enqueue(job);
            }
        }
    }

    fn complete(&mut self, mut job: Job, report: &mut TickReport) {
        let end = self.clock;
        if let Some(block) = job.finish(JobOutcome::Completed { end }) {
            self.allocator.free(block);
        }
        self.stats.record_completion(end - job.start_tick);

        tracing::info!(
            job_id = job.id,
            arrived = job.start_tick,
            ended = end,
            burst = job.total_burst,
            "Job completed, memory returned"
        );
        report.events.push(TickEvent::Completed { job: job.id, end });
        report.replies.push(job.to_descriptor());
    }

    fn dispatch(&mut self, report: &mut TickReport) {
        if self.running.is_some() {
            return;
        }
        if let Some(mut job) = self.ready.dequeue() {
            tracing::debug!(job_id = job.id, "Job started");
            job.set_state(JobState::Running);
            self.remaining_quantum = self.quantum;
            report.events.push(TickEvent::Dispatched { job: job.id });
            self.running = Some(job);
        }
    }

    /// End the run: requeue the running job, then hand back every queued job
    /// as Aborted in FIFO order. Blocks are dropped with the jobs rather than
    /// returned to the pool, which goes away with the dispatcher.
    pub fn shutdown(mut self) -> ShutdownFlush {
        let stats = self.stats.report();

        if let Some(mut job) = self.running.take() {
            job.set_state(JobState::Ready);
            self.ready.enqueue(job);
        }

        let mut replies = Vec::with_capacity(self.ready.len());
        while let Some(mut job) = self.ready.dequeue() {
            job.finish(JobOutcome::Aborted);
            tracing::info!(
                job_id = job.id,
                remaining = job.remaining_burst(),
                "Job aborted by shutdown"
            );
            replies.push(job.to_descriptor());
        }

        ShutdownFlush { replies, stats }
    }

    pub fn clock(&self) -> Tick {
        self.clock
    }

    pub fn quantum(&self) -> Tick {
        self.quantum
    }

    pub fn remaining_quantum(&self) -> Tick {
        self.remaining_quantum
    }

    pub fn running(&self) -> Option<&Job> {
        self.running.as_ref()
    }

    pub fn ready(&self) -> &ReadyQueue {
        &self.ready
    }

    pub fn allocator(&self) -> &PageAllocator {
        &self.allocator
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    /// Pages currently owned by admitted jobs
    pub fn held_pages(&self) -> usize {
        self.running
            .iter()
            .chain(self.ready.iter())
            .filter_map(Job::block)
            .map(|b| b.page_count())
            .sum()
    }

    /// Verify pool conservation and per-job state. Compiled out of release builds.
    pub fn check_invariants(&self) {
        debug_assert_eq!(
            self.allocator.free_pages() + self.held_pages(),
            self.allocator.total_pages(),
            "page pool not conserved at tick {}",
            self.clock
        );
        if let Some(running) = &self.running {
            debug_assert_eq!(running.state(), JobState::Running);
        }
        debug_assert!(self.ready.iter().all(|j| j.state() == JobState::Ready));
        for job in self.running.iter().chain(self.ready.iter()) {
            debug_assert!(job.remaining_burst() > 0, "live job {} has no burst", job.id);
            debug_assert!(job.block().is_some(), "live job {} owns no memory", job.id);
        }
    }
}
