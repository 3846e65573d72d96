use crate::memory::MemoryBlock;
use crate::scheduler::Tick;
use crate::transport::JobDescriptor;

pub type JobId = u32;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    /// Received from a submitter, admission not yet decided
    Submitted,
    Ready,
    Running,
    Completed,
    Rejected,
    Aborted,
}

impl std::fmt::Display for JobState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JobState::Submitted => write!(f, "submitted"),
            JobState::Ready => write!(f, "ready"),
            JobState::Running => write!(f, "running"),
            JobState::Completed => write!(f, "completed"),
            JobState::Rejected => write!(f, "rejected"),
            JobState::Aborted => write!(f, "aborted"),
        }
    }
}

/// Terminal result of a job as carried in the reply's end tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobOutcome {
    /// Not enough free pages at admission (end tick -1)
    Rejected,
    /// Still queued or running when the server shut down (end tick 0)
    Aborted,
    /// Finished normally at the given tick (always > 0)
    Completed { end: Tick },
}

impl JobOutcome {
    pub const REJECTED_END_TICK: i32 = -1;
    pub const ABORTED_END_TICK: i32 = 0;

    /// Signed end tick as carried on the wire. Completion ticks saturate at
    /// `i32::MAX`; a validated run never gets that far.
    pub fn end_tick(self) -> i32 {
        match self {
            JobOutcome::Rejected => Self::REJECTED_END_TICK,
            JobOutcome::Aborted => Self::ABORTED_END_TICK,
            JobOutcome::Completed { end } => i32::try_from(end).unwrap_or(i32::MAX),
        }
    }

    /// Decode a reply end tick. Values below -1 carry no meaning.
    pub fn from_end_tick(end_tick: i32) -> Option<Self> {
        match end_tick {
            Self::REJECTED_END_TICK => Some(JobOutcome::Rejected),
            Self::ABORTED_END_TICK => Some(JobOutcome::Aborted),
            end if end > 0 => Some(JobOutcome::Completed { end: end as Tick }),
            _ => None,
        }
    }
}

/// Process control block for one simulated job.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    pub reply_channel: String,
    pub total_burst: Tick,
    pub start_tick: Tick,
    pub memory_needed: usize,
    remaining_burst: Tick,
    outcome: Option<JobOutcome>,
    block: Option<MemoryBlock>,
    state: JobState,
}

impl Job {
    pub fn new(
        id: JobId,
        reply_channel: impl Into<String>,
        burst: Tick,
        memory_needed: usize,
    ) -> Self {
        Self {
            id,
            reply_channel: reply_channel.into(),
            total_burst: burst,
            start_tick: 0,
            memory_needed,
            remaining_burst: burst,
            outcome: None,
            block: None,
            state: JobState::Submitted,
        }
    }

    /// Rebuild a job from a received record. The block reference on the wire is
    /// meaningless here and never consulted.
    pub fn from_descriptor(desc: JobDescriptor) -> Self {
        Self {
            id: desc.id,
            reply_channel: desc.reply_channel,
            total_burst: desc.total_burst,
            start_tick: desc.start_tick,
            memory_needed: desc.memory_needed as usize,
            remaining_burst: desc.remaining_burst,
            outcome: None,
            block: None,
            state: JobState::Submitted,
        }
    }

    /// Snapshot suitable for sending back to the submitter
    pub fn to_descriptor(&self) -> JobDescriptor {
        JobDescriptor {
            id: self.id,
            reply_channel: self.reply_channel.clone(),
            total_burst: self.total_burst,
            remaining_burst: self.remaining_burst,
            start_tick: self.start_tick,
            end_tick: self
                .outcome
                .map(JobOutcome::end_tick)
                .unwrap_or(JobOutcome::ABORTED_END_TICK),
            memory_needed: self.memory_needed as u32,
        }
    }

    pub fn remaining_burst(&self) -> Tick {
        self.remaining_burst
    }

    pub fn state(&self) -> JobState {
        self.state
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        self.outcome
    }

    pub fn block(&self) -> Option<&MemoryBlock> {
        self.block.as_ref()
    }

    pub fn turnaround(&self) -> Option<Tick> {
        match self.outcome {
            Some(JobOutcome::Completed { end }) => Some(end - self.start_tick),
            _ => None,
        }
    }

    pub(crate) fn admit(&mut self, block: MemoryBlock) {
        debug_assert!(self.block.is_none(), "job {} admitted twice", self.id);
        self.block = Some(block);
        self.state = JobState::Ready;
    }

    pub(crate) fn set_state(&mut self, state: JobState) {
        self.state = state;
    }

    /// Consume one tick of burst. Returns true once the burst is exhausted.
    pub(crate) fn run_tick(&mut self) -> bool {
        debug_assert!(self.remaining_burst > 0, "job {} ran with no burst left", self.id);
        self.remaining_burst = self.remaining_burst.saturating_sub(1);
        self.remaining_burst == 0
    }

    /// Stamp a terminal outcome and release ownership of the memory block.
    pub(crate) fn finish(&mut self, outcome: JobOutcome) -> Option<MemoryBlock> {
        debug_assert!(self.outcome.is_none(), "job {} finished twice", self.id);
        self.outcome = Some(outcome);
        self.state = match outcome {
            JobOutcome::Rejected => JobState::Rejected,
            JobOutcome::Aborted => JobState::Aborted,
            JobOutcome::Completed { .. } => JobState::Completed,
        };
        self.block.take()
    }
}
