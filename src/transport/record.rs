use crate::error::{Result, SchedError};
use crate::scheduler::{JobId, JobOutcome, Tick};

/// Size of one job record on the wire, identical for submissions and replies
pub const RECORD_SIZE: usize = 64;

/// Maximum bytes of a reply channel name
pub const REPLY_CHANNEL_LEN: usize = 24;

const ID: usize = 0;
const REPLY_CHANNEL: usize = 4;
const TOTAL_BURST: usize = REPLY_CHANNEL + REPLY_CHANNEL_LEN;
const REMAINING_BURST: usize = TOTAL_BURST + 4;
const START_TICK: usize = REMAINING_BURST + 4;
const END_TICK: usize = START_TICK + 4;
const MEMORY_NEEDED: usize = END_TICK + 4;
const BLOCK_REF: usize = MEMORY_NEEDED + 4;

/// Reply channel name for a submitter identity
pub fn reply_channel_name(id: JobId) -> String {
    format!("reply_{}.sock", id)
}

/// Job descriptor exchanged with submitters.
///
/// The wire format also reserves 8 bytes for a memory block reference. It is
/// meaningless outside the scheduler, so it is written as zero and ignored on
/// read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobDescriptor {
    pub id: JobId,
    pub reply_channel: String,
    pub total_burst: Tick,
    pub remaining_burst: Tick,
    pub start_tick: Tick,
    /// -1 rejected, 0 aborted (or not yet finished), >0 completed at
    pub end_tick: i32,
    pub memory_needed: u32,
}

impl JobDescriptor {
    pub fn new(
        id: JobId,
        reply_channel: impl Into<String>,
        burst: Tick,
        memory_needed: u32,
    ) -> Self {
        Self {
            id,
            reply_channel: reply_channel.into(),
            total_burst: burst,
            remaining_burst: burst,
            start_tick: 0,
            end_tick: 0,
            memory_needed,
        }
    }

    /// Descriptor whose reply channel is derived from `id`
    pub fn for_submitter(id: JobId, burst: Tick, memory_needed: u32) -> Self {
        Self::new(id, reply_channel_name(id), burst, memory_needed)
    }

    pub fn outcome(&self) -> Option<JobOutcome> {
        JobOutcome::from_end_tick(self.end_tick)
    }

    /// Ticks between arrival and completion, for completed jobs only
    pub fn turnaround(&self) -> Option<Tick> {
        match self.outcome()? {
            JobOutcome::Completed { end } => Some(end.saturating_sub(self.start_tick)),
            _ => None,
        }
    }

    /// Turnaround minus the ticks actually spent running
    pub fn waiting(&self) -> Option<Tick> {
        self.turnaround().map(|t| t.saturating_sub(self.total_burst))
    }

    /// Check the fields a submitter controls.
    pub fn validate(&self) -> Result<()> {
        if self.reply_channel.is_empty() {
            return Err(SchedError::MalformedRecord(
                "empty reply channel name".to_string(),
            ));
        }
        if self.reply_channel.len() > REPLY_CHANNEL_LEN {
            return Err(SchedError::MalformedRecord(format!(
                "reply channel name longer than {} bytes",
                REPLY_CHANNEL_LEN
            )));
        }
        if self.reply_channel.contains('\0') {
            return Err(SchedError::MalformedRecord(
                "reply channel name contains NUL".to_string(),
            ));
        }
        if self.total_burst == 0 || self.remaining_burst == 0 {
            return Err(SchedError::MalformedRecord(format!(
                "job {} has no burst",
                self.id
            )));
        }
        if self.remaining_burst > self.total_burst {
            return Err(SchedError::MalformedRecord(format!(
                "job {} remaining burst {} exceeds total {}",
                self.id, self.remaining_burst, self.total_burst
            )));
        }
        Ok(())
    }

    pub fn encode(&self) -> Result<[u8; RECORD_SIZE]> {
        let name = self.reply_channel.as_bytes();
        if name.len() > REPLY_CHANNEL_LEN || name.contains(&0) {
            return Err(SchedError::MalformedRecord(format!(
                "reply channel {:?} does not fit the record",
                self.reply_channel
            )));
        }

        let mut buf = [0u8; RECORD_SIZE];
        buf[ID..ID + 4].copy_from_slice(&self.id.to_le_bytes());
        buf[REPLY_CHANNEL..REPLY_CHANNEL + name.len()].copy_from_slice(name);
        buf[TOTAL_BURST..TOTAL_BURST + 4].copy_from_slice(&self.total_burst.to_le_bytes());
        buf[REMAINING_BURST..REMAINING_BURST + 4]
            .copy_from_slice(&self.remaining_burst.to_le_bytes());
        buf[START_TICK..START_TICK + 4].copy_from_slice(&self.start_tick.to_le_bytes());
        buf[END_TICK..END_TICK + 4].copy_from_slice(&self.end_tick.to_le_bytes());
        buf[MEMORY_NEEDED..MEMORY_NEEDED + 4].copy_from_slice(&self.memory_needed.to_le_bytes());
        buf[BLOCK_REF..BLOCK_REF + 8].copy_from_slice(&0u64.to_le_bytes());
        Ok(buf)
    }

    /// Structural decode only; submissions still need [`validate`](Self::validate).
    pub fn decode(buf: &[u8; RECORD_SIZE]) -> Result<Self> {
        let raw_name = &buf[REPLY_CHANNEL..REPLY_CHANNEL + REPLY_CHANNEL_LEN];
        let name_len = raw_name
            .iter()
            .position(|&b| b == 0)
            .unwrap_or(REPLY_CHANNEL_LEN);
        let reply_channel = std::str::from_utf8(&raw_name[..name_len])
            .map_err(|e| SchedError::MalformedRecord(format!("reply channel not UTF-8: {}", e)))?
            .to_string();

        Ok(Self {
            id: read_u32(buf, ID),
            reply_channel,
            total_burst: read_u32(buf, TOTAL_BURST),
            remaining_burst: read_u32(buf, REMAINING_BURST),
            start_tick: read_u32(buf, START_TICK),
            end_tick: read_u32(buf, END_TICK) as i32,
            memory_needed: read_u32(buf, MEMORY_NEEDED),
        })
    }
}

fn read_u32(buf: &[u8; RECORD_SIZE], at: usize) -> u32 {
    let mut bytes = [0u8; 4];
    bytes.copy_from_slice(&buf[at..at + 4]);
    u32::from_le_bytes(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn layout_fits_record() {
        assert!(BLOCK_REF + 8 <= RECORD_SIZE);
    }

    #[test]
    fn encode_decode_preserves_fields() {
        let mut desc = JobDescriptor::for_submitter(4242, 10, 100);
        desc.remaining_burst = 6;
        desc.start_tick = 3;
        desc.end_tick = -1;

        let buf = desc.encode().unwrap();
        assert_eq!(JobDescriptor::decode(&buf).unwrap(), desc);
    }

    #[test]
    fn block_reference_is_zeroed_and_ignored() {
        let desc = JobDescriptor::for_submitter(1, 5, 64);
        let mut buf = desc.encode().unwrap();
        assert!(buf[BLOCK_REF..].iter().all(|&b| b == 0));

        buf[BLOCK_REF..BLOCK_REF + 8].copy_from_slice(&0xdead_beef_u64.to_le_bytes());
        assert_eq!(JobDescriptor::decode(&buf).unwrap(), desc);
    }

    #[test]
    fn encode_rejects_long_channel_name() {
        let desc = JobDescriptor::new(1, "x".repeat(REPLY_CHANNEL_LEN + 1), 5, 64);
        assert!(matches!(desc.encode(), Err(SchedError::MalformedRecord(_))));
    }

    #[test]
    fn encode_rejects_nul_in_channel_name() {
        let desc = JobDescriptor::new(1, "reply\0_1.sock", 5, 64);
        assert!(matches!(desc.encode(), Err(SchedError::MalformedRecord(_))));
        assert!(desc.validate().is_err());
    }

    #[test]
    fn channel_name_may_fill_the_field() {
        let desc = JobDescriptor::new(1, "y".repeat(REPLY_CHANNEL_LEN), 5, 64);
        let buf = desc.encode().unwrap();
        let decoded = JobDescriptor::decode(&buf).unwrap();
        assert_eq!(decoded.reply_channel.len(), REPLY_CHANNEL_LEN);
    }

    #[test]
    fn zero_burst_submission_fails_validation() {
        let mut buf = JobDescriptor::for_submitter(7, 5, 64).encode().unwrap();
        buf[TOTAL_BURST..TOTAL_BURST + 4].copy_from_slice(&0u32.to_le_bytes());
        let desc = JobDescriptor::decode(&buf).unwrap();
        assert!(matches!(
            desc.validate(),
            Err(SchedError::MalformedRecord(_))
        ));
    }

    #[test]
    fn remaining_above_total_fails_validation() {
        let mut desc = JobDescriptor::for_submitter(7, 5, 64);
        desc.remaining_burst = 9;
        assert!(desc.validate().is_err());
    }

    #[test]
    fn completed_reply_decodes_with_zero_remaining() {
        let mut desc = JobDescriptor::for_submitter(7, 5, 64);
        desc.remaining_burst = 0;
        desc.end_tick = 9;
        let decoded = JobDescriptor::decode(&desc.encode().unwrap()).unwrap();
        assert_eq!(decoded.remaining_burst, 0);
        assert_eq!(decoded.outcome(), Some(JobOutcome::Completed { end: 9 }));
    }

    #[test]
    fn decode_rejects_invalid_utf8_name() {
        let mut buf = JobDescriptor::for_submitter(7, 5, 64).encode().unwrap();
        buf[REPLY_CHANNEL] = 0xff;
        assert!(JobDescriptor::decode(&buf).is_err());
    }

    #[test]
    fn outcome_from_end_tick() {
        let mut desc = JobDescriptor::for_submitter(1, 4, 10);
        desc.start_tick = 2;

        desc.end_tick = -1;
        assert_eq!(desc.outcome(), Some(JobOutcome::Rejected));
        assert_eq!(desc.turnaround(), None);

        desc.end_tick = 0;
        assert_eq!(desc.outcome(), Some(JobOutcome::Aborted));

        desc.end_tick = 12;
        assert_eq!(desc.outcome(), Some(JobOutcome::Completed { end: 12 }));
        assert_eq!(desc.turnaround(), Some(10));
        assert_eq!(desc.waiting(), Some(6));

        desc.end_tick = -7;
        assert_eq!(desc.outcome(), None);
    }

    #[test]
    fn reply_channel_derived_from_identity() {
        assert_eq!(reply_channel_name(123), "reply_123.sock");
        assert_eq!(
            JobDescriptor::for_submitter(123, 1, 1).reply_channel,
            "reply_123.sock"
        );
    }
}
