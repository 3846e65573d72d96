use serde::Serialize;

use crate::scheduler::Tick;

/// Raw counters accumulated tick by tick.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Statistics {
    pub elapsed_ticks: u64,
    pub active_ticks: u64,
    /// Sum of the ready-queue length sampled once per tick
    pub queue_length_integral: u64,
    pub turnaround_total: u64,
    pub completed: u64,
}

impl Statistics {
    pub fn record_tick(&mut self) {
        self.elapsed_ticks += 1;
    }

    pub fn record_active_tick(&mut self) {
        self.active_ticks += 1;
    }

    pub fn record_queue_length(&mut self, len: usize) {
        self.queue_length_integral += len as u64;
    }

    pub fn record_completion(&mut self, turnaround: Tick) {
        self.turnaround_total += u64::from(turnaround);
        self.completed += 1;
    }

    pub fn report(&self) -> StatsReport {
        let utilization = if self.elapsed_ticks > 0 {
            self.active_ticks as f64 / self.elapsed_ticks as f64
        } else {
            0.0
        };
        let (average_turnaround, average_wait) = if self.completed > 0 {
            (
                self.turnaround_total as f64 / self.completed as f64,
                self.queue_length_integral as f64 / self.completed as f64,
            )
        } else {
            (0.0, 0.0)
        };

        StatsReport {
            elapsed_ticks: self.elapsed_ticks,
            active_ticks: self.active_ticks,
            completed: self.completed,
            utilization,
            average_turnaround,
            average_wait,
        }
    }
}

/// Figures derived at shutdown. Report-only.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatsReport {
    pub elapsed_ticks: u64,
    pub active_ticks: u64,
    pub completed: u64,
    pub utilization: f64,
    pub average_turnaround: f64,
    /// Queue-length integral over completed jobs, not a per-job wait
    pub average_wait: f64,
}
