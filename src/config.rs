use serde::{Deserialize, Serialize};

/// Tunables for [`crate::scheduler::task_groups::TaskGroups`] and
/// [`crate::scheduler::task_scheduler::TaskScheduler`].
///
/// Defaults match the literal values used throughout the spec's worked scenarios.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Delay before the first placement attempt for a freshly pending task group.
    pub first_schedule_delay_ms: u64,

    /// How long a preemption reservation stays valid once recorded.
    pub reservation_duration_secs: u64,

    /// Global attempts/sec across all task groups.
    pub rate_limit_per_sec: u32,

    /// Base decline-timer delay for a held offer before jitter is added.
    pub return_delay_base_secs: u64,

    /// Upper bound, in milliseconds, of the random jitter added on top of `return_delay_base_secs`.
    pub return_delay_jitter_ms: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        SchedulerConfig {
            first_schedule_delay_ms: 1,
            reservation_duration_secs: 60,
            rate_limit_per_sec: 100,
            return_delay_base_secs: 5,
            return_delay_jitter_ms: 1_000,
        }
    }
}
