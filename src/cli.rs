use clap::Parser;

use crate::config::SchedulerConfig;

/// Command-line options for the standalone scheduler binary.
///
/// Wires directly into [`SchedulerConfig`]; anything left unset falls back to that struct's
/// `Default` impl.
#[derive(Debug, Parser)]
#[command(name = "offer-scheduler", about = "Matches pending tasks against resource offers")]
pub struct Cli {
    /// Initial delay, in milliseconds, before the first placement attempt for a task group.
    #[arg(long, default_value_t = SchedulerConfig::default().first_schedule_delay_ms)]
    pub first_schedule_delay_ms: u64,

    /// Lifetime, in seconds, of a preemption reservation.
    #[arg(long, default_value_t = SchedulerConfig::default().reservation_duration_secs)]
    pub reservation_duration_secs: u64,

    /// Global placement-attempts-per-second rate limit across all task groups.
    #[arg(long, default_value_t = SchedulerConfig::default().rate_limit_per_sec)]
    pub rate_limit_per_sec: u32,

    /// Base delay, in seconds, before a held offer's decline timer fires.
    #[arg(long, default_value_t = SchedulerConfig::default().return_delay_base_secs)]
    pub return_delay_base_secs: u64,

    /// Upper bound, in milliseconds, of the random jitter added to the return delay.
    #[arg(long, default_value_t = SchedulerConfig::default().return_delay_jitter_ms)]
    pub return_delay_jitter_ms: u64,
}

impl From<Cli> for SchedulerConfig {
    fn from(cli: Cli) -> Self {
        SchedulerConfig {
            first_schedule_delay_ms: cli.first_schedule_delay_ms,
            reservation_duration_secs: cli.reservation_duration_secs,
            rate_limit_per_sec: cli.rate_limit_per_sec,
            return_delay_base_secs: cli.return_delay_base_secs,
            return_delay_jitter_ms: cli.return_delay_jitter_ms,
        }
    }
}
