pub mod cli;
pub mod config;
pub mod domain;
pub mod error;
pub mod logger;
pub mod scheduler;

use std::sync::Arc;

use config::SchedulerConfig;
use domain::ids::TaskId;
use scheduler::backoff::TruncatedBinaryBackoff;
use scheduler::collaborators::{
    Assigner, Driver, InMemoryStatsProvider, MaintenanceController, Preemptor, RescheduleCalculator, ReturnDelayProvider, Storage,
};
use scheduler::events::EventDispatcher;
use scheduler::offer_queue::OfferQueue;
use scheduler::rate_limiter::RateLimiter;
use scheduler::task_groups::TaskGroups;
use scheduler::task_scheduler::TaskScheduler;

/// The three core components wired together, plus the event dispatcher that feeds them.
///
/// Construction takes the collaborators as trait objects so a caller can substitute a real
/// resource-manager driver, storage engine, etc. without touching this crate.
pub struct Scheduler {
    pub offer_queue: Arc<OfferQueue>,
    pub task_groups: Arc<TaskGroups>,
    pub task_scheduler: Arc<TaskScheduler>,
    pub events: EventDispatcher,
}

impl Scheduler {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: &SchedulerConfig,
        storage: Arc<dyn Storage>,
        driver: Arc<dyn Driver>,
        maintenance: Arc<dyn MaintenanceController>,
        assigner: Arc<dyn Assigner>,
        preemptor: Arc<dyn Preemptor>,
        reschedule_calculator: Arc<dyn RescheduleCalculator>,
        return_delay: Arc<dyn ReturnDelayProvider>,
    ) -> Self {
        let stats = InMemoryStatsProvider::new();
        let offer_queue = OfferQueue::new(driver, maintenance, return_delay);
        let task_scheduler = TaskScheduler::new(
            storage,
            assigner,
            preemptor,
            Arc::clone(&offer_queue),
            std::time::Duration::from_secs(config.reservation_duration_secs),
            &stats,
        );
        let task_groups = TaskGroups::new(
            Arc::clone(&task_scheduler),
            Arc::new(RateLimiter::new(config.rate_limit_per_sec)),
            Arc::new(TruncatedBinaryBackoff::default()),
            reschedule_calculator,
            std::time::Duration::from_millis(config.first_schedule_delay_ms),
        );
        let events = EventDispatcher::spawn(Arc::clone(&task_groups), Arc::clone(&offer_queue));

        Scheduler { offer_queue, task_groups, task_scheduler, events }
    }

    /// Number of reservations currently cached, as surfaced by the `RESERVATIONS_CACHE_SIZE_STAT`
    /// gauge.
    pub fn reservation_cache_size(&self) -> usize {
        self.task_scheduler.reservation_cache_size()
    }

    /// Attempts an out-of-band placement for `task_id` without waiting for the group's next
    /// scheduled attempt; used by callers that want a synchronous answer (e.g. a CLI probe).
    pub async fn schedule_now(&self, task_id: &TaskId) -> error::Result<scheduler::task_scheduler::ScheduleResult> {
        self.task_scheduler.schedule(task_id).await
    }
}
