use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::time::Duration;

use crate::domain::ids::{GroupKey, SlaveId, TaskId};
use crate::domain::reservation::Reservation;
use crate::domain::task::{AttributeAggregate, TaskStatus, LAUNCH_FAILED_MSG};
use crate::error::{Result, SchedulerError, StorageError};
use crate::scheduler::collaborators::{Assigner, Preemptor, StatsProvider, Storage, RESERVATIONS_CACHE_SIZE_STAT};
use crate::scheduler::offer_queue::{LaunchOutcome, OfferQueue};

/// Outcome of a single [`TaskScheduler::schedule`] call, as seen by [`crate::scheduler::task_groups::TaskGroups`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleResult {
    /// The task was placed, dropped (no longer pending), or failed to launch and was marked
    /// `Lost` — in every case the caller should stop treating it as outstanding.
    Success,
    /// No offer fit and no preemption slot was found (or was reserved for a later attempt);
    /// the caller should retry this task on the group's next backoff.
    TryLater,
}

/// The placement engine invoked by `TaskGroups` for one task id at a time.
///
/// Owns the reservation cache: a bounded map from task id to `(slave id, expiry)`, consulted by
/// `OfferQueue` on each attempt and purged lazily on access, on consumption, and explicitly via
/// [`TaskScheduler::forget_task`].
pub struct TaskScheduler {
    storage: Arc<dyn Storage>,
    assigner: Arc<dyn Assigner>,
    preemptor: Arc<dyn Preemptor>,
    offer_queue: Arc<OfferQueue>,
    reservation_duration: Duration,
    reservation_cache: Mutex<HashMap<TaskId, Reservation>>,
}

impl TaskScheduler {
    pub fn new(
        storage: Arc<dyn Storage>,
        assigner: Arc<dyn Assigner>,
        preemptor: Arc<dyn Preemptor>,
        offer_queue: Arc<OfferQueue>,
        reservation_duration: Duration,
        stats: &dyn StatsProvider,
    ) -> Arc<Self> {
        let scheduler = Arc::new(TaskScheduler {
            storage,
            assigner,
            preemptor,
            offer_queue,
            reservation_duration,
            reservation_cache: Mutex::new(HashMap::new()),
        });

        let gauge_source = Arc::clone(&scheduler);
        stats.make_gauge(RESERVATIONS_CACHE_SIZE_STAT, Box::new(move || gauge_source.reservation_cache_size() as i64));

        scheduler
    }

    /// Attempts to place `task_id` on one of the currently held offers.
    ///
    /// A transient storage fault anywhere in the attempt (reading the task, building the
    /// aggregate, or inside the assigner's own storage access) is caught here and turned into
    /// `TRY_LATER` rather than propagated, per the error-handling design: the task stays
    /// `Pending` and `TaskGroups` retries it on the group's next backoff. Any other error is
    /// not a scheduling fact about this task and is left to propagate as fatal.
    pub async fn schedule(&self, task_id: &TaskId) -> Result<ScheduleResult> {
        match self.try_schedule(task_id).await {
            Ok(result) => Ok(result),
            Err(SchedulerError::Storage(StorageError::Transient(reason))) => {
                log::warn!("transient storage fault scheduling task {task_id}: {reason}; will retry on next backoff");
                Ok(ScheduleResult::TryLater)
            }
            Err(err) => Err(err),
        }
    }

    async fn try_schedule(&self, task_id: &TaskId) -> Result<ScheduleResult> {
        self.purge_expired(task_id);

        let task = match self.storage.read_task(task_id).await? {
            Some(task) if task.status == TaskStatus::Pending => task,
            // Gone, or no longer pending: nothing left for this attempt to do.
            _ => return Ok(ScheduleResult::Success),
        };

        let aggregate = self.build_aggregate(&task.job_name, &task.group_key()).await?;

        let storage = Arc::clone(&self.storage);
        let assigner = Arc::clone(&self.assigner);
        let task_for_assign = task.clone();
        let aggregate_for_assign = aggregate.clone();
        let outcome = self
            .offer_queue
            .launch_first(task_id, move |offer| {
                let storage = Arc::clone(&storage);
                let assigner = Arc::clone(&assigner);
                let task = task_for_assign.clone();
                let aggregate = aggregate_for_assign.clone();
                async move {
                    let Some(task_info) = assigner.maybe_assign(&offer, &task, &aggregate).await? else {
                        return Ok(None);
                    };
                    storage.assign(&task.task_id, &offer.slave_id).await.map_err(|err| match err {
                        SchedulerError::Storage(storage_err) => storage_err,
                        other => StorageError::Corrupt(other.to_string()),
                    })?;
                    Ok(Some(task_info))
                }
            })
            .await?;

        match outcome {
            LaunchOutcome::Launched { .. } => Ok(ScheduleResult::Success),
            LaunchOutcome::LaunchFailed { .. } => {
                self.storage.mark_lost(task_id, LAUNCH_FAILED_MSG).await?;
                Ok(ScheduleResult::Success)
            }
            LaunchOutcome::NoMatch => {
                if let Some(slave_id) = self.preemptor.find_preemption_slot_for(task_id, &aggregate).await {
                    self.record_reservation(task_id.clone(), slave_id);
                }
                Ok(ScheduleResult::TryLater)
            }
        }
    }

    /// Removes any cached reservation for `task_id`. Called when a task leaves `Pending` for
    /// any reason other than a successful placement, and on explicit deletion.
    pub fn forget_task(&self, task_id: &TaskId) {
        self.reservation_cache.lock().expect("poisoned").remove(task_id);
    }

    pub fn reservation_cache_size(&self) -> usize {
        self.reservation_cache.lock().expect("poisoned").len()
    }

    async fn build_aggregate(&self, job_name: &str, group_key: &GroupKey) -> Result<AttributeAggregate> {
        let running_slaves: Vec<SlaveId> =
            self.storage.pending_tasks(group_key).await?.into_iter().filter_map(|task| task.assigned_slave_id).collect();
        Ok(AttributeAggregate { job_name: job_name.to_string(), slaves_in_use: running_slaves })
    }

    fn record_reservation(&self, task_id: TaskId, slave_id: SlaveId) {
        let reservation = Reservation::new(task_id.clone(), slave_id, self.reservation_duration);
        self.reservation_cache.lock().expect("poisoned").insert(task_id, reservation.clone());
        self.offer_queue.reserve(reservation);
    }

    fn purge_expired(&self, task_id: &TaskId) {
        let mut cache = self.reservation_cache.lock().expect("poisoned");
        if let Some(reservation) = cache.get(task_id) {
            if reservation.is_expired() {
                cache.remove(task_id);
            }
        }
    }
}
