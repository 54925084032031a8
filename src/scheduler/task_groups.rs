use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::domain::ids::{GroupKey, TaskId};
use crate::domain::task::{Task, TaskStatus};
use crate::scheduler::backoff::BackoffStrategy;
use crate::scheduler::collaborators::RescheduleCalculator;
use crate::scheduler::rate_limiter::RateLimiter;
use crate::scheduler::task_scheduler::{ScheduleResult, TaskScheduler};

struct GroupState {
    /// Member task ids in the order they joined the group; iterated in this order each attempt.
    members: Vec<TaskId>,
    backoff_penalty_ms: u64,
    /// Present iff a retry is currently scheduled for this group (invariant G1).
    retry_handle: Option<JoinHandle<()>>,
}

impl GroupState {
    fn empty() -> Self {
        GroupState { members: Vec::new(), backoff_penalty_ms: 0, retry_handle: None }
    }
}

/// Decides *when* to retry placement for each group of fungible pending tasks, applying
/// exponential backoff and a global rate limit. Drives [`TaskScheduler::schedule`] once per
/// member per attempt, stopping at the first `TRY_LATER` to avoid one group starving another.
pub struct TaskGroups {
    inner: Mutex<HashMap<GroupKey, GroupState>>,
    scheduler: Arc<TaskScheduler>,
    rate_limiter: Arc<RateLimiter>,
    backoff: Arc<dyn BackoffStrategy>,
    reschedule_calculator: Arc<dyn RescheduleCalculator>,
    first_schedule_delay: Duration,
}

impl TaskGroups {
    pub fn new(
        scheduler: Arc<TaskScheduler>,
        rate_limiter: Arc<RateLimiter>,
        backoff: Arc<dyn BackoffStrategy>,
        reschedule_calculator: Arc<dyn RescheduleCalculator>,
        first_schedule_delay: Duration,
    ) -> Arc<Self> {
        Arc::new(TaskGroups { inner: Mutex::new(HashMap::new()), scheduler, rate_limiter, backoff, reschedule_calculator, first_schedule_delay })
    }

    /// Event sink for `TaskStateChange.transition(task, from)`.
    pub fn task_changed_state(self: &Arc<Self>, task: &Task, from: Option<TaskStatus>) {
        if task.status == TaskStatus::Pending {
            self.ensure_scheduled(task.group_key(), task.task_id.clone(), self.first_schedule_delay);
        } else if from == Some(TaskStatus::Pending) {
            self.scheduler.forget_task(&task.task_id);
            self.remove_member(&task.group_key(), &task.task_id);
        }
    }

    /// Event sink for `TaskStateChange.initialized(task)` — tasks observed already `Pending` at
    /// startup use the reschedule calculator's startup delay instead of `first_schedule_delay`.
    pub fn task_initialized(self: &Arc<Self>, task: &Task) {
        if task.status == TaskStatus::Pending {
            let delay = Duration::from_millis(self.reschedule_calculator.startup_schedule_delay(task));
            self.ensure_scheduled(task.group_key(), task.task_id.clone(), delay);
        }
    }

    /// Event sink for `TasksDeleted(taskSet)`. Removing the same task twice is a no-op the
    /// second time, satisfying R2.
    pub fn tasks_deleted(&self, tasks: &[Task]) {
        for task in tasks {
            self.scheduler.forget_task(&task.task_id);
            self.remove_member(&task.group_key(), &task.task_id);
        }
    }

    pub fn group_count(&self) -> usize {
        self.inner.lock().expect("poisoned").len()
    }

    pub fn members_of(&self, group_key: &GroupKey) -> Vec<TaskId> {
        self.inner.lock().expect("poisoned").get(group_key).map(|group| group.members.clone()).unwrap_or_default()
    }

    fn ensure_scheduled(self: &Arc<Self>, group_key: GroupKey, task_id: TaskId, delay: Duration) {
        let mut groups = self.inner.lock().expect("poisoned");
        let group = groups.entry(group_key.clone()).or_insert_with(GroupState::empty);
        if !group.members.contains(&task_id) {
            group.members.push(task_id);
        }
        if group.retry_handle.is_none() {
            let this = Arc::clone(self);
            let key_for_timer = group_key;
            group.retry_handle = Some(tokio::spawn(async move {
                tokio::time::sleep(delay).await;
                this.run_attempt(key_for_timer).await;
            }));
        }
    }

    fn remove_member(&self, group_key: &GroupKey, task_id: &TaskId) {
        let mut groups = self.inner.lock().expect("poisoned");
        if let Some(group) = groups.get_mut(group_key) {
            group.members.retain(|id| id != task_id);
        }
    }

    /// Runs one scheduling attempt for `group_key`: acquires a rate-limiter permit, then calls
    /// `TaskScheduler::schedule` for each member in order, stopping at the first `TRY_LATER`.
    /// Reschedules itself per the backoff strategy unless the group emptied out.
    async fn run_attempt(self: Arc<Self>, group_key: GroupKey) {
        // Clearing the retry handle here (before acquiring the rate-limiter permit) is what
        // lets `task_changed_state` schedule a fresh attempt if this one turns out fatal.
        let members = {
            let mut groups = self.inner.lock().expect("poisoned");
            match groups.get_mut(&group_key) {
                Some(group) => {
                    group.retry_handle = None;
                    group.members.clone()
                }
                None => return,
            }
        };

        self.rate_limiter.acquire().await;

        for task_id in &members {
            match self.scheduler.schedule(task_id).await {
                Ok(ScheduleResult::Success) => self.remove_member(&group_key, task_id),
                Ok(ScheduleResult::TryLater) => break,
                Err(err) => {
                    log::error!("scheduling attempt for group {group_key} failed fatally on task {task_id}: {err}");
                    return;
                }
            }
        }

        let mut groups = self.inner.lock().expect("poisoned");
        let Some(group) = groups.get_mut(&group_key) else { return };
        if group.members.is_empty() {
            groups.remove(&group_key);
            return;
        }

        let next_ms = self.backoff.calculate(group.backoff_penalty_ms);
        group.backoff_penalty_ms = next_ms;
        drop(groups);

        self.schedule_retry(group_key, Duration::from_millis(next_ms));
    }

    fn schedule_retry(self: &Arc<Self>, group_key: GroupKey, delay: Duration) {
        let mut groups = self.inner.lock().expect("poisoned");
        let Some(group) = groups.get_mut(&group_key) else { return };
        let this = Arc::clone(self);
        let key_for_timer = group_key;
        group.retry_handle = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            this.run_attempt(key_for_timer).await;
        }));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ids::TaskId;
    use crate::scheduler::backoff::TruncatedBinaryBackoff;
    use crate::scheduler::collaborators::{
        FixedReturnDelay, FixedRescheduleCalculator, InMemoryStatsProvider, InMemoryStorage, NullDriver, NullMaintenanceController,
        NullPreemptor,
    };
    use crate::scheduler::offer_queue::OfferQueue;
    use async_trait::async_trait;

    #[derive(Debug)]
    struct NeverAssign;

    #[async_trait]
    impl crate::scheduler::collaborators::Assigner for NeverAssign {
        async fn maybe_assign(
            &self,
            _offer: &crate::domain::offer::HostOffer,
            _task: &Task,
            _aggregate: &crate::domain::task::AttributeAggregate,
        ) -> std::result::Result<Option<crate::domain::task::TaskInfo>, crate::error::StorageError> {
            Ok(None)
        }
    }

    fn pending_task(id: &str, group: &str) -> Task {
        Task {
            task_id: TaskId::new(id),
            role: "www".to_string(),
            environment: "prod".to_string(),
            job_name: group.to_string(),
            resource_shape: serde_json::json!({"cpus": 1}),
            status: TaskStatus::Pending,
            assigned_slave_id: None,
        }
    }

    fn groups_fixture(storage: Arc<InMemoryStorage>) -> Arc<TaskGroups> {
        let offer_queue = OfferQueue::new(Arc::new(NullDriver), Arc::new(NullMaintenanceController), Arc::new(FixedReturnDelay(Duration::from_secs(60))));
        let stats = InMemoryStatsProvider::new();
        let scheduler =
            TaskScheduler::new(storage, Arc::new(NeverAssign), Arc::new(NullPreemptor), offer_queue, Duration::from_secs(60), &stats);
        TaskGroups::new(
            scheduler,
            Arc::new(RateLimiter::new(100)),
            Arc::new(TruncatedBinaryBackoff::default()),
            Arc::new(FixedRescheduleCalculator { delay_ms: 5 }),
            Duration::from_millis(1),
        )
    }

    #[tokio::test(start_paused = true)]
    async fn first_attempt_fires_at_first_schedule_delay_not_sooner() {
        let storage = Arc::new(InMemoryStorage::new());
        let task = pending_task("a", "frontend");
        storage.insert(task.clone());
        let groups = groups_fixture(storage);

        groups.task_changed_state(&task, Some(TaskStatus::Init));
        assert_eq!(groups.members_of(&task.group_key()).len(), 1);

        tokio::time::advance(Duration::from_micros(500)).await;
        tokio::task::yield_now().await;
        assert_eq!(groups.members_of(&task.group_key()).len(), 1, "must not fire before first_schedule_delay");

        tokio::time::advance(Duration::from_millis(1)).await;
        tokio::task::yield_now().await;
        tokio::task::yield_now().await;
        // The attempt fired; since NeverAssign + no offers, the task stays pending and the
        // group reschedules rather than disposing.
        assert_eq!(groups.members_of(&task.group_key()).len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn deleting_a_task_twice_is_idempotent() {
        let storage = Arc::new(InMemoryStorage::new());
        let task = pending_task("a", "frontend");
        storage.insert(task.clone());
        let groups = groups_fixture(storage);
        groups.task_changed_state(&task, Some(TaskStatus::Init));

        groups.tasks_deleted(&[task.clone()]);
        groups.tasks_deleted(&[task.clone()]);
        assert!(groups.members_of(&task.group_key()).is_empty());
    }
}
