use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::ids::{HostId, SlaveId, TaskId};
use crate::domain::offer::MaintenanceMode;
use crate::domain::task::{AttributeAggregate, Task, TaskInfo, TaskStatus};
use crate::error::{DriverError, Result, StorageError};

/// Everything `TaskScheduler` and `TaskGroups` need from the mutative, transactional task
/// store. A real implementation would open one write transaction per `read`/`write` pair to
/// avoid TOCTOU on task status, as called out in the concurrency design.
#[async_trait]
pub trait Storage: std::fmt::Debug + Send + Sync {
    async fn read_task(&self, task_id: &TaskId) -> Result<Option<Task>>;

    async fn pending_tasks(&self, group_key: &crate::domain::ids::GroupKey) -> Result<Vec<Task>>;

    /// Transitions `task_id` from `Pending` to `Assigned`, persisting the slave assignment in
    /// the same write. Returns an error if the task is no longer `Pending`.
    async fn assign(&self, task_id: &TaskId, slave_id: &SlaveId) -> Result<()>;

    /// Transitions `task_id` to `Lost` with a human-readable reason.
    async fn mark_lost(&self, task_id: &TaskId, reason: &str) -> Result<()>;
}

/// Launch/decline RPCs against the resource-manager driver.
#[async_trait]
pub trait Driver: std::fmt::Debug + Send + Sync {
    async fn launch_task(&self, offer_id: &crate::domain::ids::OfferId, task_info: &TaskInfo) -> std::result::Result<(), DriverError>;

    async fn decline_offer(&self, offer_id: &crate::domain::ids::OfferId);
}

/// Per-host maintenance mode lookup.
#[async_trait]
pub trait MaintenanceController: std::fmt::Debug + Send + Sync {
    async fn get_mode(&self, host_id: &HostId) -> MaintenanceMode;
}

/// Pure function (offer, task, aggregate) -> option<launch plan>, combining resource fit and
/// constraint evaluation. May report a transient storage fault, which callers treat as
/// `TRY_LATER` rather than fatal.
#[async_trait]
pub trait Assigner: std::fmt::Debug + Send + Sync {
    async fn maybe_assign(
        &self,
        offer: &crate::domain::offer::HostOffer,
        task: &Task,
        aggregate: &AttributeAggregate,
    ) -> std::result::Result<Option<TaskInfo>, StorageError>;
}

/// Victim-selection policy: identifies a running task that could be killed to make room for a
/// pending one, returning the host where that room would appear.
#[async_trait]
pub trait Preemptor: std::fmt::Debug + Send + Sync {
    async fn find_preemption_slot_for(&self, task_id: &TaskId, aggregate: &AttributeAggregate) -> Option<SlaveId>;
}

/// Startup delay policy for tasks observed already `Pending` when the process starts.
pub trait RescheduleCalculator: std::fmt::Debug + Send + Sync {
    fn startup_schedule_delay(&self, task: &Task) -> u64;
}

/// Supplies the decline-timer delay for a freshly admitted offer, queried once per offer (not
/// once globally) so an implementation can add jitter and avoid every held offer expiring in
/// the same instant.
pub trait ReturnDelayProvider: std::fmt::Debug + Send + Sync {
    fn return_delay(&self) -> Duration;
}

/// Jittered `ReturnDelayProvider`: `base` plus a uniformly random amount up to `jitter`.
#[derive(Debug, Clone, Copy)]
pub struct JitteredReturnDelay {
    pub base: Duration,
    pub jitter: Duration,
}

impl JitteredReturnDelay {
    pub fn new(base: Duration, jitter: Duration) -> Self {
        JitteredReturnDelay { base, jitter }
    }
}

impl ReturnDelayProvider for JitteredReturnDelay {
    fn return_delay(&self) -> Duration {
        if self.jitter.is_zero() {
            return self.base;
        }
        let extra = rand::random::<f64>() * self.jitter.as_secs_f64();
        self.base + Duration::from_secs_f64(extra)
    }
}

/// Name of the gauge registered for the reservation cache's current size.
pub const RESERVATIONS_CACHE_SIZE_STAT: &str = "reservations_cache_size";

/// Minimal metrics seam: a named gauge whose value is read on demand from a supplier closure.
/// No external metrics backend is wired up here (out of scope), but the registration call
/// itself is part of this core.
pub trait Gauge: std::fmt::Debug + Send + Sync {
    fn value(&self) -> i64;
}

pub trait StatsProvider: std::fmt::Debug + Send + Sync {
    fn make_gauge(&self, name: &str, supplier: Box<dyn Fn() -> i64 + Send + Sync>);
}

/// In-memory `Storage` test double: a `Mutex`-guarded `HashMap` keyed by task id, in the same
/// "single lock over one map" shape as the rest of this crate's internal stores.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    tasks: Mutex<HashMap<TaskId, Task>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        InMemoryStorage::default()
    }

    pub fn insert(&self, task: Task) {
        self.tasks.lock().expect("poisoned").insert(task.task_id.clone(), task);
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn read_task(&self, task_id: &TaskId) -> Result<Option<Task>> {
        Ok(self.tasks.lock().expect("poisoned").get(task_id).cloned())
    }

    async fn pending_tasks(&self, group_key: &crate::domain::ids::GroupKey) -> Result<Vec<Task>> {
        let guard = self.tasks.lock().expect("poisoned");
        let mut tasks: Vec<Task> = guard
            .values()
            .filter(|task| task.status == TaskStatus::Pending && &task.group_key() == group_key)
            .cloned()
            .collect();
        tasks.sort_by(|a, b| a.task_id.as_str().cmp(b.task_id.as_str()));
        Ok(tasks)
    }

    async fn assign(&self, task_id: &TaskId, slave_id: &SlaveId) -> Result<()> {
        let mut guard = self.tasks.lock().expect("poisoned");
        let task = guard.get_mut(task_id).ok_or_else(|| StorageError::Corrupt(format!("no such task {task_id}")))?;
        if task.status != TaskStatus::Pending {
            return Err(StorageError::Corrupt(format!("task {task_id} is not pending")).into());
        }
        task.status = TaskStatus::Assigned;
        task.assigned_slave_id = Some(slave_id.clone());
        Ok(())
    }

    async fn mark_lost(&self, task_id: &TaskId, reason: &str) -> Result<()> {
        let mut guard = self.tasks.lock().expect("poisoned");
        if let Some(task) = guard.get_mut(task_id) {
            task.status = TaskStatus::Lost;
            log::warn!("task {task_id} marked LOST: {reason}");
        }
        Ok(())
    }
}

/// Null-object `Driver`: logs and succeeds every launch, matching the teacher's
/// trait-plus-null-implementation idiom for collaborators this crate does not own.
#[derive(Debug, Default)]
pub struct NullDriver;

#[async_trait]
impl Driver for NullDriver {
    async fn launch_task(&self, offer_id: &crate::domain::ids::OfferId, task_info: &TaskInfo) -> std::result::Result<(), DriverError> {
        log::info!("launching task {} on offer {offer_id}", task_info.task_id);
        Ok(())
    }

    async fn decline_offer(&self, offer_id: &crate::domain::ids::OfferId) {
        log::info!("declining offer {offer_id}");
    }
}

/// `MaintenanceController` double that reports every host as `None` (no maintenance).
#[derive(Debug, Default)]
pub struct NullMaintenanceController;

#[async_trait]
impl MaintenanceController for NullMaintenanceController {
    async fn get_mode(&self, _host_id: &HostId) -> MaintenanceMode {
        MaintenanceMode::None
    }
}

/// `Preemptor` double that never finds a preemption slot.
#[derive(Debug, Default)]
pub struct NullPreemptor;

#[async_trait]
impl Preemptor for NullPreemptor {
    async fn find_preemption_slot_for(&self, _task_id: &TaskId, _aggregate: &AttributeAggregate) -> Option<SlaveId> {
        None
    }
}

/// `RescheduleCalculator` double returning a fixed delay for every startup-observed task.
#[derive(Debug, Clone, Copy)]
pub struct FixedRescheduleCalculator {
    pub delay_ms: u64,
}

impl RescheduleCalculator for FixedRescheduleCalculator {
    fn startup_schedule_delay(&self, _task: &Task) -> u64 {
        self.delay_ms
    }
}

/// `ReturnDelayProvider` double that always answers the same fixed delay; used by tests that
/// need deterministic decline timers.
#[derive(Debug, Clone, Copy)]
pub struct FixedReturnDelay(pub Duration);

impl ReturnDelayProvider for FixedReturnDelay {
    fn return_delay(&self) -> Duration {
        self.0
    }
}

/// In-memory `StatsProvider`: stores the supplier closures and exposes their current value via
/// [`InMemoryStatsProvider::get`]; no export to an external metrics backend.
#[derive(Default)]
pub struct InMemoryStatsProvider {
    gauges: Mutex<HashMap<String, Box<dyn Fn() -> i64 + Send + Sync>>>,
}

impl std::fmt::Debug for InMemoryStatsProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStatsProvider").finish_non_exhaustive()
    }
}

impl InMemoryStatsProvider {
    pub fn new() -> Self {
        InMemoryStatsProvider::default()
    }

    pub fn get(&self, name: &str) -> Option<i64> {
        self.gauges.lock().expect("poisoned").get(name).map(|supplier| supplier())
    }
}

impl StatsProvider for InMemoryStatsProvider {
    fn make_gauge(&self, name: &str, supplier: Box<dyn Fn() -> i64 + Send + Sync>) {
        self.gauges.lock().expect("poisoned").insert(name.to_string(), supplier);
    }
}
