use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use offer_scheduler::domain::ids::{HostId, OfferId, SlaveId, TaskId};
use offer_scheduler::domain::offer::{HostOffer, MaintenanceMode};
use offer_scheduler::domain::task::{AttributeAggregate, Task, TaskInfo, TaskStatus};
use offer_scheduler::error::{DriverError, StorageError};
use offer_scheduler::scheduler::collaborators::{Assigner, Driver, MaintenanceController, Preemptor};

pub fn pending_task(id: &str, role: &str, job: &str) -> Task {
    Task {
        task_id: TaskId::new(id),
        role: role.to_string(),
        environment: "prod".to_string(),
        job_name: job.to_string(),
        resource_shape: serde_json::json!({"cpus": 1}),
        status: TaskStatus::Pending,
        assigned_slave_id: None,
    }
}

/// Records every `launch_task`/`decline_offer` call it sees, and can be told to fail every
/// launch (used by the `DriverNotReady` scenario).
#[derive(Debug, Default)]
pub struct RecordingDriver {
    pub launched: Mutex<Vec<(OfferId, TaskId)>>,
    pub declined: Mutex<Vec<OfferId>>,
    pub fail_launches: bool,
}

impl RecordingDriver {
    pub fn new() -> Arc<Self> {
        Arc::new(RecordingDriver::default())
    }

    pub fn failing() -> Arc<Self> {
        Arc::new(RecordingDriver { fail_launches: true, ..Default::default() })
    }

    pub fn launched_offer_ids(&self) -> Vec<OfferId> {
        self.launched.lock().expect("poisoned").iter().map(|(offer_id, _)| offer_id.clone()).collect()
    }

    pub fn declined_offer_ids(&self) -> Vec<OfferId> {
        self.declined.lock().expect("poisoned").clone()
    }
}

#[async_trait]
impl Driver for RecordingDriver {
    async fn launch_task(&self, offer_id: &OfferId, task_info: &TaskInfo) -> Result<(), DriverError> {
        if self.fail_launches {
            return Err(DriverError::NotReady);
        }
        self.launched.lock().expect("poisoned").push((offer_id.clone(), task_info.task_id.clone()));
        Ok(())
    }

    async fn decline_offer(&self, offer_id: &OfferId) {
        self.declined.lock().expect("poisoned").push(offer_id.clone());
    }
}

/// Reports a fixed maintenance mode per host, settable at runtime for the "changing
/// maintenance" scenario.
#[derive(Debug, Default)]
pub struct MapMaintenanceController {
    modes: Mutex<std::collections::HashMap<HostId, MaintenanceMode>>,
}

impl MapMaintenanceController {
    pub fn new() -> Arc<Self> {
        Arc::new(MapMaintenanceController::default())
    }

    pub fn set(&self, host_id: HostId, mode: MaintenanceMode) {
        self.modes.lock().expect("poisoned").insert(host_id, mode);
    }
}

#[async_trait]
impl MaintenanceController for MapMaintenanceController {
    async fn get_mode(&self, host_id: &HostId) -> MaintenanceMode {
        self.modes.lock().expect("poisoned").get(host_id).copied().unwrap_or(MaintenanceMode::None)
    }
}

/// Assigns a task to an offer only if its offer id is in the accept set (or the assigner was
/// built with `accept_all`). Also records every offer id it was asked about, in order, so tests
/// can assert on `OfferQueue`'s visiting order.
#[derive(Debug, Default)]
pub struct ScriptedAssigner {
    accept: Mutex<std::collections::HashSet<OfferId>>,
    accept_all: bool,
    visits: Mutex<Vec<OfferId>>,
}

impl ScriptedAssigner {
    pub fn new() -> Arc<Self> {
        Arc::new(ScriptedAssigner::default())
    }

    pub fn accept_all() -> Arc<Self> {
        Arc::new(ScriptedAssigner { accept_all: true, ..Default::default() })
    }

    pub fn accept(&self, offer_id: OfferId) {
        self.accept.lock().expect("poisoned").insert(offer_id);
    }

    pub fn visited(&self) -> Vec<OfferId> {
        self.visits.lock().expect("poisoned").clone()
    }

    pub fn clear_visits(&self) {
        self.visits.lock().expect("poisoned").clear();
    }
}

#[async_trait]
impl Assigner for ScriptedAssigner {
    async fn maybe_assign(
        &self,
        offer: &HostOffer,
        task: &Task,
        _aggregate: &AttributeAggregate,
    ) -> Result<Option<TaskInfo>, StorageError> {
        self.visits.lock().expect("poisoned").push(offer.offer_id.clone());
        let matches = self.accept_all || self.accept.lock().expect("poisoned").contains(&offer.offer_id);
        if matches {
            Ok(Some(TaskInfo {
                task_id: task.task_id.clone(),
                offer_id: offer.offer_id.clone(),
                slave_id: offer.slave_id.clone(),
                assigned_resources: offer.resources.clone(),
            }))
        } else {
            Ok(None)
        }
    }
}

#[derive(Debug, Default)]
pub struct NeverPreempt;

#[async_trait]
impl Preemptor for NeverPreempt {
    async fn find_preemption_slot_for(&self, _task_id: &TaskId, _aggregate: &AttributeAggregate) -> Option<SlaveId> {
        None
    }
}

/// Reports a transient storage fault on every call and counts how many times it was asked, so
/// tests can confirm a group keeps retrying through repeated transient faults instead of
/// getting stuck.
#[derive(Debug, Default)]
pub struct FlakyAssigner {
    calls: Mutex<u32>,
}

impl FlakyAssigner {
    pub fn new() -> Arc<Self> {
        Arc::new(FlakyAssigner::default())
    }

    pub fn call_count(&self) -> u32 {
        *self.calls.lock().expect("poisoned")
    }
}

#[async_trait]
impl Assigner for FlakyAssigner {
    async fn maybe_assign(&self, _offer: &HostOffer, _task: &Task, _aggregate: &AttributeAggregate) -> Result<Option<TaskInfo>, StorageError> {
        *self.calls.lock().expect("poisoned") += 1;
        Err(StorageError::Transient("backing store hiccup".to_string()))
    }
}
