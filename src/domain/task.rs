use serde::{Deserialize, Serialize};

use crate::domain::ids::{GroupKey, OfferId, SlaveId, TaskId};

/// The subset of a task's lifecycle this core observes and drives.
///
/// ```text
/// Init ──► Pending ──► Assigned ──► (external) Running/Finished/Killed
///               │
///               └──► Lost  (on launch failure)
/// ```
/// Only `Pending -> Assigned` and `Pending -> Lost` transitions are made by this crate;
/// every other transition is driven by the external systems that own task execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TaskStatus {
    Init,
    Pending,
    Assigned,
    Running,
    Finished,
    Lost,
    Killed,
}

/// A pending (or formerly pending) task as read from [`crate::scheduler::collaborators::Storage`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub task_id: TaskId,
    pub role: String,
    pub environment: String,
    pub job_name: String,
    /// Opaque resource request + constraint shape, compared by the assigner.
    pub resource_shape: serde_json::Value,
    pub status: TaskStatus,
    pub assigned_slave_id: Option<SlaveId>,
}

impl Task {
    /// Derives the [`GroupKey`] this task belongs to: tasks that are fungible for scheduling
    /// purposes share a role/environment/job and an identical resource/constraint shape.
    pub fn group_key(&self) -> GroupKey {
        GroupKey::new(format!("{}/{}/{}/{}", self.role, self.environment, self.job_name, self.resource_shape))
    }
}

/// The reason a task was moved to `Lost` after a launch attempt failed.
pub const LAUNCH_FAILED_MSG: &str = "Launch failed: driver was not ready to accept the task";

/// A launch plan produced by the [`crate::scheduler::collaborators::Assigner`] for a single
/// (offer, task) pair: everything the driver needs to actually launch the task on the host
/// that made the offer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskInfo {
    pub task_id: TaskId,
    pub offer_id: OfferId,
    pub slave_id: SlaveId,
    pub assigned_resources: serde_json::Value,
}

/// Summarizes other running tasks of the same job, so the assigner can evaluate
/// anti-affinity and similar same-job constraints without re-querying storage itself.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttributeAggregate {
    pub job_name: String,
    pub slaves_in_use: Vec<SlaveId>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn task(role: &str, job: &str) -> Task {
        Task {
            task_id: TaskId::new("t"),
            role: role.to_string(),
            environment: "prod".to_string(),
            job_name: job.to_string(),
            resource_shape: serde_json::json!({"cpus": 1}),
            status: TaskStatus::Pending,
            assigned_slave_id: None,
        }
    }

    #[test]
    fn identical_shape_tasks_share_a_group_key() {
        let a = task("www", "frontend");
        let b = task("www", "frontend");
        assert_eq!(a.group_key(), b.group_key());
    }

    #[test]
    fn different_job_yields_different_group_key() {
        let a = task("www", "frontend");
        let b = task("www", "backend");
        assert_ne!(a.group_key(), b.group_key());
    }
}
