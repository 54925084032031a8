use std::sync::Arc;

use tokio::sync::mpsc;

use crate::domain::ids::HostId;
use crate::domain::offer::MaintenanceMode;
use crate::domain::task::{Task, TaskStatus};
use crate::scheduler::offer_queue::OfferQueue;
use crate::scheduler::task_groups::TaskGroups;

/// The in-process analogue of an external event bus message. One dispatcher task owns the
/// receiving end of the channel and fans each variant out to the sink that cares about it.
#[derive(Debug, Clone)]
pub enum SchedulerEvent {
    /// A task moved from `from` to its current status.
    TaskTransition { task: Task, from: Option<TaskStatus> },
    /// A task observed in its current status at startup.
    TaskInitialized { task: Task },
    /// Tasks removed from storage.
    TasksDeleted { tasks: Vec<Task> },
    /// A host's maintenance mode changed.
    HostMaintenanceChanged { host_id: HostId, mode: MaintenanceMode },
}

/// Fans [`SchedulerEvent`]s out to [`TaskGroups`] and [`OfferQueue`] over an internal
/// `tokio::sync::mpsc` channel, the in-process stand-in for an external event bus adapter.
pub struct EventDispatcher {
    sender: mpsc::UnboundedSender<SchedulerEvent>,
}

impl EventDispatcher {
    /// Spawns the dispatcher task and returns a handle holding the sending half of its channel.
    pub fn spawn(task_groups: Arc<TaskGroups>, offer_queue: Arc<OfferQueue>) -> Self {
        let (sender, mut receiver) = mpsc::unbounded_channel();

        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                match event {
                    SchedulerEvent::TaskTransition { task, from } => task_groups.task_changed_state(&task, from),
                    SchedulerEvent::TaskInitialized { task } => task_groups.task_initialized(&task),
                    SchedulerEvent::TasksDeleted { tasks } => task_groups.tasks_deleted(&tasks),
                    SchedulerEvent::HostMaintenanceChanged { host_id, mode } => offer_queue.host_changed_state(&host_id, mode),
                }
            }
        });

        EventDispatcher { sender }
    }

    /// A cloneable sending handle for publishing events into the dispatcher.
    pub fn sender(&self) -> mpsc::UnboundedSender<SchedulerEvent> {
        self.sender.clone()
    }
}
