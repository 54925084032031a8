use async_trait::async_trait;

use offer_scheduler::domain::offer::HostOffer;
use offer_scheduler::domain::task::{AttributeAggregate, Task, TaskInfo};
use offer_scheduler::error::StorageError;
use offer_scheduler::scheduler::collaborators::Assigner;

/// Demo [`Assigner`] for the standalone binary: accepts every offer unconditionally. A real
/// assigner would compare `task.resource_shape` against `offer.resources` and evaluate
/// constraints; that logic is out of scope for this crate (see the purpose & scope section of
/// the design this binary demonstrates).
#[derive(Debug, Default)]
pub struct AlwaysAssign;

#[async_trait]
impl Assigner for AlwaysAssign {
    async fn maybe_assign(
        &self,
        offer: &HostOffer,
        task: &Task,
        _aggregate: &AttributeAggregate,
    ) -> Result<Option<TaskInfo>, StorageError> {
        Ok(Some(TaskInfo {
            task_id: task.task_id.clone(),
            offer_id: offer.offer_id.clone(),
            slave_id: offer.slave_id.clone(),
            assigned_resources: offer.resources.clone(),
        }))
    }
}
