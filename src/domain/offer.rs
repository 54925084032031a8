use serde::{Deserialize, Serialize};

use crate::domain::ids::{HostId, OfferId, SlaveId};

/// The maintenance lifecycle state of a host, as reported by the maintenance controller.
///
/// The declared order, from most to least preferred placement target, is:
/// 1. `None` — the host is fully available.
/// 2. `Scheduled` — maintenance has been announced but not started.
/// 3. `Draining` — the host is actively being drained of tasks.
/// 4. `Drained` — the host has finished draining and should not receive new work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum MaintenanceMode {
    None,
    Scheduled,
    Draining,
    Drained,
}

/// An offer from the resource manager, tagged with the current maintenance mode of its
/// source host at the time it was admitted into the [`crate::scheduler::offer_queue::OfferQueue`].
///
/// The resource vector itself is opaque to this core — it is handed unmodified to the
/// [`crate::scheduler::collaborators::Assigner`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostOffer {
    pub offer_id: OfferId,
    pub host_id: HostId,
    pub slave_id: SlaveId,
    pub resources: serde_json::Value,
    pub maintenance_mode: MaintenanceMode,
    pub received_at_ms: i64,
}

impl HostOffer {
    pub fn new(
        offer_id: OfferId,
        host_id: HostId,
        slave_id: SlaveId,
        resources: serde_json::Value,
        maintenance_mode: MaintenanceMode,
        received_at_ms: i64,
    ) -> Self {
        HostOffer { offer_id, host_id, slave_id, resources, maintenance_mode, received_at_ms }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maintenance_mode_orders_none_before_drained() {
        assert!(MaintenanceMode::None < MaintenanceMode::Scheduled);
        assert!(MaintenanceMode::Scheduled < MaintenanceMode::Draining);
        assert!(MaintenanceMode::Draining < MaintenanceMode::Drained);
    }
}
