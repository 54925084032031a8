use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex};

use slotmap::{new_key_type, SlotMap};
use tokio::task::JoinHandle;
use tokio::time::Duration;

use crate::domain::ids::{HostId, OfferId, SlaveId, TaskId};
use crate::domain::offer::{HostOffer, MaintenanceMode};
use crate::domain::reservation::Reservation;
use crate::domain::task::TaskInfo;
use crate::error::{Result, StorageError};
use crate::scheduler::collaborators::{Driver, MaintenanceController, ReturnDelayProvider};

new_key_type! {
    struct Slot;
}

/// What happened when [`OfferQueue::launch_first`] reached the end of its candidate list (or a
/// match was found and the driver was asked to launch it).
#[derive(Debug)]
pub enum LaunchOutcome {
    /// No held offer satisfied the acceptor.
    NoMatch,
    /// The acceptor matched an offer and `driver.launch_task` succeeded.
    Launched { offer_id: OfferId, task_info: TaskInfo },
    /// The acceptor matched an offer but `driver.launch_task` failed; the offer is still
    /// consumed (not re-queued), per the failure semantics in the design.
    LaunchFailed { offer_id: OfferId, task_info: TaskInfo },
}

struct OfferEntry {
    offer: HostOffer,
    decline_handle: JoinHandle<()>,
    insertion_seq: u64,
}

#[derive(Default)]
struct Inner {
    /// Primary store. The `Slot` key is internal; offers are addressed from the outside by the
    /// resource manager's own [`OfferId`], via `by_offer_id` below.
    slots: SlotMap<Slot, OfferEntry>,
    by_offer_id: HashMap<OfferId, Slot>,
    /// Enforces invariant O1: at most one held offer per slave id.
    by_slave: HashMap<SlaveId, Slot>,
    /// Preemption reservations recorded by the scheduler, consulted on each attempt.
    reservations: HashMap<TaskId, Reservation>,
    next_seq: u64,
}

/// Holding area for outstanding resource offers, ordered by maintenance-mode preference, with
/// per-offer expiration and a reservation overlay.
///
/// Follows this codebase's "single lock over a primary slot map plus secondary index" shape
/// (see `reservation_store.rs`): here the slot map holds offers and the secondary indexes map
/// the resource manager's offer id and slave id back to the internal slot.
pub struct OfferQueue {
    inner: Mutex<Inner>,
    driver: Arc<dyn Driver>,
    maintenance: Arc<dyn MaintenanceController>,
    return_delay: Arc<dyn ReturnDelayProvider>,
}

impl OfferQueue {
    pub fn new(
        driver: Arc<dyn Driver>,
        maintenance: Arc<dyn MaintenanceController>,
        return_delay: Arc<dyn ReturnDelayProvider>,
    ) -> Arc<Self> {
        Arc::new(OfferQueue { inner: Mutex::new(Inner::default()), driver, maintenance, return_delay })
    }

    /// Admits a new offer. Enforces O1 (a second offer for an already-held slave causes both to
    /// be declined and neither retained) and schedules a one-shot decline timer at
    /// `now + return_delay()`, queried fresh for this offer so an implementation can jitter it.
    pub async fn add_offer(
        self: &Arc<Self>,
        offer_id: OfferId,
        host_id: HostId,
        slave_id: SlaveId,
        resources: serde_json::Value,
        received_at_ms: i64,
    ) {
        let return_delay = self.return_delay.return_delay();
        let mode = self.maintenance.get_mode(&host_id).await;
        let host_offer = HostOffer::new(offer_id.clone(), host_id, slave_id.clone(), resources, mode, received_at_ms);

        let collision = {
            let mut inner = self.inner.lock().expect("poisoned");
            inner.by_slave.remove(&slave_id).and_then(|slot| {
                let entry = inner.slots.remove(slot)?;
                inner.by_offer_id.remove(&entry.offer.offer_id);
                entry.decline_handle.abort();
                Some(entry.offer.offer_id)
            })
        };

        if let Some(existing_offer_id) = collision {
            log::warn!("offer {offer_id} collides with already-held offer {existing_offer_id} on slave {slave_id}; declining both");
            self.driver.decline_offer(&existing_offer_id).await;
            self.driver.decline_offer(&offer_id).await;
            return;
        }

        let handle = {
            let queue = Arc::clone(self);
            let timed_out_offer_id = offer_id.clone();
            tokio::spawn(async move {
                tokio::time::sleep(return_delay).await;
                queue.decline(timed_out_offer_id).await;
            })
        };

        let mut inner = self.inner.lock().expect("poisoned");
        inner.next_seq += 1;
        let seq = inner.next_seq;
        let slot = inner.slots.insert(OfferEntry { offer: host_offer, decline_handle: handle, insertion_seq: seq });
        inner.by_slave.insert(slave_id, slot);
        inner.by_offer_id.insert(offer_id, slot);
    }

    /// Iterates held offers in preference order (or, if a live reservation exists for
    /// `task_id`, just its reserved slave's offer if still held) and calls `acceptor` on each
    /// until one returns `Some`. On a match the offer is removed and the driver is asked to
    /// launch it.
    pub async fn launch_first<F, Fut>(&self, task_id: &TaskId, acceptor: F) -> Result<LaunchOutcome>
    where
        F: Fn(HostOffer) -> Fut,
        Fut: Future<Output = std::result::Result<Option<TaskInfo>, StorageError>>,
    {
        let candidates = self.candidates_for(task_id);

        for (offer_id, host_offer) in candidates {
            match acceptor(host_offer.clone()).await {
                Ok(None) => continue,
                Ok(Some(task_info)) => {
                    let consumed = {
                        let mut inner = self.inner.lock().expect("poisoned");
                        match inner.by_offer_id.remove(&offer_id).and_then(|slot| inner.slots.remove(slot)) {
                            Some(entry) => {
                                entry.decline_handle.abort();
                                inner.by_slave.remove(&host_offer.slave_id);
                                inner.reservations.remove(task_id);
                                true
                            }
                            // A racing attempt already consumed this offer; keep scanning.
                            None => false,
                        }
                    };
                    if !consumed {
                        continue;
                    }
                    return Ok(match self.driver.launch_task(&offer_id, &task_info).await {
                        Ok(()) => LaunchOutcome::Launched { offer_id, task_info },
                        Err(_) => LaunchOutcome::LaunchFailed { offer_id, task_info },
                    });
                }
                Err(err) => return Err(err.into()),
            }
        }

        Ok(LaunchOutcome::NoMatch)
    }

    /// Records that `task_id` should only see offers from `slave_id` until the reservation
    /// expires.
    pub fn reserve(&self, reservation: Reservation) {
        let mut inner = self.inner.lock().expect("poisoned");
        inner.reservations.insert(reservation.task_id.clone(), reservation);
    }

    /// Updates the maintenance-mode annotation on any held offer from `host_id`. Per the
    /// resolved open question, this re-sorts rather than forcing an immediate decline when the
    /// new mode is `Drained`.
    pub fn host_changed_state(&self, host_id: &HostId, mode: MaintenanceMode) {
        let mut inner = self.inner.lock().expect("poisoned");
        for entry in inner.slots.values_mut() {
            if entry.offer.host_id == *host_id {
                entry.offer.maintenance_mode = mode;
            }
        }
    }

    /// Number of offers currently held. Exposed for tests and gauges.
    pub fn len(&self) -> usize {
        self.inner.lock().expect("poisoned").slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn candidates_for(&self, task_id: &TaskId) -> Vec<(OfferId, HostOffer)> {
        let mut inner = self.inner.lock().expect("poisoned");

        if let Some(reservation) = inner.reservations.get(task_id) {
            if reservation.is_expired() {
                inner.reservations.remove(task_id);
            } else {
                let slave_id = reservation.slave_id.clone();
                return inner
                    .slots
                    .values()
                    .find(|entry| entry.offer.slave_id == slave_id)
                    .map(|entry| vec![(entry.offer.offer_id.clone(), entry.offer.clone())])
                    .unwrap_or_default();
            }
        }

        let mut all: Vec<(u64, HostOffer)> = inner.slots.values().map(|entry| (entry.insertion_seq, entry.offer.clone())).collect();
        all.sort_by(|a, b| a.1.maintenance_mode.cmp(&b.1.maintenance_mode).then(a.0.cmp(&b.0)));
        all.into_iter().map(|(_, offer)| (offer.offer_id.clone(), offer)).collect()
    }

    /// Fired by the per-offer decline timer. A no-op if the offer was already consumed by a
    /// launch or a slave-uniqueness collision.
    async fn decline(self: Arc<Self>, offer_id: OfferId) {
        let removed = {
            let mut inner = self.inner.lock().expect("poisoned");
            match inner.by_offer_id.remove(&offer_id).and_then(|slot| inner.slots.remove(slot)) {
                Some(entry) => {
                    inner.by_slave.remove(&entry.offer.slave_id);
                    true
                }
                None => false,
            }
        };
        if removed {
            self.driver.decline_offer(&offer_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::collaborators::{FixedReturnDelay, NullDriver, NullMaintenanceController};

    fn queue() -> Arc<OfferQueue> {
        OfferQueue::new(Arc::new(NullDriver), Arc::new(NullMaintenanceController), Arc::new(FixedReturnDelay(Duration::from_millis(10))))
    }

    #[tokio::test(start_paused = true)]
    async fn one_offer_per_slave_declines_both_on_collision() {
        let queue = queue();
        queue.add_offer(OfferId::new("o1"), HostId::new("h1"), SlaveId::new("s1"), serde_json::json!({}), 0).await;
        queue.add_offer(OfferId::new("o2"), HostId::new("h1"), SlaveId::new("s1"), serde_json::json!({}), 0).await;
        assert_eq!(queue.len(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn decline_timer_removes_unconsumed_offer() {
        let queue = queue();
        queue.add_offer(OfferId::new("o1"), HostId::new("h1"), SlaveId::new("s1"), serde_json::json!({}), 0).await;
        assert_eq!(queue.len(), 1);
        tokio::time::advance(Duration::from_millis(11)).await;
        tokio::task::yield_now().await;
        assert_eq!(queue.len(), 0);
    }
}
