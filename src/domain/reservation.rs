use tokio::time::Instant;

use crate::domain::ids::{SlaveId, TaskId};

/// A soft binding of a pending task to a specific slave for a bounded time, produced by the
/// [`crate::scheduler::collaborators::Preemptor`] when no currently held offer fits.
///
/// While a reservation for `task_id` is live, [`crate::scheduler::offer_queue::OfferQueue`]
/// exposes only the reserved slave's offer to that task's scheduling attempts.
#[derive(Debug, Clone)]
pub struct Reservation {
    pub task_id: TaskId,
    pub slave_id: SlaveId,
    pub expires_at: Instant,
}

impl Reservation {
    pub fn new(task_id: TaskId, slave_id: SlaveId, duration: std::time::Duration) -> Self {
        Reservation { task_id, slave_id, expires_at: Instant::now() + duration }
    }

    pub fn is_expired(&self) -> bool {
        Instant::now() >= self.expires_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn fresh_reservation_is_not_expired() {
        let reservation = Reservation::new(TaskId::new("t"), SlaveId::new("s"), std::time::Duration::from_secs(60));
        assert!(!reservation.is_expired());
    }

    #[tokio::test(start_paused = true)]
    async fn reservation_expires_after_its_duration() {
        let reservation = Reservation::new(TaskId::new("t"), SlaveId::new("s"), std::time::Duration::from_millis(10));
        tokio::time::advance(std::time::Duration::from_millis(11)).await;
        assert!(reservation.is_expired());
    }
}
