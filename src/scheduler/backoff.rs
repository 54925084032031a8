use std::fmt::Debug;

/// Stateless strategy mapping the previous backoff penalty (in ms) to the next one.
///
/// Object-safe so callers can hold a `Box<dyn BackoffStrategy>` and swap the policy without
/// touching [`crate::scheduler::task_groups::TaskGroups`].
pub trait BackoffStrategy: Debug + Send + Sync {
    fn calculate(&self, previous_ms: u64) -> u64;
}

/// Doubles the previous penalty each attempt, capped at `max_ms`.
///
/// With the default `first_schedule_delay_ms = 1` this produces the `1, 10, 20, 40, ...`
/// sequence used by the spec's worked scenarios once a floor is applied, so this
/// implementation takes an explicit `floor_ms` instead of deriving one from doubling alone.
#[derive(Debug, Clone, Copy)]
pub struct TruncatedBinaryBackoff {
    pub floor_ms: u64,
    pub max_ms: u64,
}

impl TruncatedBinaryBackoff {
    pub fn new(floor_ms: u64, max_ms: u64) -> Self {
        TruncatedBinaryBackoff { floor_ms, max_ms }
    }
}

impl Default for TruncatedBinaryBackoff {
    fn default() -> Self {
        TruncatedBinaryBackoff { floor_ms: 10, max_ms: 60_000 }
    }
}

impl BackoffStrategy for TruncatedBinaryBackoff {
    fn calculate(&self, previous_ms: u64) -> u64 {
        let doubled = previous_ms.saturating_mul(2);
        doubled.max(self.floor_ms).min(self.max_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_backoff_from_one_ms_hits_the_floor() {
        let backoff = TruncatedBinaryBackoff::default();
        assert_eq!(backoff.calculate(1), 10);
    }

    #[test]
    fn subsequent_backoffs_double() {
        let backoff = TruncatedBinaryBackoff::default();
        assert_eq!(backoff.calculate(10), 20);
        assert_eq!(backoff.calculate(20), 40);
    }

    #[test]
    fn backoff_saturates_at_max() {
        let backoff = TruncatedBinaryBackoff::new(10, 100);
        assert_eq!(backoff.calculate(90), 100);
    }
}
