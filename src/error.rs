use thiserror::Error;

/// Errors surfaced by [`crate::scheduler::collaborators::Storage`] reads/writes.
///
/// `Transient` faults are expected to happen (lock contention, a backing store hiccup) and are
/// handled by retrying the whole scheduling attempt later; `Corrupt` is not expected to happen
/// and is treated as fatal by callers.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage is transiently unavailable: {0}")]
    Transient(String),

    #[error("storage returned an inconsistent result: {0}")]
    Corrupt(String),
}

/// Errors surfaced by [`crate::scheduler::collaborators::Driver`] calls.
#[derive(Debug, Error)]
pub enum DriverError {
    #[error("driver is not ready to accept a launch")]
    NotReady,

    #[error("driver rejected the decline request: {0}")]
    DeclineFailed(String),
}

/// The crate-wide error type. Most fallible core operations return [`SchedulerError`]; the
/// `Storage`/`Driver` variants carry the collaborator error unchanged so callers can match on
/// the transient/fatal distinction described in the error-handling design.
#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Driver(#[from] DriverError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
