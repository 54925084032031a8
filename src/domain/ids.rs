use serde::{Deserialize, Serialize};
use std::fmt;
use std::marker::PhantomData;

/// A string identifier tagged with the type it identifies, so `Id<Task>` and
/// `Id<HostOffer>` cannot be confused at the type level even though both are
/// just strings underneath.
#[derive(Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id<T> {
    id: String,
    #[serde(skip)]
    _marker: PhantomData<fn() -> T>,
}

impl<T> Id<T> {
    pub fn new(id: impl Into<String>) -> Self {
        Id { id: id.into(), _marker: PhantomData }
    }

    pub fn as_str(&self) -> &str {
        &self.id
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        Id::new(self.id.clone())
    }
}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for Id<T> {}

impl<T> std::hash::Hash for Id<T> {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.id)
    }
}

impl<T> fmt::Debug for Id<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let full_name = std::any::type_name::<T>();
        let short_name = full_name.rsplit("::").next().unwrap_or(full_name);
        write!(f, "{short_name}Id({:?})", self.id)
    }
}

impl<T> From<Id<T>> for String {
    fn from(id: Id<T>) -> Self {
        id.id
    }
}

/// Tag types for [`Id`]. These never get constructed; they only exist to make
/// `Id<OfferTag>` distinct from `Id<TaskTag>` at compile time.
pub struct OfferTag;
pub struct HostTag;
pub struct SlaveTag;
pub struct TaskTag;

pub type OfferId = Id<OfferTag>;
pub type HostId = Id<HostTag>;
pub type SlaveId = Id<SlaveTag>;
pub type TaskId = Id<TaskTag>;

/// Identifies a [`crate::scheduler::task_groups::TaskGroup`] — the equivalence class of
/// fungible pending tasks that share a role/environment/job and resource/constraint shape.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupKey(String);

impl GroupKey {
    pub fn new(key: impl Into<String>) -> Self {
        GroupKey(key.into())
    }
}

impl fmt::Display for GroupKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}
