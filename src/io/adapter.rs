use crate::io::lock::LockError;
use crate::model::collection::{Collection, Scope};
use crate::ops::store::{Applied, Mutation, StoreError};

/// Error type for persistence backends
#[derive(Debug, thiserror::Error)]
pub enum PersistenceError {
    #[error("network error: {0}")]
    Transient(String),
    #[error("server rejected the request (HTTP {status})")]
    Rejected { status: u16 },
    #[error("not signed in or session expired")]
    Unauthorized,
    #[error("stored data is corrupt: {0}")]
    Corrupt(String),
    #[error("storage error: {0}")]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Lock(#[from] LockError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl PersistenceError {
    /// Failures the user can reasonably retry as-is
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            PersistenceError::Transient(_) | PersistenceError::Lock(LockError::Timeout { .. })
        )
    }
}

/// A store that collections are loaded from and mutations are sent to.
///
/// `apply` is issued once per user action and is never batched or retried.
/// It receives the caller's current view of the collection and returns what
/// the backend actually persisted.
pub trait PersistenceAdapter {
    fn load(&mut self, scope: &Scope) -> Result<Collection, PersistenceError>;

    fn save(&mut self, collection: &Collection) -> Result<(), PersistenceError>;

    fn apply(
        &mut self,
        mutation: &Mutation,
        current: &Collection,
    ) -> Result<Applied, PersistenceError>;
}
