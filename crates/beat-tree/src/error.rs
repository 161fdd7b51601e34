use beat_types::{Address, BlockId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TreeError {
    /// An operation was attempted before `ready()` resolved.
    #[error("tree is not ready")]
    NotReady,

    /// Readiness resolved to a failure; the handle is unusable.
    #[error("tree failed to open: {0}")]
    OpenFailed(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    /// This store does not hold the writer key for the tree.
    #[error("tree {0} is read-only in this store")]
    ReadOnly(Address),

    #[error("invalid path {path:?}: {reason}")]
    InvalidPath { path: String, reason: String },

    /// A referenced block has not been replicated to this store yet.
    #[error("block {0} is not available locally")]
    Unavailable(BlockId),

    #[error("store error: {0}")]
    Store(#[from] beat_store::StoreError),
}

impl TreeError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}

pub type TreeResult<T> = Result<T, TreeError>;
