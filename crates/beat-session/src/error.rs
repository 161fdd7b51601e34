use std::path::PathBuf;

use beat_http::HttpError;
use beat_net::NetError;
use beat_store::StoreError;
use beat_tree::TreeError;
use thiserror::Error;

use crate::config::ConfigError;
use crate::state::SessionState;

#[derive(Debug, Error)]
pub enum SessionError {
    /// The working directory has no manifest.
    #[error("{} not found, initialize the directory with `hyperbeat init`", path.display())]
    ConfigMissing { path: PathBuf },

    /// `init` found an existing manifest.
    #[error("{} already exists, directory is already initialized", path.display())]
    ConfigConflict { path: PathBuf },

    #[error("manifest {} is invalid: {reason}", path.display())]
    ManifestInvalid { path: PathBuf, reason: String },

    #[error("invalid tree key {key:?}: {reason}")]
    InvalidKey { key: String, reason: String },

    #[error("storage unavailable: {0}")]
    StorageUnavailable(StoreError),

    #[error("tree not ready: {0}")]
    TreeNotReady(String),

    #[error("write to {path} failed: {reason}")]
    WriteFailed { path: String, reason: String },

    #[error("illegal session transition {from} -> {to}")]
    InvalidTransition { from: SessionState, to: SessionState },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("tree error: {0}")]
    Tree(TreeError),

    #[error("network error: {0}")]
    Net(NetError),

    #[error("http error: {0}")]
    Http(#[from] HttpError),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<StoreError> for SessionError {
    fn from(e: StoreError) -> Self {
        if e.is_unavailable() {
            Self::StorageUnavailable(e)
        } else {
            Self::Store(e)
        }
    }
}

impl From<TreeError> for SessionError {
    fn from(e: TreeError) -> Self {
        match e {
            TreeError::NotReady => Self::TreeNotReady("readiness not awaited".into()),
            TreeError::OpenFailed(reason) => Self::TreeNotReady(reason),
            TreeError::WriteFailed { path, reason } => Self::WriteFailed { path, reason },
            TreeError::Store(store) => store.into(),
            other => Self::Tree(other),
        }
    }
}

impl From<NetError> for SessionError {
    fn from(e: NetError) -> Self {
        match e {
            NetError::Tree(tree) => tree.into(),
            NetError::Store(store) => store.into(),
            other => Self::Net(other),
        }
    }
}

impl SessionError {
    pub fn is_deadline_exceeded(&self) -> bool {
        matches!(self, Self::Net(NetError::DeadlineExceeded(_)))
    }
}

pub type SessionResult<T> = Result<T, SessionError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unavailable_store_maps_to_storage_unavailable() {
        let e: SessionError = StoreError::Unavailable {
            path: "/nowhere".into(),
            reason: "denied".into(),
        }
        .into();
        assert!(matches!(e, SessionError::StorageUnavailable(_)));
    }

    #[test]
    fn tree_failures_are_classified() {
        let e: SessionError = TreeError::OpenFailed("bad key".into()).into();
        assert!(matches!(e, SessionError::TreeNotReady(r) if r == "bad key"));

        let e: SessionError = TreeError::WriteFailed {
            path: "/a".into(),
            reason: "eof".into(),
        }
        .into();
        assert!(matches!(e, SessionError::WriteFailed { .. }));

        let e: SessionError = NetError::Tree(TreeError::NotReady).into();
        assert!(matches!(e, SessionError::TreeNotReady(_)));
    }

    #[test]
    fn deadline_is_recognized() {
        let e: SessionError = NetError::DeadlineExceeded(std::time::Duration::from_secs(1)).into();
        assert!(e.is_deadline_exceeded());
    }
}
