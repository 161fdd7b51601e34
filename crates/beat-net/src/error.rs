use std::time::Duration;

use beat_types::DiscoveryId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum NetError {
    /// Downloads need lookup enabled for the tree's topic.
    #[error("lookup is not enabled for topic {0}")]
    LookupDisabled(DiscoveryId),

    #[error("download did not complete within {0:?}")]
    DeadlineExceeded(Duration),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("store error: {0}")]
    Store(#[from] beat_store::StoreError),

    #[error("tree error: {0}")]
    Tree(#[from] beat_tree::TreeError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type NetResult<T> = Result<T, NetError>;
