use std::path::PathBuf;

use beat_types::{Address, BlockId};

/// Errors from content store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Local storage could not be reached or initialized.
    #[error("storage unavailable at {path}: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    /// The requested block was not found.
    #[error("block not found: {0}")]
    NotFound(BlockId),

    /// Content hash mismatch on read (data corruption).
    #[error("hash mismatch for {id}: computed {computed}")]
    HashMismatch { id: BlockId, computed: BlockId },

    /// Serialization or deserialization failure.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The block data is malformed or cannot be decoded.
    #[error("corrupt block {id}: {reason}")]
    CorruptBlock { id: BlockId, reason: String },

    /// A root record was not signed by the feed's address.
    #[error("invalid signature on root record {version} for {address}")]
    InvalidSignature { address: Address, version: u64 },

    /// A root record does not advance the feed.
    #[error("stale root record for {address}: head is {head}, got {proposed}")]
    StaleRecord {
        address: Address,
        head: u64,
        proposed: u64,
    },

    /// A stored writer key is malformed.
    #[error("corrupt key for {address}: {reason}")]
    CorruptKey { address: Address, reason: String },

    /// Attempted to write a null block ID.
    #[error("cannot store block with null ID")]
    NullBlockId,

    /// Storage backend is read-only.
    #[error("store is read-only")]
    ReadOnly,
}

impl StoreError {
    /// Returns `true` if this error means the storage root itself is unusable.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable { .. })
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
