use beat_types::{Address, BlockId};

use crate::block::StoredBlock;
use crate::error::StoreResult;
use crate::record::RootRecord;

/// Content-addressed block store.
///
/// All implementations must satisfy these invariants:
/// - Blocks are immutable once written. The same data always produces the
///   same ID.
/// - A block is either fully present or absent; readers never see a torn
///   block.
/// - Concurrent reads are always safe.
/// - All I/O errors are propagated, never silently ignored.
pub trait BlockStore: Send + Sync {
    /// Read a block by its content-addressed ID.
    ///
    /// Returns `Ok(None)` if the block does not exist.
    /// Returns `Err` on I/O failure or data corruption.
    fn read(&self, id: &BlockId) -> StoreResult<Option<StoredBlock>>;

    /// Write a block and return its content-addressed ID.
    ///
    /// If the block already exists, this is a no-op (idempotent).
    fn write(&self, block: &StoredBlock) -> StoreResult<BlockId>;

    /// Check whether a block exists in the store.
    fn exists(&self, id: &BlockId) -> StoreResult<bool>;

    /// Delete a block by ID. Returns `true` if the block existed.
    ///
    /// Deleting a referenced block makes the trees using it unreadable
    /// until it is replicated again.
    fn delete(&self, id: &BlockId) -> StoreResult<bool>;

    /// Read multiple blocks in a batch.
    fn read_batch(&self, ids: &[BlockId]) -> StoreResult<Vec<Option<StoredBlock>>> {
        ids.iter().map(|id| self.read(id)).collect()
    }

    /// Write multiple blocks in a batch and return their IDs.
    fn write_batch(&self, blocks: &[StoredBlock]) -> StoreResult<Vec<BlockId>> {
        blocks.iter().map(|b| self.write(b)).collect()
    }

    /// Of `ids`, the ones not present locally, in input order.
    fn missing(&self, ids: &[BlockId]) -> StoreResult<Vec<BlockId>> {
        let mut out = Vec::new();
        for id in ids {
            if !self.exists(id)? {
                out.push(*id);
            }
        }
        Ok(out)
    }
}

/// Per-address history of signed root records.
///
/// Implementations reject records whose signature does not verify against
/// the address and records that do not advance the head version.
pub trait FeedStore: Send + Sync {
    /// The highest-version record for `address`, if any.
    fn head(&self, address: &Address) -> StoreResult<Option<RootRecord>>;

    /// All valid records for `address`, in append order.
    fn records(&self, address: &Address) -> StoreResult<Vec<RootRecord>>;

    /// Append a record after verifying it.
    fn append(&self, address: &Address, record: &RootRecord) -> StoreResult<()>;
}

/// Shared acceptance rule for feed appends.
pub(crate) fn check_append(
    address: &Address,
    head: Option<&RootRecord>,
    record: &RootRecord,
) -> StoreResult<()> {
    record.verify(address)?;
    let head_version = head.map(|h| h.version).unwrap_or(0);
    if record.version <= head_version {
        return Err(crate::error::StoreError::StaleRecord {
            address: *address,
            head: head_version,
            proposed: record.version,
        });
    }
    Ok(())
}
