use std::collections::HashMap;
use std::sync::RwLock;

use beat_types::{Address, BlockId};

use crate::block::StoredBlock;
use crate::error::{StoreError, StoreResult};
use crate::record::RootRecord;
use crate::traits::{check_append, BlockStore, FeedStore};

/// In-memory, HashMap-based block store.
///
/// Intended for tests and embedding. All blocks are held in memory behind a
/// `RwLock` for safe concurrent access. Blocks are cloned on read/write.
pub struct InMemoryBlockStore {
    blocks: RwLock<HashMap<BlockId, StoredBlock>>,
}

impl InMemoryBlockStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            blocks: RwLock::new(HashMap::new()),
        }
    }

    /// Number of blocks currently stored.
    pub fn len(&self) -> usize {
        self.blocks.read().expect("lock poisoned").len()
    }

    /// Returns `true` if the store is empty.
    pub fn is_empty(&self) -> bool {
        self.blocks.read().expect("lock poisoned").is_empty()
    }

    /// Total payload bytes across all stored blocks.
    pub fn total_bytes(&self) -> u64 {
        self.blocks
            .read()
            .expect("lock poisoned")
            .values()
            .map(|b| b.size())
            .sum()
    }
}

impl Default for InMemoryBlockStore {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockStore for InMemoryBlockStore {
    fn read(&self, id: &BlockId) -> StoreResult<Option<StoredBlock>> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.get(id).cloned())
    }

    fn write(&self, block: &StoredBlock) -> StoreResult<BlockId> {
        let id = block.compute_id();
        if id.is_null() {
            return Err(StoreError::NullBlockId);
        }
        let mut map = self.blocks.write().expect("lock poisoned");
        map.entry(id).or_insert_with(|| block.clone());
        Ok(id)
    }

    fn exists(&self, id: &BlockId) -> StoreResult<bool> {
        let map = self.blocks.read().expect("lock poisoned");
        Ok(map.contains_key(id))
    }

    fn delete(&self, id: &BlockId) -> StoreResult<bool> {
        let mut map = self.blocks.write().expect("lock poisoned");
        Ok(map.remove(id).is_some())
    }
}

impl std::fmt::Debug for InMemoryBlockStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryBlockStore")
            .field("block_count", &self.len())
            .finish()
    }
}

/// In-memory feed store.
#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    feeds: RwLock<HashMap<Address, Vec<RootRecord>>>,
}

impl InMemoryFeedStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FeedStore for InMemoryFeedStore {
    fn head(&self, address: &Address) -> StoreResult<Option<RootRecord>> {
        let feeds = self.feeds.read().expect("lock poisoned");
        Ok(feeds.get(address).and_then(|records| records.last().cloned()))
    }

    fn records(&self, address: &Address) -> StoreResult<Vec<RootRecord>> {
        let feeds = self.feeds.read().expect("lock poisoned");
        Ok(feeds.get(address).cloned().unwrap_or_default())
    }

    fn append(&self, address: &Address, record: &RootRecord) -> StoreResult<()> {
        let mut feeds = self.feeds.write().expect("lock poisoned");
        let records = feeds.entry(*address).or_default();
        check_append(address, records.last(), record)?;
        records.push(record.clone());
        Ok(())
    }
}
