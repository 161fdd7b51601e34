use beat_crypto::ContentHasher;
use beat_types::BlockId;
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// The kind of block stored.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum BlockKind {
    /// Raw file bytes.
    Chunk,
    /// File node: total size plus ordered chunk references.
    File,
    /// Directory node: sorted entries mapping names to block references.
    Directory,
}

impl BlockKind {
    /// One-byte tag used by the on-disk encoding.
    pub fn tag(&self) -> u8 {
        match self {
            Self::Chunk => b'c',
            Self::File => b'f',
            Self::Directory => b'd',
        }
    }

    /// Parse a one-byte on-disk tag.
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            b'c' => Some(Self::Chunk),
            b'f' => Some(Self::File),
            b'd' => Some(Self::Directory),
            _ => None,
        }
    }

    fn hasher(&self) -> &'static ContentHasher {
        match self {
            Self::Chunk => &ContentHasher::CHUNK,
            Self::File => &ContentHasher::FILE,
            Self::Directory => &ContentHasher::DIRECTORY,
        }
    }
}

impl std::fmt::Display for BlockKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Chunk => write!(f, "chunk"),
            Self::File => write!(f, "file"),
            Self::Directory => write!(f, "directory"),
        }
    }
}

/// A stored block: kind tag + raw bytes.
///
/// `StoredBlock` is the unit of storage and of replication. The store never
/// interprets the bytes; decoding into nodes happens in the typed wrappers
/// below.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoredBlock {
    /// The type of this block.
    pub kind: BlockKind,
    /// The raw bytes of the block.
    pub data: Vec<u8>,
}

impl StoredBlock {
    /// Create a new stored block from kind and data.
    pub fn new(kind: BlockKind, data: Vec<u8>) -> Self {
        Self { kind, data }
    }

    /// Raw file bytes.
    pub fn chunk(data: Vec<u8>) -> Self {
        Self::new(BlockKind::Chunk, data)
    }

    /// Compute the content-addressed ID for this block.
    pub fn compute_id(&self) -> BlockId {
        self.kind.hasher().hash(&self.data)
    }

    /// Size of the payload in bytes.
    pub fn size(&self) -> u64 {
        self.data.len() as u64
    }

    /// Encode as `[tag][data]` for storage on disk.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.data.len() + 1);
        out.push(self.kind.tag());
        out.extend_from_slice(&self.data);
        out
    }

    /// Decode the on-disk encoding, verifying it hashes to `id`.
    pub fn decode(id: &BlockId, bytes: &[u8]) -> StoreResult<Self> {
        let (tag, data) = bytes.split_first().ok_or_else(|| StoreError::CorruptBlock {
            id: *id,
            reason: "empty block file".into(),
        })?;
        let kind = BlockKind::from_tag(*tag).ok_or_else(|| StoreError::CorruptBlock {
            id: *id,
            reason: format!("unknown block tag {tag:#04x}"),
        })?;
        let block = Self::new(kind, data.to_vec());
        block.verify(id)?;
        Ok(block)
    }

    /// Check that this block hashes to `id`.
    pub fn verify(&self, id: &BlockId) -> StoreResult<()> {
        let computed = self.compute_id();
        if computed != *id {
            return Err(StoreError::HashMismatch { id: *id, computed });
        }
        Ok(())
    }

    /// Block ids this block references.
    ///
    /// Chunks are leaves; file nodes reference chunks; directory nodes
    /// reference their children.
    pub fn links(&self) -> StoreResult<Vec<BlockId>> {
        match self.kind {
            BlockKind::Chunk => Ok(Vec::new()),
            BlockKind::File => Ok(FileNode::from_stored_block(self)?.chunks),
            BlockKind::Directory => Ok(DirectoryNode::from_stored_block(self)?
                .entries
                .into_iter()
                .map(|e| e.id)
                .collect()),
        }
    }
}

// ---------------------------------------------------------------------------
// FileNode
// ---------------------------------------------------------------------------

/// A file: its total length and the ordered chunks holding its bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileNode {
    /// Total length in bytes.
    pub size: u64,
    /// Size of every chunk except possibly the last.
    pub chunk_size: u64,
    /// Chunk block ids in file order.
    pub chunks: Vec<BlockId>,
}

impl FileNode {
    /// Convert into a `StoredBlock` for storage.
    pub fn to_stored_block(&self) -> StoreResult<StoredBlock> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredBlock::new(BlockKind::File, data))
    }

    /// Decode from a `StoredBlock`.
    pub fn from_stored_block(block: &StoredBlock) -> StoreResult<Self> {
        if block.kind != BlockKind::File {
            return Err(StoreError::CorruptBlock {
                id: block.compute_id(),
                reason: format!("expected file, got {}", block.kind),
            });
        }
        serde_json::from_slice(&block.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}

// ---------------------------------------------------------------------------
// DirectoryNode
// ---------------------------------------------------------------------------

/// Whether a directory entry names a file or a subdirectory.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    File,
    Directory,
}

/// A single entry in a directory node.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirEntry {
    /// Entry name (a single path component).
    pub name: String,
    /// File or subdirectory.
    pub kind: EntryKind,
    /// Block id of the referenced file or directory node.
    pub id: BlockId,
}

impl DirEntry {
    /// Create a new directory entry.
    pub fn new(name: impl Into<String>, kind: EntryKind, id: BlockId) -> Self {
        Self {
            name: name.into(),
            kind,
            id,
        }
    }
}

/// Directory listing node.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryNode {
    /// Entries sorted by name.
    pub entries: Vec<DirEntry>,
}

impl DirectoryNode {
    /// Create a directory with the given entries.
    ///
    /// Entries are sorted by name for deterministic hashing; on duplicate
    /// names the last one wins.
    pub fn new(entries: Vec<DirEntry>) -> Self {
        let mut dir = Self::empty();
        for entry in entries {
            dir.upsert(entry);
        }
        dir
    }

    /// Create an empty directory.
    pub fn empty() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Look up an entry by name.
    pub fn get(&self, name: &str) -> Option<&DirEntry> {
        self.entries
            .binary_search_by(|e| e.name.as_str().cmp(name))
            .ok()
            .map(|i| &self.entries[i])
    }

    /// Insert or replace an entry, keeping entries sorted.
    pub fn upsert(&mut self, entry: DirEntry) {
        match self
            .entries
            .binary_search_by(|e| e.name.as_str().cmp(&entry.name))
        {
            Ok(i) => self.entries[i] = entry,
            Err(i) => self.entries.insert(i, entry),
        }
    }

    /// Entry names in sorted order.
    pub fn names(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.name.clone()).collect()
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the directory has no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Convert into a `StoredBlock` for storage.
    pub fn to_stored_block(&self) -> StoreResult<StoredBlock> {
        let data = serde_json::to_vec(self).map_err(|e| StoreError::Serialization(e.to_string()))?;
        Ok(StoredBlock::new(BlockKind::Directory, data))
    }

    /// Decode from a `StoredBlock`.
    pub fn from_stored_block(block: &StoredBlock) -> StoreResult<Self> {
        if block.kind != BlockKind::Directory {
            return Err(StoreError::CorruptBlock {
                id: block.compute_id(),
                reason: format!("expected directory, got {}", block.kind),
            });
        }
        serde_json::from_slice(&block.data).map_err(|e| StoreError::Serialization(e.to_string()))
    }
}
