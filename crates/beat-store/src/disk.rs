use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use beat_types::BlockId;
use tracing::debug;

use crate::block::StoredBlock;
use crate::error::{StoreError, StoreResult};
use crate::traits::BlockStore;

/// Block store laid out on disk as `<root>/ab/cdef...`.
///
/// Each block lives in its own file named by the hex of its id, fanned out by
/// the first byte. Writes go to a temp file in the same directory and are
/// renamed into place, so a block file is either complete or absent. Reads
/// re-hash the contents and report [`StoreError::HashMismatch`] on
/// corruption.
#[derive(Debug)]
pub struct DiskBlockStore {
    root: PathBuf,
    read_only: bool,
}

impl DiskBlockStore {
    /// Open (or create) a block directory.
    pub fn open(root: &Path) -> StoreResult<Self> {
        fs::create_dir_all(root)?;
        Ok(Self {
            root: root.to_path_buf(),
            read_only: false,
        })
    }

    /// Open an existing block directory without write access.
    pub fn open_read_only(root: &Path) -> StoreResult<Self> {
        if !root.is_dir() {
            return Err(StoreError::Unavailable {
                path: root.to_path_buf(),
                reason: "block directory does not exist".into(),
            });
        }
        Ok(Self {
            root: root.to_path_buf(),
            read_only: true,
        })
    }

    /// Root directory of the block files.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn path_for(&self, id: &BlockId) -> PathBuf {
        let hex = id.to_hex();
        self.root.join(&hex[..2]).join(&hex[2..])
    }
}

impl BlockStore for DiskBlockStore {
    fn read(&self, id: &BlockId) -> StoreResult<Option<StoredBlock>> {
        match fs::read(self.path_for(id)) {
            Ok(bytes) => StoredBlock::decode(id, &bytes).map(Some),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, block: &StoredBlock) -> StoreResult<BlockId> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        let id = block.compute_id();
        if id.is_null() {
            return Err(StoreError::NullBlockId);
        }
        let path = self.path_for(&id);
        if path.exists() {
            return Ok(id);
        }
        let dir = path.parent().unwrap_or(&self.root);
        fs::create_dir_all(dir)?;

        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        tmp.write_all(&block.encode())?;
        tmp.as_file().sync_data()?;
        tmp.persist(&path).map_err(|e| StoreError::Io(e.error))?;

        debug!(block = %id.short_hex(), kind = %block.kind, size = block.size(), "block written");
        Ok(id)
    }

    fn exists(&self, id: &BlockId) -> StoreResult<bool> {
        Ok(self.path_for(id).is_file())
    }

    fn delete(&self, id: &BlockId) -> StoreResult<bool> {
        if self.read_only {
            return Err(StoreError::ReadOnly);
        }
        match fs::remove_file(self.path_for(id)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
