use beat_store::EntryKind;
use beat_tree::{Entry, FileReader, TreeResult, VersionedTree};

/// One child in a directory listing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ListingEntry {
    pub name: String,
    pub is_dir: bool,
}

/// Path-addressed content a tree mount serves.
pub trait ContentSource: Send + Sync {
    fn stat(&self, path: &str) -> TreeResult<Entry>;

    /// Children of the directory at `path`, sorted by name.
    fn list(&self, path: &str) -> TreeResult<Vec<ListingEntry>>;

    fn open(&self, path: &str) -> TreeResult<FileReader>;
}

impl ContentSource for VersionedTree {
    fn stat(&self, path: &str) -> TreeResult<Entry> {
        VersionedTree::stat(self, path)
    }

    fn list(&self, path: &str) -> TreeResult<Vec<ListingEntry>> {
        Ok(self
            .read_dir_entries(path)?
            .into_iter()
            .map(|(name, kind)| ListingEntry {
                name,
                is_dir: kind == EntryKind::Directory,
            })
            .collect())
    }

    fn open(&self, path: &str) -> TreeResult<FileReader> {
        self.open_file(path)
    }
}
