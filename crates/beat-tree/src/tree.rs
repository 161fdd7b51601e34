use std::sync::Arc;

use beat_crypto::SigningKey;
use beat_store::{
    ContentStore, DirEntry, DirectoryNode, EntryKind, FileNode, RootRecord, StoredBlock,
};
use beat_types::{Address, BlockId, DiscoveryId};
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::sync::{Mutex, OnceCell};
use tracing::{debug, info};

use crate::error::{TreeError, TreeResult};
use crate::path::TreePath;
use crate::reader::FileReader;

/// Default size of a file chunk.
pub const DEFAULT_CHUNK_SIZE: usize = 64 * 1024;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeOptions {
    /// Bytes per stored chunk.
    pub chunk_size: usize,
}

impl Default for TreeOptions {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
        }
    }
}

/// What a path names in the current version.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Entry {
    Directory,
    File { size: u64 },
}

impl Entry {
    pub fn is_dir(&self) -> bool {
        matches!(self, Self::Directory)
    }
}

/// Result of a completed write.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FileStat {
    pub path: TreePath,
    pub size: u64,
    /// Tree version that first contains this write.
    pub version: u64,
}

enum Node {
    Directory(DirectoryNode),
    File(FileNode),
}

type Readiness = Result<Option<Arc<SigningKey>>, String>;

/// A single-writer, versioned tree of files over a [`ContentStore`].
///
/// The handle is created unready; call [`ready`](Self::ready) before any
/// other operation.
pub struct VersionedTree {
    store: ContentStore,
    address: Address,
    options: TreeOptions,
    ready: OnceCell<Readiness>,
    commit_lock: Mutex<()>,
}

impl VersionedTree {
    /// Create a handle for `address`, or for a freshly generated writer key
    /// when `address` is `None`.
    pub async fn open(
        store: ContentStore,
        address: Option<Address>,
        options: TreeOptions,
    ) -> TreeResult<Self> {
        let address = match address {
            Some(address) => address,
            None => store.keyring().generate()?,
        };
        if options.chunk_size == 0 {
            return Err(TreeError::OpenFailed("chunk size must be non-zero".into()));
        }
        debug!(%address, chunk_size = options.chunk_size, "tree handle created");
        Ok(Self {
            store,
            address,
            options,
            ready: OnceCell::new(),
            commit_lock: Mutex::new(()),
        })
    }

    /// Resolve readiness. The first call loads the history head and writer
    /// key; every later call returns the same outcome.
    pub async fn ready(&self) -> TreeResult<()> {
        let outcome = self.ready.get_or_init(|| async { self.load() }).await;
        match outcome {
            Ok(_) => Ok(()),
            Err(reason) => Err(TreeError::OpenFailed(reason.clone())),
        }
    }

    fn load(&self) -> Readiness {
        let head = self
            .store
            .feeds()
            .head(&self.address)
            .map_err(|e| e.to_string())?;
        let key = self
            .store
            .keyring()
            .signing_key(&self.address)
            .map_err(|e| e.to_string())?;
        info!(
            address = %self.address,
            version = head.as_ref().map_or(0, |h| h.version),
            writable = key.is_some(),
            "tree ready"
        );
        Ok(key.map(Arc::new))
    }

    fn writer(&self) -> TreeResult<Option<Arc<SigningKey>>> {
        match self.ready.get() {
            None => Err(TreeError::NotReady),
            Some(Err(reason)) => Err(TreeError::OpenFailed(reason.clone())),
            Some(Ok(key)) => Ok(key.clone()),
        }
    }

    pub fn store(&self) -> &ContentStore {
        &self.store
    }

    pub fn address(&self) -> Address {
        self.address
    }

    pub fn discovery_id(&self) -> DiscoveryId {
        self.address.discovery_id()
    }

    pub fn options(&self) -> &TreeOptions {
        &self.options
    }

    /// Whether this store holds the writer key.
    pub fn is_writable(&self) -> TreeResult<bool> {
        Ok(self.writer()?.is_some())
    }

    /// Latest root record, `None` while the tree is empty.
    pub fn head(&self) -> TreeResult<Option<RootRecord>> {
        self.writer()?;
        Ok(self.store.feeds().head(&self.address)?)
    }

    /// Current version; `0` for an empty tree.
    pub fn version(&self) -> TreeResult<u64> {
        Ok(self.head()?.map_or(0, |h| h.version))
    }

    fn load_block(&self, id: &BlockId) -> TreeResult<StoredBlock> {
        self.store
            .blocks()
            .read(id)?
            .ok_or(TreeError::Unavailable(*id))
    }

    fn load_dir(&self, id: &BlockId) -> TreeResult<DirectoryNode> {
        Ok(DirectoryNode::from_stored_block(&self.load_block(id)?)?)
    }

    fn load_node(&self, entry: &DirEntry) -> TreeResult<Node> {
        let block = self.load_block(&entry.id)?;
        Ok(match entry.kind {
            EntryKind::Directory => Node::Directory(DirectoryNode::from_stored_block(&block)?),
            EntryKind::File => Node::File(FileNode::from_stored_block(&block)?),
        })
    }

    fn root_dir(&self, head: Option<&RootRecord>) -> TreeResult<DirectoryNode> {
        match head {
            Some(record) => self.load_dir(&record.root),
            None => Ok(DirectoryNode::empty()),
        }
    }

    fn resolve(&self, path: &TreePath) -> TreeResult<Node> {
        let head = self.head()?;
        let mut node = Node::Directory(self.root_dir(head.as_ref())?);
        for name in path.components() {
            let dir = match node {
                Node::Directory(dir) => dir,
                Node::File(_) => return Err(TreeError::NotFound(path.to_string())),
            };
            let entry = dir
                .get(name)
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
            node = self.load_node(entry)?;
        }
        Ok(node)
    }

    /// Kind and size of the entry at `path`.
    pub fn stat(&self, path: &str) -> TreeResult<Entry> {
        let path = TreePath::parse(path)?;
        Ok(match self.resolve(&path)? {
            Node::Directory(_) => Entry::Directory,
            Node::File(file) => Entry::File { size: file.size },
        })
    }

    /// Sorted child names of the directory at `path`.
    pub fn read_dir(&self, path: &str) -> TreeResult<Vec<String>> {
        let path = TreePath::parse(path)?;
        match self.resolve(&path)? {
            Node::Directory(dir) => Ok(dir.names()),
            Node::File(_) => Err(TreeError::NotFound(path.to_string())),
        }
    }

    /// Child entries of the directory at `path` with their kinds.
    pub fn read_dir_entries(&self, path: &str) -> TreeResult<Vec<(String, EntryKind)>> {
        let path = TreePath::parse(path)?;
        match self.resolve(&path)? {
            Node::Directory(dir) => Ok(dir.entries.into_iter().map(|e| (e.name, e.kind)).collect()),
            Node::File(_) => Err(TreeError::NotFound(path.to_string())),
        }
    }

    pub fn open_file(&self, path: &str) -> TreeResult<FileReader> {
        let path = TreePath::parse(path)?;
        match self.resolve(&path)? {
            Node::File(file) => Ok(FileReader::new(self.store.clone(), file)),
            Node::Directory(_) => Err(TreeError::NotFound(path.to_string())),
        }
    }

    /// Whole contents of the file at `path`.
    pub async fn read_file(&self, path: &str) -> TreeResult<Vec<u8>> {
        self.open_file(path)?.read_all().await
    }

    /// Every file under `path`, depth first in name order.
    pub fn walk_files(&self, path: &str) -> TreeResult<Vec<(TreePath, u64)>> {
        let path = TreePath::parse(path)?;
        let mut out = Vec::new();
        match self.resolve(&path)? {
            Node::File(file) => out.push((path, file.size)),
            Node::Directory(dir) => self.walk_dir(&path, &dir, &mut out)?,
        }
        Ok(out)
    }

    fn walk_dir(
        &self,
        at: &TreePath,
        dir: &DirectoryNode,
        out: &mut Vec<(TreePath, u64)>,
    ) -> TreeResult<()> {
        for entry in &dir.entries {
            let child = at.join(&entry.name);
            match self.load_node(entry)? {
                Node::File(file) => out.push((child, file.size)),
                Node::Directory(sub) => self.walk_dir(&child, &sub, out)?,
            }
        }
        Ok(())
    }

    /// Create or replace the file at `path` with everything `input` yields.
    ///
    /// The new content becomes visible only after the input is fully
    /// consumed and a new root is published. A failed read leaves the tree
    /// untouched.
    pub async fn write<R>(&self, path: &str, mut input: R) -> TreeResult<FileStat>
    where
        R: AsyncRead + Unpin,
    {
        let key = self.writer()?.ok_or(TreeError::ReadOnly(self.address))?;
        let path = TreePath::parse(path)?;
        if path.is_root() {
            return Err(TreeError::InvalidPath {
                path: path.to_string(),
                reason: "cannot write a file at the root".into(),
            });
        }
        let failed = |reason: String| TreeError::WriteFailed {
            path: path.to_string(),
            reason,
        };

        let chunk_size = self.options.chunk_size;
        let mut buf = vec![0u8; chunk_size];
        let mut chunks = Vec::new();
        let mut size = 0u64;
        loop {
            let filled = fill(&mut input, &mut buf)
                .await
                .map_err(|e| failed(e.to_string()))?;
            if filled == 0 {
                break;
            }
            let id = self
                .store
                .blocks()
                .write(&StoredBlock::chunk(buf[..filled].to_vec()))
                .map_err(|e| failed(e.to_string()))?;
            chunks.push(id);
            size += filled as u64;
            if filled < chunk_size {
                break;
            }
        }

        let node = FileNode {
            size,
            chunk_size: chunk_size as u64,
            chunks,
        };
        let file_id = self
            .store
            .blocks()
            .write(&node.to_stored_block()?)
            .map_err(|e| failed(e.to_string()))?;

        let _guard = self.commit_lock.lock().await;
        let head = self.store.feeds().head(&self.address)?;
        let root = self.root_dir(head.as_ref())?;
        let root_id = self
            .insert(root, path.components(), file_id)
            .map_err(|e| match e {
                TreeError::WriteFailed { reason, .. } => failed(reason),
                other => other,
            })?;
        let version = match head {
            Some(head) if head.root == root_id => {
                debug!(address = %self.address, %path, version = head.version, "content unchanged");
                head.version
            }
            head => {
                let version = head.map_or(0, |h| h.version) + 1;
                let record = RootRecord::sign(&key, version, root_id);
                self.store.feeds().append(&self.address, &record)?;
                version
            }
        };

        debug!(address = %self.address, %path, size, version, "file written");
        Ok(FileStat {
            path,
            size,
            version,
        })
    }

    pub async fn write_bytes(&self, path: &str, bytes: impl AsRef<[u8]>) -> TreeResult<FileStat> {
        self.write(path, bytes.as_ref()).await
    }

    /// Rebuild `dir` with a file at `components`, returning the new
    /// directory block id.
    fn insert(
        &self,
        mut dir: DirectoryNode,
        components: &[String],
        file_id: BlockId,
    ) -> TreeResult<BlockId> {
        let (name, rest) = components
            .split_first()
            .ok_or_else(|| TreeError::WriteFailed {
                path: String::new(),
                reason: "empty path".into(),
            })?;
        let existing = dir.get(name).cloned();
        let entry = if rest.is_empty() {
            if matches!(existing, Some(ref e) if e.kind == EntryKind::Directory) {
                return Err(TreeError::WriteFailed {
                    path: String::new(),
                    reason: format!("{name:?} is a directory"),
                });
            }
            DirEntry::new(name.clone(), EntryKind::File, file_id)
        } else {
            let child = match existing {
                None => DirectoryNode::empty(),
                Some(e) if e.kind == EntryKind::Directory => self.load_dir(&e.id)?,
                Some(_) => {
                    return Err(TreeError::WriteFailed {
                        path: String::new(),
                        reason: format!("{name:?} is a file"),
                    })
                }
            };
            DirEntry::new(name.clone(), EntryKind::Directory, self.insert(child, rest, file_id)?)
        };
        dir.upsert(entry);
        Ok(self.store.blocks().write(&dir.to_stored_block()?)?)
    }

    /// Release the handle.
    pub fn close(self) {
        debug!(address = %self.address, "tree closed");
    }
}

impl std::fmt::Debug for VersionedTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VersionedTree")
            .field("address", &self.address)
            .field("ready", &self.ready.initialized())
            .finish()
    }
}

/// Read until `buf` is full or the input ends; returns the bytes read.
async fn fill<R: AsyncRead + Unpin>(input: &mut R, buf: &mut [u8]) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        let n = input.read(&mut buf[filled..]).await?;
        if n == 0 {
            break;
        }
        filled += n;
    }
    Ok(filled)
}

#[cfg(test)]
mod tests {
    use std::io;
    use std::pin::Pin;
    use std::task::{Context, Poll};

    use tokio::io::ReadBuf;

    use super::*;

    async fn ready_tree() -> VersionedTree {
        let tree = VersionedTree::open(ContentStore::in_memory(), None, TreeOptions::default())
            .await
            .unwrap();
        tree.ready().await.unwrap();
        tree
    }

    /// Yields some bytes, then fails.
    struct BrokenInput {
        sent: bool,
    }

    impl AsyncRead for BrokenInput {
        fn poll_read(
            mut self: Pin<&mut Self>,
            _cx: &mut Context<'_>,
            buf: &mut ReadBuf<'_>,
        ) -> Poll<io::Result<()>> {
            if self.sent {
                Poll::Ready(Err(io::Error::other("disk unplugged")))
            } else {
                self.sent = true;
                buf.put_slice(b"partial");
                Poll::Ready(Ok(()))
            }
        }
    }

    #[tokio::test]
    async fn write_then_read_back() {
        let tree = ready_tree().await;
        let stat = tree.write_bytes("/docs/a.txt", b"hello").await.unwrap();
        assert_eq!(stat.size, 5);
        assert_eq!(stat.version, 1);
        assert_eq!(tree.read_file("docs/a.txt").await.unwrap(), b"hello");
        assert_eq!(tree.read_dir("/").unwrap(), vec!["docs"]);
        assert_eq!(tree.read_dir("/docs").unwrap(), vec!["a.txt"]);
        assert_eq!(tree.stat("/docs").unwrap(), Entry::Directory);
        assert_eq!(tree.stat("/docs/a.txt").unwrap(), Entry::File { size: 5 });
    }

    #[tokio::test]
    async fn operations_before_ready_fail() {
        let tree = VersionedTree::open(ContentStore::in_memory(), None, TreeOptions::default())
            .await
            .unwrap();
        assert!(matches!(tree.read_dir("/"), Err(TreeError::NotReady)));
        assert!(matches!(tree.write_bytes("/a", b"x").await, Err(TreeError::NotReady)));
        assert!(matches!(tree.version(), Err(TreeError::NotReady)));
    }

    #[tokio::test]
    async fn ready_resolves_once() {
        let tree = ready_tree().await;
        tree.ready().await.unwrap();
        tree.ready().await.unwrap();
        assert!(tree.is_writable().unwrap());
    }

    #[tokio::test]
    async fn corrupt_key_fails_readiness_consistently() {
        let dir = tempfile::tempdir().unwrap();
        let store = ContentStore::open(beat_store::StoreConfig::new(dir.path()))
            .await
            .unwrap();
        let tree = VersionedTree::open(store, None, TreeOptions::default())
            .await
            .unwrap();
        let key_file = dir
            .path()
            .join("keys")
            .join(format!("{}.key", tree.address().to_hex()));
        std::fs::write(&key_file, hex_of(&SigningKey::generate())).unwrap();

        assert!(matches!(tree.ready().await, Err(TreeError::OpenFailed(_))));
        assert!(matches!(tree.ready().await, Err(TreeError::OpenFailed(_))));
        assert!(matches!(tree.read_dir("/"), Err(TreeError::OpenFailed(_))));
    }

    fn hex_of(key: &SigningKey) -> String {
        key.as_bytes().iter().map(|b| format!("{b:02x}")).collect()
    }

    #[tokio::test]
    async fn empty_tree_lists_nothing() {
        let tree = ready_tree().await;
        assert!(tree.read_dir("/").unwrap().is_empty());
        assert_eq!(tree.version().unwrap(), 0);
    }

    #[tokio::test]
    async fn missing_paths_are_not_found() {
        let tree = ready_tree().await;
        tree.write_bytes("/a.txt", b"x").await.unwrap();
        assert!(tree.read_file("/nope").await.unwrap_err().is_not_found());
        assert!(tree.read_dir("/a.txt").unwrap_err().is_not_found());
        assert!(tree.read_file("/").await.unwrap_err().is_not_found());
        assert!(tree.stat("/a.txt/child").unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn paths_are_case_sensitive() {
        let tree = ready_tree().await;
        tree.write_bytes("/A.txt", b"upper").await.unwrap();
        tree.write_bytes("/a.txt", b"lower").await.unwrap();
        assert_eq!(tree.read_dir("/").unwrap(), vec!["A.txt", "a.txt"]);
        assert_eq!(tree.read_file("/A.txt").await.unwrap(), b"upper");
    }

    #[tokio::test]
    async fn rewrite_replaces_content_and_bumps_version() {
        let tree = ready_tree().await;
        tree.write_bytes("/f", b"one").await.unwrap();
        let stat = tree.write_bytes("/f", b"two!").await.unwrap();
        assert_eq!(stat.version, 2);
        assert_eq!(tree.version().unwrap(), 2);
        assert_eq!(tree.read_file("/f").await.unwrap(), b"two!");
    }

    #[tokio::test]
    async fn identical_rewrite_keeps_version() {
        let tree = ready_tree().await;
        tree.write_bytes("/a/f", b"same").await.unwrap();
        tree.write_bytes("/g", b"other").await.unwrap();
        let stat = tree.write_bytes("/a/f", b"same").await.unwrap();
        assert_eq!(stat.version, 2);
        assert_eq!(tree.version().unwrap(), 2);
        assert_eq!(tree.store().feeds().records(&tree.address()).unwrap().len(), 2);
    }

    #[tokio::test]
    async fn foreign_tree_is_read_only() {
        let other = ready_tree().await;
        other.write_bytes("/x", b"theirs").await.unwrap();

        let tree = VersionedTree::open(ContentStore::in_memory(), Some(other.address()), TreeOptions::default())
            .await
            .unwrap();
        tree.ready().await.unwrap();
        assert!(!tree.is_writable().unwrap());
        assert!(tree.read_dir("/").unwrap().is_empty());
        assert!(matches!(
            tree.write_bytes("/y", b"mine").await,
            Err(TreeError::ReadOnly(a)) if a == other.address()
        ));
    }

    #[tokio::test]
    async fn failed_input_leaves_tree_untouched() {
        let tree = ready_tree().await;
        tree.write_bytes("/keep", b"k").await.unwrap();
        let err = tree
            .write("/broken", BrokenInput { sent: false })
            .await
            .unwrap_err();
        assert!(matches!(err, TreeError::WriteFailed { .. }));
        assert_eq!(tree.version().unwrap(), 1);
        assert_eq!(tree.read_dir("/").unwrap(), vec!["keep"]);
    }

    #[tokio::test]
    async fn file_in_the_way_of_directory_fails() {
        let tree = ready_tree().await;
        tree.write_bytes("/a", b"file").await.unwrap();
        let err = tree.write_bytes("/a/b", b"nested").await.unwrap_err();
        assert!(matches!(err, TreeError::WriteFailed { ref path, .. } if path == "/a/b"));

        tree.write_bytes("/d/x", b"x").await.unwrap();
        assert!(matches!(
            tree.write_bytes("/d", b"over a dir").await,
            Err(TreeError::WriteFailed { .. })
        ));
    }

    #[tokio::test]
    async fn writing_root_is_invalid() {
        let tree = ready_tree().await;
        assert!(matches!(
            tree.write_bytes("/", b"x").await,
            Err(TreeError::InvalidPath { .. })
        ));
    }

    #[tokio::test]
    async fn concurrent_disjoint_writes_all_land() {
        let tree = ready_tree().await;
        let names: Vec<String> = (0..16).map(|i| format!("/dir{}/file{i}", i % 3)).collect();
        let writes = names
            .iter()
            .map(|name| tree.write_bytes(name, name.as_bytes().to_vec()));
        futures::future::try_join_all(writes).await.unwrap();

        assert_eq!(tree.version().unwrap(), 16);
        for name in &names {
            assert_eq!(tree.read_file(name).await.unwrap(), name.as_bytes());
        }
        assert_eq!(tree.walk_files("/").unwrap().len(), 16);
    }

    #[tokio::test]
    async fn empty_file_roundtrips() {
        let tree = ready_tree().await;
        let stat = tree.write_bytes("/empty", b"").await.unwrap();
        assert_eq!(stat.size, 0);
        assert!(tree.read_file("/empty").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_directory_block_is_unavailable() {
        let tree = ready_tree().await;
        tree.write_bytes("/sub/f", b"x").await.unwrap();
        let root = tree.head().unwrap().unwrap().root;
        let root_dir = tree.load_dir(&root).unwrap();
        let sub = root_dir.get("sub").unwrap().id;
        tree.store().blocks().delete(&sub).unwrap();
        assert!(matches!(tree.read_dir("/sub"), Err(TreeError::Unavailable(id)) if id == sub));
    }

    #[tokio::test]
    async fn history_survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let address = {
            let store = ContentStore::open(beat_store::StoreConfig::new(dir.path()))
                .await
                .unwrap();
            let tree = VersionedTree::open(store, None, TreeOptions::default())
                .await
                .unwrap();
            tree.ready().await.unwrap();
            tree.write_bytes("/persist.txt", b"still here").await.unwrap();
            let address = tree.address();
            tree.close();
            address
        };

        let store = ContentStore::open(beat_store::StoreConfig::new(dir.path()))
            .await
            .unwrap();
        let tree = VersionedTree::open(store, Some(address), TreeOptions::default())
            .await
            .unwrap();
        tree.ready().await.unwrap();
        assert!(tree.is_writable().unwrap());
        assert_eq!(tree.read_file("/persist.txt").await.unwrap(), b"still here");
    }
}
