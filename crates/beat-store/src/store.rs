use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::disk::DiskBlockStore;
use crate::error::{StoreError, StoreResult};
use crate::feed::DiskFeedStore;
use crate::keyring::Keyring;
use crate::memory::{InMemoryBlockStore, InMemoryFeedStore};
use crate::traits::{BlockStore, FeedStore};

/// Marker written at the storage root on first open.
const LAYOUT_FILE: &str = "LAYOUT";
const LAYOUT_VERSION: &str = "beat-store-v1";

/// Where and how to open a [`ContentStore`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Storage root directory.
    pub root: PathBuf,
    /// Open without write access; the root must already exist.
    #[serde(default)]
    pub read_only: bool,
}

impl StoreConfig {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: false,
        }
    }

    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            read_only: true,
        }
    }
}

struct Inner {
    root: Option<PathBuf>,
    read_only: bool,
    blocks: Box<dyn BlockStore>,
    feeds: Box<dyn FeedStore>,
    keyring: Keyring,
}

/// Handle to local block storage shared by the tree and the network bridge.
///
/// Cloning is cheap; all clones refer to the same backends.
#[derive(Clone)]
pub struct ContentStore {
    inner: Arc<Inner>,
}

impl ContentStore {
    /// Open (or create) the on-disk store described by `config`.
    ///
    /// Creates `blocks/`, `feeds/` and `keys/` under the root on first open.
    /// Any failure to reach or initialize the root is reported as
    /// [`StoreError::Unavailable`].
    pub async fn open(config: StoreConfig) -> StoreResult<Self> {
        let root = config.root.clone();
        let store = tokio::task::spawn_blocking(move || Self::open_blocking(&config))
            .await
            .map_err(|e| StoreError::Unavailable {
                path: root,
                reason: e.to_string(),
            })??;
        info!(root = ?store.root(), read_only = store.is_read_only(), "content store open");
        Ok(store)
    }

    fn open_blocking(config: &StoreConfig) -> StoreResult<Self> {
        let root = config.root.as_path();
        let unavailable = |reason: String| StoreError::Unavailable {
            path: root.to_path_buf(),
            reason,
        };

        if config.read_only {
            if !root.is_dir() {
                return Err(unavailable("store does not exist".into()));
            }
        } else {
            fs::create_dir_all(root).map_err(|e| unavailable(e.to_string()))?;
        }
        check_layout(root, config.read_only).map_err(|e| match e {
            StoreError::Io(io) => unavailable(io.to_string()),
            other => other,
        })?;

        let (blocks, feeds) = if config.read_only {
            (
                DiskBlockStore::open_read_only(&root.join("blocks"))?,
                DiskFeedStore::open_read_only(&root.join("feeds"))?,
            )
        } else {
            (
                DiskBlockStore::open(&root.join("blocks")).map_err(|e| unavailable(e.to_string()))?,
                DiskFeedStore::open(&root.join("feeds")).map_err(|e| unavailable(e.to_string()))?,
            )
        };

        Ok(Self {
            inner: Arc::new(Inner {
                root: Some(root.to_path_buf()),
                read_only: config.read_only,
                blocks: Box::new(blocks),
                feeds: Box::new(feeds),
                keyring: Keyring::on_disk(&root.join("keys")),
            }),
        })
    }

    /// A store backed entirely by memory.
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(Inner {
                root: None,
                read_only: false,
                blocks: Box::new(InMemoryBlockStore::new()),
                feeds: Box::new(InMemoryFeedStore::new()),
                keyring: Keyring::in_memory(),
            }),
        }
    }

    /// Blocks shared by every tree in this store.
    pub fn blocks(&self) -> &dyn BlockStore {
        self.inner.blocks.as_ref()
    }

    /// Signed root histories.
    pub fn feeds(&self) -> &dyn FeedStore {
        self.inner.feeds.as_ref()
    }

    /// Writer keys held by this store.
    pub fn keyring(&self) -> &Keyring {
        &self.inner.keyring
    }

    /// Storage root, or `None` for in-memory stores.
    pub fn root(&self) -> Option<&Path> {
        self.inner.root.as_deref()
    }

    pub fn is_read_only(&self) -> bool {
        self.inner.read_only
    }

    /// Returns `true` if both handles refer to the same backends.
    pub fn same_store(&self, other: &ContentStore) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// Release this handle. Backends close when the last clone is released.
    pub fn close(self) {
        info!(root = ?self.root(), handles = Arc::strong_count(&self.inner) - 1, "content store handle released");
    }
}

impl std::fmt::Debug for ContentStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ContentStore")
            .field("root", &self.inner.root)
            .field("read_only", &self.inner.read_only)
            .finish()
    }
}

fn check_layout(root: &Path, read_only: bool) -> StoreResult<()> {
    let marker = root.join(LAYOUT_FILE);
    match fs::read_to_string(&marker) {
        Ok(found) if found.trim() == LAYOUT_VERSION => Ok(()),
        Ok(found) => Err(StoreError::Unavailable {
            path: root.to_path_buf(),
            reason: format!("unsupported store layout {:?}", found.trim()),
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound && !read_only => {
            fs::write(&marker, LAYOUT_VERSION)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}
