//! Local content store for hyperbeat.
//!
//! A [`ContentStore`] is the leaf resource every session acquires first. It
//! bundles three things that live side by side under one storage root:
//!
//! - **blocks** -- immutable, content-addressed [`StoredBlock`]s (file chunks,
//!   file nodes, directory nodes), keyed by [`BlockId`](beat_types::BlockId)
//! - **feeds** -- per-address append-only history of signed [`RootRecord`]s;
//!   the highest valid record is the tree's current root
//! - **keys** -- writer secret keys for trees created on this machine
//!
//! # Storage Backends
//!
//! - [`InMemoryBlockStore`] / [`InMemoryFeedStore`] -- tests and embedding
//! - [`DiskBlockStore`] / [`DiskFeedStore`] -- the on-disk layout
//!
//! # Design Rules
//!
//! 1. Blocks are immutable once written (content-addressing guarantees this).
//! 2. Block files appear atomically (temp file + rename); a killed process
//!    leaves at most an orphan temp file, never a torn block.
//! 3. Feed records are length + CRC framed; torn tails are skipped on read.
//! 4. Feeds only accept records signed by their address, with increasing
//!    versions.
//! 5. All I/O errors are propagated, never silently ignored.

pub mod block;
pub mod disk;
pub mod error;
pub mod feed;
pub mod keyring;
pub mod memory;
pub mod record;
pub mod store;
pub mod traits;

pub use block::{BlockKind, DirEntry, DirectoryNode, EntryKind, FileNode, StoredBlock};
pub use disk::DiskBlockStore;
pub use error::{StoreError, StoreResult};
pub use feed::DiskFeedStore;
pub use keyring::Keyring;
pub use memory::{InMemoryBlockStore, InMemoryFeedStore};
pub use record::RootRecord;
pub use store::{ContentStore, StoreConfig};
pub use traits::{BlockStore, FeedStore};
