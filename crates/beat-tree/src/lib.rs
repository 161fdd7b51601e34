//! Versioned file tree for hyperbeat.
//!
//! A [`VersionedTree`] presents the blocks of a [`ContentStore`] as a
//! hierarchy of files and directories addressed by `/`-separated paths.
//! Every completed write publishes a new signed root record, so each
//! version of the tree is an immutable snapshot and readers never observe a
//! half-written file.
//!
//! ```text
//! RootRecord v3 ──root──▶ Directory ─┬─ "index.html" ──▶ File ──▶ [chunk, chunk]
//!                                    └─ "img/" ──▶ Directory ──▶ ...
//! ```
//!
//! [`ContentStore`]: beat_store::ContentStore

pub mod error;
pub mod path;
pub mod reader;
pub mod tree;

pub use error::{TreeError, TreeResult};
pub use path::TreePath;
pub use reader::FileReader;
pub use tree::{Entry, FileStat, TreeOptions, VersionedTree, DEFAULT_CHUNK_SIZE};
