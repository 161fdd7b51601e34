//! Foundation types for hyperbeat.
//!
//! Every other hyperbeat crate depends on `beat-types`.
//!
//! # Key Types
//!
//! - [`Address`]: public identifier of a tree's signed history (an Ed25519 public key)
//! - [`DiscoveryId`]: swarm topic derived from an [`Address`], never persisted
//! - [`BlockId`]: content-addressed identifier of a stored block (BLAKE3)

pub mod address;
pub mod block;
pub mod error;

pub use address::{Address, DiscoveryId};
pub use block::BlockId;
pub use error::TypeError;
