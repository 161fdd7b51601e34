//! Swarm membership and replication for hyperbeat.
//!
//! A [`NetworkBridge`] joins a swarm through a [`SwarmTransport`], announces
//! and looks up trees by their discovery id, and downloads missing blocks
//! from peers. Every fetched block is hash-verified and every adopted root
//! record is signature-verified before it touches the local store, so a
//! misbehaving peer can stall a download but never corrupt it.

pub mod bridge;
pub mod directory;
pub mod error;
pub mod memory;
pub mod negotiation;
pub mod transport;
pub mod types;

pub use bridge::NetworkBridge;
pub use directory::DirectorySwarm;
pub use error::{NetError, NetResult};
pub use memory::MemorySwarm;
pub use negotiation::NegotiationEngine;
pub use transport::{LocalPeer, RemotePeer, StorePeer, SwarmTransport};
pub use types::{Deadline, DownloadReport, JoinOptions, PeerId};
