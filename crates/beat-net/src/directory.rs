use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use beat_store::{ContentStore, StoreConfig};
use beat_types::DiscoveryId;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{NetError, NetResult};
use crate::transport::{LocalPeer, RemotePeer, StorePeer, SwarmTransport};
use crate::types::PeerId;

/// Contents of one rendezvous file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
struct Rendezvous {
    peer_id: PeerId,
    store_root: PathBuf,
}

/// Swarm over a shared rendezvous directory.
///
/// Announcing writes `<dir>/<topic hex>/<peer id>.json` naming the peer's
/// store root; lookup opens each listed store read-only. Every process on
/// the machine pointing at the same directory joins the same swarm.
#[derive(Clone, Debug)]
pub struct DirectorySwarm {
    dir: PathBuf,
}

impl DirectorySwarm {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn topic_dir(&self, topic: &DiscoveryId) -> PathBuf {
        self.dir.join(topic.to_hex())
    }

    fn entry_path(&self, topic: &DiscoveryId, peer: &PeerId) -> PathBuf {
        self.topic_dir(topic).join(format!("{peer}.json"))
    }

    async fn open_entry(&self, path: &Path) -> NetResult<StorePeer> {
        let text = tokio::fs::read(path).await?;
        let entry: Rendezvous =
            serde_json::from_slice(&text).map_err(|e| NetError::Serialization(e.to_string()))?;
        let store = ContentStore::open(StoreConfig::read_only(&entry.store_root)).await?;
        Ok(StorePeer::new(entry.peer_id, store))
    }
}

#[async_trait]
impl SwarmTransport for DirectorySwarm {
    async fn announce(&self, topic: &DiscoveryId, peer: &LocalPeer) -> NetResult<()> {
        let store_root = peer.store.root().ok_or_else(|| {
            NetError::Transport("a directory swarm needs an on-disk store".into())
        })?;
        let entry = Rendezvous {
            peer_id: peer.id,
            store_root: store_root.to_path_buf(),
        };
        let json =
            serde_json::to_vec_pretty(&entry).map_err(|e| NetError::Serialization(e.to_string()))?;
        tokio::fs::create_dir_all(self.topic_dir(topic)).await?;
        tokio::fs::write(self.entry_path(topic, &peer.id), json).await?;
        debug!(%topic, peer = %peer.id, dir = ?self.dir, "announced");
        Ok(())
    }

    async fn withdraw(&self, topic: &DiscoveryId, peer: &PeerId) -> NetResult<()> {
        match tokio::fs::remove_file(self.entry_path(topic, peer)).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn lookup(&self, topic: &DiscoveryId) -> NetResult<Vec<Arc<dyn RemotePeer>>> {
        let mut entries = match tokio::fs::read_dir(self.topic_dir(topic)).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut peers: Vec<Arc<dyn RemotePeer>> = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            match self.open_entry(&path).await {
                Ok(peer) => peers.push(Arc::new(peer)),
                Err(e) => warn!(path = ?path, error = %e, "skipping unusable rendezvous entry"),
            }
        }
        Ok(peers)
    }
}
