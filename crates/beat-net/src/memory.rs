use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use beat_types::DiscoveryId;
use tracing::debug;

use crate::error::NetResult;
use crate::transport::{LocalPeer, RemotePeer, StorePeer, SwarmTransport};
use crate::types::PeerId;

/// In-process swarm hub. Clones share membership, so bridges holding clones
/// of one hub see each other.
#[derive(Clone, Debug, Default)]
pub struct MemorySwarm {
    topics: Arc<RwLock<HashMap<DiscoveryId, Vec<LocalPeer>>>>,
}

impl MemorySwarm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of peers announced under `topic`.
    pub fn members(&self, topic: &DiscoveryId) -> usize {
        self.topics
            .read()
            .expect("swarm lock poisoned")
            .get(topic)
            .map_or(0, Vec::len)
    }
}

#[async_trait]
impl SwarmTransport for MemorySwarm {
    async fn announce(&self, topic: &DiscoveryId, peer: &LocalPeer) -> NetResult<()> {
        let mut topics = self.topics.write().expect("swarm lock poisoned");
        let members = topics.entry(*topic).or_default();
        if !members.iter().any(|m| m.id == peer.id) {
            members.push(peer.clone());
            debug!(%topic, peer = %peer.id, "announced");
        }
        Ok(())
    }

    async fn withdraw(&self, topic: &DiscoveryId, peer: &PeerId) -> NetResult<()> {
        let mut topics = self.topics.write().expect("swarm lock poisoned");
        if let Some(members) = topics.get_mut(topic) {
            members.retain(|m| m.id != *peer);
            if members.is_empty() {
                topics.remove(topic);
            }
        }
        Ok(())
    }

    async fn lookup(&self, topic: &DiscoveryId) -> NetResult<Vec<Arc<dyn RemotePeer>>> {
        let topics = self.topics.read().expect("swarm lock poisoned");
        Ok(topics
            .get(topic)
            .map(|members| {
                members
                    .iter()
                    .map(|m| Arc::new(StorePeer::from(m)) as Arc<dyn RemotePeer>)
                    .collect()
            })
            .unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use beat_store::ContentStore;
    use beat_types::Address;

    use super::*;

    fn topic(byte: u8) -> DiscoveryId {
        Address::from_bytes([byte; 32]).discovery_id()
    }

    #[tokio::test]
    async fn announce_then_lookup() {
        let swarm = MemorySwarm::new();
        let peer = LocalPeer::new(ContentStore::in_memory());
        swarm.announce(&topic(1), &peer).await.unwrap();

        let found = swarm.lookup(&topic(1)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), peer.id);
        assert!(swarm.lookup(&topic(2)).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_announce_is_not_duplicated() {
        let swarm = MemorySwarm::new();
        let peer = LocalPeer::new(ContentStore::in_memory());
        swarm.announce(&topic(1), &peer).await.unwrap();
        swarm.announce(&topic(1), &peer).await.unwrap();
        assert_eq!(swarm.members(&topic(1)), 1);
    }

    #[tokio::test]
    async fn withdraw_removes_membership() {
        let swarm = MemorySwarm::new();
        let a = LocalPeer::new(ContentStore::in_memory());
        let b = LocalPeer::new(ContentStore::in_memory());
        swarm.announce(&topic(1), &a).await.unwrap();
        swarm.announce(&topic(1), &b).await.unwrap();
        swarm.withdraw(&topic(1), &a.id).await.unwrap();

        let found = swarm.lookup(&topic(1)).await.unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id(), b.id);
    }

    #[tokio::test]
    async fn clones_share_the_hub() {
        let swarm = MemorySwarm::new();
        let other = swarm.clone();
        let peer = LocalPeer::new(ContentStore::in_memory());
        swarm.announce(&topic(3), &peer).await.unwrap();
        assert_eq!(other.members(&topic(3)), 1);
    }
}
