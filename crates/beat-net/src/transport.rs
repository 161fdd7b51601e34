use std::sync::Arc;

use async_trait::async_trait;
use beat_store::{ContentStore, RootRecord};
use beat_types::{Address, BlockId, DiscoveryId};

use crate::error::NetResult;
use crate::types::PeerId;

/// This process's presence in the swarm: an id plus the store it serves
/// replication reads from.
#[derive(Clone, Debug)]
pub struct LocalPeer {
    pub id: PeerId,
    pub store: ContentStore,
}

impl LocalPeer {
    pub fn new(store: ContentStore) -> Self {
        Self {
            id: PeerId::generate(),
            store,
        }
    }
}

/// Peer discovery for a swarm.
///
/// A transport only finds peers; what is fetched from them and how it is
/// verified is up to the caller.
#[async_trait]
pub trait SwarmTransport: Send + Sync {
    /// Advertise `peer` under `topic`. Announcing twice is a no-op.
    async fn announce(&self, topic: &DiscoveryId, peer: &LocalPeer) -> NetResult<()>;

    /// Stop advertising `peer` under `topic`.
    async fn withdraw(&self, topic: &DiscoveryId, peer: &PeerId) -> NetResult<()>;

    /// Peers currently advertised under `topic`, possibly including the caller.
    async fn lookup(&self, topic: &DiscoveryId) -> NetResult<Vec<Arc<dyn RemotePeer>>>;
}

/// Read access to another peer's replicated data.
#[async_trait]
pub trait RemotePeer: Send + Sync {
    fn id(&self) -> PeerId;

    /// The peer's latest root record for `address`. Unverified.
    async fn head(&self, address: &Address) -> NetResult<Option<RootRecord>>;

    /// The encoded block `id`, if the peer has it. Unverified.
    async fn block(&self, id: &BlockId) -> NetResult<Option<Vec<u8>>>;
}

/// A remote peer served straight from a [`ContentStore`].
#[derive(Clone, Debug)]
pub struct StorePeer {
    id: PeerId,
    store: ContentStore,
}

impl StorePeer {
    pub fn new(id: PeerId, store: ContentStore) -> Self {
        Self { id, store }
    }
}

impl From<&LocalPeer> for StorePeer {
    fn from(peer: &LocalPeer) -> Self {
        Self::new(peer.id, peer.store.clone())
    }
}

#[async_trait]
impl RemotePeer for StorePeer {
    fn id(&self) -> PeerId {
        self.id
    }

    async fn head(&self, address: &Address) -> NetResult<Option<RootRecord>> {
        Ok(self.store.feeds().head(address)?)
    }

    async fn block(&self, id: &BlockId) -> NetResult<Option<Vec<u8>>> {
        Ok(self.store.blocks().read(id)?.map(|b| b.encode()))
    }
}
