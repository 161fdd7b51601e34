use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use beat_store::{BlockKind, ContentStore, DirectoryNode, EntryKind, FileNode, StoreError, StoredBlock};
use beat_tree::{TreeError, TreePath, VersionedTree};
use beat_types::{BlockId, DiscoveryId};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use crate::error::{NetError, NetResult};
use crate::negotiation::NegotiationEngine;
use crate::transport::{LocalPeer, RemotePeer, SwarmTransport};
use crate::types::{Deadline, DownloadReport, JoinOptions, PeerId};

/// Pause between lookup rounds while blocks are still missing.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A store's membership in a swarm.
///
/// Serves the shared store to peers that find it, and pulls trees from
/// peers into it.
pub struct NetworkBridge {
    local: LocalPeer,
    transport: Arc<dyn SwarmTransport>,
    topics: Mutex<HashMap<DiscoveryId, JoinOptions>>,
    poll_interval: Duration,
}

impl NetworkBridge {
    pub fn join(store: ContentStore, transport: Arc<dyn SwarmTransport>) -> NetResult<Self> {
        let local = LocalPeer::new(store);
        info!(peer = %local.id, "joined swarm");
        Ok(Self {
            local,
            transport,
            topics: Mutex::new(HashMap::new()),
            poll_interval: DEFAULT_POLL_INTERVAL,
        })
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn peer_id(&self) -> PeerId {
        self.local.id
    }

    /// Current flags for `topic`, if it was ever configured.
    pub async fn options(&self, topic: &DiscoveryId) -> Option<JoinOptions> {
        self.topics.lock().await.get(topic).copied()
    }

    /// Set participation flags for `topic`.
    ///
    /// Only flag changes reach the transport, so repeating a call is a no-op.
    pub async fn configure(&self, topic: &DiscoveryId, options: JoinOptions) -> NetResult<()> {
        let mut topics = self.topics.lock().await;
        let previous = topics.get(topic).copied().unwrap_or(JoinOptions::NONE);
        if options.announce && !previous.announce {
            self.transport.announce(topic, &self.local).await?;
        } else if !options.announce && previous.announce {
            self.transport.withdraw(topic, &self.local.id).await?;
        }
        topics.insert(*topic, options);
        debug!(%topic, announce = options.announce, lookup = options.lookup, "topic configured");
        Ok(())
    }

    /// Replicate everything reachable from `path` in `tree` into the local
    /// store, waiting for peers as long as `deadline` allows.
    pub async fn download(
        &self,
        tree: &VersionedTree,
        path: &str,
        deadline: Deadline,
    ) -> NetResult<DownloadReport> {
        tree.version()?;
        let topic = tree.discovery_id();
        let lookup = self
            .topics
            .lock()
            .await
            .get(&topic)
            .is_some_and(|o| o.lookup);
        if !lookup {
            return Err(NetError::LookupDisabled(topic));
        }
        let path = TreePath::parse(path)?;

        match deadline {
            Deadline::Unbounded => self.replicate(tree, &path).await,
            Deadline::After(limit) => tokio::time::timeout(limit, self.replicate(tree, &path))
                .await
                .map_err(|_| NetError::DeadlineExceeded(limit))?,
        }
    }

    async fn replicate(&self, tree: &VersionedTree, path: &TreePath) -> NetResult<DownloadReport> {
        let mut report = DownloadReport::default();
        loop {
            report.rounds += 1;
            if self.sync_round(tree, path, &mut report).await? {
                info!(
                    address = %tree.address(),
                    %path,
                    version = report.version,
                    blocks = report.blocks_fetched,
                    bytes = report.bytes_fetched,
                    "download complete"
                );
                return Ok(report);
            }
            debug!(address = %tree.address(), round = report.rounds, "waiting for peers");
            tokio::time::sleep(self.poll_interval).await;
        }
    }

    async fn peers(&self, topic: &DiscoveryId) -> Vec<Arc<dyn RemotePeer>> {
        match self.transport.lookup(topic).await {
            Ok(peers) => peers
                .into_iter()
                .filter(|p| p.id() != self.local.id)
                .collect(),
            Err(e) => {
                warn!(%topic, error = %e, "peer lookup failed");
                Vec::new()
            }
        }
    }

    /// One lookup round. Returns `true` once nothing under `path` is missing.
    async fn sync_round(
        &self,
        tree: &VersionedTree,
        path: &TreePath,
        report: &mut DownloadReport,
    ) -> NetResult<bool> {
        let address = tree.address();
        let store = tree.store();
        let peers = self.peers(&tree.discovery_id()).await;

        let mut offers = Vec::new();
        for peer in &peers {
            match peer.head(&address).await {
                Ok(Some(record)) => offers.push(record),
                Ok(None) => {}
                Err(e) => warn!(peer = %peer.id(), error = %e, "head request failed"),
            }
        }
        let local_head = store.feeds().head(&address)?;
        if let Some(record) = NegotiationEngine::choose_head(&address, local_head.as_ref(), offers) {
            match store.feeds().append(&address, &record) {
                Ok(()) => debug!(%address, version = record.version, "adopted remote root"),
                Err(StoreError::StaleRecord { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let Some(head) = store.feeds().head(&address)? else {
            return Ok(false);
        };
        report.version = head.version;

        let mut current = (head.root, BlockKind::Directory);
        for name in path.components() {
            if current.1 != BlockKind::Directory {
                return Err(TreeError::NotFound(path.to_string()).into());
            }
            if !self.ensure(store, &current.0, &peers, report).await? {
                return Ok(false);
            }
            let dir = self.local_dir(store, &current.0)?;
            let entry = dir
                .get(name)
                .ok_or_else(|| TreeError::NotFound(path.to_string()))?;
            current = (entry.id, block_kind(entry.kind));
        }

        self.fill_subtree(store, current, &peers, report).await
    }

    /// Fetch every missing block under `top`, breadth first.
    async fn fill_subtree(
        &self,
        store: &ContentStore,
        top: (BlockId, BlockKind),
        peers: &[Arc<dyn RemotePeer>],
        report: &mut DownloadReport,
    ) -> NetResult<bool> {
        let mut complete = true;
        let mut seen = HashSet::new();
        let mut frontier = vec![top];
        while !frontier.is_empty() {
            frontier.retain(|(id, _)| seen.insert(*id));
            let ids: Vec<BlockId> = frontier.iter().map(|(id, _)| *id).collect();
            let wants = NegotiationEngine::compute_wants(store.blocks(), &ids)?;
            let mut unavailable = HashSet::new();
            for id in wants {
                if !self.fetch(store, &id, peers, report).await? {
                    unavailable.insert(id);
                }
            }

            let mut next = Vec::new();
            for (id, kind) in frontier {
                if unavailable.contains(&id) {
                    complete = false;
                    continue;
                }
                match kind {
                    BlockKind::Chunk => {}
                    BlockKind::File => {
                        let node = FileNode::from_stored_block(&self.local_block(store, &id)?)?;
                        next.extend(node.chunks.into_iter().map(|c| (c, BlockKind::Chunk)));
                    }
                    BlockKind::Directory => {
                        let dir = self.local_dir(store, &id)?;
                        next.extend(dir.entries.into_iter().map(|e| (e.id, block_kind(e.kind))));
                    }
                }
            }
            frontier = next;
        }
        Ok(complete)
    }

    async fn ensure(
        &self,
        store: &ContentStore,
        id: &BlockId,
        peers: &[Arc<dyn RemotePeer>],
        report: &mut DownloadReport,
    ) -> NetResult<bool> {
        if store.blocks().exists(id)? {
            return Ok(true);
        }
        self.fetch(store, id, peers, report).await
    }

    /// Ask each peer in turn for `id`; the first copy that verifies is kept.
    async fn fetch(
        &self,
        store: &ContentStore,
        id: &BlockId,
        peers: &[Arc<dyn RemotePeer>],
        report: &mut DownloadReport,
    ) -> NetResult<bool> {
        for peer in peers {
            let bytes = match peer.block(id).await {
                Ok(Some(bytes)) => bytes,
                Ok(None) => continue,
                Err(e) => {
                    warn!(peer = %peer.id(), block = %id, error = %e, "block request failed");
                    continue;
                }
            };
            match StoredBlock::decode(id, &bytes) {
                Ok(block) => {
                    store.blocks().write(&block)?;
                    report.blocks_fetched += 1;
                    report.bytes_fetched += bytes.len() as u64;
                    debug!(peer = %peer.id(), block = %id, kind = %block.kind, "block fetched");
                    return Ok(true);
                }
                Err(e) => {
                    report.blocks_rejected += 1;
                    warn!(peer = %peer.id(), block = %id, error = %e, "discarding block that failed verification");
                }
            }
        }
        Ok(false)
    }

    fn local_block(&self, store: &ContentStore, id: &BlockId) -> NetResult<StoredBlock> {
        store
            .blocks()
            .read(id)?
            .ok_or_else(|| NetError::Tree(TreeError::Unavailable(*id)))
    }

    fn local_dir(&self, store: &ContentStore, id: &BlockId) -> NetResult<DirectoryNode> {
        Ok(DirectoryNode::from_stored_block(&self.local_block(store, id)?)?)
    }

    /// Withdraw from every announced topic.
    pub async fn close(self) -> NetResult<()> {
        let topics = self.topics.into_inner();
        for (topic, options) in topics {
            if options.announce {
                if let Err(e) = self.transport.withdraw(&topic, &self.local.id).await {
                    warn!(%topic, error = %e, "withdraw failed");
                }
            }
        }
        info!(peer = %self.local.id, "left swarm");
        Ok(())
    }
}

impl std::fmt::Debug for NetworkBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetworkBridge")
            .field("peer", &self.local.id)
            .field("poll_interval", &self.poll_interval)
            .finish()
    }
}

fn block_kind(kind: EntryKind) -> BlockKind {
    match kind {
        EntryKind::File => BlockKind::File,
        EntryKind::Directory => BlockKind::Directory,
    }
}
