use std::path::PathBuf;
use std::sync::Arc;

use beat_http::{BoundServer, ContentServer, HttpConfig, Mount, MountTable};
use beat_net::{Deadline, DirectorySwarm, DownloadReport, JoinOptions, NetworkBridge, SwarmTransport};
use beat_store::{ContentStore, StoreConfig};
use beat_tree::{TreeOptions, VersionedTree};
use beat_types::Address;
use tracing::{debug, info, warn};

use crate::config::BeatConfig;
use crate::error::{SessionError, SessionResult};
use crate::state::{SessionState, StateMachine};

/// One command's worth of acquired resources.
///
/// Resources are acquired store first, then tree, then network; `close` and
/// `fail` release them in the opposite order.
pub struct Session {
    config: BeatConfig,
    home: PathBuf,
    transport: Option<Arc<dyn SwarmTransport>>,
    machine: StateMachine,
    store: Option<ContentStore>,
    tree: Option<Arc<VersionedTree>>,
    network: Option<NetworkBridge>,
}

impl Session {
    pub fn new(config: BeatConfig, home: PathBuf) -> Self {
        Self {
            config,
            home,
            transport: None,
            machine: StateMachine::new(),
            store: None,
            tree: None,
            network: None,
        }
    }

    /// Use `transport` instead of the configured rendezvous directory.
    pub fn with_transport(mut self, transport: Arc<dyn SwarmTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn state(&self) -> SessionState {
        self.machine.state()
    }

    pub fn machine(&self) -> &StateMachine {
        &self.machine
    }

    pub fn config(&self) -> &BeatConfig {
        &self.config
    }

    pub fn advance(&mut self, next: SessionState) -> SessionResult<()> {
        self.machine.advance(next)
    }

    pub async fn open_store(&mut self) -> SessionResult<ContentStore> {
        self.advance(SessionState::StoreOpening)?;
        let root = self.config.store_root(&self.home);
        let store = ContentStore::open(StoreConfig::new(root)).await?;
        self.store = Some(store.clone());
        self.advance(SessionState::StoreReady)?;
        Ok(store)
    }

    /// Open and await readiness of the tree at `address`, or of a new tree.
    pub async fn open_tree(&mut self, address: Option<Address>) -> SessionResult<Arc<VersionedTree>> {
        self.advance(SessionState::TreeOpening)?;
        let store = self
            .store
            .clone()
            .ok_or(SessionError::InvalidTransition {
                from: SessionState::TreeOpening,
                to: SessionState::TreeReady,
            })?;
        let options: TreeOptions = self.config.tree.clone();
        let tree = Arc::new(VersionedTree::open(store, address, options).await?);
        self.tree = Some(tree.clone());
        tree.ready().await?;
        self.advance(SessionState::TreeReady)?;
        Ok(tree)
    }

    pub fn tree(&self) -> Option<&Arc<VersionedTree>> {
        self.tree.as_ref()
    }

    /// Join the swarm and configure the tree's topic.
    pub async fn join_network(&mut self, options: JoinOptions) -> SessionResult<()> {
        self.advance(SessionState::NetworkJoining)?;
        let (store, tree) = match (&self.store, &self.tree) {
            (Some(store), Some(tree)) => (store.clone(), tree.clone()),
            _ => {
                return Err(SessionError::InvalidTransition {
                    from: SessionState::NetworkJoining,
                    to: SessionState::NetworkConfigured,
                })
            }
        };
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => {
                let dir = self.config.rendezvous_dir(&self.home);
                tokio::fs::create_dir_all(&dir).await?;
                Arc::new(DirectorySwarm::new(dir)) as Arc<dyn SwarmTransport>
            }
        };
        let bridge = NetworkBridge::join(store, transport)?
            .with_poll_interval(self.config.swarm.poll_interval());
        let bridge = self.network.insert(bridge);
        bridge.configure(&tree.discovery_id(), options).await?;
        self.advance(SessionState::NetworkConfigured)?;
        Ok(())
    }

    pub fn network(&self) -> Option<&NetworkBridge> {
        self.network.as_ref()
    }

    /// Replicate the whole tree, or the part under `path`.
    pub async fn download(&mut self, path: &str, deadline: Deadline) -> SessionResult<DownloadReport> {
        self.advance(SessionState::Downloading)?;
        let (Some(bridge), Some(tree)) = (&self.network, &self.tree) else {
            return Err(SessionError::InvalidTransition {
                from: SessionState::NetworkConfigured,
                to: SessionState::Downloading,
            });
        };
        Ok(bridge.download(tree, path, deadline).await?)
    }

    /// Bind the HTTP bridge: the live tree first, then `http.assets_dir`
    /// when that directory exists.
    pub async fn bind_http(&mut self, http: HttpConfig) -> SessionResult<BoundServer> {
        self.advance(SessionState::ServingHttp)?;
        let Some(tree) = &self.tree else {
            return Err(SessionError::InvalidTransition {
                from: SessionState::NetworkConfigured,
                to: SessionState::ServingHttp,
            });
        };
        let mut mounts = MountTable::new().with(Mount::tree("/", tree.clone()));
        if let Some(assets) = http.assets_dir.clone() {
            if assets.is_dir() {
                info!(dir = ?assets, "serving assets behind the tree");
                mounts.push(Mount::assets("/", assets));
            } else {
                debug!(dir = ?assets, "assets directory does not exist");
            }
        }
        Ok(ContentServer::new(http, mounts).bind().await?)
    }

    /// Close everything in reverse acquisition order and finish in `Done`.
    pub async fn close(mut self) -> SessionResult<()> {
        self.advance(SessionState::Closing)?;
        let result = self.release().await;
        self.advance(SessionState::Done)?;
        result
    }

    /// Move to `Failed`, release what was acquired, and hand back `error`.
    pub async fn fail(mut self, error: SessionError) -> SessionError {
        warn!(state = %self.state(), error = %error, "session failed");
        if self.machine.advance(SessionState::Failed).is_err() {
            debug!(state = %self.state(), "session already terminal");
        }
        if let Err(e) = self.release().await {
            warn!(error = %e, "cleanup after failure was incomplete");
        }
        error
    }

    /// Close on success, clean up on failure.
    pub async fn finish<T>(self, result: SessionResult<T>) -> SessionResult<T> {
        match result {
            Ok(value) => {
                self.close().await?;
                Ok(value)
            }
            Err(e) => Err(self.fail(e).await),
        }
    }

    async fn release(&mut self) -> SessionResult<()> {
        let mut first_error = None;
        if let Some(bridge) = self.network.take() {
            if let Err(e) = bridge.close().await {
                warn!(error = %e, "network close failed");
                first_error.get_or_insert(SessionError::from(e));
            }
        }
        if let Some(tree) = self.tree.take() {
            match Arc::try_unwrap(tree) {
                Ok(tree) => tree.close(),
                Err(shared) => debug!(address = %shared.address(), "tree still shared at close"),
            }
        }
        if let Some(store) = self.store.take() {
            store.close();
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("state", &self.state())
            .field("store", &self.store.is_some())
            .field("tree", &self.tree.is_some())
            .field("network", &self.network.is_some())
            .finish()
    }
}
