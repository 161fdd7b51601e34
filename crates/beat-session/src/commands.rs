//! The user-facing operations, one session each.

use std::convert::Infallible;
use std::future::Future;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use beat_http::BoundServer;
use beat_net::{Deadline, DownloadReport, JoinOptions, SwarmTransport};
use beat_store::EntryKind;
use beat_tree::{FileStat, TreeError, VersionedTree};
use beat_types::{Address, DiscoveryId};
use tracing::{debug, info, warn};

use crate::config::BeatConfig;
use crate::error::{SessionError, SessionResult};
use crate::ingest;
use crate::manifest::Manifest;
use crate::session::Session;
use crate::state::SessionState;

/// Called once a command knows which tree it is working on, before any
/// long-running step.
pub type TreeAnnouncer = Arc<dyn Fn(Address, DiscoveryId) + Send + Sync>;

/// Everything a command needs from its caller.
#[derive(Clone)]
pub struct Context {
    /// Working directory holding the manifest and the files to ingest.
    pub dir: PathBuf,
    pub home: PathBuf,
    pub config: BeatConfig,
    pub transport: Option<Arc<dyn SwarmTransport>>,
    pub announcer: Option<TreeAnnouncer>,
}

impl Context {
    pub fn new(dir: impl Into<PathBuf>, home: impl Into<PathBuf>, config: BeatConfig) -> Self {
        Self {
            dir: dir.into(),
            home: home.into(),
            config,
            transport: None,
            announcer: None,
        }
    }

    pub fn with_transport(mut self, transport: Arc<dyn SwarmTransport>) -> Self {
        self.transport = Some(transport);
        self
    }

    pub fn with_announcer(mut self, announcer: TreeAnnouncer) -> Self {
        self.announcer = Some(announcer);
        self
    }

    fn session(&self) -> Session {
        let session = Session::new(self.config.clone(), self.home.clone());
        match &self.transport {
            Some(transport) => session.with_transport(transport.clone()),
            None => session,
        }
    }

    fn announce(&self, tree: &VersionedTree) {
        if let Some(announcer) = &self.announcer {
            announcer(tree.address(), tree.discovery_id());
        }
    }

    /// The store root, when it lives inside the working directory.
    fn store_inside_dir(&self) -> Option<PathBuf> {
        let root = self.config.store_root(&self.home);
        root.starts_with(&self.dir).then_some(root)
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("dir", &self.dir)
            .field("home", &self.home)
            .field("config", &self.config)
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

/// Result of a read that may name nothing.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Lookup<T> {
    Found(T),
    NotFound(String),
}

impl<T> Lookup<T> {
    pub fn found(self) -> Option<T> {
        match self {
            Self::Found(value) => Some(value),
            Self::NotFound(_) => None,
        }
    }

    fn from_tree(path: &str, result: Result<T, TreeError>) -> SessionResult<Self> {
        match result {
            Ok(value) => Ok(Self::Found(value)),
            Err(e) if e.is_not_found() => {
                debug!(path, "nothing at path");
                Ok(Self::NotFound(path.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }
}

#[derive(Clone, Debug)]
pub struct InitOutcome {
    pub address: Address,
    pub discovery_id: DiscoveryId,
    pub manifest_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct AddOutcome {
    pub address: Address,
    pub discovery_id: DiscoveryId,
    pub files: Vec<FileStat>,
    pub version: u64,
}

#[derive(Clone, Debug)]
pub struct LsOutcome {
    pub address: Address,
    pub discovery_id: DiscoveryId,
    pub entries: Lookup<Vec<(String, EntryKind)>>,
}

#[derive(Clone, Debug)]
pub struct CatOutcome {
    pub address: Address,
    pub discovery_id: DiscoveryId,
    pub content: Lookup<Vec<u8>>,
}

#[derive(Clone, Debug)]
pub struct PinOutcome {
    pub address: Address,
    pub discovery_id: DiscoveryId,
    pub report: DownloadReport,
}

fn parse_key(key: &str) -> SessionResult<Address> {
    Address::from_hex(key).map_err(|e| SessionError::InvalidKey {
        key: key.to_string(),
        reason: e.to_string(),
    })
}

/// Open the store and the tree at `address`, or a new tree.
async fn open(
    session: &mut Session,
    ctx: &Context,
    address: Option<Address>,
) -> SessionResult<Arc<VersionedTree>> {
    session.open_store().await?;
    let tree = session.open_tree(address).await?;
    ctx.announce(&tree);
    Ok(tree)
}

/// Write the manifest for a freshly generated tree. When another `init` got
/// there first the new key is dropped, so no unreachable writer is left behind.
fn record_manifest(tree: &VersionedTree, dir: &Path) -> SessionResult<PathBuf> {
    match Manifest::new(tree.address()).create(dir) {
        Err(SessionError::ConfigConflict { path }) => {
            let address = tree.address();
            match tree.store().keyring().remove(&address) {
                Ok(()) => debug!(%address, "discarded key of unrecorded tree"),
                Err(e) => warn!(%address, error = %e, "cannot discard key of unrecorded tree"),
            }
            Err(SessionError::ConfigConflict { path })
        }
        other => other,
    }
}

/// Create a new tree and record it in the working directory's manifest.
pub async fn init(ctx: &Context) -> SessionResult<InitOutcome> {
    if Manifest::exists(&ctx.dir) {
        return Err(SessionError::ConfigConflict {
            path: Manifest::path(&ctx.dir),
        });
    }
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, None).await?;
        let manifest_path = record_manifest(&tree, &ctx.dir)?;
        info!(address = %tree.address(), manifest = ?manifest_path, "initialized");
        Ok::<_, SessionError>(InitOutcome {
            address: tree.address(),
            discovery_id: tree.discovery_id(),
            manifest_path,
        })
    }
    .await;
    session.finish(result).await
}

/// Import every non-hidden file in the working directory.
pub async fn add(ctx: &Context) -> SessionResult<AddOutcome> {
    let manifest = Manifest::load(&ctx.dir)?;
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, Some(manifest.key)).await?;
        session.advance(SessionState::Ingesting)?;
        let exclude = ctx.store_inside_dir();
        let files = ingest::ingest(&tree, &ctx.dir, exclude.as_deref()).await?;
        Ok::<_, SessionError>(AddOutcome {
            address: tree.address(),
            discovery_id: tree.discovery_id(),
            files,
            version: tree.version()?,
        })
    }
    .await;
    session.finish(result).await
}

/// Entries of the directory at `path` in the manifest's tree.
pub async fn ls(ctx: &Context, path: &str) -> SessionResult<LsOutcome> {
    let manifest = Manifest::load(&ctx.dir)?;
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, Some(manifest.key)).await?;
        session.advance(SessionState::Listing)?;
        Ok::<_, SessionError>(LsOutcome {
            address: tree.address(),
            discovery_id: tree.discovery_id(),
            entries: Lookup::from_tree(path, tree.read_dir_entries(path))?,
        })
    }
    .await;
    session.finish(result).await
}

/// Contents of the file at `path` in the manifest's tree.
pub async fn cat(ctx: &Context, path: &str) -> SessionResult<CatOutcome> {
    let manifest = Manifest::load(&ctx.dir)?;
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, Some(manifest.key)).await?;
        session.advance(SessionState::Reading)?;
        Ok::<_, SessionError>(CatOutcome {
            address: tree.address(),
            discovery_id: tree.discovery_id(),
            content: Lookup::from_tree(path, tree.read_file(path).await)?,
        })
    }
    .await;
    session.finish(result).await
}

/// Join the swarm for `key` and replicate the whole tree locally.
///
/// With no peers this waits as long as `deadline` allows.
pub async fn pin(ctx: &Context, key: &str, deadline: Deadline) -> SessionResult<PinOutcome> {
    let address = parse_key(key)?;
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, Some(address)).await?;
        session.advance(SessionState::Pinning)?;
        session.join_network(JoinOptions::default()).await?;
        let report = session.download("/", deadline).await?;
        info!(%address, version = report.version, blocks = report.blocks_fetched, "pinned");
        Ok::<_, SessionError>(PinOutcome {
            address,
            discovery_id: tree.discovery_id(),
            report,
        })
    }
    .await;
    session.finish(result).await
}

/// A tree joined to the swarm with its HTTP bridge bound but not yet
/// serving.
pub struct Share {
    session: Session,
    server: BoundServer,
    pub address: Address,
    pub discovery_id: DiscoveryId,
}

impl Share {
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    pub fn url(&self) -> String {
        beat_http::url_for(self.server.local_addr())
    }

    /// Serve until `shutdown` resolves, then close the session.
    ///
    /// A tree this store cannot write is kept in sync with the swarm for as
    /// long as the server runs.
    pub async fn run<F>(self, shutdown: F) -> SessionResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let Share { session, server, .. } = self;
        let result = {
            let sync = keep_synced(&session);
            tokio::select! {
                served = server.serve(shutdown) => served.map_err(SessionError::from),
                never = sync => match never {},
            }
        };
        session.finish(result).await
    }
}

impl std::fmt::Debug for Share {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Share")
            .field("address", &self.address)
            .field("local_addr", &self.server.local_addr())
            .finish()
    }
}

async fn keep_synced(session: &Session) -> Infallible {
    let (Some(bridge), Some(tree)) = (session.network(), session.tree()) else {
        return std::future::pending().await;
    };
    if tree.is_writable().unwrap_or(true) {
        return std::future::pending().await;
    }
    let interval = session.config().swarm.poll_interval();
    loop {
        match bridge.download(tree, "/", Deadline::Unbounded).await {
            Ok(report) if report.blocks_fetched > 0 => {
                info!(address = %tree.address(), version = report.version, blocks = report.blocks_fetched, "synced");
            }
            Ok(_) => {}
            Err(e) => warn!(address = %tree.address(), error = %e, "sync failed"),
        }
        tokio::time::sleep(interval).await;
    }
}

/// Join the swarm for `key` (or the manifest's tree) and bind the HTTP
/// bridge on `port`, falling back to the configured address.
pub async fn share(ctx: &Context, key: Option<&str>, port: Option<u16>) -> SessionResult<Share> {
    let address = match key {
        Some(key) => parse_key(key)?,
        None => Manifest::load(&ctx.dir)?.key,
    };
    let mut session = ctx.session();
    let result = async {
        let tree = open(&mut session, ctx, Some(address)).await?;
        session.advance(SessionState::Sharing)?;
        session.join_network(JoinOptions::default()).await?;
        let mut http = match port {
            Some(port) => ctx.config.http.clone().with_port(port),
            None => ctx.config.http.clone(),
        };
        http.assets_dir = Some(ctx.config.assets_dir(&ctx.home));
        let server = session.bind_http(http).await?;
        info!(%address, addr = %server.local_addr(), "sharing");
        Ok::<_, SessionError>((server, tree.discovery_id()))
    }
    .await;
    match result {
        Ok((server, discovery_id)) => Ok(Share {
            session,
            server,
            address,
            discovery_id,
        }),
        Err(e) => Err(session.fail(e).await),
    }
}
