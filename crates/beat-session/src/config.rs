use std::path::{Path, PathBuf};
use std::time::Duration;

use beat_http::HttpConfig;
use beat_tree::TreeOptions;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Overrides the hyperbeat home directory (default `~/.hyperbeat`).
pub const HOME_ENV: &str = "HYPERBEAT_HOME";
pub const CONFIG_FILE: &str = "config.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {message}", path.display())]
    Parse { path: PathBuf, message: String },

    #[error("cannot determine home directory; set {HOME_ENV}")]
    NoHome,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSection {
    /// Content store root; `<home>/store` when unset.
    pub root: Option<PathBuf>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SwarmSection {
    /// Rendezvous directory shared by local peers; `<home>/swarm` when unset.
    pub rendezvous_dir: Option<PathBuf>,
    pub poll_interval_ms: u64,
}

impl Default for SwarmSection {
    fn default() -> Self {
        Self {
            rendezvous_dir: None,
            poll_interval_ms: 1000,
        }
    }
}

impl SwarmSection {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }
}

/// Everything configurable about a hyperbeat invocation.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BeatConfig {
    pub store: StoreSection,
    pub tree: TreeOptions,
    pub swarm: SwarmSection,
    pub http: HttpConfig,
}

impl BeatConfig {
    /// Load from `explicit` if given, otherwise from `<home>/config.toml`
    /// when it exists, otherwise defaults.
    pub fn load(explicit: Option<&Path>, home: &Path) -> Result<Self, ConfigError> {
        let path = match explicit {
            Some(path) => path.to_path_buf(),
            None => {
                let path = home.join(CONFIG_FILE);
                if !path.exists() {
                    return Ok(Self::default());
                }
                path
            }
        };
        let text = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        Self::parse(&text).map_err(|message| ConfigError::Parse { path, message })
    }

    pub fn parse(text: &str) -> Result<Self, String> {
        toml::from_str(text).map_err(|e| e.to_string())
    }

    pub fn store_root(&self, home: &Path) -> PathBuf {
        match &self.store.root {
            Some(root) => expand_home(root),
            None => home.join("store"),
        }
    }

    pub fn rendezvous_dir(&self, home: &Path) -> PathBuf {
        match &self.swarm.rendezvous_dir {
            Some(dir) => expand_home(dir),
            None => home.join("swarm"),
        }
    }

    /// Static assets served behind the tree: `http.assets_dir` resolved
    /// against `home` when relative, `<home>/public` when unset. Never
    /// depends on the working directory being shared.
    pub fn assets_dir(&self, home: &Path) -> PathBuf {
        match &self.http.assets_dir {
            Some(dir) => home.join(expand_home(dir)),
            None => home.join("public"),
        }
    }
}

/// `$HYPERBEAT_HOME`, or `~/.hyperbeat`.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    if let Some(home) = std::env::var_os(HOME_ENV) {
        return Ok(PathBuf::from(home));
    }
    dirs::home_dir()
        .map(|home| home.join(".hyperbeat"))
        .ok_or(ConfigError::NoHome)
}

fn expand_home(path: &Path) -> PathBuf {
    match path.strip_prefix("~") {
        Ok(rest) => match dirs::home_dir() {
            Some(home) => home.join(rest),
            None => path.to_path_buf(),
        },
        Err(_) => path.to_path_buf(),
    }
}
