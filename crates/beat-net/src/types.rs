use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Identity of one swarm participant for the lifetime of a bridge.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeerId(Uuid);

impl PeerId {
    /// A new, time-ordered peer id.
    pub fn generate() -> Self {
        Self(Uuid::now_v7())
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }

    pub fn parse(s: &str) -> Option<Self> {
        Uuid::parse_str(s).ok().map(Self)
    }
}

impl fmt::Debug for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PeerId({})", self.0)
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Participation flags for one topic.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JoinOptions {
    /// Advertise this peer under the topic.
    pub announce: bool,
    /// Discover other peers under the topic.
    pub lookup: bool,
}

impl JoinOptions {
    pub const NONE: Self = Self {
        announce: false,
        lookup: false,
    };
}

impl Default for JoinOptions {
    fn default() -> Self {
        Self {
            announce: true,
            lookup: true,
        }
    }
}

/// How long a download may wait for peers to supply missing data.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Deadline {
    #[default]
    Unbounded,
    After(Duration),
}

impl Deadline {
    pub fn from_secs(secs: Option<u64>) -> Self {
        match secs {
            Some(secs) => Self::After(Duration::from_secs(secs)),
            None => Self::Unbounded,
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DownloadReport {
    /// Tree version present locally when the download finished.
    pub version: u64,
    pub blocks_fetched: usize,
    pub bytes_fetched: u64,
    /// Blocks discarded because they failed verification.
    pub blocks_rejected: usize,
    /// Number of lookup rounds it took.
    pub rounds: usize,
}
