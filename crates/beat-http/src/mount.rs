use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::source::ContentSource;

/// What a mount serves.
#[derive(Clone)]
pub enum MountTarget {
    /// A live tree.
    Tree(Arc<dyn ContentSource>),
    /// A local directory served through `ServeDir`.
    Assets(PathBuf),
}

impl fmt::Debug for MountTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Tree(_) => write!(f, "Tree"),
            Self::Assets(dir) => write!(f, "Assets({})", dir.display()),
        }
    }
}

/// A target attached at a URL prefix.
#[derive(Clone, Debug)]
pub struct Mount {
    prefix: String,
    target: MountTarget,
}

impl Mount {
    pub fn new(prefix: &str, target: MountTarget) -> Self {
        let trimmed = prefix.trim_matches('/');
        Self {
            prefix: format!("/{trimmed}"),
            target,
        }
    }

    pub fn tree(prefix: &str, source: Arc<dyn ContentSource>) -> Self {
        Self::new(prefix, MountTarget::Tree(source))
    }

    pub fn assets(prefix: &str, dir: impl Into<PathBuf>) -> Self {
        Self::new(prefix, MountTarget::Assets(dir.into()))
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    pub fn target(&self) -> &MountTarget {
        &self.target
    }

    /// The request path relative to this mount, or `None` if the request is
    /// outside it. The result always starts with `/`.
    pub fn strip<'a>(&self, path: &'a str) -> Option<&'a str> {
        if self.prefix == "/" {
            return Some(path);
        }
        let rest = path.strip_prefix(self.prefix.as_str())?;
        if rest.is_empty() {
            Some("/")
        } else if rest.starts_with('/') {
            Some(rest)
        } else {
            None
        }
    }
}

/// Mounts in precedence order.
#[derive(Clone, Debug, Default)]
pub struct MountTable {
    mounts: Vec<Mount>,
}

impl MountTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `mount` after every existing mount.
    pub fn with(mut self, mount: Mount) -> Self {
        self.mounts.push(mount);
        self
    }

    pub fn push(&mut self, mount: Mount) {
        self.mounts.push(mount);
    }

    pub fn mounts(&self) -> &[Mount] {
        &self.mounts
    }

    pub fn len(&self) -> usize {
        self.mounts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mounts.is_empty()
    }
}
