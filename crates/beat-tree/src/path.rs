use std::fmt;

use crate::error::{TreeError, TreeResult};

/// Normalized path inside a tree.
///
/// Paths are `/`-separated and case-sensitive. Empty segments (leading,
/// trailing or doubled slashes) and `.` segments are dropped; `..` is
/// rejected rather than resolved. The empty path is the root directory.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TreePath {
    components: Vec<String>,
}

impl TreePath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn parse(raw: &str) -> TreeResult<Self> {
        let mut components = Vec::new();
        for segment in raw.split('/') {
            match segment {
                "" | "." => continue,
                ".." => {
                    return Err(TreeError::InvalidPath {
                        path: raw.to_string(),
                        reason: "parent segments are not allowed".into(),
                    })
                }
                s if s.contains('\0') => {
                    return Err(TreeError::InvalidPath {
                        path: raw.to_string(),
                        reason: "NUL byte in segment".into(),
                    })
                }
                s => components.push(s.to_string()),
            }
        }
        Ok(Self { components })
    }

    pub fn is_root(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    /// Last component, or `None` for the root.
    pub fn file_name(&self) -> Option<&str> {
        self.components.last().map(String::as_str)
    }

    /// Parent directory, or `None` for the root.
    pub fn parent(&self) -> Option<TreePath> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// Append a single name.
    pub fn join(&self, name: &str) -> TreePath {
        let mut components = self.components.clone();
        components.push(name.to_string());
        Self { components }
    }
}

impl fmt::Display for TreePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        for c in &self.components {
            write!(f, "/{c}")?;
        }
        Ok(())
    }
}

impl std::str::FromStr for TreePath {
    type Err = TreeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}
