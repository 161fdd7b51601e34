use std::fs::OpenOptions;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use beat_types::Address;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{SessionError, SessionResult};

pub const MANIFEST_FILE: &str = "dat.json";
const MANIFEST_TYPE: &str = "hyperdrive";

/// Binds a working directory to one tree.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub key: Address,
    #[serde(rename = "type")]
    pub kind: String,
}

impl Manifest {
    pub fn new(key: Address) -> Self {
        Self {
            key,
            kind: MANIFEST_TYPE.into(),
        }
    }

    pub fn path(dir: &Path) -> PathBuf {
        dir.join(MANIFEST_FILE)
    }

    pub fn exists(dir: &Path) -> bool {
        Self::path(dir).is_file()
    }

    /// Read the manifest in `dir`.
    pub fn load(dir: &Path) -> SessionResult<Self> {
        let path = Self::path(dir);
        let text = match std::fs::read(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(SessionError::ConfigMissing { path })
            }
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&text).map_err(|e| SessionError::ManifestInvalid {
            path,
            reason: e.to_string(),
        })
    }

    /// Write the manifest into `dir`, refusing to replace an existing one.
    pub fn create(&self, dir: &Path) -> SessionResult<PathBuf> {
        let path = Self::path(dir);
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                return Err(SessionError::ConfigConflict { path })
            }
            Err(e) => return Err(e.into()),
        };
        let json = serde_json::to_string_pretty(self).map_err(io::Error::other)?;
        file.write_all(json.as_bytes())?;
        file.sync_all()?;
        debug!(path = ?path, key = %self.key, "manifest written");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn address() -> Address {
        Address::from_bytes([0xab; 32])
    }

    #[test]
    fn create_then_load() {
        let dir = tempfile::tempdir().unwrap();
        Manifest::new(address()).create(dir.path()).unwrap();
        let loaded = Manifest::load(dir.path()).unwrap();
        assert_eq!(loaded.key, address());
        assert_eq!(loaded.kind, "hyperdrive");
    }

    #[test]
    fn on_disk_shape() {
        let dir = tempfile::tempdir().unwrap();
        let path = Manifest::new(address()).create(dir.path()).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&std::fs::read(path).unwrap()).unwrap();
        assert_eq!(value["key"], "ab".repeat(32));
        assert_eq!(value["type"], "hyperdrive");
    }

    #[test]
    fn missing_manifest_is_config_missing() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(SessionError::ConfigMissing { .. })
        ));
    }

    #[test]
    fn create_refuses_to_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        Manifest::new(address()).create(dir.path()).unwrap();
        let before = std::fs::read(Manifest::path(dir.path())).unwrap();
        let err = Manifest::new(Address::from_bytes([1; 32]))
            .create(dir.path())
            .unwrap_err();
        assert!(matches!(err, SessionError::ConfigConflict { .. }));
        assert_eq!(std::fs::read(Manifest::path(dir.path())).unwrap(), before);
    }

    #[test]
    fn malformed_manifest_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(Manifest::path(dir.path()), r#"{"key": "zz"}"#).unwrap();
        assert!(matches!(
            Manifest::load(dir.path()),
            Err(SessionError::ManifestInvalid { .. })
        ));
    }
}
