use std::collections::HashMap;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use beat_crypto::SigningKey;
use beat_types::Address;
use tracing::debug;

use crate::error::{StoreError, StoreResult};

/// Writer secret keys for trees created in this store.
///
/// Only the store that generated a tree holds its key, which is what makes
/// the single-writer model hold: every other store can read and replicate
/// the tree but cannot publish new versions.
#[derive(Debug)]
pub enum Keyring {
    Memory(RwLock<HashMap<Address, [u8; 32]>>),
    Disk(PathBuf),
}

impl Keyring {
    pub fn in_memory() -> Self {
        Self::Memory(RwLock::new(HashMap::new()))
    }

    /// Keys stored as `<dir>/<address hex>.key`.
    pub fn on_disk(dir: &Path) -> Self {
        Self::Disk(dir.to_path_buf())
    }

    /// Generate a fresh writer key and persist it. Returns the new address.
    pub fn generate(&self) -> StoreResult<Address> {
        let key = SigningKey::generate();
        let address = key.address();
        match self {
            Self::Memory(keys) => {
                keys.write()
                    .expect("keyring lock poisoned")
                    .insert(address, *key.as_bytes());
            }
            Self::Disk(dir) => {
                fs::create_dir_all(dir)?;
                let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
                tmp.write_all(hex::encode(key.as_bytes()).as_bytes())?;
                tmp.as_file().sync_data()?;
                restrict_permissions(tmp.path())?;
                tmp.persist(key_path(dir, &address))
                    .map_err(|e| StoreError::Io(e.error))?;
            }
        }
        debug!(%address, "writer key generated");
        Ok(address)
    }

    /// The writer key for `address`, if this store holds it.
    pub fn signing_key(&self, address: &Address) -> StoreResult<Option<SigningKey>> {
        let bytes = match self {
            Self::Memory(keys) => keys.read().expect("keyring lock poisoned").get(address).copied(),
            Self::Disk(dir) => match fs::read_to_string(key_path(dir, address)) {
                Ok(text) => Some(decode_key(address, &text)?),
                Err(e) if e.kind() == io::ErrorKind::NotFound => None,
                Err(e) => return Err(e.into()),
            },
        };
        Ok(bytes.map(SigningKey::from_bytes))
    }

    /// Forget the writer key for `address`. Removing an unknown key is a no-op.
    pub fn remove(&self, address: &Address) -> StoreResult<()> {
        match self {
            Self::Memory(keys) => {
                keys.write().expect("keyring lock poisoned").remove(address);
            }
            Self::Disk(dir) => match fs::remove_file(key_path(dir, address)) {
                Ok(()) => {}
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            },
        }
        debug!(%address, "writer key removed");
        Ok(())
    }
}

fn key_path(dir: &Path, address: &Address) -> PathBuf {
    dir.join(format!("{}.key", address.to_hex()))
}

fn decode_key(address: &Address, text: &str) -> StoreResult<[u8; 32]> {
    let corrupt = |reason: String| StoreError::CorruptKey {
        address: *address,
        reason,
    };
    let bytes = hex::decode(text.trim()).map_err(|e| corrupt(e.to_string()))?;
    let arr: [u8; 32] = bytes
        .try_into()
        .map_err(|_| corrupt("expected 32-byte secret".into()))?;
    if SigningKey::from_bytes(arr).address() != *address {
        return Err(corrupt("secret does not match address".into()));
    }
    Ok(arr)
}

#[cfg(unix)]
fn restrict_permissions(path: &Path) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600))
}

#[cfg(not(unix))]
fn restrict_permissions(_path: &Path) -> io::Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_generate_and_lookup() {
        let keyring = Keyring::in_memory();
        let address = keyring.generate().unwrap();
        let key = keyring.signing_key(&address).unwrap().unwrap();
        assert_eq!(key.address(), address);
    }

    #[test]
    fn disk_keys_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let address = Keyring::on_disk(dir.path()).generate().unwrap();
        let key = Keyring::on_disk(dir.path())
            .signing_key(&address)
            .unwrap()
            .expect("key persisted");
        assert_eq!(key.address(), address);
    }

    #[test]
    fn removed_key_is_gone() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::on_disk(dir.path());
        let address = keyring.generate().unwrap();
        keyring.remove(&address).unwrap();
        assert!(keyring.signing_key(&address).unwrap().is_none());
        keyring.remove(&address).unwrap();

        let memory = Keyring::in_memory();
        let address = memory.generate().unwrap();
        memory.remove(&address).unwrap();
        assert!(memory.signing_key(&address).unwrap().is_none());
    }

    #[test]
    fn unknown_address_has_no_key() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::on_disk(dir.path());
        let stranger = SigningKey::generate().address();
        assert!(keyring.signing_key(&stranger).unwrap().is_none());
    }

    #[test]
    fn mismatched_key_file_is_corrupt() {
        let dir = tempfile::tempdir().unwrap();
        let keyring = Keyring::on_disk(dir.path());
        let address = SigningKey::generate().address();
        let other = SigningKey::generate();
        fs::write(key_path(dir.path(), &address), hex::encode(other.as_bytes())).unwrap();
        assert!(matches!(
            keyring.signing_key(&address),
            Err(StoreError::CorruptKey { .. })
        ));
    }
}
