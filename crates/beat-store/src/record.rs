use beat_crypto::{Signature, SigningKey, VerifyingKey};
use beat_types::{Address, BlockId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{StoreError, StoreResult};

/// One published version of a tree.
///
/// Records form the append-only history of an [`Address`]. A record is only
/// accepted if it is signed by the address's key, so a record received from
/// any peer can be trusted to come from the writer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootRecord {
    /// Monotonic version number, starting at 1.
    pub version: u64,
    /// Directory node at the root of this version.
    pub root: BlockId,
    /// When the writer published this version.
    pub written_at: DateTime<Utc>,
    /// Writer signature over `address ‖ version ‖ root ‖ written_at`.
    pub signature: Signature,
}

impl RootRecord {
    /// Sign a new record with the writer's key.
    pub fn sign(key: &SigningKey, version: u64, root: BlockId) -> Self {
        let written_at = Utc::now();
        let message = signing_bytes(&key.address(), version, &root, &written_at);
        Self {
            version,
            root,
            written_at,
            signature: key.sign(&message),
        }
    }

    /// Verify the record was signed by `address`.
    pub fn verify(&self, address: &Address) -> StoreResult<()> {
        let invalid = || StoreError::InvalidSignature {
            address: *address,
            version: self.version,
        };
        let key = VerifyingKey::from_address(address).map_err(|_| invalid())?;
        let message = signing_bytes(address, self.version, &self.root, &self.written_at);
        key.verify(&message, &self.signature).map_err(|_| invalid())
    }
}

fn signing_bytes(address: &Address, version: u64, root: &BlockId, at: &DateTime<Utc>) -> Vec<u8> {
    let mut out = Vec::with_capacity(13 + 32 + 8 + 32 + 8);
    out.extend_from_slice(b"beat-root-v1:");
    out.extend_from_slice(address.as_bytes());
    out.extend_from_slice(&version.to_le_bytes());
    out.extend_from_slice(root.as_bytes());
    out.extend_from_slice(&at.timestamp_micros().to_le_bytes());
    out
}
