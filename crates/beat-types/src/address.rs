use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{decode_32, TypeError};

/// Context string mixed into every discovery id derivation.
const DISCOVERY_CONTEXT: &[u8] = b"hyperbeat";

/// Public identifier of a tree's history.
///
/// An `Address` is the Ed25519 public key of the tree's single writer. Every
/// root record in the tree's history is signed by the matching secret key,
/// so the address alone is enough to verify anything a peer hands us.
/// Serialized as a 64-character hex string.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Address([u8; 32]);

impl Address {
    /// Wrap raw public key bytes.
    pub const fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    /// The raw 32-byte public key.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Short identifier (first 8 hex characters).
    pub fn short_hex(&self) -> String {
        hex::encode(&self.0[..4])
    }

    /// Parse from a 64-character hex string.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_32(s.trim()).map(Self)
    }

    /// Derive the swarm topic for this address.
    pub fn discovery_id(&self) -> DiscoveryId {
        DiscoveryId::derive(self)
    }
}

impl fmt::Debug for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Address({})", self.short_hex())
    }
}

impl fmt::Display for Address {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl FromStr for Address {
    type Err = TypeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl TryFrom<String> for Address {
    type Error = TypeError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::from_hex(&value)
    }
}

impl From<Address> for String {
    fn from(address: Address) -> Self {
        address.to_hex()
    }
}

/// Swarm topic used to find and advertise peers for an [`Address`].
///
/// Derived as a BLAKE3 keyed hash of a fixed context string, keyed by the
/// address. Knowing a discovery id does not reveal the address, so peers can
/// rendezvous on it without learning which tree is being replicated.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscoveryId([u8; 32]);

impl DiscoveryId {
    /// Derive the discovery id for an address.
    pub fn derive(address: &Address) -> Self {
        Self(*blake3::keyed_hash(address.as_bytes(), DISCOVERY_CONTEXT).as_bytes())
    }

    /// The raw 32-byte topic.
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Full hex-encoded string.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// Parse from a hex string, e.g. a rendezvous directory name.
    pub fn from_hex(s: &str) -> Result<Self, TypeError> {
        decode_32(s).map(Self)
    }
}

impl fmt::Debug for DiscoveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DiscoveryId({})", hex::encode(&self.0[..4]))
    }
}

impl fmt::Display for DiscoveryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_roundtrip() {
        let address = Address::from_bytes([99; 32]);
        let parsed = Address::from_hex(&address.to_hex()).unwrap();
        assert_eq!(address, parsed);
    }

    #[test]
    fn from_hex_tolerates_surrounding_whitespace() {
        let address = Address::from_bytes([3; 32]);
        let padded = format!("  {}\n", address.to_hex());
        assert_eq!(padded.parse::<Address>().unwrap(), address);
    }

    #[test]
    fn from_hex_rejects_wrong_length() {
        let err = Address::from_hex("abcd").unwrap_err();
        assert_eq!(err, TypeError::InvalidLength { expected: 32, actual: 2 });
    }

    #[test]
    fn from_hex_rejects_garbage() {
        assert!(matches!(
            Address::from_hex("not hex at all"),
            Err(TypeError::InvalidHex(_))
        ));
    }

    #[test]
    fn serializes_as_hex_string() {
        let address = Address::from_bytes([1; 32]);
        let json = serde_json::to_string(&address).unwrap();
        assert_eq!(json, format!("\"{}\"", address.to_hex()));
        let parsed: Address = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, address);
    }

    #[test]
    fn discovery_id_is_deterministic() {
        let address = Address::from_bytes([42; 32]);
        assert_eq!(address.discovery_id(), DiscoveryId::derive(&address));
    }

    #[test]
    fn discovery_id_differs_from_address() {
        let address = Address::from_bytes([42; 32]);
        assert_ne!(address.discovery_id().as_bytes(), address.as_bytes());
    }

    #[test]
    fn distinct_addresses_have_distinct_topics() {
        let a = Address::from_bytes([1; 32]).discovery_id();
        let b = Address::from_bytes([2; 32]).discovery_id();
        assert_ne!(a, b);
    }

    #[test]
    fn debug_is_short() {
        let address = Address::from_bytes([0xab; 32]);
        assert_eq!(format!("{address:?}"), "Address(abababab)");
    }
}
