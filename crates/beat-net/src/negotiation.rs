use std::collections::HashSet;

use beat_store::{BlockStore, RootRecord, StoreResult};
use beat_types::{Address, BlockId};
use tracing::warn;

/// Decides what to adopt and fetch from peers.
pub struct NegotiationEngine;

impl NegotiationEngine {
    /// The newest remote record for `address` that verifies and is newer
    /// than `local`. Forged or stale offers are dropped.
    pub fn choose_head(
        address: &Address,
        local: Option<&RootRecord>,
        offers: impl IntoIterator<Item = RootRecord>,
    ) -> Option<RootRecord> {
        let floor = local.map_or(0, |r| r.version);
        offers
            .into_iter()
            .filter(|r| r.version > floor)
            .filter(|r| match r.verify(address) {
                Ok(()) => true,
                Err(e) => {
                    warn!(%address, version = r.version, error = %e, "dropping unverifiable root record");
                    false
                }
            })
            .max_by_key(|r| r.version)
    }

    /// Of `ids`, those missing from `local`, deduplicated in first-seen order.
    pub fn compute_wants(local: &dyn BlockStore, ids: &[BlockId]) -> StoreResult<Vec<BlockId>> {
        let mut seen = HashSet::new();
        let unique: Vec<BlockId> = ids.iter().copied().filter(|id| seen.insert(*id)).collect();
        local.missing(&unique)
    }
}

#[cfg(test)]
mod tests {
    use beat_crypto::SigningKey;
    use beat_store::{InMemoryBlockStore, StoredBlock};

    use super::*;

    fn record(key: &SigningKey, version: u64) -> RootRecord {
        RootRecord::sign(key, version, BlockId::from_hash([version as u8; 32]))
    }

    #[test]
    fn picks_highest_newer_version() {
        let key = SigningKey::generate();
        let local = record(&key, 2);
        let chosen = NegotiationEngine::choose_head(
            &key.address(),
            Some(&local),
            vec![record(&key, 1), record(&key, 4), record(&key, 3)],
        )
        .unwrap();
        assert_eq!(chosen.version, 4);
    }

    #[test]
    fn nothing_newer_means_no_head() {
        let key = SigningKey::generate();
        let local = record(&key, 5);
        assert!(NegotiationEngine::choose_head(&key.address(), Some(&local), vec![record(&key, 5)]).is_none());
    }

    #[test]
    fn forged_records_are_ignored() {
        let key = SigningKey::generate();
        let forger = SigningKey::generate();
        let chosen = NegotiationEngine::choose_head(
            &key.address(),
            None,
            vec![record(&forger, 9), record(&key, 1)],
        )
        .unwrap();
        assert_eq!(chosen.version, 1);
    }

    #[test]
    fn wants_are_missing_and_unique() {
        let store = InMemoryBlockStore::new();
        let have = store.write(&StoredBlock::chunk(b"have".to_vec())).unwrap();
        let want = StoredBlock::chunk(b"want".to_vec()).compute_id();
        let wants = NegotiationEngine::compute_wants(&store, &[have, want, want]).unwrap();
        assert_eq!(wants, vec![want]);
    }
}
