use crate::core::constants::{LSK_FETCH_OFFSET, LSK_OWNED_NOTES};
use crate::core::storage::{storage_namespace, KeyValueStore};
use crate::error::{Result, ZertSdkError};
use crate::types::{Note, ScanCursor};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::debug;

/// Persisted scan cursor, one slot per (deployment, wallet).
///
/// The cache does not merge: `save` replaces the slot. Callers only ever
/// hand it a cursor derived from the one they loaded.
#[derive(Clone)]
pub struct ScanCache {
    store: Arc<dyn KeyValueStore>,
    program_id: Pubkey,
}

impl ScanCache {
    pub fn new(store: Arc<dyn KeyValueStore>, program_id: Pubkey) -> Self {
        Self { store, program_id }
    }

    pub fn offset_key(&self, wallet: &Pubkey) -> String {
        format!("{}{}", LSK_FETCH_OFFSET, storage_namespace(&self.program_id, wallet))
    }

    pub fn notes_key(&self, wallet: &Pubkey) -> String {
        format!("{}{}", LSK_OWNED_NOTES, storage_namespace(&self.program_id, wallet))
    }

    /// Stored cursor, or an empty one if nothing was saved yet
    pub fn load(&self, wallet: &Pubkey) -> Result<ScanCursor> {
        let offset = match self.store.get(&self.offset_key(wallet))? {
            Some(raw) => raw.trim().parse::<u64>().map_err(|_| {
                ZertSdkError::CacheCorrupted(format!("fetch offset {raw:?} is not a number"))
            })?,
            None => 0,
        };

        let notes: Vec<Note> = match self.store.get(&self.notes_key(wallet))? {
            Some(raw) => serde_json::from_str(&raw)
                .map_err(|e| ZertSdkError::CacheCorrupted(format!("owned notes: {e}")))?,
            None => Vec::new(),
        };

        let cursor = ScanCursor::from_offset(offset, notes);
        if !cursor.is_consistent() {
            return Err(ZertSdkError::CacheCorrupted(format!(
                "cached note beyond processed offset {offset}"
            )));
        }
        Ok(cursor)
    }

    /// Commit a cursor. Notes are written before the offset so an interrupted
    /// save never claims positions whose notes were not stored.
    pub fn save(&self, wallet: &Pubkey, cursor: &ScanCursor) -> Result<()> {
        let notes = serde_json::to_string(&cursor.owned_notes)?;
        self.store.set(&self.notes_key(wallet), &notes)?;
        self.store
            .set(&self.offset_key(wallet), &cursor.next_position().to_string())?;
        debug!(%wallet, next = cursor.next_position(), notes = cursor.owned_notes.len(), "scan cursor saved");
        Ok(())
    }

    pub fn clear(&self, wallet: &Pubkey) -> Result<()> {
        self.store.delete(&self.offset_key(wallet))?;
        self.store.delete(&self.notes_key(wallet))?;
        debug!(%wallet, "scan cursor cleared");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asset::AssetField;
    use crate::core::constants::{DEFAULT_PROGRAM_ID, USDC_MINT};
    use crate::core::storage::{FileStore, MemoryStore};

    fn note(position: u64) -> Note {
        Note {
            amount: 10 + position,
            asset_field: AssetField::native(),
            blinding: 1,
            owner_key_hash: [2u8; 32],
            position,
            spent: false,
        }
    }

    #[test]
    fn missing_slot_loads_empty() {
        let cache = ScanCache::new(Arc::new(MemoryStore::new()), Pubkey::new_unique());
        assert_eq!(cache.load(&Pubkey::new_unique()).unwrap(), ScanCursor::empty());
    }

    #[test]
    fn save_then_load_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let program = Pubkey::new_unique();
        let wallet = Pubkey::new_unique();

        let mut cursor = ScanCursor::empty();
        cursor.absorb_page(9, vec![note(2), note(7)]);
        ScanCache::new(Arc::new(FileStore::open(dir.path()).unwrap()), program)
            .save(&wallet, &cursor)
            .unwrap();

        let reopened = ScanCache::new(Arc::new(FileStore::open(dir.path()).unwrap()), program);
        assert_eq!(reopened.load(&wallet).unwrap(), cursor);
    }

    #[test]
    fn keys_are_namespaced_per_wallet_and_program() {
        let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
        let wallet = Pubkey::new_unique();
        let a = ScanCache::new(store.clone(), DEFAULT_PROGRAM_ID);
        let b = ScanCache::new(store, USDC_MINT);
        assert_ne!(a.offset_key(&wallet), b.offset_key(&wallet));
        assert!(a.offset_key(&wallet).starts_with("fetch_offset"));
        assert!(a.notes_key(&wallet).starts_with("owned_notes"));
    }

    #[test]
    fn inconsistent_slot_is_reported_as_corruption() {
        let store = Arc::new(MemoryStore::new());
        let cache = ScanCache::new(store.clone(), Pubkey::new_unique());
        let wallet = Pubkey::new_unique();

        store.set(&cache.offset_key(&wallet), "3").unwrap();
        store
            .set(&cache.notes_key(&wallet), &serde_json::to_string(&vec![note(5)]).unwrap())
            .unwrap();
        assert!(matches!(cache.load(&wallet), Err(ZertSdkError::CacheCorrupted(_))));

        store.set(&cache.offset_key(&wallet), "three").unwrap();
        assert!(matches!(cache.load(&wallet), Err(ZertSdkError::CacheCorrupted(_))));

        cache.clear(&wallet).unwrap();
        assert_eq!(cache.load(&wallet).unwrap(), ScanCursor::empty());
    }
}
