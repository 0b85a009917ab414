use crate::asset::AssetField;
use serde::{Deserialize, Serialize};

/// Opaque ciphertext as published on the ledger, with its insertion index
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncryptedNote {
    /// Position in the global note stream
    pub position: u64,

    /// Envelope bytes (`iv || tag || body`)
    pub ciphertext: Vec<u8>,
}

impl EncryptedNote {
    pub fn new(position: u64, ciphertext: Vec<u8>) -> Self {
        Self {
            position,
            ciphertext,
        }
    }
}

/// A decrypted note owned by the wallet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    /// Value in the asset's smallest unit
    pub amount: u64,

    /// Asset identity as a field element
    pub asset_field: AssetField,

    /// Commitment blinding factor
    pub blinding: u32,

    /// Hash binding the note to the owning identity
    pub owner_key_hash: [u8; 32],

    /// Position in the global note stream
    pub position: u64,

    /// Set once a nullifier for this note is observed; never cleared
    #[serde(default)]
    pub spent: bool,
}

impl Note {
    /// Record that the note was spent. There is no way back.
    pub fn mark_spent(&mut self) {
        self.spent = true;
    }

    pub fn is_spendable(&self) -> bool {
        !self.spent && self.amount > 0
    }
}

/// Resumable scan state for one wallet
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScanCursor {
    /// Highest stream position already examined, `None` before the first page
    pub last_processed_position: Option<u64>,

    /// Owned notes discovered so far, ordered by position
    pub owned_notes: Vec<Note>,
}

impl ScanCursor {
    pub fn empty() -> Self {
        Self::default()
    }

    /// First stream position that still needs examining
    pub fn next_position(&self) -> u64 {
        self.last_processed_position.map_or(0, |p| p + 1)
    }

    /// Rebuild a cursor from the persisted offset (count of processed entries)
    pub fn from_offset(offset: u64, owned_notes: Vec<Note>) -> Self {
        Self {
            last_processed_position: offset.checked_sub(1),
            owned_notes,
        }
    }

    /// Whether every note sits at or below the processed watermark
    pub fn is_consistent(&self) -> bool {
        match self.last_processed_position {
            None => self.owned_notes.is_empty(),
            Some(last) => self.owned_notes.iter().all(|n| n.position <= last),
        }
    }

    /// Fold one fully decoded page into the cursor.
    ///
    /// The watermark only moves forward and notes at or below the previous
    /// watermark, or already present, are ignored, so re-applying a page is
    /// harmless.
    pub fn absorb_page(&mut self, last_position: u64, notes: Vec<Note>) {
        let floor = self.next_position();
        for note in notes {
            if note.position < floor || note.position > last_position {
                continue;
            }
            if self.owned_notes.iter().any(|n| n.position == note.position) {
                continue;
            }
            self.owned_notes.push(note);
        }
        self.owned_notes.sort_by_key(|n| n.position);
        self.last_processed_position = Some(
            self.last_processed_position
                .map_or(last_position, |p| p.max(last_position)),
        );
    }

    pub fn unspent_notes(&self) -> impl Iterator<Item = &Note> {
        self.owned_notes.iter().filter(|n| !n.spent)
    }
}
