//! Ownership detection for encrypted notes.
//!
//! # Envelope layout
//! ```text
//! [0..16]   iv
//! [16..32]  tag = HMAC-SHA256(mac_key, iv || body)[..16]
//! [32..]    body = AES-128-CTR(encryption_key, iv, plaintext)
//! ```
//! The plaintext is a borsh record of exactly [`NOTE_PLAINTEXT_LEN`] bytes.

use crate::asset::AssetField;
use crate::error::{Result, ZertSdkError};
use crate::identity::{Identity, OWNER_TAG_LEN};
use crate::types::{EncryptedNote, Note};
use aes::cipher::{KeyIvInit, StreamCipher};
use borsh::{BorshDeserialize, BorshSerialize};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use tracing::{trace, warn};

type HmacSha256 = Hmac<Sha256>;
type Aes128Ctr = ctr::Ctr128BE<aes::Aes128>;

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 16;
pub const ENVELOPE_HEADER_LEN: usize = IV_LEN + TAG_LEN;
pub const NOTE_PLAINTEXT_LEN: usize = 8 + 4 + 32 + OWNER_TAG_LEN;

#[derive(Debug, Clone, BorshSerialize, BorshDeserialize)]
struct NotePlaintext {
    amount: u64,
    blinding: u32,
    asset_field: [u8; 32],
    owner_tag: [u8; OWNER_TAG_LEN],
}

/// Note contents before encryption
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub amount: u64,
    pub asset_field: AssetField,
    pub blinding: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MalformedReason {
    /// Envelope cannot even hold iv and tag
    TooShort(usize),
    /// Authenticated body does not decode to exactly one note record
    BadLayout(usize),
    /// Asset field is not a canonical field element
    FieldOutOfRange,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DecodeOutcome {
    Owned(Note),
    NotOwned,
    Malformed(MalformedReason),
}

/// Per-page classification counts plus the owned notes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PageDecode {
    pub owned: Vec<Note>,
    pub not_owned: u64,
    pub malformed: u64,
    /// Owned notes of zero value (transaction padding), dropped
    pub zero_value: u64,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoteDecoder;

impl NoteDecoder {
    pub fn new() -> Self {
        Self
    }

    /// Classify one candidate. Pure: same input, same outcome.
    pub fn decode(&self, note: &EncryptedNote, identity: &Identity) -> DecodeOutcome {
        let data = &note.ciphertext;
        if data.len() < ENVELOPE_HEADER_LEN {
            return DecodeOutcome::Malformed(MalformedReason::TooShort(data.len()));
        }

        let (iv, rest) = data.split_at(IV_LEN);
        let (tag, body) = rest.split_at(TAG_LEN);

        // A tag mismatch means the note was encrypted to someone else
        if !authenticate(identity, iv, body, tag) {
            return DecodeOutcome::NotOwned;
        }

        let mut plaintext = body.to_vec();
        if apply_keystream(identity, iv, &mut plaintext).is_err() {
            return DecodeOutcome::NotOwned;
        }

        let record = match NotePlaintext::try_from_slice(&plaintext) {
            Ok(record) => record,
            Err(_) => {
                return DecodeOutcome::Malformed(MalformedReason::BadLayout(plaintext.len()))
            },
        };

        if record.owner_tag != identity.owner_tag() {
            return DecodeOutcome::NotOwned;
        }

        let Some(asset_field) = AssetField::from_be_bytes(&record.asset_field) else {
            return DecodeOutcome::Malformed(MalformedReason::FieldOutOfRange);
        };

        DecodeOutcome::Owned(Note {
            amount: record.amount,
            asset_field,
            blinding: record.blinding,
            owner_key_hash: *identity.owner_key_hash(),
            position: note.position,
            spent: false,
        })
    }

    /// Classify a whole page; malformed entries are logged and skipped,
    /// zero-value owned notes are dropped
    pub fn decode_page(&self, notes: &[EncryptedNote], identity: &Identity) -> PageDecode {
        let mut page = PageDecode::default();
        for note in notes {
            match self.decode(note, identity) {
                DecodeOutcome::Owned(owned) if owned.amount == 0 => {
                    trace!(position = note.position, "zero-value note");
                    page.zero_value += 1;
                },
                DecodeOutcome::Owned(owned) => {
                    trace!(position = note.position, "owned note");
                    page.owned.push(owned);
                },
                DecodeOutcome::NotOwned => page.not_owned += 1,
                DecodeOutcome::Malformed(reason) => {
                    warn!(position = note.position, ?reason, "skipping malformed note");
                    page.malformed += 1;
                },
            }
        }
        page
    }

    /// Encrypt a note to `identity` under the given iv
    pub fn seal(&self, identity: &Identity, draft: &NoteDraft, iv: [u8; IV_LEN]) -> Result<Vec<u8>> {
        let record = NotePlaintext {
            amount: draft.amount,
            blinding: draft.blinding,
            asset_field: draft.asset_field.to_be_bytes(),
            owner_tag: identity.owner_tag(),
        };
        let plaintext = borsh::to_vec(&record)
            .map_err(|e| ZertSdkError::Other(format!("note encoding: {e}")))?;
        self.seal_raw(identity, &plaintext, iv)
    }

    /// Encrypt a note to `identity` under a fresh random iv
    pub fn seal_random(&self, identity: &Identity, draft: &NoteDraft) -> Result<Vec<u8>> {
        self.seal(identity, draft, rand::random())
    }

    /// Wrap arbitrary plaintext in an authenticated envelope
    pub fn seal_raw(&self, identity: &Identity, plaintext: &[u8], iv: [u8; IV_LEN]) -> Result<Vec<u8>> {
        let mut body = plaintext.to_vec();
        apply_keystream(identity, &iv, &mut body)?;

        let mut mac = HmacSha256::new_from_slice(identity.mac_key())
            .map_err(|e| ZertSdkError::Other(format!("mac key: {e}")))?;
        mac.update(&iv);
        mac.update(&body);
        let tag = mac.finalize().into_bytes();

        let mut envelope = Vec::with_capacity(ENVELOPE_HEADER_LEN + body.len());
        envelope.extend_from_slice(&iv);
        envelope.extend_from_slice(&tag[..TAG_LEN]);
        envelope.extend_from_slice(&body);
        Ok(envelope)
    }
}

fn authenticate(identity: &Identity, iv: &[u8], body: &[u8], tag: &[u8]) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(identity.mac_key()) else {
        return false;
    };
    mac.update(iv);
    mac.update(body);
    mac.verify_truncated_left(tag).is_ok()
}

fn apply_keystream(identity: &Identity, iv: &[u8], buf: &mut [u8]) -> Result<()> {
    let mut cipher = Aes128Ctr::new_from_slices(identity.encryption_key(), iv)
        .map_err(|e| ZertSdkError::Other(format!("cipher init: {e}")))?;
    cipher.apply_keystream(buf);
    Ok(())
}
