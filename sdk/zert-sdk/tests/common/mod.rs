#![allow(dead_code)]

use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;
use zert_sdk::core::constants::DEFAULT_PROGRAM_ID;
use zert_sdk::identity::challenge_message;
use zert_sdk::{
    AssetField, EncryptedNote, Identity, KeyValueStore, MemoryStore, NoteDecoder, NoteDraft,
    NotePage, NoteScanner, NoteSource, Result, ScanCache, ShieldedAccount, SignError, SyncConfig,
    WalletSigner, ZertSdkError,
};

//=============================================================================
// Note stream
//=============================================================================

/// In-memory note stream standing in for the indexer
pub struct StreamSource {
    notes: RwLock<Vec<EncryptedNote>>,
    fetches: AtomicUsize,
    fail_from: AtomicU64,
    delay: Duration,
}

impl StreamSource {
    pub fn new(notes: Vec<EncryptedNote>) -> Self {
        Self {
            notes: RwLock::new(notes),
            fetches: AtomicUsize::new(0),
            fail_from: AtomicU64::new(u64::MAX),
            delay: Duration::ZERO,
        }
    }

    /// Every fetch sleeps first, so overlapping scans really overlap
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn len(&self) -> u64 {
        self.notes.read().unwrap().len() as u64
    }

    /// Append ciphertexts at the next positions
    pub fn append(&self, ciphertexts: Vec<Vec<u8>>) {
        let mut notes = self.notes.write().unwrap();
        for ciphertext in ciphertexts {
            let position = notes.len() as u64;
            notes.push(EncryptedNote::new(position, ciphertext));
        }
    }

    /// Simulate a ledger reset by dropping everything from `len` on
    pub fn truncate(&self, len: u64) {
        self.notes.write().unwrap().truncate(len as usize);
    }

    /// Fetches starting at or after `position` fail until `heal` is called
    pub fn fail_from(&self, position: u64) {
        self.fail_from.store(position, Ordering::SeqCst);
    }

    pub fn heal(&self) {
        self.fail_from.store(u64::MAX, Ordering::SeqCst);
    }

    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl NoteSource for StreamSource {
    async fn fetch_notes_from(&self, position: u64, limit: u64) -> Result<NotePage> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if position >= self.fail_from.load(Ordering::SeqCst) {
            return Err(ZertSdkError::Transport("indexer unavailable".into()));
        }

        let notes = self.notes.read().unwrap();
        Ok(NotePage {
            start: position,
            notes: notes
                .iter()
                .filter(|n| n.position >= position)
                .take(limit as usize)
                .cloned()
                .collect(),
            total: notes.len() as u64,
        })
    }
}

//=============================================================================
// Signers
//=============================================================================

/// Local keypair that counts how often the user was prompted
pub struct CountingSigner {
    pub keypair: Keypair,
    prompts: AtomicUsize,
    delay: Duration,
}

impl CountingSigner {
    pub fn new() -> Self {
        Self {
            keypair: Keypair::new(),
            prompts: AtomicUsize::new(0),
            delay: Duration::from_millis(20),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for CountingSigner {
    fn pubkey(&self) -> Pubkey {
        WalletSigner::pubkey(&self.keypair)
    }

    async fn sign_message(&self, message: &[u8]) -> std::result::Result<Signature, SignError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        WalletSigner::sign_message(&self.keypair, message).await
    }
}

/// Wallet whose user declines every request
pub struct RejectingSigner {
    wallet: Pubkey,
    prompts: AtomicUsize,
}

impl RejectingSigner {
    pub fn new() -> Self {
        Self {
            wallet: Pubkey::new_unique(),
            prompts: AtomicUsize::new(0),
        }
    }

    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WalletSigner for RejectingSigner {
    fn pubkey(&self) -> Pubkey {
        self.wallet
    }

    async fn sign_message(&self, _message: &[u8]) -> std::result::Result<Signature, SignError> {
        self.prompts.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(20)).await;
        Err(SignError::Rejected)
    }
}

/// Hardware-style wallet that only signs transactions
pub struct TransactionOnlySigner(pub Pubkey);

#[async_trait]
impl WalletSigner for TransactionOnlySigner {
    fn pubkey(&self) -> Pubkey {
        self.0
    }

    async fn sign_message(&self, _message: &[u8]) -> std::result::Result<Signature, SignError> {
        Err(SignError::Unsupported)
    }
}

//=============================================================================
// Notes
//=============================================================================

/// The identity the SDK derives for `keypair`
pub fn identity_for(keypair: &Keypair) -> Arc<Identity> {
    let wallet = WalletSigner::pubkey(keypair);
    let signature =
        solana_sdk::signer::Signer::sign_message(keypair, challenge_message(&wallet).as_bytes());
    Arc::new(Identity::from_signature(wallet, &signature).unwrap())
}

pub fn sealed(identity: &Identity, amount: u64, asset_field: AssetField) -> Vec<u8> {
    let draft = NoteDraft {
        amount,
        asset_field,
        blinding: rand::random(),
    };
    NoteDecoder::new().seal_random(identity, &draft).unwrap()
}

pub fn native(identity: &Identity, amount: u64) -> Vec<u8> {
    sealed(identity, amount, AssetField::native())
}

/// Note encrypted to somebody else
pub fn foreign(amount: u64) -> Vec<u8> {
    let stranger = identity_for(&Keypair::new());
    native(&stranger, amount)
}

/// Stream of `len` notes where the positions in `owned` belong to `identity`
/// and carry `1000 + position` lamports
pub fn mixed_stream(identity: &Identity, owned: &[u64], len: u64) -> Vec<EncryptedNote> {
    (0..len)
        .map(|position| {
            let ciphertext = if owned.contains(&position) {
                native(identity, 1000 + position)
            } else {
                foreign(1)
            };
            EncryptedNote::new(position, ciphertext)
        })
        .collect()
}

//=============================================================================
// Wiring
//=============================================================================

pub fn scanner(
    source: Arc<StreamSource>,
    store: Arc<dyn KeyValueStore>,
    page_size: u64,
) -> NoteScanner {
    NoteScanner::new(source, ScanCache::new(store, DEFAULT_PROGRAM_ID), page_size)
}

pub fn account(source: Arc<StreamSource>, store: Arc<dyn KeyValueStore>) -> ShieldedAccount {
    ShieldedAccount::builder()
        .with_config(SyncConfig::default().with_page_size(4).with_page_delay_ms(0))
        .with_store(store)
        .with_source(source)
        .build()
        .unwrap()
}

pub fn memory_store() -> Arc<dyn KeyValueStore> {
    Arc::new(MemoryStore::new())
}
