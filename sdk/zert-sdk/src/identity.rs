//! Deterministic scanning/spending identity derived from a wallet signature.
//!
//! The wallet signs a fixed challenge bound to its address. The signature is
//! the seed: it is persisted (so the user is prompted once per device) and
//! run through HKDF-SHA256 to obtain the keys. Caching the seed rather than
//! the keys lets the derivation evolve without a new prompt.

use crate::core::constants::{CHALLENGE_PREFIX, LSK_WALLET_SIGNATURE};
use crate::core::signer::{SignError, WalletSigner};
use crate::core::storage::KeyValueStore;
use crate::error::{Result, ZertSdkError};
use hkdf::Hkdf;
use sha2::{Digest, Sha256};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Signature;
use std::fmt;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use zeroize::Zeroizing;

const IDENTITY_SALT: &[u8] = b"zert/identity/v1";
const SCANNING_INFO: &[u8] = b"zert/scanning-key";
const SPENDING_INFO: &[u8] = b"zert/spending-key";
const OWNER_DOMAIN: &[u8] = b"zert/owner";

pub const OWNER_TAG_LEN: usize = 8;

/// Challenge the wallet signs; embedding the address prevents cross-wallet replay
pub fn challenge_message(wallet: &Pubkey) -> String {
    format!("{}{}", CHALLENGE_PREFIX, wallet)
}

/// Storage key of the persisted signature seed
pub fn signature_key(wallet: &Pubkey) -> String {
    format!("{}{}", LSK_WALLET_SIGNATURE, wallet)
}

/// Private scanning/spending key pair of one wallet
#[derive(Clone)]
pub struct Identity {
    wallet: Pubkey,
    scanning_key: Zeroizing<[u8; 32]>,
    spending_key: Zeroizing<[u8; 32]>,
    owner_key_hash: [u8; 32],
}

impl Identity {
    /// Same wallet and same signature always give the same identity
    pub fn from_signature(wallet: Pubkey, signature: &Signature) -> Result<Self> {
        let hk = Hkdf::<Sha256>::new(Some(IDENTITY_SALT), signature.as_ref());

        let mut scanning_key = Zeroizing::new([0u8; 32]);
        hk.expand(SCANNING_INFO, &mut scanning_key[..])
            .map_err(|e| ZertSdkError::Other(format!("scanning key derivation: {e}")))?;

        let mut spending_key = Zeroizing::new([0u8; 32]);
        hk.expand(SPENDING_INFO, &mut spending_key[..])
            .map_err(|e| ZertSdkError::Other(format!("spending key derivation: {e}")))?;

        let mut hasher = Sha256::new();
        hasher.update(OWNER_DOMAIN);
        hasher.update(&spending_key[..]);
        let owner_key_hash: [u8; 32] = hasher.finalize().into();

        Ok(Self {
            wallet,
            scanning_key,
            spending_key,
            owner_key_hash,
        })
    }

    pub fn wallet(&self) -> &Pubkey {
        &self.wallet
    }

    /// AES-128 key for note bodies
    pub fn encryption_key(&self) -> &[u8] {
        &self.scanning_key[..16]
    }

    /// HMAC key authenticating note envelopes
    pub fn mac_key(&self) -> &[u8] {
        &self.scanning_key[16..]
    }

    pub fn spending_key(&self) -> &[u8; 32] {
        &self.spending_key
    }

    pub fn owner_key_hash(&self) -> &[u8; 32] {
        &self.owner_key_hash
    }

    /// Short owner tag embedded in note plaintexts
    pub fn owner_tag(&self) -> [u8; OWNER_TAG_LEN] {
        let mut tag = [0u8; OWNER_TAG_LEN];
        tag.copy_from_slice(&self.owner_key_hash[..OWNER_TAG_LEN]);
        tag
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("wallet", &self.wallet)
            .field("owner_tag", &hex::encode(self.owner_tag()))
            .finish_non_exhaustive()
    }
}

impl PartialEq for Identity {
    fn eq(&self, other: &Self) -> bool {
        self.wallet == other.wallet && self.owner_key_hash == other.owner_key_hash
    }
}

impl Eq for Identity {}

/// Per-session authentication state
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Deriving,
    Ready(Arc<Identity>),
    Rejected,
}

impl SessionState {
    pub fn identity(&self) -> Option<&Arc<Identity>> {
        match self {
            SessionState::Ready(identity) => Some(identity),
            _ => None,
        }
    }
}

/// Derives and caches the identity of the connected wallet.
///
/// Overlapping requests are serialized on the session lock; a caller that
/// waited behind a finished attempt reuses its outcome instead of prompting
/// the user again. Every transition is mirrored into `published` so readers
/// never have to take the session lock.
pub struct IdentityDeriver {
    store: Arc<dyn KeyValueStore>,
    session: Mutex<SessionState>,
    published: RwLock<SessionState>,
    completed: AtomicU64,
}

impl IdentityDeriver {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            session: Mutex::new(SessionState::Unauthenticated),
            published: RwLock::new(SessionState::Unauthenticated),
            completed: AtomicU64::new(0),
        }
    }

    /// Last published state; `Deriving` only while a signature is being obtained
    pub fn state(&self) -> SessionState {
        match self.published.read() {
            Ok(state) => state.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    /// Settled state, waiting for an in-flight derivation to finish
    pub async fn current(&self) -> SessionState {
        self.session.lock().await.clone()
    }

    fn publish(&self, state: SessionState) {
        match self.published.write() {
            Ok(mut published) => *published = state,
            Err(poisoned) => *poisoned.into_inner() = state,
        }
    }

    pub async fn derive_identity(&self, signer: &dyn WalletSigner) -> Result<Arc<Identity>> {
        let wallet = signer.pubkey();
        let observed = self.completed.load(Ordering::Acquire);
        let mut session = self.session.lock().await;
        let joined = self.completed.load(Ordering::Acquire) != observed;

        match &*session {
            SessionState::Ready(identity) if *identity.wallet() == wallet => {
                return Ok(identity.clone());
            },
            SessionState::Rejected if joined => {
                return Err(ZertSdkError::SignatureRejected);
            },
            _ => {},
        }

        self.publish(SessionState::Deriving);
        let outcome = self.resolve_identity(signer, &wallet).await;
        *session = match &outcome {
            Ok(identity) => SessionState::Ready(identity.clone()),
            Err(ZertSdkError::SignatureRejected) => SessionState::Rejected,
            Err(_) => SessionState::Unauthenticated,
        };
        self.publish(session.clone());
        self.completed.fetch_add(1, Ordering::AcqRel);
        outcome
    }

    async fn resolve_identity(
        &self,
        signer: &dyn WalletSigner,
        wallet: &Pubkey,
    ) -> Result<Arc<Identity>> {
        let challenge = challenge_message(wallet);

        let signature = match self.stored_signature(wallet)? {
            Some(signature) => {
                debug!(%wallet, "reusing stored identity signature");
                signature
            },
            None => {
                info!(%wallet, "requesting identity signature");
                let signature = signer
                    .sign_message(challenge.as_bytes())
                    .await
                    .map_err(|e| match e {
                        SignError::Rejected => ZertSdkError::SignatureRejected,
                        SignError::Unsupported => ZertSdkError::SignatureUnavailable,
                        SignError::Failed(msg) => ZertSdkError::Signer(msg),
                    })?;
                self.store
                    .set(&signature_key(wallet), &signature.to_string())?;
                signature
            },
        };

        Ok(Arc::new(Identity::from_signature(*wallet, &signature)?))
    }

    /// Stored seed for the wallet. The seed is used as stored: wallets that
    /// sign through an envelope produce signatures that do not verify over
    /// the bare challenge. Only an unparsable value is discarded.
    fn stored_signature(&self, wallet: &Pubkey) -> Result<Option<Signature>> {
        let key = signature_key(wallet);
        let Some(encoded) = self.store.get(&key)? else {
            return Ok(None);
        };

        match Signature::from_str(encoded.trim()) {
            Ok(signature) => Ok(Some(signature)),
            Err(e) => {
                warn!(%wallet, error = %e, "discarding unparsable stored identity signature");
                self.store.delete(&key)?;
                Ok(None)
            },
        }
    }

    /// Logical sign-out: the stored seed survives for the next session
    pub async fn disconnect(&self) {
        let mut session = self.session.lock().await;
        *session = SessionState::Unauthenticated;
        self.publish(SessionState::Unauthenticated);
    }

    /// Remove the stored seed so the next derivation prompts again
    pub async fn forget(&self, wallet: &Pubkey) -> Result<()> {
        let mut session = self.session.lock().await;
        if session.identity().is_some_and(|id| id.wallet() == wallet) {
            *session = SessionState::Unauthenticated;
            self.publish(SessionState::Unauthenticated);
        }
        self.store.delete(&signature_key(wallet))
    }
}
