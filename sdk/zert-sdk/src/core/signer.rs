use async_trait::async_trait;
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::{Keypair, Signature, Signer};
use thiserror::Error;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SignError {
    #[error("user rejected the request")]
    Rejected,
    #[error("message signing is not supported by this wallet")]
    Unsupported,
    #[error("{0}")]
    Failed(String),
}

/// Abstraction for an entity that can sign messages.
/// This allows the SDK to work with:
/// 1. Local Keypairs (Backend/CLI)
/// 2. Wallet Adapters (Frontend - user-approved message signing)
#[async_trait]
pub trait WalletSigner: Send + Sync {
    fn pubkey(&self) -> Pubkey;

    /// Sign a message.
    /// Not all signers support this (e.g. hardware wallets that only sign transactions),
    /// those return `SignError::Unsupported`.
    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignError>;
}

#[async_trait]
impl WalletSigner for Keypair {
    fn pubkey(&self) -> Pubkey {
        Signer::pubkey(self)
    }

    async fn sign_message(&self, message: &[u8]) -> Result<Signature, SignError> {
        // ed25519 signing is deterministic, so the derived identity is stable across devices
        Ok(Signer::sign_message(self, message))
    }
}
