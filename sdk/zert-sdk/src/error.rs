use solana_sdk::pubkey::Pubkey;
use thiserror::Error;

/// SDK-specific error types for shielded balance synchronization
#[derive(Debug, Error)]
pub enum ZertSdkError {
    /// The user declined the identity challenge
    #[error("Signature request rejected by the user")]
    SignatureRejected,

    /// The connected wallet cannot sign arbitrary messages
    #[error("Connected wallet cannot sign messages")]
    SignatureUnavailable,

    /// Operation needs a derived identity and none is available
    #[error("No wallet connected")]
    NotConnected,

    /// Any other signer failure
    #[error("Signer error: {0}")]
    Signer(String),

    /// Indexer fetch failed; the scan halts at the last committed cursor
    #[error("Transport error: {0}")]
    Transport(String),

    /// Connection or RPC error
    #[error("Connection error: {0}")]
    Connection(String),

    /// The caller abandoned the scan at a page boundary
    #[error("Scan cancelled")]
    ScanCancelled,

    /// Persisted scan state failed an integrity check
    #[error("Scan cache corrupted: {0}")]
    CacheCorrupted(String),

    /// Mint has no registered field element
    #[error("Asset {0} is not registered")]
    UnsupportedAsset(Pubkey),

    /// Asset registration would alias an existing field element
    #[error("Field element collision while registering {0}")]
    AssetCollision(Pubkey),

    /// Fee rate outside 0..=10000 basis points
    #[error("Invalid fee rate: {0} basis points (expected 0..=10000)")]
    InvalidFeeRate(u32),

    /// Configuration could not be loaded or is inconsistent
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Durable storage failure
    #[error("Storage error: {0}")]
    Storage(String),

    /// JSON serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid account data or deserialization error
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

impl ZertSdkError {
    /// Whether the failure is transient and the caller may offer a retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_) | Self::Connection(_))
    }
}

impl From<std::io::Error> for ZertSdkError {
    fn from(err: std::io::Error) -> Self {
        Self::Storage(err.to_string())
    }
}

/// Result type alias for SDK operations
pub type Result<T> = std::result::Result<T, ZertSdkError>;
