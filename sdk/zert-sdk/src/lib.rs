pub mod advanced;
pub mod asset;
pub mod balance;
pub mod basic;
pub mod cache;
pub mod config;
pub mod core;
pub mod error;
pub mod fee;
pub mod identity;
pub mod types;
pub mod utils;

pub use crate::advanced::decoder::{DecodeOutcome, MalformedReason, NoteDecoder, NoteDraft};
pub use crate::advanced::scan::{NoteScanner, ScanFailure, ScanPhase, ScanReport, ScanTask};
pub use crate::asset::{AssetDescriptor, AssetField, AssetRegistry};
pub use crate::balance::{
    aggregate, BalanceEntry, BalanceSnapshot, BalanceView, NullifierAccountOracle,
    SpendStatusOracle, SpentPositions,
};
pub use crate::basic::account::{ShieldedAccount, ShieldedAccountBuilder};
pub use crate::cache::ScanCache;
pub use crate::config::SyncConfig;
pub use crate::core::connection::SolConnection;
pub use crate::core::signer::{SignError, WalletSigner};
pub use crate::core::source::{IndexerNoteSource, NotePage, NoteSource};
pub use crate::core::storage::{FileStore, KeyValueStore, MemoryStore};
pub use crate::error::{Result, ZertSdkError};
pub use crate::fee::{estimate_fee, FeeEstimate, FeeKind, FeeRate, FeeSchedule};
pub use crate::identity::{Identity, IdentityDeriver, SessionState};
pub use crate::types::{EncryptedNote, Note, ScanCursor};
pub use crate::utils::{format_adaptive, format_units, parse_units};
