//! Per-asset balances from the owned note set.

use crate::asset::{AssetField, AssetRegistry};
use crate::core::connection::SolConnection;
use crate::core::constants::NULLIFIER_SEED;
use crate::error::{Result, ZertSdkError};
use crate::types::Note;
use crate::utils::format_units;
use async_trait::async_trait;
use num_bigint::BigUint;
use num_traits::Zero;
use solana_sdk::pubkey::Pubkey;
use std::collections::{BTreeMap, HashSet};
use std::sync::RwLock;

/// Answers whether an owned note has already been spent
#[async_trait]
pub trait SpendStatusOracle: Send + Sync {
    async fn is_spent(&self, note: &Note) -> Result<bool>;
}

/// Oracle backed by a known set of spent positions
#[derive(Debug, Default)]
pub struct SpentPositions {
    positions: RwLock<HashSet<u64>>,
}

impl SpentPositions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_positions(positions: impl IntoIterator<Item = u64>) -> Self {
        Self {
            positions: RwLock::new(positions.into_iter().collect()),
        }
    }

    pub fn mark(&self, position: u64) {
        if let Ok(mut positions) = self.positions.write() {
            positions.insert(position);
        }
    }
}

#[async_trait]
impl SpendStatusOracle for SpentPositions {
    async fn is_spent(&self, note: &Note) -> Result<bool> {
        let positions = self
            .positions
            .read()
            .map_err(|_| ZertSdkError::Other("spent set lock poisoned".into()))?;
        Ok(positions.contains(&note.position))
    }
}

/// Computes the nullifier of a note, or `None` when it cannot be computed yet
pub type NullifierFn = Box<dyn Fn(&Note) -> Option<[u8; 32]> + Send + Sync>;

/// Oracle that looks for the on-ledger nullifier account of each note.
///
/// The pool creates a PDA at `["nullifier", nullifier]` when a note is
/// spent, so the account's existence is the spent flag.
pub struct NullifierAccountOracle<C: SolConnection> {
    connection: C,
    program_id: Pubkey,
    nullifier_of: NullifierFn,
}

impl<C: SolConnection> NullifierAccountOracle<C> {
    pub fn new(connection: C, program_id: Pubkey, nullifier_of: NullifierFn) -> Self {
        Self {
            connection,
            program_id,
            nullifier_of,
        }
    }

    pub fn nullifier_address(&self, nullifier: &[u8; 32]) -> Pubkey {
        Pubkey::find_program_address(&[NULLIFIER_SEED, nullifier.as_ref()], &self.program_id).0
    }
}

#[async_trait]
impl<C: SolConnection> SpendStatusOracle for NullifierAccountOracle<C> {
    async fn is_spent(&self, note: &Note) -> Result<bool> {
        let Some(nullifier) = (self.nullifier_of)(note) else {
            return Ok(false);
        };
        let address = self.nullifier_address(&nullifier);
        let account = self
            .connection
            .get_account(&address)
            .await
            .map_err(|e| ZertSdkError::Connection(e.to_string()))?;
        Ok(account.is_some())
    }
}

/// Sum unspent amounts per asset field. Each note counts once.
pub fn aggregate(notes: &[Note]) -> BTreeMap<AssetField, BigUint> {
    let mut totals: BTreeMap<AssetField, BigUint> = BTreeMap::new();
    for note in notes.iter().filter(|n| n.is_spendable()) {
        *totals.entry(note.asset_field).or_default() += note.amount;
    }
    totals
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BalanceEntry {
    pub field: AssetField,
    pub mint: Pubkey,
    pub symbol: String,
    pub decimals: u8,
    pub raw: BigUint,
    pub display: String,
}

/// Human-facing balances. Totals of unregistered assets are kept apart,
/// still counted but without a symbol.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceView {
    pub entries: Vec<BalanceEntry>,
    pub unlisted: Vec<(AssetField, BigUint)>,
}

impl BalanceView {
    pub fn from_totals(totals: &BTreeMap<AssetField, BigUint>, registry: &AssetRegistry) -> Self {
        let mut view = BalanceView::default();
        for (field, raw) in totals.iter().filter(|(_, raw)| !raw.is_zero()) {
            match registry.descriptor_by_field(field) {
                Some(asset) => view.entries.push(BalanceEntry {
                    field: *field,
                    mint: asset.mint,
                    symbol: asset.symbol.clone(),
                    decimals: asset.decimals,
                    raw: raw.clone(),
                    display: format_units(raw, asset.decimals),
                }),
                None => {
                    tracing::debug!(%field, "balance in unregistered asset");
                    view.unlisted.push((*field, raw.clone()));
                },
            }
        }
        view.entries.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        view
    }

    pub fn by_symbol(&self, symbol: &str) -> Option<&BalanceEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }

    pub fn by_mint(&self, mint: &Pubkey) -> Option<&BalanceEntry> {
        self.entries.iter().find(|e| e.mint == *mint)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty() && self.unlisted.is_empty()
    }
}

/// Balance view as returned to the presentation layer
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BalanceSnapshot {
    pub view: BalanceView,
    /// False when no identity is available; the view is then empty
    pub authenticated: bool,
    /// Set when the view is served from cache after a failed refresh
    pub warning: Option<String>,
    /// First stream position not reflected in the view
    pub next_position: u64,
}

impl BalanceSnapshot {
    pub fn unauthenticated() -> Self {
        Self::default()
    }

    pub fn is_stale(&self) -> bool {
        self.warning.is_some()
    }
}
