//! Mapping between mint addresses and the field elements stored inside notes.
//!
//! Notes carry their asset as a BN254 field element rather than an address.
//! The mapping is a registered table: only mints known to the registry can
//! be turned back into addresses.

use crate::core::constants::{FIELD_MODULUS, NATIVE_MINT, USDC_MINT, USDT_MINT, ZEC_MINT};
use crate::error::{Result, ZertSdkError};
use primitive_types::U256;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;

/// Asset identity as a circuit-native field element (< BN254 modulus)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub struct AssetField(U256);

impl AssetField {
    /// Field element of a mint: its 32 bytes read big-endian, reduced mod the field size
    pub fn from_mint(mint: &Pubkey) -> Self {
        Self(U256::from_big_endian(mint.as_ref()) % FIELD_MODULUS)
    }

    /// Sentinel for the native asset
    pub fn native() -> Self {
        Self::from_mint(&NATIVE_MINT)
    }

    pub fn is_native(&self) -> bool {
        *self == Self::native()
    }

    /// Parse a canonical big-endian encoding; values outside the field are rejected
    pub fn from_be_bytes(bytes: &[u8; 32]) -> Option<Self> {
        let value = U256::from_big_endian(bytes);
        (value < FIELD_MODULUS).then_some(Self(value))
    }

    pub fn to_be_bytes(&self) -> [u8; 32] {
        let mut out = [0u8; 32];
        self.0.to_big_endian(&mut out);
        out
    }

    pub fn as_u256(&self) -> U256 {
        self.0
    }
}

impl fmt::Display for AssetField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for AssetField {
    type Err = ZertSdkError;

    fn from_str(s: &str) -> Result<Self> {
        let value = U256::from_dec_str(s)
            .map_err(|e| ZertSdkError::InvalidAccountData(format!("bad field element {s}: {e:?}")))?;
        if value >= FIELD_MODULUS {
            return Err(ZertSdkError::InvalidAccountData(format!(
                "field element {s} exceeds the field modulus"
            )));
        }
        Ok(Self(value))
    }
}

impl From<AssetField> for String {
    fn from(field: AssetField) -> Self {
        field.to_string()
    }
}

impl TryFrom<String> for AssetField {
    type Error = ZertSdkError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// A supported asset
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetDescriptor {
    pub mint: Pubkey,
    pub field: AssetField,
    pub decimals: u8,
    pub symbol: String,
}

impl AssetDescriptor {
    pub fn new(mint: Pubkey, decimals: u8, symbol: impl Into<String>) -> Self {
        Self {
            mint,
            field: AssetField::from_mint(&mint),
            decimals,
            symbol: symbol.into(),
        }
    }
}

/// Registered table of supported assets, queryable in both directions
#[derive(Debug, Clone, Default)]
pub struct AssetRegistry {
    by_mint: HashMap<Pubkey, AssetDescriptor>,
    by_field: HashMap<AssetField, Pubkey>,
}

impl AssetRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Registry preloaded with the assets the pool supports out of the box
    pub fn builtin() -> Self {
        let mut registry = Self::empty();
        for descriptor in [
            AssetDescriptor::new(NATIVE_MINT, 9, "SOL"),
            AssetDescriptor::new(USDC_MINT, 6, "USDC"),
            AssetDescriptor::new(USDT_MINT, 6, "USDT"),
            AssetDescriptor::new(ZEC_MINT, 9, "ZEC"),
        ] {
            registry.insert(descriptor);
        }
        registry
    }

    fn insert(&mut self, descriptor: AssetDescriptor) {
        self.by_field.insert(descriptor.field, descriptor.mint);
        self.by_mint.insert(descriptor.mint, descriptor);
    }

    /// Add an asset. Re-registering a mint replaces its metadata; a different
    /// mint reducing to an already registered field element is refused.
    pub fn register(&mut self, descriptor: AssetDescriptor) -> Result<()> {
        if let Some(existing) = self.by_field.get(&descriptor.field) {
            if *existing != descriptor.mint {
                return Err(ZertSdkError::AssetCollision(descriptor.mint));
            }
        }
        tracing::debug!(mint = %descriptor.mint, symbol = %descriptor.symbol, "registered asset");
        self.insert(descriptor);
        Ok(())
    }

    /// Field element for a registered mint
    pub fn to_field(&self, mint: &Pubkey) -> Result<AssetField> {
        self.by_mint
            .get(mint)
            .map(|d| d.field)
            .ok_or(ZertSdkError::UnsupportedAsset(*mint))
    }

    /// Mint for a field element; `None` means the asset is unknown, not an error
    pub fn from_field(&self, field: &AssetField) -> Option<Pubkey> {
        self.by_field.get(field).copied()
    }

    pub fn descriptor_by_mint(&self, mint: &Pubkey) -> Option<&AssetDescriptor> {
        self.by_mint.get(mint)
    }

    pub fn descriptor_by_field(&self, field: &AssetField) -> Option<&AssetDescriptor> {
        self.from_field(field).and_then(|mint| self.by_mint.get(&mint))
    }

    pub fn symbol_of(&self, field: &AssetField) -> Option<&str> {
        self.descriptor_by_field(field).map(|d| d.symbol.as_str())
    }

    pub fn iter(&self) -> impl Iterator<Item = &AssetDescriptor> {
        self.by_mint.values()
    }

    pub fn len(&self) -> usize {
        self.by_mint.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_mint.is_empty()
    }
}
