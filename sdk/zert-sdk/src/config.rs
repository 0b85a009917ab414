//! Sync engine configuration.

use crate::core::constants::{
    DEFAULT_INDEXER_URL, DEFAULT_PROGRAM_ID, PAGE_DELAY_MS, PAGE_SIZE, REQUEST_TIMEOUT_MS,
};
use crate::error::{Result, ZertSdkError};
use crate::fee::FeeSchedule;
use serde::{Deserialize, Serialize};
use solana_sdk::pubkey::Pubkey;
use std::env;
use std::str::FromStr;
use std::time::Duration;

/// Settings shared by the scanner, the indexer client and fee estimation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Pool program id; its prefix namespaces every storage key.
    pub program_id: String,
    /// Base URL of the commitments indexer.
    pub indexer_url: String,
    /// Notes requested per page.
    pub page_size: u64,
    /// Indexer request timeout (milliseconds).
    pub request_timeout_ms: u64,
    /// Pause between consecutive pages (milliseconds).
    pub page_delay_ms: u64,
    /// Fee rates per operation.
    pub fees: FeeSchedule,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            program_id: DEFAULT_PROGRAM_ID.to_string(),
            indexer_url: DEFAULT_INDEXER_URL.to_string(),
            page_size: PAGE_SIZE,
            request_timeout_ms: REQUEST_TIMEOUT_MS,
            page_delay_ms: PAGE_DELAY_MS,
            fees: FeeSchedule::default(),
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Result<Self> {
        Self::from_vars(|name| env::var(name).ok())
    }

    fn from_vars(var: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();
        let config = Self {
            program_id: var("ZERT_PROGRAM_ID").unwrap_or(defaults.program_id),
            indexer_url: var("ZERT_INDEXER_URL").unwrap_or(defaults.indexer_url),
            page_size: parse_var(&var, "ZERT_PAGE_SIZE", defaults.page_size)?,
            request_timeout_ms: parse_var(
                &var,
                "ZERT_REQUEST_TIMEOUT_MS",
                defaults.request_timeout_ms,
            )?,
            page_delay_ms: parse_var(&var, "ZERT_PAGE_DELAY_MS", defaults.page_delay_ms)?,
            fees: defaults.fees,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)
            .map_err(|e| ZertSdkError::Config(format!("malformed config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    pub fn with_program_id(mut self, program_id: &Pubkey) -> Self {
        self.program_id = program_id.to_string();
        self
    }

    pub fn with_indexer_url(mut self, url: impl Into<String>) -> Self {
        self.indexer_url = url.into();
        self
    }

    pub fn with_page_size(mut self, page_size: u64) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn with_page_delay_ms(mut self, delay_ms: u64) -> Self {
        self.page_delay_ms = delay_ms;
        self
    }

    pub fn with_request_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.request_timeout_ms = timeout_ms;
        self
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn validate(&self) -> Result<()> {
        self.program_pubkey()?;
        if self.indexer_url.trim().is_empty() {
            return Err(ZertSdkError::Config("indexer_url is empty".into()));
        }
        if self.page_size == 0 {
            return Err(ZertSdkError::Config("page_size must be at least 1".into()));
        }
        self.fees.validate()
    }

    pub fn program_pubkey(&self) -> Result<Pubkey> {
        Pubkey::from_str(&self.program_id)
            .map_err(|e| ZertSdkError::Config(format!("program_id {}: {e}", self.program_id)))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }
}

fn parse_var<T: FromStr>(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: T,
) -> Result<T> {
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| ZertSdkError::Config(format!("{name}={raw} is not a valid number"))),
        None => Ok(default),
    }
}
