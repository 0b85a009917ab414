use crate::advanced::scan::{NoteScanner, ScanReport};
use crate::asset::AssetRegistry;
use crate::balance::{aggregate, BalanceSnapshot, BalanceView, SpendStatusOracle};
use crate::cache::ScanCache;
use crate::config::SyncConfig;
use crate::core::signer::WalletSigner;
use crate::core::source::{IndexerNoteSource, NoteSource};
use crate::core::storage::{KeyValueStore, MemoryStore};
use crate::error::{Result, ZertSdkError};
use crate::fee::{estimate_fee, FeeEstimate, FeeKind};
use crate::identity::{Identity, IdentityDeriver, SessionState};
use solana_sdk::pubkey::Pubkey;
use std::sync::Arc;
use tracing::{info, warn};

/// Shielded balance of one connected wallet.
///
/// Ties the identity session, the note scanner and the asset registry
/// together behind the operations a wallet UI needs.
pub struct ShieldedAccount {
    config: SyncConfig,
    program_id: Pubkey,
    registry: AssetRegistry,
    deriver: IdentityDeriver,
    scanner: NoteScanner,
    spend_oracle: Option<Arc<dyn SpendStatusOracle>>,
}

impl ShieldedAccount {
    pub fn builder() -> ShieldedAccountBuilder {
        ShieldedAccountBuilder::new()
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn program_id(&self) -> &Pubkey {
        &self.program_id
    }

    pub fn registry(&self) -> &AssetRegistry {
        &self.registry
    }

    pub fn session_state(&self) -> SessionState {
        self.deriver.state()
    }

    /// Derive (or reuse) the identity of the wallet behind `signer`
    ///
    /// # Returns
    /// The identity, or `SignatureRejected` / `SignatureUnavailable` when the
    /// wallet does not produce the challenge signature
    pub async fn connect(&self, signer: &dyn WalletSigner) -> Result<Arc<Identity>> {
        self.deriver.derive_identity(signer).await
    }

    /// End the session. The stored signature is kept for the next session.
    pub async fn disconnect(&self) {
        self.deriver.disconnect().await;
    }

    async fn current_identity(&self) -> Result<Arc<Identity>> {
        match self.deriver.current().await {
            SessionState::Ready(identity) => Ok(identity),
            SessionState::Rejected => Err(ZertSdkError::SignatureRejected),
            SessionState::Unauthenticated | SessionState::Deriving => {
                Err(ZertSdkError::NotConnected)
            },
        }
    }

    /// Scan new notes of the connected wallet
    pub async fn sync(&self) -> Result<ScanReport> {
        let identity = self.current_identity().await?;
        self.scanner.scan(identity).await
    }

    /// Refresh and report balances for the wallet behind `signer`.
    ///
    /// A declined signature yields an unauthenticated, empty snapshot. A
    /// failed fetch yields the cached balances with a warning attached.
    pub async fn balances(&self, signer: &dyn WalletSigner) -> Result<BalanceSnapshot> {
        let identity = match self.connect(signer).await {
            Ok(identity) => identity,
            Err(ZertSdkError::SignatureRejected | ZertSdkError::SignatureUnavailable) => {
                info!(wallet = %signer.pubkey(), "no identity, showing unauthenticated balances");
                return Ok(BalanceSnapshot::unauthenticated());
            },
            Err(e) => return Err(e),
        };
        let wallet = *identity.wallet();

        let warning = match self.scanner.scan(identity).await {
            Ok(_) => None,
            Err(e) if e.is_retryable() => {
                warn!(%wallet, error = %e, "serving cached balances");
                Some(e.to_string())
            },
            Err(e) => return Err(e),
        };

        let cursor = match &self.spend_oracle {
            Some(oracle) => self.scanner.refresh_spent(&wallet, oracle.as_ref()).await?,
            None => self.scanner.load_cursor(&wallet).await?,
        };

        let totals = aggregate(&cursor.owned_notes);
        Ok(BalanceSnapshot {
            view: BalanceView::from_totals(&totals, &self.registry),
            authenticated: true,
            warning,
            next_position: cursor.next_position(),
        })
    }

    /// Discard the scan cache of the connected wallet and rescan from the start
    pub async fn force_resync(&self) -> Result<ScanReport> {
        let identity = self.current_identity().await?;
        self.scanner.force_resync(identity).await
    }

    /// Delete everything stored for `wallet`: identity seed and scan cache
    pub async fn forget_wallet(&self, wallet: &Pubkey) -> Result<()> {
        self.deriver.forget(wallet).await?;
        self.scanner.forget(wallet).await?;
        info!(%wallet, "wallet storage cleared");
        Ok(())
    }

    /// Fee for `amount` of `mint` under the configured rate for `kind`
    pub fn estimate_fee(&self, amount: &str, mint: &Pubkey, kind: FeeKind) -> Result<FeeEstimate> {
        let asset = self
            .registry
            .descriptor_by_mint(mint)
            .ok_or(ZertSdkError::UnsupportedAsset(*mint))?;
        let rate = self.config.fees.rate(kind)?;
        Ok(estimate_fee(amount, asset, rate))
    }
}

/// Builder for [`ShieldedAccount`]; unset collaborators get defaults
/// (in-memory store, HTTP indexer from the config, built-in assets).
#[derive(Default)]
pub struct ShieldedAccountBuilder {
    config: Option<SyncConfig>,
    store: Option<Arc<dyn KeyValueStore>>,
    source: Option<Arc<dyn NoteSource>>,
    registry: Option<AssetRegistry>,
    spend_oracle: Option<Arc<dyn SpendStatusOracle>>,
}

impl ShieldedAccountBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = Some(config);
        self
    }

    pub fn with_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.store = Some(store);
        self
    }

    pub fn with_source(mut self, source: Arc<dyn NoteSource>) -> Self {
        self.source = Some(source);
        self
    }

    pub fn with_registry(mut self, registry: AssetRegistry) -> Self {
        self.registry = Some(registry);
        self
    }

    pub fn with_spend_oracle(mut self, oracle: Arc<dyn SpendStatusOracle>) -> Self {
        self.spend_oracle = Some(oracle);
        self
    }

    pub fn build(self) -> Result<ShieldedAccount> {
        let config = self.config.unwrap_or_default();
        config.validate()?;
        let program_id = config.program_pubkey()?;

        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn KeyValueStore>);
        let source: Arc<dyn NoteSource> = match self.source {
            Some(source) => source,
            None => Arc::new(IndexerNoteSource::new(
                config.indexer_url.clone(),
                config.request_timeout(),
            )?),
        };

        let scanner = NoteScanner::new(
            source,
            ScanCache::new(store.clone(), program_id),
            config.page_size,
        )
        .with_page_delay(config.page_delay());

        Ok(ShieldedAccount {
            program_id,
            registry: self.registry.unwrap_or_else(AssetRegistry::builtin),
            deriver: IdentityDeriver::new(store),
            scanner,
            spend_oracle: self.spend_oracle,
            config,
        })
    }
}
