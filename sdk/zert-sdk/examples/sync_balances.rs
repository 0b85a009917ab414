// Example: Syncing a shielded balance from the indexer
//
// This example demonstrates how to:
// 1. Load the sync configuration from the environment
// 2. Persist scan state in a local directory
// 3. Derive the wallet's identity and scan its notes
// 4. Print per-asset balances and a withdrawal fee quote
//
// Run against a local indexer:
//   ZERT_INDEXER_URL=http://localhost:3001 cargo run --example sync_balances

use solana_sdk::signature::Keypair;
use std::sync::Arc;
use zert_sdk::core::constants::NATIVE_MINT;
use zert_sdk::{FeeKind, FileStore, ShieldedAccount, SyncConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // 1. Configuration (ZERT_* variables override defaults)
    let config = SyncConfig::from_env()?;
    println!("Indexer: {}", config.indexer_url);

    // 2. Durable storage for the identity seed and scan cursor
    let store = Arc::new(FileStore::open(".zert-cache")?);

    // 3. Account backed by the HTTP indexer
    let account = ShieldedAccount::builder()
        .with_config(config)
        .with_store(store)
        .build()?;

    // A local keypair stands in for a browser wallet
    let wallet = Keypair::new();
    let snapshot = account.balances(&wallet).await?;

    if let Some(warning) = &snapshot.warning {
        println!("Showing cached balances: {}", warning);
    }

    // 4. Balances
    println!("Scanned up to position {}", snapshot.next_position);
    for entry in &snapshot.view.entries {
        println!("  {:>6}: {}", entry.symbol, entry.display);
    }
    for (field, raw) in &snapshot.view.unlisted {
        println!("  unlisted asset {}: {} units", field, raw);
    }

    let fee = account.estimate_fee("1.00", &NATIVE_MINT, FeeKind::Withdraw)?;
    println!("\nFee to withdraw 1 SOL: {} SOL", fee.display);

    Ok(())
}
