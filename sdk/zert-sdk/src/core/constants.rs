use primitive_types::U256;
use solana_sdk::pubkey;
use solana_sdk::pubkey::Pubkey;

// Default Program ID of the shielded pool deployment
pub const DEFAULT_PROGRAM_ID: Pubkey = pubkey!("6Uok9UsjztPC9VJ3a8ZpawzKmgrD2VvMKQGb64FYjhnx");

pub const DEFAULT_INDEXER_URL: &str = "http://localhost:3001";

/// Maximum number of encrypted notes requested per indexer call
pub const PAGE_SIZE: u64 = 50;

/// Pause between consecutive page fetches, in milliseconds
pub const PAGE_DELAY_MS: u64 = 100;

pub const REQUEST_TIMEOUT_MS: u64 = 30_000;

/// BN254 scalar field modulus (little-endian limbs)
/// 21888242871839275222246405745257275088548364400416034343698204186575808495617
pub const FIELD_MODULUS: U256 = U256([
    0x43e1_f593_f000_0001,
    0x2833_e848_79b9_7091,
    0xb850_45b6_8181_585d,
    0x3064_4e72_e131_a029,
]);

/// Wrapped SOL mint; its field element is the native-asset sentinel
pub const NATIVE_MINT: Pubkey = pubkey!("So11111111111111111111111111111111111111112");
pub const USDC_MINT: Pubkey = pubkey!("EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v");
pub const USDT_MINT: Pubkey = pubkey!("Es9vMFrzaCERmJfrF4H2FYD4KCoNkY11McCe8BenwNYB");
pub const ZEC_MINT: Pubkey = pubkey!("A7bdiYdS5GjqGFtxf17ppRHtDKPkkRqbKtR27dxvQXaS");

pub const BASIS_POINTS_DENOMINATOR: u32 = 10_000;
pub const DEFAULT_DEPOSIT_FEE_BPS: u32 = 0;
pub const DEFAULT_WITHDRAW_FEE_BPS: u32 = 25;
pub const DEFAULT_SWAP_FEE_BPS: u32 = 25;

// Storage key families
pub const LSK_FETCH_OFFSET: &str = "fetch_offset";
pub const LSK_OWNED_NOTES: &str = "owned_notes";
pub const LSK_WALLET_SIGNATURE: &str = "wallet_signature_";

/// Length of the program-id prefix used to namespace storage keys
pub const PROGRAM_PREFIX_LEN: usize = 6;

pub const CHALLENGE_PREFIX: &str = "Sign this message to authenticate with Zert\n\nWallet: ";

pub const NULLIFIER_SEED: &[u8] = b"nullifier";
