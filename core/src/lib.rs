//! rayswap core library
//!
//! Wallet primitives for the rayswap Solana client: identity loading, ledger
//! access, associated token accounts, exact amount conversion, native and SPL
//! transfers, and signing/broadcast of externally built transactions.
//!
//! # Features
//!
//! - **Wallet identity**: base58 or `solana-keygen` JSON secret keys, zeroized after decode
//! - **Token accounts**: deterministic derivation and idempotent creation
//! - **Transfers**: SOL and SPL token transfers with a configurable fee reserve
//! - **Submission**: ordered re-sign and broadcast of base64 transaction payloads
//! - **Metrics** (feature `metrics`): Prometheus counters for ledger RPC calls
//!
//! # Quick Start
//!
//! ```no_run
//! use rayswap_core::{ClientConfig, Wallet, WalletIdentity};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::builder()
//!         .with_rpc_url("https://api.mainnet-beta.solana.com")
//!         .build();
//!     let identity = WalletIdentity::from_file("wallet.json")?;
//!     let wallet = Wallet::connect(&config, identity);
//!
//!     let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse()?;
//!     println!("USDC: {}", wallet.token_balance(&usdc).await?);
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod config;
pub mod error;
pub mod keypair;
pub mod rpc;
pub mod token;
pub mod transaction;
pub mod wallet;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-exports for convenience
pub use config::ClientConfig;
pub use error::{Error, Result};
pub use keypair::WalletIdentity;
pub use rpc::{LedgerRpc, SolanaRpc};
pub use token::{MintInfo, MintMetadataProvider, TokenAccountRef, TokenAccountResolver};
pub use transaction::{BuiltTransaction, SubmissionResult, TransactionSubmitter};
pub use wallet::Wallet;

/// Prelude module for easy importing of common types
pub mod prelude {
    pub use super::{
        BuiltTransaction, ClientConfig, Error, LedgerRpc, MintMetadataProvider, Result,
        SubmissionResult, TokenAccountRef, Wallet, WalletIdentity,
    };

    pub use rust_decimal::Decimal;
    pub use solana_sdk::{
        pubkey::Pubkey,
        signature::{Signature, Signer},
    };
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Library name
pub const NAME: &str = "rayswap-core";
