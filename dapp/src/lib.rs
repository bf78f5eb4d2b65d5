//! Raydium swaps and price polling for rayswap wallets
//!
//! Builds on `rayswap-core` to execute token swaps through the Raydium trade
//! API and to poll token prices on a fixed schedule.
//!
//! # Features
//!
//! - **Swaps**: quote, build, sign and submit with funds validated up front
//! - **Priority fees**: fee estimate fetched per swap
//! - **Mint metadata**: decimals and symbols from the Raydium mint endpoint
//! - **Price polling**: one task per token, errors logged and skipped
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use rayswap_core::{ClientConfig, Wallet, WalletIdentity};
//! use rayswap_dapp::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
//!     let config = ClientConfig::default();
//!     let identity = WalletIdentity::from_file("wallet.json")?;
//!     let raydium = Arc::new(RaydiumClient::new(&config.api)?);
//!     let wallet = Wallet::connect(&config, identity).with_metadata_provider(raydium.clone());
//!
//!     let usdc: Pubkey = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse()?;
//!     let request = SwapRequest::new(rayswap_core::token::native_mint(), usdc, 100_000_000, DEFAULT_SLIPPAGE_BPS);
//!
//!     let result = SwapOrchestrator::new(wallet, raydium).swap(&request).await?;
//!     for signature in &result.signatures {
//!         println!("{}", signature);
//!     }
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

pub mod error;
pub mod price;
pub mod protocol;

#[cfg(feature = "raydium")]
pub mod raydium;

// Re-exports for convenience
pub use error::{DappError, Result};
pub use price::PricePoller;
pub use protocol::{PriceSource, PriceTick, SwapApi, SwapBuildRequest, SwapQuote, SwapRequest};

#[cfg(feature = "raydium")]
pub use raydium::{RaydiumClient, SwapOrchestrator};

/// Prelude module for easy importing of common types
pub mod prelude {
    pub use super::{
        DappError, PricePoller, PriceSource, PriceTick, Result, SwapApi, SwapQuote, SwapRequest,
        DEFAULT_SLIPPAGE_BPS,
    };

    #[cfg(feature = "raydium")]
    pub use super::{RaydiumClient, SwapOrchestrator};

    pub use solana_sdk::pubkey::Pubkey;
}

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
/// Library name
pub const NAME: &str = "rayswap-dapp";
/// Default slippage tolerance in basis points (0.5%)
pub const DEFAULT_SLIPPAGE_BPS: u16 = 50;
