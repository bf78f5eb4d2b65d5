//! SPL token accounts, balances and amount conversion
//!
//! Token accounts are always the associated token account of the wallet for
//! a mint under the classic SPL Token program. The address is a pure function
//! of (owner, mint); existence is checked on the ledger at every call and
//! nothing is cached between calls.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use rayswap_core::keypair::WalletIdentity;
//! use rayswap_core::rpc::SolanaRpc;
//! use rayswap_core::token::TokenAccountResolver;
//! use rayswap_core::config::RpcSettings;
//!
//! # async fn run(identity: WalletIdentity) -> rayswap_core::Result<()> {
//! let ledger = Arc::new(SolanaRpc::from_settings(&RpcSettings::default()));
//! let resolver = TokenAccountResolver::new(ledger, identity);
//!
//! let usdc = "EPjFWdd5AufqSSqeM2qN1xzybapC8G4wEGGkZwyTDt1v".parse()?;
//! let account = resolver.ensure_account(&usdc).await?;
//! println!("USDC account: {}", account.address);
//! # Ok(())
//! # }
//! ```

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};
use solana_sdk::{account::Account, pubkey::Pubkey};
use spl_associated_token_account::{get_associated_token_address, instruction as ata_instruction};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as SplTokenAccount, Mint};
use tracing::{debug, info, instrument};

use crate::error::{Error, Result};
use crate::keypair::WalletIdentity;
use crate::rpc::LedgerRpc;
use crate::transaction::TransactionSubmitter;

/// Decimals of the native asset (1 SOL = 10^9 lamports)
pub const NATIVE_DECIMALS: u8 = 9;

/// Address of the associated token account of `owner` for `mint`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TokenAccountRef {
    /// Wallet that owns the account
    pub owner: Pubkey,
    /// Token mint
    pub mint: Pubkey,
    /// Derived account address
    pub address: Pubkey,
}

impl fmt::Display for TokenAccountRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.address)
    }
}

/// Derive the associated token account for (owner, mint)
pub fn derive_token_account(owner: &Pubkey, mint: &Pubkey) -> TokenAccountRef {
    TokenAccountRef {
        owner: *owner,
        mint: *mint,
        address: get_associated_token_address(owner, mint),
    }
}

/// Mint of wrapped SOL, used as the token id of the native asset
pub fn native_mint() -> Pubkey {
    spl_token::native_mint::id()
}

/// Parse a token id or wallet address
pub fn parse_address(value: &str) -> Result<Pubkey> {
    Ok(Pubkey::from_str(value.trim())?)
}

/// Read the token amount held by an SPL token account
pub fn token_account_amount(account: &Account) -> Result<u64> {
    Ok(SplTokenAccount::unpack(&account.data)?.amount)
}

/// Descriptive data about a mint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MintInfo {
    /// Mint address
    pub mint: Pubkey,
    /// Number of decimal places in a human amount
    pub decimals: u8,
    /// Ticker symbol, when known
    pub symbol: Option<String>,
    /// Display name, when known
    pub name: Option<String>,
}

/// Source of mint metadata
#[async_trait]
pub trait MintMetadataProvider: Send + Sync {
    /// Metadata for a mint, `None` when the provider does not know it
    async fn mint_info(&self, mint: &Pubkey) -> Result<Option<MintInfo>>;

    /// Decimals for a mint, failing with `DecimalsUnavailable` when unknown
    async fn decimals(&self, mint: &Pubkey) -> Result<u8> {
        match self.mint_info(mint).await {
            Ok(Some(info)) => Ok(info.decimals),
            Ok(None) => Err(Error::DecimalsUnavailable(mint.to_string())),
            Err(err) => {
                debug!(%mint, error = %err, "Mint metadata lookup failed");
                Err(Error::DecimalsUnavailable(mint.to_string()))
            }
        }
    }
}

/// Metadata read from the mint account itself
pub struct OnChainMintMetadata {
    ledger: Arc<dyn LedgerRpc>,
}

impl OnChainMintMetadata {
    /// Create a provider over the given ledger
    pub fn new(ledger: Arc<dyn LedgerRpc>) -> Self {
        Self { ledger }
    }
}

#[async_trait]
impl MintMetadataProvider for OnChainMintMetadata {
    async fn mint_info(&self, mint: &Pubkey) -> Result<Option<MintInfo>> {
        let Some(account) = self.ledger.get_account(mint).await? else {
            return Ok(None);
        };
        let state = Mint::unpack(&account.data)?;
        Ok(Some(MintInfo {
            mint: *mint,
            decimals: state.decimals,
            symbol: None,
            name: None,
        }))
    }
}

/// Ensures the wallet's token accounts exist and reads their balances
#[derive(Clone)]
pub struct TokenAccountResolver {
    submitter: TransactionSubmitter,
}

impl TokenAccountResolver {
    /// Create a resolver for the wallet identity
    pub fn new(ledger: Arc<dyn LedgerRpc>, identity: WalletIdentity) -> Self {
        Self {
            submitter: TransactionSubmitter::new(ledger, identity),
        }
    }

    /// Create a resolver sharing an existing submitter
    pub fn with_submitter(submitter: TransactionSubmitter) -> Self {
        Self { submitter }
    }

    /// Derived token account of the wallet for a mint (no ledger access)
    pub fn account_for(&self, mint: &Pubkey) -> TokenAccountRef {
        derive_token_account(&self.submitter.identity().address(), mint)
    }

    /// Return the wallet's token account for `mint`, creating it if absent.
    ///
    /// A creation rejected because the account is already in use (another
    /// caller created it first) counts as success.
    #[instrument(skip(self), fields(owner = %self.submitter.identity().address()))]
    pub async fn ensure_account(&self, mint: &Pubkey) -> Result<TokenAccountRef> {
        let account = self.account_for(mint);

        if self.submitter.ledger().get_account(&account.address).await?.is_some() {
            debug!(address = %account.address, "Token account exists");
            return Ok(account);
        }

        info!(address = %account.address, "Creating token account");
        let owner = account.owner;
        let instruction = ata_instruction::create_associated_token_account(
            &owner,
            &owner,
            mint,
            &spl_token::id(),
        );

        match self.submitter.send_instructions_confirmed(&[instruction]).await {
            Ok(signature) => {
                info!(address = %account.address, %signature, "Token account created");
                Ok(account)
            }
            Err(err) if err.is_account_in_use() => {
                debug!(address = %account.address, "Token account created concurrently");
                Ok(account)
            }
            Err(err) => Err(Error::account_creation(format!("{}: {}", account.address, err))),
        }
    }

    /// Balance of the wallet's token account for `mint`, 0 when it does not exist
    pub async fn token_balance(&self, mint: &Pubkey) -> Result<u64> {
        let account = self.account_for(mint);
        match self.submitter.ledger().get_account(&account.address).await? {
            Some(data) => token_account_amount(&data),
            None => Ok(0),
        }
    }
}

/// Amount conversion between human decimals and smallest units
pub mod utils {
    use super::*;

    fn scale_factor(decimals: u8) -> Result<Decimal> {
        10u64
            .checked_pow(u32::from(decimals))
            .map(Decimal::from)
            .ok_or_else(|| Error::invalid_amount(format!("unsupported decimals: {}", decimals)))
    }

    /// Convert a human amount into smallest units.
    ///
    /// Rounds half away from zero. Negative, zero and out-of-range results
    /// are rejected.
    pub fn to_base_units(amount: Decimal, decimals: u8) -> Result<u64> {
        if amount.is_sign_negative() {
            return Err(Error::invalid_amount(format!("negative amount: {}", amount)));
        }
        let scaled = amount
            .checked_mul(scale_factor(decimals)?)
            .ok_or_else(|| Error::invalid_amount(format!("amount too large: {}", amount)))?
            .round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);

        match scaled.to_u64() {
            Some(0) => Err(Error::invalid_amount(format!(
                "{} rounds to zero at {} decimals",
                amount, decimals
            ))),
            Some(units) => Ok(units),
            None => Err(Error::invalid_amount(format!("amount too large: {}", amount))),
        }
    }

    /// Convert smallest units into a human amount
    pub fn from_base_units(units: u64, decimals: u8) -> Result<Decimal> {
        Decimal::try_from_i128_with_scale(i128::from(units), u32::from(decimals))
            .map(|value| value.normalize())
            .map_err(|e| Error::invalid_amount(e.to_string()))
    }

    /// Parse a decimal amount string
    pub fn parse_amount(value: &str) -> Result<Decimal> {
        Decimal::from_str(value.trim())
            .map_err(|e| Error::invalid_amount(format!("{}: {}", value, e)))
    }

    /// Format smallest units with an optional symbol
    pub fn format_token_amount(units: u64, decimals: u8, symbol: Option<&str>) -> String {
        let amount = from_base_units(units, decimals)
            .map(|value| value.to_string())
            .unwrap_or_else(|_| units.to_string());
        match symbol {
            Some(sym) => format!("{} {}", amount, sym),
            None => amount,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::utils::*;
    use super::*;
    use crate::testing::MockLedger;
    use solana_sdk::signature::Keypair;

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn resolver() -> (Arc<MockLedger>, TokenAccountResolver) {
        let ledger = Arc::new(MockLedger::new());
        let identity = WalletIdentity::from_keypair(Keypair::new());
        (ledger.clone(), TokenAccountResolver::new(ledger, identity))
    }

    #[test]
    fn test_derivation_is_deterministic() {
        let owner = Pubkey::new_unique();
        let mint = Pubkey::new_unique();

        let first = derive_token_account(&owner, &mint);
        let second = derive_token_account(&owner, &mint);

        assert_eq!(first, second);
        assert_eq!(first.address, get_associated_token_address(&owner, &mint));
        assert_ne!(first.address, derive_token_account(&owner, &Pubkey::new_unique()).address);
    }

    #[test]
    fn test_to_base_units_half_up() -> Result<()> {
        assert_eq!(to_base_units(dec("1.5"), 6)?, 1_500_000);
        assert_eq!(to_base_units(dec("1.0000005"), 6)?, 1_000_001);
        assert_eq!(to_base_units(dec("1.0000004"), 6)?, 1_000_000);
        assert_eq!(to_base_units(dec("1.0000015"), 6)?, 1_000_002);
        assert_eq!(to_base_units(dec("0.01"), NATIVE_DECIMALS)?, 10_000_000);
        Ok(())
    }

    #[test]
    fn test_to_base_units_rejects_invalid() {
        assert!(matches!(to_base_units(dec("-1"), 6), Err(Error::InvalidAmount(_))));
        assert!(matches!(to_base_units(dec("0.0000001"), 6), Err(Error::InvalidAmount(_))));
        assert!(matches!(
            to_base_units(dec("99999999999999999999"), 9),
            Err(Error::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_from_base_units() -> Result<()> {
        assert_eq!(from_base_units(1_500_000, 6)?, dec("1.5"));
        assert_eq!(format_token_amount(2_500_000_000, 9, Some("SOL")), "2.5 SOL");
        assert_eq!(parse_amount(" 0.25 ")?, dec("0.25"));
        assert!(parse_amount("abc").is_err());
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_account_creates_when_absent() -> Result<()> {
        let (ledger, resolver) = resolver();
        let mint = Pubkey::new_unique();

        let account = resolver.ensure_account(&mint).await?;

        assert!(ledger.has_account(&account.address));
        assert_eq!(ledger.confirm_calls(), 1);
        assert_eq!(resolver.token_balance(&mint).await?, 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_ensure_account_skips_existing() -> Result<()> {
        let (ledger, resolver) = resolver();
        let mint = Pubkey::new_unique();
        let owner = resolver.account_for(&mint).owner;
        let address = ledger.set_token_balance(owner, mint, 42)?;

        let account = resolver.ensure_account(&mint).await?;

        assert_eq!(account.address, address);
        assert_eq!(ledger.confirm_calls(), 0);
        assert_eq!(resolver.token_balance(&mint).await?, 42);
        Ok(())
    }

    #[tokio::test]
    async fn test_concurrent_ensure_account_converges() -> Result<()> {
        let (ledger, resolver) = resolver();
        let mint = Pubkey::new_unique();

        let (first, second) = tokio::join!(resolver.ensure_account(&mint), resolver.ensure_account(&mint));

        let (first, second) = (first?, second?);
        assert_eq!(first.address, second.address);
        assert_eq!(ledger.confirm_calls(), 2);
        assert!(ledger.has_account(&first.address));
        Ok(())
    }

    #[tokio::test]
    async fn test_balance_of_missing_account_is_zero() -> Result<()> {
        let (ledger, resolver) = resolver();

        assert_eq!(resolver.token_balance(&Pubkey::new_unique()).await?, 0);
        assert_eq!(ledger.confirm_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_on_chain_decimals() -> Result<()> {
        let ledger = Arc::new(MockLedger::new());
        let mint = Pubkey::new_unique();
        ledger.set_mint(mint, 6)?;
        let provider = OnChainMintMetadata::new(ledger);

        assert_eq!(provider.decimals(&mint).await?, 6);
        assert!(matches!(
            provider.decimals(&Pubkey::new_unique()).await,
            Err(Error::DecimalsUnavailable(_))
        ));
        Ok(())
    }
}
