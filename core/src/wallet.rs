//! Wallet operations
//!
//! [`Wallet`] ties the signing identity to a ledger and a mint metadata
//! source and exposes balances and transfers. Every transfer is signed by
//! the wallet, paid by the wallet and confirmed before returning.
//!
//! # Example
//!
//! ```no_run
//! use rayswap_core::{ClientConfig, Wallet, WalletIdentity};
//! use rayswap_core::token::utils::parse_amount;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let identity = WalletIdentity::from_secret_str(&std::env::var("RAYSWAP_SECRET_KEY")?)?;
//!     let wallet = Wallet::connect(&ClientConfig::default(), identity);
//!
//!     println!("Balance: {} lamports", wallet.native_balance().await?);
//!
//!     let destination = "9WzDXwBbmkg8ZTbNMqUxvQRAyrZzDsGYdLVL9zYtAWWM".parse()?;
//!     let signature = wallet.send_native(&destination, parse_amount("0.1")?).await?;
//!     println!("Transaction sent: {}", signature);
//!     Ok(())
//! }
//! ```

use std::sync::Arc;

use rust_decimal::Decimal;
use solana_sdk::{pubkey::Pubkey, signature::Signature, system_instruction};
use spl_associated_token_account::instruction::create_associated_token_account_idempotent;
use tracing::{info, instrument};

use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::keypair::WalletIdentity;
use crate::rpc::{LedgerRpc, SolanaRpc};
use crate::token::{
    derive_token_account, utils::to_base_units, MintMetadataProvider, OnChainMintMetadata,
    TokenAccountRef, TokenAccountResolver, NATIVE_DECIMALS,
};
use crate::transaction::TransactionSubmitter;

/// A funded signing wallet bound to a ledger
#[derive(Clone)]
pub struct Wallet {
    submitter: TransactionSubmitter,
    resolver: TokenAccountResolver,
    metadata: Arc<dyn MintMetadataProvider>,
    fee_reserve_lamports: u64,
}

impl Wallet {
    /// Assemble a wallet from its parts
    pub fn new(
        identity: WalletIdentity,
        ledger: Arc<dyn LedgerRpc>,
        metadata: Arc<dyn MintMetadataProvider>,
        fee_reserve_lamports: u64,
    ) -> Self {
        let submitter = TransactionSubmitter::new(ledger, identity);
        Self {
            resolver: TokenAccountResolver::with_submitter(submitter.clone()),
            submitter,
            metadata,
            fee_reserve_lamports,
        }
    }

    /// Connect to the configured RPC endpoint, reading mint decimals on chain
    pub fn connect(config: &ClientConfig, identity: WalletIdentity) -> Self {
        let ledger: Arc<dyn LedgerRpc> = Arc::new(SolanaRpc::from_settings(&config.rpc));
        let metadata = Arc::new(OnChainMintMetadata::new(ledger.clone()));
        Self::new(identity, ledger, metadata, config.wallet.fee_reserve_lamports)
    }

    /// Replace the mint metadata source
    pub fn with_metadata_provider(mut self, metadata: Arc<dyn MintMetadataProvider>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Public address of the wallet
    pub fn address(&self) -> Pubkey {
        self.submitter.identity().address()
    }

    /// Signing identity
    pub fn identity(&self) -> &WalletIdentity {
        self.submitter.identity()
    }

    /// Ledger handle
    pub fn ledger(&self) -> &Arc<dyn LedgerRpc> {
        self.submitter.ledger()
    }

    /// Transaction submitter bound to this wallet
    pub fn submitter(&self) -> &TransactionSubmitter {
        &self.submitter
    }

    /// Token account resolver bound to this wallet
    pub fn resolver(&self) -> &TokenAccountResolver {
        &self.resolver
    }

    /// Mint metadata source
    pub fn metadata(&self) -> &Arc<dyn MintMetadataProvider> {
        &self.metadata
    }

    /// Lamports that must remain after any native spend
    pub fn fee_reserve_lamports(&self) -> u64 {
        self.fee_reserve_lamports
    }

    /// Native balance in lamports
    pub async fn native_balance(&self) -> Result<u64> {
        self.ledger().get_balance(&self.address()).await
    }

    /// Token balance in smallest units, 0 when the account does not exist
    pub async fn token_balance(&self, mint: &Pubkey) -> Result<u64> {
        self.resolver.token_balance(mint).await
    }

    /// Ensure the wallet's token account for `mint` exists
    pub async fn ensure_token_account(&self, mint: &Pubkey) -> Result<TokenAccountRef> {
        self.resolver.ensure_account(mint).await
    }

    /// Fail with `InsufficientFunds` unless the native balance covers
    /// `lamports` plus the fee reserve
    pub async fn check_native_funds(&self, lamports: u64) -> Result<u64> {
        let required = lamports
            .checked_add(self.fee_reserve_lamports)
            .ok_or_else(|| Error::invalid_amount(format!("{} lamports overflows", lamports)))?;
        let available = self.native_balance().await?;
        if available < required {
            return Err(Error::InsufficientFunds { required, available });
        }
        Ok(available)
    }

    /// Transfer SOL to `destination`, keeping the fee reserve
    #[instrument(skip(self), fields(from = %self.address()))]
    pub async fn send_native(&self, destination: &Pubkey, amount_sol: Decimal) -> Result<Signature> {
        let lamports = to_base_units(amount_sol, NATIVE_DECIMALS)?;
        self.check_native_funds(lamports).await?;

        let instruction = system_instruction::transfer(&self.address(), destination, lamports);
        let signature = self.submitter.send_instructions_confirmed(&[instruction]).await?;

        info!(%destination, lamports, %signature, "Native transfer confirmed");
        Ok(signature)
    }

    /// Transfer `amount` of token `mint` to the wallet `destination`.
    ///
    /// The destination's token account is created in the same transaction
    /// when it does not exist yet.
    #[instrument(skip(self), fields(from = %self.address()))]
    pub async fn send_token(
        &self,
        destination: &Pubkey,
        mint: &Pubkey,
        amount: Decimal,
    ) -> Result<Signature> {
        let decimals = self.metadata.decimals(mint).await?;
        let units = to_base_units(amount, decimals)?;

        let available = self.resolver.token_balance(mint).await?;
        if available < units {
            return Err(Error::InsufficientFunds {
                required: units,
                available,
            });
        }

        let owner = self.address();
        let source = self.resolver.account_for(mint);
        let target = derive_token_account(destination, mint);

        let mut instructions = Vec::with_capacity(2);
        if self.ledger().get_account(&target.address).await?.is_none() {
            instructions.push(create_associated_token_account_idempotent(
                &owner,
                destination,
                mint,
                &spl_token::id(),
            ));
        }
        instructions.push(spl_token::instruction::transfer_checked(
            &spl_token::id(),
            &source.address,
            mint,
            &target.address,
            &owner,
            &[],
            units,
            decimals,
        )?);

        let signature = self.submitter.send_instructions_confirmed(&instructions).await?;

        info!(%destination, %mint, units, %signature, "Token transfer confirmed");
        Ok(signature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_FEE_RESERVE_LAMPORTS;
    use crate::testing::MockLedger;
    use solana_sdk::signature::Keypair;

    fn wallet() -> (Arc<MockLedger>, Wallet) {
        let ledger = Arc::new(MockLedger::new());
        let metadata = Arc::new(OnChainMintMetadata::new(ledger.clone()));
        let wallet = Wallet::new(
            WalletIdentity::from_keypair(Keypair::new()),
            ledger.clone(),
            metadata,
            DEFAULT_FEE_RESERVE_LAMPORTS,
        );
        (ledger, wallet)
    }

    fn dec(value: &str) -> Decimal {
        value.parse().unwrap()
    }

    fn program_ids(ledger: &MockLedger) -> Vec<Pubkey> {
        let confirmed = ledger.confirmed();
        let message = &confirmed[0].message;
        message
            .instructions
            .iter()
            .map(|ix| message.account_keys[ix.program_id_index as usize])
            .collect()
    }

    #[tokio::test]
    async fn test_send_native_requires_reserve() -> Result<()> {
        let (ledger, wallet) = wallet();
        ledger.set_lamports(wallet.address(), 5_000_000);

        let err = wallet
            .send_native(&Pubkey::new_unique(), dec("0.001"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InsufficientFunds {
                required: 11_000_000,
                available: 5_000_000
            }
        ));
        assert_eq!(ledger.confirm_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_native_confirms_transfer() -> Result<()> {
        let (ledger, wallet) = wallet();
        ledger.set_lamports(wallet.address(), 2_000_000_000);

        let signature = wallet.send_native(&Pubkey::new_unique(), dec("1.5")).await?;

        let confirmed = ledger.confirmed();
        assert_eq!(confirmed.len(), 1);
        assert_eq!(confirmed[0].signatures[0], signature);
        assert_eq!(confirmed[0].message.account_keys[0], wallet.address());
        Ok(())
    }

    #[tokio::test]
    async fn test_send_token_creates_destination_account() -> Result<()> {
        let (ledger, wallet) = wallet();
        let mint = Pubkey::new_unique();
        ledger.set_mint(mint, 6)?;
        ledger.set_token_balance(wallet.address(), mint, 5_000_000)?;

        wallet
            .send_token(&Pubkey::new_unique(), &mint, dec("1.5"))
            .await?;

        assert_eq!(
            program_ids(&ledger),
            vec![spl_associated_token_account::id(), spl_token::id()]
        );
        Ok(())
    }

    #[tokio::test]
    async fn test_send_token_existing_destination() -> Result<()> {
        let (ledger, wallet) = wallet();
        let mint = Pubkey::new_unique();
        let destination = Pubkey::new_unique();
        ledger.set_mint(mint, 6)?;
        ledger.set_token_balance(wallet.address(), mint, 5_000_000)?;
        ledger.set_token_balance(destination, mint, 0)?;

        wallet.send_token(&destination, &mint, dec("5")).await?;

        assert_eq!(program_ids(&ledger), vec![spl_token::id()]);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_token_insufficient_balance() -> Result<()> {
        let (ledger, wallet) = wallet();
        let mint = Pubkey::new_unique();
        ledger.set_mint(mint, 6)?;
        ledger.set_token_balance(wallet.address(), mint, 1_000_000)?;

        let err = wallet
            .send_token(&Pubkey::new_unique(), &mint, dec("1.0000005"))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            Error::InsufficientFunds {
                required: 1_000_001,
                available: 1_000_000
            }
        ));
        assert_eq!(ledger.confirm_calls(), 0);
        Ok(())
    }

    #[tokio::test]
    async fn test_send_token_unknown_decimals() {
        let (ledger, wallet) = wallet();

        let err = wallet
            .send_token(&Pubkey::new_unique(), &Pubkey::new_unique(), dec("1"))
            .await
            .unwrap_err();

        assert!(matches!(err, Error::DecimalsUnavailable(_)));
        assert_eq!(ledger.confirm_calls(), 0);
    }
}
