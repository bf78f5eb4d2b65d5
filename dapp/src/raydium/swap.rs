//! Swap orchestration
//!
//! A swap runs strictly in sequence: validate balances, fetch the priority
//! fee, fetch a quote, build the transactions, then sign and broadcast them
//! in order. Nothing is retried; a failure at any step ends the swap.
//! Validation failures happen before anything is broadcast; missing token
//! accounts are only created once every balance check has passed.

use std::sync::Arc;

use rayswap_core::{Error as CoreError, SubmissionResult, Wallet};
use solana_sdk::pubkey::Pubkey;
use tracing::{debug, info, instrument};

use crate::error::{DappError, Result};
use crate::protocol::{SwapApi, SwapBuildRequest, SwapQuote, SwapRequest};

/// Token accounts resolved during validation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct SwapAccounts {
    input: Option<Pubkey>,
    output: Option<Pubkey>,
}

/// Executes swaps for a wallet through a [`SwapApi`]
#[derive(Clone)]
pub struct SwapOrchestrator {
    wallet: Wallet,
    api: Arc<dyn SwapApi>,
}

impl SwapOrchestrator {
    /// Create an orchestrator for the wallet
    pub fn new(wallet: Wallet, api: Arc<dyn SwapApi>) -> Self {
        Self { wallet, api }
    }

    /// Wallet the swaps are executed for
    pub fn wallet(&self) -> &Wallet {
        &self.wallet
    }

    /// Quote a swap without validating balances or submitting anything
    pub async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        request.validate()?;
        self.api.quote(request).await.map_err(as_quote_error)
    }

    /// Execute a swap and return the signatures of the broadcast transactions
    #[instrument(
        skip(self, request),
        fields(
            input = %request.input_mint(),
            output = %request.output_mint(),
            amount = request.amount(),
            slippage_bps = request.slippage_bps()
        )
    )]
    pub async fn swap(&self, request: &SwapRequest) -> Result<SubmissionResult> {
        request.validate()?;
        let accounts = self.validate_funds(request).await?;

        let compute_unit_price = self.api.priority_fee().await.map_err(as_fee_error)?;
        debug!(compute_unit_price, "Priority fee");

        let quote = self.api.quote(request).await.map_err(as_quote_error)?;
        debug!(output_amount = ?quote.output_amount(), "Quote received");

        let build = SwapBuildRequest {
            quote,
            compute_unit_price,
            wallet: self.wallet.address(),
            wrap_sol: request.input_is_native(),
            unwrap_sol: request.output_is_native(),
            input_account: accounts.input,
            output_account: accounts.output,
        };
        let transactions = self
            .api
            .build_swap_transactions(&build)
            .await
            .map_err(as_build_error)?;
        if transactions.is_empty() {
            return Err(DappError::BuildFailed("no transactions returned".into()));
        }

        let result = self.wallet.submitter().submit_all(&transactions).await?;
        info!(transactions = result.signatures.len(), "Swap submitted");
        Ok(result)
    }

    async fn validate_funds(&self, request: &SwapRequest) -> Result<SwapAccounts> {
        // Native input is spent on top of the fee reserve
        let native_spend = if request.input_is_native() {
            request.amount()
        } else {
            0
        };
        self.wallet.check_native_funds(native_spend).await?;

        let mut accounts = SwapAccounts::default();

        if !request.input_is_native() {
            // A missing account reads as 0, so this fails before any creation
            let available = self.wallet.token_balance(request.input_mint()).await?;
            if available < request.amount() {
                return Err(CoreError::InsufficientFunds {
                    required: request.amount(),
                    available,
                }
                .into());
            }
            let account = self.wallet.ensure_token_account(request.input_mint()).await?;
            accounts.input = Some(account.address);
        }

        if !request.output_is_native() {
            let account = self.wallet.ensure_token_account(request.output_mint()).await?;
            accounts.output = Some(account.address);
        }

        Ok(accounts)
    }
}

fn as_fee_error(err: DappError) -> DappError {
    match err {
        DappError::FeeUnavailable(_) => err,
        other => DappError::FeeUnavailable(other.to_string()),
    }
}

fn as_quote_error(err: DappError) -> DappError {
    match err {
        DappError::QuoteUnavailable(_) => err,
        other => DappError::QuoteUnavailable(other.to_string()),
    }
}

fn as_build_error(err: DappError) -> DappError {
    match err {
        DappError::BuildFailed(_) => err,
        other => DappError::BuildFailed(other.to_string()),
    }
}
