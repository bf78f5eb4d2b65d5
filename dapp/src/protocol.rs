//! Protocol-neutral swap and price interfaces
//!
//! The swap orchestrator and price poller only talk to the outside world
//! through [`SwapApi`] and [`PriceSource`]. [`crate::raydium::RaydiumClient`]
//! implements both over HTTP.

use async_trait::async_trait;
use rayswap_core::token::native_mint;
use rayswap_core::BuiltTransaction;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;

use crate::error::{DappError, Result};

/// Upper bound for slippage (100%)
pub const MAX_SLIPPAGE_BPS: u16 = 10_000;

/// An exact-input swap of `amount` smallest units of one token for another
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwapRequest {
    input_mint: Pubkey,
    output_mint: Pubkey,
    amount: u64,
    slippage_bps: u16,
    input_is_native: bool,
    output_is_native: bool,
}

impl SwapRequest {
    /// Create a request; a side is native when its mint is wrapped SOL
    pub fn new(input_mint: Pubkey, output_mint: Pubkey, amount: u64, slippage_bps: u16) -> Self {
        Self {
            input_is_native: input_mint == native_mint(),
            output_is_native: output_mint == native_mint(),
            input_mint,
            output_mint,
            amount,
            slippage_bps,
        }
    }

    /// Override which sides settle in native SOL
    pub fn with_native_sides(mut self, input_is_native: bool, output_is_native: bool) -> Self {
        self.input_is_native = input_is_native;
        self.output_is_native = output_is_native;
        self
    }

    /// Token sold
    pub fn input_mint(&self) -> &Pubkey {
        &self.input_mint
    }

    /// Token bought
    pub fn output_mint(&self) -> &Pubkey {
        &self.output_mint
    }

    /// Amount sold, in the input token's smallest unit
    pub fn amount(&self) -> u64 {
        self.amount
    }

    /// Maximum tolerated slippage in basis points
    pub fn slippage_bps(&self) -> u16 {
        self.slippage_bps
    }

    /// Whether the input is paid in native SOL (wrapped by the swap)
    pub fn input_is_native(&self) -> bool {
        self.input_is_native
    }

    /// Whether the output is received in native SOL (unwrapped by the swap)
    pub fn output_is_native(&self) -> bool {
        self.output_is_native
    }

    /// Check the request's own invariants
    pub fn validate(&self) -> Result<()> {
        if self.amount == 0 {
            return Err(DappError::InvalidRequest("amount must be greater than zero".into()));
        }
        if self.slippage_bps > MAX_SLIPPAGE_BPS {
            return Err(DappError::InvalidRequest(format!(
                "slippage {} bps exceeds {} bps",
                self.slippage_bps, MAX_SLIPPAGE_BPS
            )));
        }
        if self.input_mint == self.output_mint {
            return Err(DappError::InvalidRequest("input and output tokens are identical".into()));
        }
        Ok(())
    }
}

/// Quote returned by the swap API, passed to the build step unmodified
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SwapQuote(Value);

impl SwapQuote {
    /// Wrap a raw quote response
    pub fn from_value(value: Value) -> Self {
        Self(value)
    }

    /// Raw quote response
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Expected output amount in the output token's smallest unit
    pub fn output_amount(&self) -> Option<u64> {
        number_field(&self.0["data"]["outputAmount"]).and_then(|v| v.parse().ok())
    }

    /// Minimum output after slippage
    pub fn other_amount_threshold(&self) -> Option<u64> {
        number_field(&self.0["data"]["otherAmountThreshold"]).and_then(|v| v.parse().ok())
    }

    /// Estimated price impact in percent
    pub fn price_impact_pct(&self) -> Option<f64> {
        number_field(&self.0["data"]["priceImpactPct"]).and_then(|v| v.parse().ok())
    }
}

fn number_field(value: &Value) -> Option<String> {
    match value {
        Value::Number(n) => Some(n.to_string()),
        Value::String(s) => Some(s.clone()),
        _ => None,
    }
}

/// Inputs to the transaction build step
#[derive(Debug, Clone)]
pub struct SwapBuildRequest {
    /// Quote obtained for this swap
    pub quote: SwapQuote,
    /// Priority fee in micro-lamports per compute unit
    pub compute_unit_price: u64,
    /// Wallet that signs and pays
    pub wallet: Pubkey,
    /// Wrap native SOL for the input side
    pub wrap_sol: bool,
    /// Unwrap the output into native SOL
    pub unwrap_sol: bool,
    /// Wallet token account for the input, when the input is not native
    pub input_account: Option<Pubkey>,
    /// Wallet token account for the output, when the output is not native
    pub output_account: Option<Pubkey>,
}

/// One observed price of a token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceTick {
    /// Token the price is for
    pub token_id: String,
    /// Price in USD
    pub price: f64,
    /// Observation time, milliseconds since the Unix epoch
    pub timestamp_ms: i64,
}

/// Quote, fee and transaction-build endpoints of a swap aggregator
#[async_trait]
pub trait SwapApi: Send + Sync {
    /// Current priority fee in micro-lamports per compute unit
    async fn priority_fee(&self) -> Result<u64>;

    /// Quote for an exact-input swap
    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote>;

    /// Ready-to-sign transactions executing a quoted swap, in submission order
    async fn build_swap_transactions(&self, request: &SwapBuildRequest) -> Result<Vec<BuiltTransaction>>;
}

/// Source of spot prices
#[async_trait]
pub trait PriceSource: Send + Sync {
    /// Current price of a token
    async fn price(&self, token_id: &str) -> Result<f64>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_native_sides_follow_mint() {
        let usdc = Pubkey::new_unique();
        let request = SwapRequest::new(usdc, native_mint(), 1_000_000, 100);

        assert!(!request.input_is_native());
        assert!(request.output_is_native());
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_request_validation() {
        let (a, b) = (Pubkey::new_unique(), Pubkey::new_unique());

        assert!(matches!(
            SwapRequest::new(a, b, 0, 50).validate(),
            Err(DappError::InvalidRequest(_))
        ));
        assert!(matches!(
            SwapRequest::new(a, b, 1, 10_001).validate(),
            Err(DappError::InvalidRequest(_))
        ));
        assert!(matches!(
            SwapRequest::new(a, a, 1, 50).validate(),
            Err(DappError::InvalidRequest(_))
        ));
    }

    #[test]
    fn test_quote_accessors() {
        let quote = SwapQuote::from_value(json!({
            "success": true,
            "data": {
                "outputAmount": "6543210",
                "otherAmountThreshold": "6477778",
                "priceImpactPct": 0.02
            }
        }));

        assert_eq!(quote.output_amount(), Some(6_543_210));
        assert_eq!(quote.other_amount_threshold(), Some(6_477_778));
        assert_eq!(quote.price_impact_pct(), Some(0.02));
        assert_eq!(SwapQuote::from_value(json!({})).output_amount(), None);
    }
}
