//! HTTP client for the Raydium trade API, priority fee API, mint API and
//! the token price API

use std::time::Duration;

use async_trait::async_trait;
use rayswap_core::config::{ApiSettings, TxVersion};
use rayswap_core::{BuiltTransaction, MintInfo, MintMetadataProvider};
use reqwest::Client;
use serde::de::DeserializeOwned;
use serde_json::Value;
use solana_sdk::pubkey::Pubkey;
use tracing::debug;

use super::types::{
    ApiEnvelope, BuildSwapBody, BuiltTransactionItem, MintRecord, PriceResponse,
    PriorityFeeResponse,
};
use crate::error::{DappError, Result};
use crate::protocol::{PriceSource, SwapApi, SwapBuildRequest, SwapQuote, SwapRequest};

const USER_AGENT: &str = concat!("rayswap/", env!("CARGO_PKG_VERSION"));

/// Client for the Raydium HTTP APIs
#[derive(Debug, Clone)]
pub struct RaydiumClient {
    http: Client,
    swap_host: String,
    api_host: String,
    price_url: String,
    tx_version: TxVersion,
}

impl RaydiumClient {
    /// Create a client from API settings
    pub fn new(settings: &ApiSettings) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_seconds))
            .user_agent(USER_AGENT)
            .build()?;

        Ok(Self::with_http_client(http, settings))
    }

    /// Create a client over an existing `reqwest` client
    pub fn with_http_client(http: Client, settings: &ApiSettings) -> Self {
        Self {
            http,
            swap_host: settings.swap_host.trim_end_matches('/').to_string(),
            api_host: settings.api_host.trim_end_matches('/').to_string(),
            price_url: settings.price_url.trim_end_matches('/').to_string(),
            tx_version: settings.tx_version,
        }
    }

    async fn get_json<T: DeserializeOwned>(&self, url: &str, query: &[(&str, String)]) -> Result<T> {
        debug!(url, "GET");
        let response = self.http.get(url).query(query).send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<Value>(&body)
                .ok()
                .and_then(|value| value["msg"].as_str().map(str::to_string))
                .unwrap_or_else(|| status.to_string());
            return Err(DappError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(serde_json::from_str(&body)?)
    }

    /// Current priority fee estimate, micro-lamports per compute unit
    pub async fn fetch_priority_fee(&self) -> Result<u64> {
        let url = format!("{}/main/auto-fee", self.api_host);
        let response: PriorityFeeResponse = self
            .get_json(&url, &[])
            .await
            .map_err(|e| DappError::FeeUnavailable(e.reason()))?;

        debug!(fee = response.data.default.estimate, "Priority fee fetched");
        Ok(response.data.default.estimate)
    }

    /// Exact-input quote for a swap
    pub async fn fetch_quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        let url = format!("{}/compute/swap-base-in", self.swap_host);
        let query = [
            ("inputMint", request.input_mint().to_string()),
            ("outputMint", request.output_mint().to_string()),
            ("amount", request.amount().to_string()),
            ("slippageBps", request.slippage_bps().to_string()),
            ("txVersion", self.tx_version.as_str().to_string()),
        ];

        let value: Value = self
            .get_json(&url, &query)
            .await
            .map_err(|e| DappError::QuoteUnavailable(e.reason()))?;

        if value["success"].as_bool() != Some(true) {
            let reason = value["msg"].as_str().unwrap_or("quote request failed");
            return Err(DappError::QuoteUnavailable(reason.to_string()));
        }

        let quote = SwapQuote::from_value(value);
        debug!(output_amount = ?quote.output_amount(), "Quote fetched");
        Ok(quote)
    }

    /// Serialized transactions executing a quoted swap
    pub async fn fetch_swap_transactions(&self, request: &SwapBuildRequest) -> Result<Vec<BuiltTransaction>> {
        let url = format!("{}/transaction/swap-base-in", self.swap_host);
        let body = BuildSwapBody {
            compute_unit_price_micro_lamports: request.compute_unit_price.to_string(),
            swap_response: request.quote.as_value(),
            tx_version: self.tx_version.as_str(),
            wallet: request.wallet.to_string(),
            wrap_sol: request.wrap_sol,
            unwrap_sol: request.unwrap_sol,
            input_account: request.input_account.map(|a| a.to_string()),
            output_account: request.output_account.map(|a| a.to_string()),
        };

        debug!(url, wrap_sol = body.wrap_sol, unwrap_sol = body.unwrap_sol, "POST");
        let response = self
            .http
            .post(&url)
            .json(&body)
            .send()
            .await
            .map_err(|e| DappError::BuildFailed(e.to_string()))?;
        let envelope: ApiEnvelope<Vec<BuiltTransactionItem>> = response
            .json()
            .await
            .map_err(|e| DappError::BuildFailed(e.to_string()))?;

        let items = envelope.into_result().map_err(DappError::BuildFailed)?;
        if items.is_empty() {
            return Err(DappError::BuildFailed("no transactions returned".into()));
        }

        debug!(count = items.len(), "Swap transactions built");
        Ok(items
            .into_iter()
            .map(|item| BuiltTransaction::from_base64(item.transaction))
            .collect())
    }

    /// Spot price of a token in USD
    pub async fn fetch_price(&self, token_id: &str) -> Result<f64> {
        let response: PriceResponse = self
            .get_json(&self.price_url, &[("ids", token_id.to_string())])
            .await
            .map_err(|e| DappError::PriceUnavailable(e.reason()))?;

        response
            .data
            .get(token_id)
            .and_then(|entry| entry.as_ref())
            .map(|entry| entry.price)
            .ok_or_else(|| DappError::PriceUnavailable(format!("no price for {}", token_id)))
    }

    /// Metadata for a mint, `None` when the API does not know it
    pub async fn fetch_mint_info(&self, mint: &Pubkey) -> Result<Option<MintInfo>> {
        let url = format!("{}/mint/ids", self.api_host);
        let envelope: ApiEnvelope<Vec<Option<MintRecord>>> = self
            .get_json(&url, &[("mints", mint.to_string())])
            .await
            .map_err(|e| DappError::MetadataUnavailable(e.reason()))?;

        let records = envelope.into_result().map_err(DappError::MetadataUnavailable)?;
        let target = mint.to_string();
        Ok(records
            .into_iter()
            .flatten()
            .find(|record| record.address == target)
            .map(|record| MintInfo {
                mint: *mint,
                decimals: record.decimals,
                symbol: record.symbol,
                name: record.name,
            }))
    }
}

#[async_trait]
impl SwapApi for RaydiumClient {
    async fn priority_fee(&self) -> Result<u64> {
        self.fetch_priority_fee().await
    }

    async fn quote(&self, request: &SwapRequest) -> Result<SwapQuote> {
        self.fetch_quote(request).await
    }

    async fn build_swap_transactions(&self, request: &SwapBuildRequest) -> Result<Vec<BuiltTransaction>> {
        self.fetch_swap_transactions(request).await
    }
}

#[async_trait]
impl PriceSource for RaydiumClient {
    async fn price(&self, token_id: &str) -> Result<f64> {
        self.fetch_price(token_id).await
    }
}

#[async_trait]
impl MintMetadataProvider for RaydiumClient {
    async fn mint_info(&self, mint: &Pubkey) -> rayswap_core::Result<Option<MintInfo>> {
        Ok(self.fetch_mint_info(mint).await?)
    }
}
