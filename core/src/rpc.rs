//! Ledger RPC access
//!
//! Everything the client needs from a Solana node goes through the
//! [`LedgerRpc`] trait: balances, optional account reads, blockhashes and
//! transaction broadcast. [`SolanaRpc`] implements it over the nonblocking
//! `solana-client` RPC client; tests substitute an in-memory ledger.
//!
//! # Example
//!
//! ```no_run
//! use rayswap_core::config::RpcSettings;
//! use rayswap_core::rpc::{LedgerRpc, SolanaRpc};
//! use solana_sdk::pubkey::Pubkey;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let rpc = SolanaRpc::from_settings(&RpcSettings::default());
//!     let lamports = rpc.get_balance(&Pubkey::new_unique()).await?;
//!     println!("Balance: {} lamports", lamports);
//!     Ok(())
//! }
//! ```

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use solana_client::{
    client_error::ClientError, nonblocking::rpc_client::RpcClient,
    rpc_config::RpcSendTransactionConfig,
};
use solana_sdk::{
    account::Account,
    commitment_config::CommitmentConfig,
    hash::Hash,
    pubkey::Pubkey,
    signature::Signature,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::{debug, instrument};

use crate::config::RpcSettings;
use crate::error::Result;

/// Ledger operations used by the wallet, resolver and submitter
#[async_trait]
pub trait LedgerRpc: Send + Sync {
    /// Native balance of an address, in lamports
    async fn get_balance(&self, address: &Pubkey) -> Result<u64>;

    /// Account at an address, `None` when it does not exist
    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>>;

    /// Most recent blockhash for signing new transactions
    async fn get_latest_blockhash(&self) -> Result<Hash>;

    /// Broadcast without preflight simulation and without waiting for confirmation
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature>;

    /// Broadcast and wait until the transaction reaches the configured commitment
    async fn send_and_confirm_transaction(&self, transaction: &Transaction) -> Result<Signature>;
}

#[cfg(feature = "metrics")]
#[derive(Clone)]
struct RpcMetrics {
    request_count: prometheus::IntCounterVec,
    request_duration: prometheus::Histogram,
}

#[cfg(feature = "metrics")]
impl RpcMetrics {
    fn new(registry: &prometheus::Registry) -> Result<Self> {
        use prometheus::{Histogram, HistogramOpts, IntCounterVec, Opts};

        let registration =
            |e: prometheus::Error| crate::Error::config(format!("metrics registration failed: {}", e));

        let request_count = IntCounterVec::new(
            Opts::new("rayswap_rpc_requests_total", "Total number of ledger RPC requests"),
            &["method", "status"],
        )
        .map_err(registration)?;

        let request_duration = Histogram::with_opts(HistogramOpts::new(
            "rayswap_rpc_request_duration_seconds",
            "Ledger RPC request duration in seconds",
        ))
        .map_err(registration)?;

        registry
            .register(Box::new(request_count.clone()))
            .map_err(registration)?;
        registry
            .register(Box::new(request_duration.clone()))
            .map_err(registration)?;

        Ok(Self {
            request_count,
            request_duration,
        })
    }
}

/// [`LedgerRpc`] over a Solana JSON-RPC endpoint
pub struct SolanaRpc {
    client: RpcClient,
    commitment: CommitmentConfig,
    #[cfg(feature = "metrics")]
    metrics: Option<RpcMetrics>,
}

impl SolanaRpc {
    /// Create a client for a single endpoint
    pub fn new(url: impl Into<String>, timeout: Duration, commitment: CommitmentConfig) -> Self {
        Self {
            client: RpcClient::new_with_timeout_and_commitment(url.into(), timeout, commitment),
            commitment,
            #[cfg(feature = "metrics")]
            metrics: None,
        }
    }

    /// Create a client from configuration settings
    pub fn from_settings(settings: &RpcSettings) -> Self {
        Self::new(
            settings.url.clone(),
            Duration::from_secs(settings.timeout_seconds),
            settings.commitment.to_solana_commitment(),
        )
    }

    /// Record request counts and latencies on the given registry
    #[cfg(feature = "metrics")]
    pub fn with_metrics(mut self, registry: &prometheus::Registry) -> Result<Self> {
        self.metrics = Some(RpcMetrics::new(registry)?);
        Ok(self)
    }

    /// Endpoint URL this client talks to
    pub fn url(&self) -> String {
        self.client.url()
    }

    async fn observe<T, F>(&self, method: &'static str, call: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, ClientError>>,
    {
        let started = Instant::now();
        let result = call.await;
        let elapsed = started.elapsed();

        #[cfg(feature = "metrics")]
        if let Some(metrics) = &self.metrics {
            let status = if result.is_ok() { "success" } else { "error" };
            metrics
                .request_count
                .with_label_values(&[method, status])
                .inc();
            metrics.request_duration.observe(elapsed.as_secs_f64());
        }

        match result {
            Ok(value) => {
                debug!(method, elapsed_ms = elapsed.as_millis() as u64, "RPC call completed");
                Ok(value)
            }
            Err(err) => {
                debug!(method, error = %err, "RPC call failed");
                Err(err.into())
            }
        }
    }
}

#[async_trait]
impl LedgerRpc for SolanaRpc {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.observe("getBalance", self.client.get_balance(address))
            .await
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        let response = self
            .observe(
                "getAccountInfo",
                self.client
                    .get_account_with_commitment(address, self.commitment),
            )
            .await?;
        Ok(response.value)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        self.observe("getLatestBlockhash", self.client.get_latest_blockhash())
            .await
    }

    #[instrument(skip_all, fields(signature = %transaction.signatures.first().copied().unwrap_or_default()))]
    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let config = RpcSendTransactionConfig {
            skip_preflight: true,
            ..Default::default()
        };
        self.observe(
            "sendTransaction",
            self.client.send_transaction_with_config(transaction, config),
        )
        .await
    }

    #[instrument(skip_all, fields(signature = %transaction.signatures.first().copied().unwrap_or_default()))]
    async fn send_and_confirm_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.observe(
            "sendAndConfirmTransaction",
            self.client.send_and_confirm_transaction(transaction),
        )
        .await
    }
}
