//! Configuration management for rayswap
//!
//! Configuration is resolved from the following sources, highest priority first:
//! 1. Command line arguments
//! 2. Environment variables (`RAYSWAP_RPC_URL`, `RAYSWAP_SWAP_HOST`, `RAYSWAP_API_HOST`)
//! 3. Configuration files (YAML/JSON)
//! 4. Default values
//!
//! # Example
//!
//! ```no_run
//! use rayswap_core::config::{ClientConfig, CommitmentLevel};
//!
//! let config = ClientConfig::builder()
//!     .with_rpc_url("https://api.mainnet-beta.solana.com")
//!     .with_commitment(CommitmentLevel::Finalized)
//!     .build();
//!
//! let config = ClientConfig::from_file("rayswap.yaml")?;
//! # Ok::<(), rayswap_core::Error>(())
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{Error, Result};

/// Lamports kept back on every native spend so the wallet can still pay fees
pub const DEFAULT_FEE_RESERVE_LAMPORTS: u64 = 10_000_000;

/// Default Raydium transaction host (quote + build)
pub const DEFAULT_SWAP_HOST: &str = "https://transaction-v1.raydium.io";

/// Default Raydium API host (priority fee + mint metadata)
pub const DEFAULT_API_HOST: &str = "https://api-v3.raydium.io";

/// Default token price endpoint
pub const DEFAULT_PRICE_URL: &str = "https://api.jup.ag/price/v2";

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// RPC client configuration
    pub rpc: RpcSettings,
    /// Wallet spending policy
    pub wallet: WalletSettings,
    /// External HTTP API configuration
    pub api: ApiSettings,
    /// Price poller configuration
    pub poller: PollerSettings,
    /// Monitoring and observability configuration
    pub monitoring: MonitoringSettings,
}

/// RPC client settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RpcSettings {
    /// JSON-RPC endpoint URL
    pub url: String,
    /// Request timeout in seconds
    pub timeout_seconds: u64,
    /// Default commitment level
    pub commitment: CommitmentLevel,
}

/// Wallet spending policy
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WalletSettings {
    /// Minimum native balance that must remain to cover fees, in lamports
    pub fee_reserve_lamports: u64,
}

/// Transaction message version requested from the swap API
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum TxVersion {
    /// Versioned (v0) transactions with address lookup tables
    V0,
    /// Legacy transactions
    #[serde(rename = "LEGACY")]
    Legacy,
}

/// External HTTP API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSettings {
    /// Host serving quote and transaction-build endpoints
    pub swap_host: String,
    /// Host serving priority fee and mint metadata endpoints
    pub api_host: String,
    /// Token price endpoint
    pub price_url: String,
    /// Transaction version requested from the build endpoint
    pub tx_version: TxVersion,
    /// HTTP request timeout in seconds
    pub timeout_seconds: u64,
}

/// Price poller settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PollerSettings {
    /// Interval used when a subscription does not specify one
    pub default_interval_ms: u64,
}

/// Solana commitment level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum CommitmentLevel {
    /// Processed commitment (least secure, fastest)
    Processed,
    /// Confirmed commitment (balanced)
    Confirmed,
    /// Finalized commitment (most secure, slowest)
    Finalized,
}

/// Monitoring and observability settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct MonitoringSettings {
    /// Logging configuration
    pub logging: LoggingSettings,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Log level (error, warn, info, debug, trace)
    pub level: LogLevel,
    /// Log format (text, json)
    pub format: LogFormat,
}

/// Log level
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Error level
    Error,
    /// Warning level
    Warn,
    /// Info level (default)
    Info,
    /// Debug level
    Debug,
    /// Trace level
    Trace,
}

/// Log format
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Plain text format
    Text,
    /// JSON format
    Json,
}

impl Default for RpcSettings {
    fn default() -> Self {
        Self {
            url: "https://api.mainnet-beta.solana.com".to_string(),
            timeout_seconds: 30,
            commitment: CommitmentLevel::Confirmed,
        }
    }
}

impl Default for WalletSettings {
    fn default() -> Self {
        Self {
            fee_reserve_lamports: DEFAULT_FEE_RESERVE_LAMPORTS,
        }
    }
}

impl Default for ApiSettings {
    fn default() -> Self {
        Self {
            swap_host: DEFAULT_SWAP_HOST.to_string(),
            api_host: DEFAULT_API_HOST.to_string(),
            price_url: DEFAULT_PRICE_URL.to_string(),
            tx_version: TxVersion::V0,
            timeout_seconds: 15,
        }
    }
}

impl Default for PollerSettings {
    fn default() -> Self {
        Self {
            default_interval_ms: 1_000,
        }
    }
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: LogLevel::Info,
            format: LogFormat::Text,
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::new()
    }

    /// Load configuration from a YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        serde_yaml::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse YAML config: {}", e)))
    }

    /// Load configuration from a JSON file
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::config(format!("Failed to read config file: {}", e)))?;

        serde_json::from_str(&content)
            .map_err(|e| Error::config(format!("Failed to parse JSON config: {}", e)))
    }

    /// Load configuration from a file (auto-detects format by extension)
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        match extension_of(path).as_str() {
            "yaml" | "yml" => Self::from_yaml_file(path),
            "json" => Self::from_json_file(path),
            other => Err(Error::config(format!(
                "Unsupported config file format: {}. Supported: .yaml, .yml, .json",
                other
            ))),
        }
    }

    /// Save configuration to a file (format chosen by extension)
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let content = match extension_of(path).as_str() {
            "yaml" | "yml" => serde_yaml::to_string(self)
                .map_err(|e| Error::config(format!("Failed to serialize config to YAML: {}", e)))?,
            "json" => serde_json::to_string_pretty(self)
                .map_err(|e| Error::config(format!("Failed to serialize config to JSON: {}", e)))?,
            other => {
                return Err(Error::config(format!(
                    "Unsupported config file format: {}. Supported: .yaml, .yml, .json",
                    other
                )))
            }
        };

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        std::fs::write(path, content)
            .map_err(|e| Error::config(format!("Failed to write config file: {}", e)))
    }

    /// Apply `RAYSWAP_*` environment overrides on top of the current values
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("RAYSWAP_RPC_URL") {
            self.rpc.url = url;
        }
        if let Ok(host) = std::env::var("RAYSWAP_SWAP_HOST") {
            self.api.swap_host = host;
        }
        if let Ok(host) = std::env::var("RAYSWAP_API_HOST") {
            self.api.api_host = host;
        }
        self
    }

    /// RPC request timeout
    pub fn rpc_timeout(&self) -> Duration {
        Duration::from_secs(self.rpc.timeout_seconds)
    }

    /// HTTP API request timeout
    pub fn api_timeout(&self) -> Duration {
        Duration::from_secs(self.api.timeout_seconds)
    }

    /// Default price polling interval
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poller.default_interval_ms)
    }
}

fn extension_of(path: &Path) -> String {
    path.extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("")
        .to_lowercase()
}

impl CommitmentLevel {
    /// Convert to Solana SDK commitment config
    pub fn to_solana_commitment(&self) -> solana_sdk::commitment_config::CommitmentConfig {
        use solana_sdk::commitment_config::CommitmentConfig;
        match self {
            CommitmentLevel::Processed => CommitmentConfig::processed(),
            CommitmentLevel::Confirmed => CommitmentConfig::confirmed(),
            CommitmentLevel::Finalized => CommitmentConfig::finalized(),
        }
    }
}

impl LogLevel {
    /// Convert to tracing level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

impl TxVersion {
    /// Wire name used by the swap API
    pub fn as_str(&self) -> &'static str {
        match self {
            TxVersion::V0 => "V0",
            TxVersion::Legacy => "LEGACY",
        }
    }
}

/// Builder for ClientConfig with fluent interface
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    /// Create a new builder with default configuration
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
        }
    }

    /// Set the RPC endpoint URL
    pub fn with_rpc_url(mut self, url: impl Into<String>) -> Self {
        self.config.rpc.url = url.into();
        self
    }

    /// Set RPC timeout in seconds
    pub fn with_rpc_timeout(mut self, seconds: u64) -> Self {
        self.config.rpc.timeout_seconds = seconds;
        self
    }

    /// Set commitment level
    pub fn with_commitment(mut self, commitment: CommitmentLevel) -> Self {
        self.config.rpc.commitment = commitment;
        self
    }

    /// Set the native fee reserve in lamports
    pub fn with_fee_reserve(mut self, lamports: u64) -> Self {
        self.config.wallet.fee_reserve_lamports = lamports;
        self
    }

    /// Set the Raydium transaction host
    pub fn with_swap_host(mut self, host: impl Into<String>) -> Self {
        self.config.api.swap_host = host.into();
        self
    }

    /// Set the Raydium API host
    pub fn with_api_host(mut self, host: impl Into<String>) -> Self {
        self.config.api.api_host = host.into();
        self
    }

    /// Set the price endpoint
    pub fn with_price_url(mut self, url: impl Into<String>) -> Self {
        self.config.api.price_url = url.into();
        self
    }

    /// Set the transaction version requested from the swap API
    pub fn with_tx_version(mut self, version: TxVersion) -> Self {
        self.config.api.tx_version = version;
        self
    }

    /// Set the default price polling interval in milliseconds
    pub fn with_poll_interval_ms(mut self, millis: u64) -> Self {
        self.config.poller.default_interval_ms = millis;
        self
    }

    /// Set log level
    pub fn with_log_level(mut self, level: LogLevel) -> Self {
        self.config.monitoring.logging.level = level;
        self
    }

    /// Build the final configuration
    pub fn build(self) -> ClientConfig {
        self.config
    }
}

impl Default for ClientConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_default_config() {
        let config = ClientConfig::default();

        assert_eq!(config.wallet.fee_reserve_lamports, 10_000_000);
        assert_eq!(config.rpc.timeout_seconds, 30);
        assert_eq!(config.rpc.commitment, CommitmentLevel::Confirmed);
        assert_eq!(config.api.swap_host, DEFAULT_SWAP_HOST);
        assert_eq!(config.api.tx_version, TxVersion::V0);
        assert_eq!(config.poll_interval(), Duration::from_millis(1_000));
    }

    #[test]
    fn test_builder_pattern() {
        let config = ClientConfig::builder()
            .with_rpc_url("https://custom.rpc.url")
            .with_fee_reserve(5_000)
            .with_commitment(CommitmentLevel::Finalized)
            .with_tx_version(TxVersion::Legacy)
            .build();

        assert_eq!(config.rpc.url, "https://custom.rpc.url");
        assert_eq!(config.wallet.fee_reserve_lamports, 5_000);
        assert_eq!(config.rpc.commitment, CommitmentLevel::Finalized);
        assert_eq!(config.api.tx_version.as_str(), "LEGACY");
    }

    #[test]
    fn test_partial_yaml_uses_defaults() -> Result<()> {
        let temp_dir = tempdir()?;
        let config_path = temp_dir.path().join("partial.yml");
        std::fs::write(&config_path, "wallet:\n  fee_reserve_lamports: 42\n")?;

        let config = ClientConfig::from_file(&config_path)?;

        assert_eq!(config.wallet.fee_reserve_lamports, 42);
        assert_eq!(config.api.api_host, DEFAULT_API_HOST);
        assert_eq!(config.monitoring.logging.level, LogLevel::Info);
        Ok(())
    }

    #[test]
    fn test_config_file_io() -> Result<()> {
        let temp_dir = tempdir()?;

        for name in ["config.yaml", "nested/config.json"] {
            let config_path = temp_dir.path().join(name);
            let original = ClientConfig::builder().with_poll_interval_ms(250).build();

            original.save_to_file(&config_path)?;
            let loaded = ClientConfig::from_file(&config_path)?;

            assert_eq!(loaded.poller.default_interval_ms, 250);
        }
        Ok(())
    }

    #[test]
    fn test_unsupported_extension() {
        let err = ClientConfig::from_file("config.toml").unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_commitment_conversion() {
        use solana_sdk::commitment_config::CommitmentConfig;

        assert_eq!(
            CommitmentLevel::Processed.to_solana_commitment(),
            CommitmentConfig::processed()
        );
        assert_eq!(
            CommitmentLevel::Finalized.to_solana_commitment(),
            CommitmentConfig::finalized()
        );
    }
}
