//! Error types for the swap and price clients

use rayswap_core::Error as CoreError;

/// Result type alias for dapp operations
pub type Result<T> = std::result::Result<T, DappError>;

/// Errors raised by the Raydium client, swap orchestrator and price poller
#[derive(Debug, thiserror::Error)]
pub enum DappError {
    /// Wallet, ledger or submission failure from the core library
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Priority fee estimate could not be fetched
    #[error("Priority fee unavailable: {0}")]
    FeeUnavailable(String),

    /// Quote API failed or was unreachable
    #[error("Quote unavailable: {0}")]
    QuoteUnavailable(String),

    /// Transaction build API failed or was unreachable
    #[error("Swap transaction build failed: {0}")]
    BuildFailed(String),

    /// Price API failed or returned no price for the token
    #[error("Price unavailable: {0}")]
    PriceUnavailable(String),

    /// Metadata API failed
    #[error("Metadata unavailable: {0}")]
    MetadataUnavailable(String),

    /// Swap request rejected before any network call
    #[error("Invalid swap request: {0}")]
    InvalidRequest(String),

    /// API answered with a non-success status
    #[error("API returned {status}: {message}")]
    Api {
        /// HTTP status code
        status: u16,
        /// Failure message from the response body, or the status reason
        message: String,
    },

    /// HTTP transport error
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON decoding error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl DappError {
    /// Check if error is due to insufficient funds
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::Core(err) if err.is_insufficient_funds())
    }

    /// Human-readable reason, without the variant prefix for API failures
    pub fn reason(&self) -> String {
        match self {
            Self::Api { message, .. } => message.clone(),
            other => other.to_string(),
        }
    }

    /// Check if error was raised before anything was broadcast
    pub fn is_pre_submission(&self) -> bool {
        !matches!(self, Self::Core(CoreError::Submission(_)))
    }
}

impl From<DappError> for CoreError {
    fn from(err: DappError) -> Self {
        match err {
            DappError::Core(inner) => inner,
            other => CoreError::rpc(other.to_string()),
        }
    }
}
