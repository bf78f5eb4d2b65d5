//! Error types for the rayswap core library
//!
//! Every fallible operation in this crate returns [`Result`]. Variants fall
//! into two groups: domain failures a caller is expected to branch on
//! (insufficient funds, account creation, submission, unresolved decimals)
//! and infrastructure failures bubbled up from the RPC client, codecs and
//! configuration loading.

use solana_client::client_error::ClientError;
use solana_sdk::instruction::InstructionError;
use solana_sdk::transaction::TransactionError;

/// Result type alias for core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for rayswap core operations
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Balance does not cover the requested amount plus any reserve
    #[error("Insufficient funds: required {required}, available {available}")]
    InsufficientFunds {
        /// Amount needed, in the smallest unit of the asset
        required: u64,
        /// Amount held, in the smallest unit of the asset
        available: u64,
    },

    /// Token account creation failed for a reason other than a concurrent creator
    #[error("Token account creation failed: {0}")]
    AccountCreation(String),

    /// A transaction could not be decoded, signed or broadcast
    #[error("Transaction submission failed: {0}")]
    Submission(String),

    /// Decimals for a token could not be resolved
    #[error("Decimals unavailable for token {0}")]
    DecimalsUnavailable(String),

    /// RPC communication error
    #[error("RPC error: {0}")]
    Rpc(String),

    /// Solana RPC client error
    #[error("Solana RPC error: {0}")]
    SolanaRpc(#[from] ClientError),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid key format or corruption
    #[error("Invalid key format: {0}")]
    InvalidKey(String),

    /// Invalid address format
    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    /// Invalid amount
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    /// Account data did not decode as the expected SPL state
    #[error("Invalid account data: {0}")]
    InvalidAccountData(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// JSON serialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Bincode serialization error
    #[error("Bincode error: {0}")]
    Bincode(#[from] bincode::Error),
}

impl Error {
    /// Create a new RPC error
    pub fn rpc(msg: impl Into<String>) -> Self {
        Self::Rpc(msg.into())
    }

    /// Create a new submission error
    pub fn submission(msg: impl Into<String>) -> Self {
        Self::Submission(msg.into())
    }

    /// Create a new account creation error
    pub fn account_creation(msg: impl Into<String>) -> Self {
        Self::AccountCreation(msg.into())
    }

    /// Create a new configuration error
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// Create a new invalid amount error
    pub fn invalid_amount(msg: impl Into<String>) -> Self {
        Self::InvalidAmount(msg.into())
    }

    /// Create a new serialization error
    pub fn serialization(msg: impl Into<String>) -> Self {
        Self::Serialization(msg.into())
    }

    /// Check if error is due to insufficient funds
    pub fn is_insufficient_funds(&self) -> bool {
        matches!(self, Self::InsufficientFunds { .. })
    }

    /// Check if the ledger rejected an account creation because the
    /// account already exists.
    ///
    /// The system program reports this as custom error 0 on the create
    /// instruction; some RPC nodes only surface it in the log text.
    pub fn is_account_in_use(&self) -> bool {
        match self {
            Self::SolanaRpc(err) => {
                if let Some(TransactionError::InstructionError(_, InstructionError::Custom(0))) =
                    err.get_transaction_error()
                {
                    return true;
                }
                err.to_string().contains("already in use")
            }
            Self::Rpc(msg) => msg.contains("already in use"),
            _ => false,
        }
    }

    /// Check if error is transient (the same call may succeed later)
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Rpc(_) | Self::SolanaRpc(_))
    }
}

impl From<solana_sdk::pubkey::ParsePubkeyError> for Error {
    fn from(err: solana_sdk::pubkey::ParsePubkeyError) -> Self {
        Self::InvalidAddress(format!("Failed to parse public key: {}", err))
    }
}

impl From<base64::DecodeError> for Error {
    fn from(err: base64::DecodeError) -> Self {
        Self::Serialization(format!("Base64 decoding error: {}", err))
    }
}

impl From<spl_token::solana_program::program_error::ProgramError> for Error {
    fn from(err: spl_token::solana_program::program_error::ProgramError) -> Self {
        Self::InvalidAccountData(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insufficient_funds_message() {
        let err = Error::InsufficientFunds {
            required: 10_000_000,
            available: 5,
        };
        assert!(err.is_insufficient_funds());
        assert_eq!(
            err.to_string(),
            "Insufficient funds: required 10000000, available 5"
        );
    }

    #[test]
    fn test_account_in_use_detection() {
        assert!(Error::rpc("Allocate: account Address { .. } already in use").is_account_in_use());
        assert!(!Error::rpc("blockhash not found").is_account_in_use());
        assert!(!Error::account_creation("already in use").is_account_in_use());
    }

    #[test]
    fn test_recoverable_classification() {
        assert!(Error::rpc("timeout").is_recoverable());
        assert!(!Error::invalid_amount("negative").is_recoverable());
        assert!(!Error::DecimalsUnavailable("mint".into()).is_recoverable());
    }
}
