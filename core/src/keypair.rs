//! Wallet identity loading
//!
//! A [`WalletIdentity`] is the signing keypair of the wallet together with its
//! public address. It is loaded once from a secret-key string and then shared
//! read-only by every component that needs to sign.
//!
//! Two secret-key encodings are accepted:
//! - base58 of the 64-byte secret (the format browser wallets export)
//! - the JSON byte array written by `solana-keygen`
//!
//! # Example
//!
//! ```no_run
//! use rayswap_core::keypair::WalletIdentity;
//!
//! let identity = WalletIdentity::from_secret_str(&std::env::var("RAYSWAP_SECRET_KEY")?)?;
//! println!("wallet: {}", identity.address());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use solana_sdk::{
    pubkey::Pubkey,
    signature::{Keypair, Signer},
};
use zeroize::Zeroizing;

use crate::error::{Error, Result};

/// Length of an ed25519 secret key as used by Solana (seed + public key)
const SECRET_KEY_LEN: usize = 64;

/// Signing identity of the wallet
///
/// Cloning is cheap and shares the same keypair.
#[derive(Clone)]
pub struct WalletIdentity {
    keypair: Arc<Keypair>,
    address: Pubkey,
}

impl WalletIdentity {
    /// Wrap an existing keypair
    pub fn from_keypair(keypair: Keypair) -> Self {
        let address = keypair.pubkey();
        Self {
            keypair: Arc::new(keypair),
            address,
        }
    }

    /// Load from raw 64-byte secret key bytes
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() != SECRET_KEY_LEN {
            return Err(Error::InvalidKey(format!(
                "expected {} secret key bytes, got {}",
                SECRET_KEY_LEN,
                bytes.len()
            )));
        }
        let keypair = Keypair::try_from(bytes)
            .map_err(|e| Error::InvalidKey(format!("Invalid keypair bytes: {}", e)))?;

        Ok(Self::from_keypair(keypair))
    }

    /// Load from a base58-encoded secret key
    pub fn from_base58(encoded: &str) -> Result<Self> {
        let bytes = Zeroizing::new(
            bs58::decode(encoded.trim())
                .into_vec()
                .map_err(|e| Error::InvalidKey(format!("Invalid base58: {}", e)))?,
        );

        Self::from_bytes(&bytes)
    }

    /// Load from a `solana-keygen` style JSON byte array
    pub fn from_json_array(json: &str) -> Result<Self> {
        let bytes: Zeroizing<Vec<u8>> = Zeroizing::new(
            serde_json::from_str(json)
                .map_err(|e| Error::InvalidKey(format!("Invalid keypair JSON: {}", e)))?,
        );

        Self::from_bytes(&bytes)
    }

    /// Load from a secret-key string in either supported encoding
    pub fn from_secret_str(secret: &str) -> Result<Self> {
        let secret = secret.trim();
        if secret.starts_with('[') {
            Self::from_json_array(secret)
        } else {
            Self::from_base58(secret)
        }
    }

    /// Load from a keypair file on disk
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = Zeroizing::new(std::fs::read_to_string(path.as_ref())?);
        Self::from_secret_str(&content)
    }

    /// Public address of the wallet
    pub fn address(&self) -> Pubkey {
        self.address
    }

    /// Underlying keypair, for signing
    pub fn keypair(&self) -> &Keypair {
        &self.keypair
    }
}

impl fmt::Debug for WalletIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WalletIdentity")
            .field("address", &self.address)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_from_base58() -> Result<()> {
        let keypair = Keypair::new();
        let expected = keypair.pubkey();

        let identity = WalletIdentity::from_secret_str(&keypair.to_base58_string())?;

        assert_eq!(identity.address(), expected);
        assert_eq!(identity.keypair().pubkey(), expected);
        Ok(())
    }

    #[test]
    fn test_identity_from_json_array() -> Result<()> {
        let keypair = Keypair::new();
        let json = serde_json::to_string(&keypair.to_bytes().to_vec())?;

        let identity = WalletIdentity::from_secret_str(&format!("  {}\n", json))?;

        assert_eq!(identity.address(), keypair.pubkey());
        Ok(())
    }

    #[test]
    fn test_identity_rejects_bad_input() {
        assert!(matches!(
            WalletIdentity::from_secret_str("not-base58-0OIl"),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            WalletIdentity::from_bytes(&[1u8; 32]),
            Err(Error::InvalidKey(_))
        ));
        assert!(matches!(
            WalletIdentity::from_secret_str("[1, 2, 3]"),
            Err(Error::InvalidKey(_))
        ));
    }

    #[test]
    fn test_debug_hides_secret() {
        let identity = WalletIdentity::from_keypair(Keypair::new());
        let rendered = format!("{:?}", identity);
        assert!(rendered.contains(&identity.address().to_string()));
        assert!(!rendered.contains(&identity.keypair().to_base58_string()));
    }
}
