//! Transaction signing and broadcast
//!
//! Two paths lead to the ledger:
//! - externally built payloads ([`BuiltTransaction`], base64 of a bincode
//!   serialized [`VersionedTransaction`]) are decoded, re-signed with the
//!   wallet key and broadcast without preflight or confirmation;
//! - locally assembled instructions are signed into a legacy transaction
//!   paid by the wallet and broadcast with confirmation.

use std::sync::Arc;

use base64::Engine;
use serde::{Deserialize, Serialize};
use solana_sdk::{
    instruction::Instruction,
    signature::Signature,
    transaction::{Transaction, VersionedTransaction},
};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::keypair::WalletIdentity;
use crate::rpc::LedgerRpc;

/// An opaque, ready-to-sign transaction payload (base64)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BuiltTransaction(String);

impl BuiltTransaction {
    /// Wrap a base64 payload
    pub fn from_base64(payload: impl Into<String>) -> Self {
        Self(payload.into())
    }

    /// Encode a transaction into a payload
    pub fn encode(transaction: &VersionedTransaction) -> Result<Self> {
        let bytes = bincode::serialize(transaction)?;
        Ok(Self(base64::engine::general_purpose::STANDARD.encode(bytes)))
    }

    /// Base64 payload
    pub fn as_base64(&self) -> &str {
        &self.0
    }

    /// Decode the payload into a transaction
    pub fn decode(&self) -> Result<VersionedTransaction> {
        let bytes = base64::engine::general_purpose::STANDARD.decode(self.0.trim())?;
        Ok(bincode::deserialize(&bytes)?)
    }
}

/// Signatures of broadcast transactions, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmissionResult {
    /// One signature per submitted payload
    pub signatures: Vec<Signature>,
}

/// Signs with the wallet identity and broadcasts through the ledger
#[derive(Clone)]
pub struct TransactionSubmitter {
    ledger: Arc<dyn LedgerRpc>,
    identity: WalletIdentity,
}

impl TransactionSubmitter {
    /// Create a submitter for the given ledger and signer
    pub fn new(ledger: Arc<dyn LedgerRpc>, identity: WalletIdentity) -> Self {
        Self { ledger, identity }
    }

    /// Ledger handle
    pub fn ledger(&self) -> &Arc<dyn LedgerRpc> {
        &self.ledger
    }

    /// Signing identity
    pub fn identity(&self) -> &WalletIdentity {
        &self.identity
    }

    /// Replace all signatures on a transaction with the wallet's
    pub fn sign(&self, unsigned: VersionedTransaction) -> Result<VersionedTransaction> {
        VersionedTransaction::try_new(unsigned.message, &[self.identity.keypair()])
            .map_err(|e| Error::submission(format!("signing failed: {}", e)))
    }

    /// Decode, sign and broadcast one payload without waiting for confirmation
    pub async fn submit(&self, built: &BuiltTransaction) -> Result<Signature> {
        let transaction = self.sign(built.decode()?)?;
        self.ledger.send_transaction(&transaction).await
    }

    /// Submit payloads strictly in order.
    ///
    /// The first failure aborts the remaining payloads; transactions already
    /// broadcast are not rolled back and their signatures are not returned.
    pub async fn submit_all(&self, transactions: &[BuiltTransaction]) -> Result<SubmissionResult> {
        let total = transactions.len();
        let mut signatures = Vec::with_capacity(total);

        for (index, built) in transactions.iter().enumerate() {
            let signature = self.submit(built).await.map_err(|err| {
                Error::submission(format!("transaction {}/{}: {}", index + 1, total, err))
            })?;
            info!(%signature, position = index + 1, total, "Transaction broadcast");
            signatures.push(signature);
        }

        Ok(SubmissionResult { signatures })
    }

    /// Sign instructions into a transaction paid by the wallet, broadcast it
    /// and wait for confirmation
    pub async fn send_instructions_confirmed(&self, instructions: &[Instruction]) -> Result<Signature> {
        let payer = self.identity.address();
        let blockhash = self.ledger.get_latest_blockhash().await?;

        let mut transaction = Transaction::new_with_payer(instructions, Some(&payer));
        transaction
            .try_sign(&[self.identity.keypair()], blockhash)
            .map_err(|e| Error::submission(format!("signing failed: {}", e)))?;

        debug!(instructions = instructions.len(), %blockhash, "Sending confirmed transaction");
        self.ledger.send_and_confirm_transaction(&transaction).await
    }
}
