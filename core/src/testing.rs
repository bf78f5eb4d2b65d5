//! In-memory ledger for tests
//!
//! [`MockLedger`] implements [`LedgerRpc`] over a map of accounts. Account
//! reads yield to the scheduler after taking their snapshot, so two tasks
//! racing on the same address both observe the pre-race state. Confirmed
//! transactions apply associated-token-account creation; everything else is
//! only recorded.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use solana_sdk::{
    account::Account,
    hash::Hash,
    message::{v0::Message as MessageV0, VersionedMessage},
    pubkey::Pubkey,
    signature::Signature,
    system_instruction,
    transaction::{Transaction, VersionedTransaction},
};
use spl_token::solana_program::program_pack::Pack;
use spl_token::state::{Account as TokenAccount, AccountState, Mint};

use crate::error::{Error, Result};
use crate::rpc::LedgerRpc;
use crate::token::derive_token_account;
use crate::transaction::BuiltTransaction;

/// Instruction data tag of the idempotent associated-token-account create
const CREATE_IDEMPOTENT: u8 = 1;

/// Unsigned v0 payload paying from `payer`, shaped like a swap API response
pub fn unsigned_payload(payer: &Pubkey, lamports: u64) -> Result<BuiltTransaction> {
    let instruction = system_instruction::transfer(payer, &Pubkey::new_unique(), lamports);
    let message = MessageV0::try_compile(payer, &[instruction], &[], Hash::new_unique())
        .map_err(|e| Error::serialization(e.to_string()))?;
    let transaction = VersionedTransaction {
        signatures: vec![Signature::default(); message.header.num_required_signatures as usize],
        message: VersionedMessage::V0(message),
    };
    BuiltTransaction::encode(&transaction)
}

#[derive(Default)]
struct LedgerState {
    balances: HashMap<Pubkey, u64>,
    accounts: HashMap<Pubkey, Account>,
    sent: Vec<VersionedTransaction>,
    confirmed: Vec<Transaction>,
    fail_send_at: Option<usize>,
}

/// In-memory [`LedgerRpc`] with call counters
#[derive(Default)]
pub struct MockLedger {
    state: Mutex<LedgerState>,
    balance_calls: AtomicUsize,
    account_calls: AtomicUsize,
    send_calls: AtomicUsize,
    confirm_calls: AtomicUsize,
}

impl MockLedger {
    /// Empty ledger
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, LedgerState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Set the native balance of an address
    pub fn set_lamports(&self, address: Pubkey, lamports: u64) {
        self.lock().balances.insert(address, lamports);
    }

    /// Create a mint account with the given decimals
    pub fn set_mint(&self, mint: Pubkey, decimals: u8) -> Result<()> {
        let state = Mint {
            decimals,
            is_initialized: true,
            supply: u64::MAX / 2,
            ..Mint::default()
        };
        let mut data = vec![0u8; Mint::LEN];
        Mint::pack(state, &mut data)?;
        self.insert_account(mint, data);
        Ok(())
    }

    /// Create or overwrite the associated token account of `owner` for `mint`
    pub fn set_token_balance(&self, owner: Pubkey, mint: Pubkey, amount: u64) -> Result<Pubkey> {
        let address = derive_token_account(&owner, &mint).address;
        let mut data = vec![0u8; TokenAccount::LEN];
        TokenAccount::pack(
            TokenAccount {
                mint,
                owner,
                amount,
                state: AccountState::Initialized,
                ..TokenAccount::default()
            },
            &mut data,
        )?;
        self.insert_account(address, data);
        Ok(address)
    }

    /// Make the `n`th (zero-based) unconfirmed broadcast fail
    pub fn fail_send_at(&self, n: usize) {
        self.lock().fail_send_at = Some(n);
    }

    /// Whether an account exists at the address
    pub fn has_account(&self, address: &Pubkey) -> bool {
        self.lock().accounts.contains_key(address)
    }

    /// Transactions broadcast through [`LedgerRpc::send_transaction`]
    pub fn sent(&self) -> Vec<VersionedTransaction> {
        self.lock().sent.clone()
    }

    /// Transactions broadcast through [`LedgerRpc::send_and_confirm_transaction`]
    pub fn confirmed(&self) -> Vec<Transaction> {
        self.lock().confirmed.clone()
    }

    /// Number of balance reads
    pub fn balance_calls(&self) -> usize {
        self.balance_calls.load(Ordering::SeqCst)
    }

    /// Number of account reads
    pub fn account_calls(&self) -> usize {
        self.account_calls.load(Ordering::SeqCst)
    }

    /// Number of unconfirmed broadcasts attempted
    pub fn send_calls(&self) -> usize {
        self.send_calls.load(Ordering::SeqCst)
    }

    /// Number of confirmed broadcasts attempted
    pub fn confirm_calls(&self) -> usize {
        self.confirm_calls.load(Ordering::SeqCst)
    }

    fn insert_account(&self, address: Pubkey, data: Vec<u8>) {
        self.lock().accounts.insert(
            address,
            Account {
                lamports: 2_039_280,
                data,
                owner: spl_token::id(),
                executable: false,
                rent_epoch: 0,
            },
        );
    }

    fn apply_ata_creates(&self, transaction: &Transaction) -> Result<()> {
        let message = &transaction.message;
        for instruction in &message.instructions {
            let program = message.account_keys[instruction.program_id_index as usize];
            if program != spl_associated_token_account::id() {
                continue;
            }
            let key = |position: usize| -> Result<Pubkey> {
                instruction
                    .accounts
                    .get(position)
                    .and_then(|index| message.account_keys.get(*index as usize))
                    .copied()
                    .ok_or_else(|| Error::rpc("malformed create instruction"))
            };
            let address = key(1)?;
            let owner = key(2)?;
            let mint = key(3)?;

            if self.has_account(&address) {
                if instruction.data.first() == Some(&CREATE_IDEMPOTENT) {
                    continue;
                }
                return Err(Error::rpc(format!(
                    "Allocate: account Address {{ address: {}, base: None }} already in use",
                    address
                )));
            }
            self.set_token_balance(owner, mint, 0)?;
        }
        Ok(())
    }
}

#[async_trait]
impl LedgerRpc for MockLedger {
    async fn get_balance(&self, address: &Pubkey) -> Result<u64> {
        self.balance_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.lock().balances.get(address).copied().unwrap_or(0))
    }

    async fn get_account(&self, address: &Pubkey) -> Result<Option<Account>> {
        self.account_calls.fetch_add(1, Ordering::SeqCst);
        let snapshot = self.lock().accounts.get(address).cloned();
        tokio::task::yield_now().await;
        Ok(snapshot)
    }

    async fn get_latest_blockhash(&self) -> Result<Hash> {
        Ok(Hash::new_unique())
    }

    async fn send_transaction(&self, transaction: &VersionedTransaction) -> Result<Signature> {
        let attempt = self.send_calls.fetch_add(1, Ordering::SeqCst);
        let mut state = self.lock();
        if state.fail_send_at == Some(attempt) {
            return Err(Error::rpc("Transaction simulation failed: Blockhash not found"));
        }
        state.sent.push(transaction.clone());
        Ok(transaction.signatures.first().copied().unwrap_or_default())
    }

    async fn send_and_confirm_transaction(&self, transaction: &Transaction) -> Result<Signature> {
        self.confirm_calls.fetch_add(1, Ordering::SeqCst);
        self.apply_ata_creates(transaction)?;
        self.lock().confirmed.push(transaction.clone());
        Ok(transaction.signatures.first().copied().unwrap_or_default())
    }
}
