//! Account storage: the only place where balances are mutated.

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Account, Cents};

mod memory;
mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// SQL migration for the accounts table
pub const MIGRATION_001_ACCOUNTS: &str = include_str!("migrations/001_accounts.sql");

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Insufficient balance in account {account}: balance {balance}, required {required}")]
    InsufficientBalance {
        account: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Cannot transfer from an account to itself: {0}")]
    SameAccount(String),

    #[error("Timed out waiting for exclusive access to accounts")]
    Timeout,

    #[error("Store unavailable: {0}")]
    Unavailable(String),

    #[error("Store error: {0}")]
    Internal(#[from] anyhow::Error),
}

/// Tunables shared by every store implementation.
#[derive(Debug, Clone)]
pub struct StoreOptions {
    /// Upper bound on how long an operation waits for locks or connections.
    pub lock_timeout: Duration,
    /// Connection pool size (ignored by the in-memory store).
    pub max_connections: u32,
}

impl Default for StoreOptions {
    fn default() -> Self {
        Self {
            lock_timeout: Duration::from_secs(5),
            max_connections: 8,
        }
    }
}

/// Concurrency-safe account storage.
///
/// Implementations must make `atomic_transfer` serializable with respect to
/// every other operation touching the same accounts: readers never observe a
/// debit without its matching credit, and no balance ever drops below zero.
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Create an account. Fails if the name is taken or the balance is negative.
    async fn create(&self, name: &str, initial_balance: Cents) -> Result<Account, StoreError>;

    /// Fetch an account by name.
    async fn get(&self, name: &str) -> Result<Account, StoreError>;

    /// All accounts ordered by name, as one consistent snapshot.
    async fn list(&self) -> Result<Vec<Account>, StoreError>;

    /// Move `amount` from `from` to `to` as a single unit.
    /// Returns the updated sender and receiver.
    async fn atomic_transfer(
        &self,
        from: &str,
        to: &str,
        amount: Cents,
    ) -> Result<(Account, Account), StoreError>;
}

/// Checks that need no access to stored state. Run before any lock is taken.
pub(crate) fn validate_transfer(from: &str, to: &str, amount: Cents) -> Result<(), StoreError> {
    if amount <= 0 {
        return Err(StoreError::InvalidAmount(
            "Amount must be positive".to_string(),
        ));
    }
    if from == to {
        return Err(StoreError::SameAccount(from.to_string()));
    }
    Ok(())
}

pub(crate) fn validate_initial_balance(balance: Cents) -> Result<(), StoreError> {
    if balance < 0 {
        return Err(StoreError::InvalidAmount(
            "Initial balance cannot be negative".to_string(),
        ));
    }
    Ok(())
}
