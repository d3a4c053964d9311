use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::{Account, Cents, format_cents, parse_amount, serialize_cents};
use crate::storage::{AccountStore, MemoryStore, SqliteStore, StoreError, StoreOptions};

use super::AppError;

/// Application service providing the ledger operations.
/// This is the primary interface for any client (CLI, HTTP, tests).
///
/// The service keeps no state of its own: every call goes to the store, and
/// balances are never cached between calls.
#[derive(Clone)]
pub struct LedgerService {
    store: Arc<dyn AccountStore>,
}

/// Account creation input, as received from a client.
/// Fields are optional so that missing values are reported as invalid data
/// rather than as a decoding failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct NewAccount {
    pub name: Option<String>,
    pub balance: Option<Value>,
}

/// Transfer input, as received from a client.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TransferRequest {
    pub from: Option<String>,
    pub to: Option<String>,
    pub amount: Option<Value>,
}

/// One party's balance after a transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceUpdate {
    pub name: String,
    #[serde(serialize_with = "serialize_cents")]
    pub new_balance: Cents,
}

/// Result of a successful transfer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TransferReceipt {
    pub message: String,
    #[serde(serialize_with = "serialize_cents")]
    pub amount: Cents,
    pub from: BalanceUpdate,
    pub to: BalanceUpdate,
}

impl NewAccount {
    pub fn new(name: impl Into<String>, balance: impl Into<Value>) -> Self {
        Self {
            name: Some(name.into()),
            balance: Some(balance.into()),
        }
    }
}

impl TransferRequest {
    pub fn new(from: impl Into<String>, to: impl Into<String>, amount: impl Into<Value>) -> Self {
        Self {
            from: Some(from.into()),
            to: Some(to.into()),
            amount: Some(amount.into()),
        }
    }
}

impl LedgerService {
    /// Create a new ledger service over the given store.
    pub fn new(store: Arc<dyn AccountStore>) -> Self {
        Self { store }
    }

    /// Initialize a SQLite database at the given path (created if missing).
    pub async fn init(database_path: &str, options: &StoreOptions) -> Result<Self, AppError> {
        let store = SqliteStore::init(database_path, options)
            .await
            .map_err(unavailable)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// Connect to an existing SQLite database.
    pub async fn connect(database_path: &str, options: &StoreOptions) -> Result<Self, AppError> {
        let store = SqliteStore::connect(database_path, false, options)
            .await
            .map_err(unavailable)?;
        Ok(Self::new(Arc::new(store)))
    }

    /// A service over a fresh in-memory store.
    pub fn in_memory(options: &StoreOptions) -> Self {
        Self::new(Arc::new(MemoryStore::new(options)))
    }

    // ========================
    // Account operations
    // ========================

    /// Create a new account.
    pub async fn create_account(&self, request: NewAccount) -> Result<Account, AppError> {
        let name = required_text(request.name.as_deref()).ok_or(AppError::InvalidAccountData)?;
        let balance = request
            .balance
            .as_ref()
            .and_then(|value| parse_amount(value).ok())
            .ok_or(AppError::InvalidAccountData)?;

        let account = self.store.create(name, balance).await.inspect_err(log_failure)?;

        tracing::info!(
            account = %account.name,
            balance = %format_cents(account.balance),
            "account created"
        );
        Ok(account)
    }

    /// Get an account by name.
    pub async fn get_account(&self, name: &str) -> Result<Account, AppError> {
        Ok(self.store.get(name.trim()).await.inspect_err(log_failure)?)
    }

    /// List all accounts, ordered by name.
    pub async fn list_accounts(&self) -> Result<Vec<Account>, AppError> {
        Ok(self.store.list().await.inspect_err(log_failure)?)
    }

    // ========================
    // Transfer operations
    // ========================

    /// Move funds between two accounts.
    pub async fn transfer(&self, request: TransferRequest) -> Result<TransferReceipt, AppError> {
        let from = required_text(request.from.as_deref());
        let to = required_text(request.to.as_deref());
        let amount = request
            .amount
            .as_ref()
            .and_then(|value| parse_amount(value).ok())
            .filter(|amount| *amount > 0);

        let (Some(from), Some(to), Some(amount)) = (from, to, amount) else {
            return Err(AppError::InvalidTransferDetails);
        };

        let (sender, receiver) = self
            .store
            .atomic_transfer(from, to, amount)
            .await
            .inspect_err(log_failure)
            .map_err(|err| transfer_error(err, from))?;

        tracing::info!(
            from = %sender.name,
            to = %receiver.name,
            amount = %format_cents(amount),
            "transfer committed"
        );

        Ok(TransferReceipt {
            message: format!(
                "Transfer successful: {} from {} → {}",
                format_cents(amount),
                sender.name,
                receiver.name
            ),
            amount,
            from: BalanceUpdate {
                name: sender.name,
                new_balance: sender.balance,
            },
            to: BalanceUpdate {
                name: receiver.name,
                new_balance: receiver.balance,
            },
        })
    }
}

fn unavailable(err: anyhow::Error) -> AppError {
    tracing::error!(error = ?err, "failed to open store");
    AppError::StoreUnavailable(format!("{:#}", err))
}

/// A missing account in a transfer is reported as the sender or the receiver.
fn transfer_error(err: StoreError, from: &str) -> AppError {
    match err {
        StoreError::AccountNotFound(name) if name == from => AppError::SenderNotFound(name),
        StoreError::AccountNotFound(name) => AppError::ReceiverNotFound(name),
        other => other.into(),
    }
}

/// Trimmed, non-empty text, or None.
fn required_text(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn log_failure(err: &StoreError) {
    match err {
        StoreError::Timeout | StoreError::Unavailable(_) => {
            tracing::warn!(error = %err, "store temporarily unavailable")
        }
        StoreError::Internal(inner) => tracing::error!(error = ?inner, "store failure"),
        _ => tracing::debug!(error = %err, "request rejected by store"),
    }
}
