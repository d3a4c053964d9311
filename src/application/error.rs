use thiserror::Error;

use crate::domain::Cents;
use crate::storage::StoreError;

/// Message returned to clients in place of internal failure details.
pub const INTERNAL_ERROR_MESSAGE: &str = "Internal server error";

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid account data")]
    InvalidAccountData,

    #[error("Invalid transfer details")]
    InvalidTransferDetails,

    #[error("Account not found: {0}")]
    AccountNotFound(String),

    #[error("Sender account ({0}) not found")]
    SenderNotFound(String),

    #[error("Receiver account ({0}) not found")]
    ReceiverNotFound(String),

    #[error("Cannot transfer from account {0} to itself")]
    SameAccount(String),

    #[error("Insufficient balance")]
    InsufficientBalance {
        account: String,
        balance: Cents,
        required: Cents,
    },

    #[error("Account already exists: {0}")]
    DuplicateAccount(String),

    #[error("Store unavailable, try again later")]
    StoreUnavailable(String),

    #[error("Timed out waiting for the accounts, try again later")]
    Timeout,

    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl AppError {
    /// Whether retrying the same request may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, AppError::StoreUnavailable(_) | AppError::Timeout)
    }

    /// Message safe to show to clients.
    pub fn public_message(&self) -> String {
        match self {
            AppError::Internal(_) => INTERNAL_ERROR_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<StoreError> for AppError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::AccountNotFound(name) => AppError::AccountNotFound(name),
            StoreError::DuplicateAccount(name) => AppError::DuplicateAccount(name),
            StoreError::InsufficientBalance {
                account,
                balance,
                required,
            } => AppError::InsufficientBalance {
                account,
                balance,
                required,
            },
            StoreError::SameAccount(name) => AppError::SameAccount(name),
            // Only transfers reach the store with an amount it can reject;
            // account creation validates the balance before calling it.
            StoreError::InvalidAmount(_) => AppError::InvalidTransferDetails,
            StoreError::Timeout => AppError::Timeout,
            StoreError::Unavailable(reason) => AppError::StoreUnavailable(reason),
            StoreError::Internal(err) => AppError::Internal(err),
        }
    }
}
