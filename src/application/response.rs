use serde::Serialize;

use super::{AppError, TransferReceipt};

/// Uniform result shape returned to clients: a success flag, an optional
/// human-readable message and optional data.
#[derive(Debug, Clone, Serialize)]
pub struct Envelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            message: None,
            data: Some(data),
        }
    }

    pub fn ok_with_message(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: Some(data),
        }
    }

    pub fn failure(err: &AppError) -> Self {
        Self {
            success: false,
            message: Some(err.public_message()),
            data: None,
        }
    }
}

impl Envelope<()> {
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: Some(message.into()),
            data: None,
        }
    }
}

impl From<TransferReceipt> for Envelope<TransferReceipt> {
    fn from(receipt: TransferReceipt) -> Self {
        Self::ok_with_message(receipt.message.clone(), receipt)
    }
}
