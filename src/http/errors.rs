use axum::Json;
use axum::http::{HeaderValue, StatusCode, header};
use axum::response::{IntoResponse, Response};

use crate::application::{AppError, Envelope};

/// HTTP status for each error kind.
pub fn status_for(err: &AppError) -> StatusCode {
    match err {
        AppError::InvalidAccountData
        | AppError::InvalidTransferDetails
        | AppError::SameAccount(_)
        | AppError::InsufficientBalance { .. } => StatusCode::BAD_REQUEST,
        AppError::AccountNotFound(_)
        | AppError::SenderNotFound(_)
        | AppError::ReceiverNotFound(_) => StatusCode::NOT_FOUND,
        AppError::DuplicateAccount(_) => StatusCode::CONFLICT,
        AppError::StoreUnavailable(_) | AppError::Timeout => StatusCode::SERVICE_UNAVAILABLE,
        AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Seconds a client should wait before retrying a transient failure.
const RETRY_AFTER_SECS: &str = "1";

pub fn error_response(err: AppError) -> Response {
    let status = status_for(&err);
    let mut response = (status, Json(Envelope::<()>::failure(&err))).into_response();
    if err.is_transient() {
        response
            .headers_mut()
            .insert(header::RETRY_AFTER, HeaderValue::from_static(RETRY_AFTER_SECS));
    }
    response
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        error_response(self)
    }
}
