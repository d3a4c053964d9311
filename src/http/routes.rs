use axum::{
    Extension, Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};

use crate::application::{AppError, Envelope, LedgerService, NewAccount, TransferRequest};

pub async fn health() -> Response {
    (StatusCode::OK, Json(Envelope::message("ok"))).into_response()
}

pub async fn create_account(
    Extension(service): Extension<LedgerService>,
    body: Result<Json<NewAccount>, JsonRejection>,
) -> Result<Response, AppError> {
    // An unreadable body is invalid account data like any other bad input.
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected create-account body");
        AppError::InvalidAccountData
    })?;

    let account = service.create_account(request).await?;
    Ok((StatusCode::CREATED, Json(Envelope::ok(account))).into_response())
}

pub async fn list_accounts(
    Extension(service): Extension<LedgerService>,
) -> Result<Response, AppError> {
    let accounts = service.list_accounts().await?;
    Ok((StatusCode::OK, Json(Envelope::ok(accounts))).into_response())
}

pub async fn transfer(
    Extension(service): Extension<LedgerService>,
    body: Result<Json<TransferRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = body.map_err(|rejection| {
        tracing::debug!(error = %rejection, "rejected transfer body");
        AppError::InvalidTransferDetails
    })?;

    let receipt = service.transfer(request).await?;
    Ok((StatusCode::OK, Json(Envelope::from(receipt))).into_response())
}
