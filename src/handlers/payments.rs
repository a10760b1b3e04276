// src/handlers/payments.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::auth::AuthenticatedAccount,
    models::account::Role,
};

// GET /api/receipts/mine
pub async fn list_my_receipts(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<impl IntoResponse, AppError> {
    let receipts = app_state
        .application_service
        .list_receipts_by_account(account.id)
        .await?;
    Ok((StatusCode::OK, Json(receipts)))
}

// GET /api/receipts/{id}
pub async fn get_receipt(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = app_state.application_service.get_receipt(id).await?;

    if account.role == Role::Customer && receipt.account_id != account.id {
        return Err(AppError::Forbidden("Este recibo não pertence à sua conta.".into()));
    }

    Ok((StatusCode::OK, Json(receipt)))
}

// POST /api/receipts/{id}/pay
pub async fn init_payment(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let session = app_state.application_service.init_payment(id, &account).await?;
    Ok((StatusCode::OK, Json(session)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub tx_ref: String,
}

// POST /api/payments/webhook — endpoint público chamado pelo gateway.
// O corpo só carrega a referência; o resultado real é reverificado
// direto no gateway antes de qualquer escrita.
pub async fn payment_webhook(
    State(app_state): State<AppState>,
    Json(payload): Json<WebhookPayload>,
) -> Result<impl IntoResponse, AppError> {
    let receipt = app_state
        .application_service
        .handle_payment_webhook(&payload.tx_ref)
        .await?;
    Ok((StatusCode::OK, Json(receipt)))
}
