// src/handlers/verifications.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::NaiveDate;
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    db::verification_repo::VerificationFields,
    middleware::{auth::AuthenticatedAccount, rbac::{DispatcherOnly, RequireRole}},
    models::verification::IdDocumentType,
};

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SubmitVerificationPayload {
    #[validate(length(min = 2, message = "O nome completo é obrigatório"))]
    pub full_name: String,

    pub date_of_birth: NaiveDate,

    pub id_type: IdDocumentType,

    #[validate(length(min = 1, message = "required"))]
    pub id_number: String,

    #[validate(length(min = 1, message = "required"))]
    pub sub_city: String,

    #[validate(length(min = 1, message = "required"))]
    pub woreda: String,

    pub address: Option<String>,

    #[validate(url(message = "URL inválida"))]
    pub document_url: Option<String>,
}

// POST /api/verifications
pub async fn submit_verification(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(payload): Json<SubmitVerificationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let verification = app_state
        .verification_service
        .submit(
            account.id,
            VerificationFields {
                full_name: payload.full_name,
                date_of_birth: payload.date_of_birth,
                id_type: payload.id_type,
                id_number: payload.id_number,
                sub_city: payload.sub_city,
                woreda: payload.woreda,
                address: payload.address,
                document_url: payload.document_url,
            },
        )
        .await?;

    Ok((StatusCode::CREATED, Json(verification)))
}

// GET /api/verifications/me
pub async fn my_verification(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<impl IntoResponse, AppError> {
    let verification = app_state
        .verification_service
        .find_by_account(account.id)
        .await?
        .ok_or(AppError::NotFound("Verificação"))?;
    Ok((StatusCode::OK, Json(verification)))
}

// GET /api/verifications/pending
pub async fn list_pending(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
) -> Result<impl IntoResponse, AppError> {
    let pending = app_state.verification_service.list_pending().await?;
    Ok((StatusCode::OK, Json(pending)))
}

// POST /api/verifications/{id}/approve
pub async fn approve_verification(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let verification = app_state.verification_service.approve(id).await?;
    Ok((StatusCode::OK, Json(verification)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RejectPayload {
    pub reason: String,
}

// POST /api/verifications/{id}/reject
pub async fn reject_verification(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<RejectPayload>,
) -> Result<impl IntoResponse, AppError> {
    let verification = app_state
        .verification_service
        .reject(id, &payload.reason)
        .await?;
    Ok((StatusCode::OK, Json(verification)))
}
