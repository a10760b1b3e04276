// src/handlers/accounts.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{auth::AuthenticatedAccount, rbac::{ManagerOnly, RequireRole}},
    models::account::Role,
};

// GET /api/accounts/me
pub async fn get_me(AuthenticatedAccount(account): AuthenticatedAccount) -> impl IntoResponse {
    Json(account)
}

// GET /api/accounts
pub async fn list_accounts(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
) -> Result<impl IntoResponse, AppError> {
    let accounts = app_state.account_service.list_accounts().await?;
    Ok((StatusCode::OK, Json(accounts)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TechnicianLocationPayload {
    #[validate(length(min = 1, message = "required"))]
    pub sub_city: String,
    #[validate(length(min = 1, message = "required"))]
    pub woreda: String,
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateStaffPayload {
    #[validate(email(message = "E-mail inválido"))]
    pub email: String,

    #[validate(length(min = 8, message = "A senha deve ter no mínimo 8 caracteres"))]
    pub password: String,

    #[validate(length(min = 1, message = "required"))]
    pub first_name: String,

    #[validate(length(min = 1, message = "required"))]
    pub last_name: String,

    pub role: Role,

    #[validate(nested)]
    pub technician_location: Option<TechnicianLocationPayload>,
}

// POST /api/accounts/staff
pub async fn create_staff(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
    Json(payload): Json<CreateStaffPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let location = payload
        .technician_location
        .map(|loc| (loc.sub_city, loc.woreda));

    let account = app_state
        .account_service
        .create_staff(
            &payload.email,
            &payload.password,
            &payload.first_name,
            &payload.last_name,
            payload.role,
            location,
        )
        .await?;

    Ok((StatusCode::CREATED, Json(account)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetRolePayload {
    pub role: Role,
}

// PATCH /api/accounts/{id}/role
pub async fn set_role(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetRolePayload>,
) -> Result<impl IntoResponse, AppError> {
    let account = app_state.account_service.set_role(id, payload.role).await?;
    Ok((StatusCode::OK, Json(account)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetDisabledPayload {
    pub disabled: bool,
}

// PATCH /api/accounts/{id}/disabled
pub async fn set_disabled(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
    AuthenticatedAccount(actor): AuthenticatedAccount,
    Path(id): Path<Uuid>,
    Json(payload): Json<SetDisabledPayload>,
) -> Result<impl IntoResponse, AppError> {
    // Auto-bloqueio derrubaria o último gerente da própria sessão.
    if actor.id == id && payload.disabled {
        return Err(AppError::PreconditionFailed(
            "Você não pode desativar a própria conta.".into(),
        ));
    }

    let account = app_state
        .account_service
        .set_disabled(id, payload.disabled)
        .await?;
    Ok((StatusCode::OK, Json(account)))
}

// POST /api/accounts/sync/retry
pub async fn retry_pending_sync(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
) -> Result<impl IntoResponse, AppError> {
    let synced = app_state.account_service.retry_pending_sync().await?;
    Ok((StatusCode::OK, Json(json!({ "synced": synced }))))
}
