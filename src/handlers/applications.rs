// src/handlers/applications.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedAccount,
        rbac::{DispatcherOnly, EstimatorOnly, RequireRole, StaffOnly},
    },
    models::{
        account::Role,
        application::{
            ApplicationDetails, ApprovalStatus, ConnectionType, MeterType, ServiceCategory,
            VoltageLevel,
        },
    },
};

// =============================================================================
//  REQUISIÇÕES DE SERVIÇO
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateApplicationPayload {
    pub category: ServiceCategory,

    #[validate(length(min = 2, message = "O tipo de serviço é obrigatório"))]
    pub service_type: String,

    pub details: ApplicationDetails,

    #[serde(default)]
    pub document_urls: Vec<String>,
}

// POST /api/applications
pub async fn create_application(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Json(payload): Json<CreateApplicationPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let (application, receipt) = app_state
        .application_service
        .create_application(
            &account,
            payload.category,
            &payload.service_type,
            payload.details,
            payload.document_urls,
        )
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(json!({ "application": application, "receipt": receipt })),
    ))
}

// GET /api/applications/mine
pub async fn list_my_applications(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<impl IntoResponse, AppError> {
    let applications = app_state
        .application_service
        .list_applications_by_account(account.id)
        .await?;
    Ok((StatusCode::OK, Json(applications)))
}

// GET /api/applications
pub async fn list_applications(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
) -> Result<impl IntoResponse, AppError> {
    let applications = app_state.application_service.list_applications().await?;
    Ok((StatusCode::OK, Json(applications)))
}

// GET /api/applications/{id}
pub async fn get_application(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let application = app_state.application_service.get_application(id).await?;

    if account.role == Role::Customer && application.account_id != account.id {
        return Err(AppError::Forbidden(
            "Esta requisição não pertence à sua conta.".into(),
        ));
    }

    Ok((StatusCode::OK, Json(application)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DecisionPayload {
    pub status: ApprovalStatus,
    pub reason: Option<String>,
}

// POST /api/applications/{id}/decision
pub async fn decide_application(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<DecisionPayload>,
) -> Result<impl IntoResponse, AppError> {
    let application = app_state
        .application_service
        .decide_application(id, payload.status, payload.reason.as_deref())
        .await?;
    Ok((StatusCode::OK, Json(application)))
}

// =============================================================================
//  TABELAS DE PREÇOS
// =============================================================================

// GET /api/pricing
pub async fn list_pricing(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
) -> Result<impl IntoResponse, AppError> {
    let connections = app_state.application_service.list_connection_prices().await?;
    let meters = app_state.application_service.list_meter_prices().await?;
    Ok((
        StatusCode::OK,
        Json(json!({ "connections": connections, "meters": meters })),
    ))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPricePayload {
    pub connection_type: ConnectionType,
    pub voltage_level: VoltageLevel,
    pub base_cost: Decimal,
    pub voltage_rate: Decimal,
}

// PUT /api/pricing/connection
pub async fn upsert_connection_price(
    State(app_state): State<AppState>,
    _guard: RequireRole<EstimatorOnly>,
    Json(payload): Json<ConnectionPricePayload>,
) -> Result<impl IntoResponse, AppError> {
    let price = app_state
        .application_service
        .upsert_connection_price(
            payload.connection_type,
            payload.voltage_level,
            payload.base_cost,
            payload.voltage_rate,
        )
        .await?;
    Ok((StatusCode::OK, Json(price)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeterPricePayload {
    pub meter_type: MeterType,
    pub base_cost: Decimal,
    pub installation_fee: Decimal,
}

// PUT /api/pricing/meter
pub async fn upsert_meter_price(
    State(app_state): State<AppState>,
    _guard: RequireRole<EstimatorOnly>,
    Json(payload): Json<MeterPricePayload>,
) -> Result<impl IntoResponse, AppError> {
    let price = app_state
        .application_service
        .upsert_meter_price(payload.meter_type, payload.base_cost, payload.installation_fee)
        .await?;
    Ok((StatusCode::OK, Json(price)))
}
