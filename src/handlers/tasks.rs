// src/handlers/tasks.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedAccount,
        rbac::{DispatcherOnly, ManagerOnly, RequireRole, StaffOnly},
    },
    models::{account::Role, report::ReportSubmission, task::TaskStatus},
};

// =============================================================================
//  TÉCNICOS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RegisterTechnicianPayload {
    pub account_id: Uuid,

    #[validate(length(min = 1, message = "required"))]
    pub sub_city: String,

    #[validate(length(min = 1, message = "required"))]
    pub woreda: String,
}

// POST /api/technicians
pub async fn register_technician(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
    Json(payload): Json<RegisterTechnicianPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let technician = app_state
        .dispatch_service
        .register_technician(payload.account_id, &payload.sub_city, &payload.woreda)
        .await?;
    Ok((StatusCode::CREATED, Json(technician)))
}

// GET /api/technicians
pub async fn list_technicians(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
) -> Result<impl IntoResponse, AppError> {
    let technicians = app_state.dispatch_service.list_technicians().await?;
    Ok((StatusCode::OK, Json(technicians)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnLeavePayload {
    pub on_leave: bool,
}

// PATCH /api/technicians/{id}/leave
pub async fn set_technician_on_leave(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<OnLeavePayload>,
) -> Result<impl IntoResponse, AppError> {
    app_state
        .dispatch_service
        .set_technician_on_leave(id, payload.on_leave)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
//  TAREFAS
// =============================================================================

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignTaskPayload {
    pub application_id: Uuid,
    pub technician_id: Uuid,
    pub scheduled_at: DateTime<Utc>,
}

// POST /api/tasks
pub async fn assign_task(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    AuthenticatedAccount(assigner): AuthenticatedAccount,
    Json(payload): Json<AssignTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    let task = app_state
        .dispatch_service
        .assign_task(
            payload.application_id,
            payload.technician_id,
            payload.scheduled_at,
            &assigner,
        )
        .await?;
    Ok((StatusCode::CREATED, Json(task)))
}

// GET /api/tasks — a listagem é recortada pelo papel de quem pede:
// cliente vê as próprias, técnico vê as suas, o restante da equipe vê tudo.
pub async fn list_tasks(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
) -> Result<impl IntoResponse, AppError> {
    let tasks = app_state.dispatch_service.list_tasks_for(&account).await?;
    Ok((StatusCode::OK, Json(tasks)))
}

// GET /api/tasks/{id}
pub async fn get_task(
    State(app_state): State<AppState>,
    AuthenticatedAccount(account): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let task = app_state.dispatch_service.get_task(id).await?;

    if account.role == Role::Customer && task.customer_id != account.id {
        return Err(AppError::Forbidden("Esta tarefa não pertence à sua conta.".into()));
    }

    Ok((StatusCode::OK, Json(task)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTaskStatusPayload {
    pub status: TaskStatus,
    // Relatório opcional, aceito apenas na conclusão.
    pub report: Option<ReportSubmission>,
}

// PATCH /api/tasks/{id}/status
pub async fn update_task_status(
    State(app_state): State<AppState>,
    AuthenticatedAccount(actor): AuthenticatedAccount,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskStatusPayload>,
) -> Result<impl IntoResponse, AppError> {
    let task = app_state
        .dispatch_service
        .update_task_status(id, payload.status, payload.report, &actor)
        .await?;
    Ok((StatusCode::OK, Json(task)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReassignTaskPayload {
    pub technician_id: Uuid,
}

// POST /api/tasks/{id}/reassign
pub async fn reassign_task(
    State(app_state): State<AppState>,
    _guard: RequireRole<DispatcherOnly>,
    Path(id): Path<Uuid>,
    Json(payload): Json<ReassignTaskPayload>,
) -> Result<impl IntoResponse, AppError> {
    let task = app_state
        .dispatch_service
        .reassign_task(id, payload.technician_id)
        .await?;
    Ok((StatusCode::OK, Json(task)))
}
