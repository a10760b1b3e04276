// src/handlers/reports.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::{
        auth::AuthenticatedAccount,
        rbac::{ManagerOnly, RequireRole, StaffOnly},
    },
    models::report::{ReportSubmission, TemplateField},
};

// =============================================================================
//  MODELOS DE RELATÓRIO
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateTemplatePayload {
    #[validate(length(min = 2, message = "O nome deve ter no mínimo 2 caracteres"))]
    pub name: String,

    #[validate(length(min = 1, message = "required"))]
    pub category: String,

    pub fields: Vec<TemplateField>,
}

// POST /api/templates
pub async fn create_template(
    State(app_state): State<AppState>,
    _guard: RequireRole<ManagerOnly>,
    Json(payload): Json<CreateTemplatePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let template = app_state
        .report_service
        .create_template(&payload.name, &payload.category, payload.fields)
        .await?;
    Ok((StatusCode::CREATED, Json(template)))
}

// GET /api/templates
pub async fn list_templates(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
) -> Result<impl IntoResponse, AppError> {
    let templates = app_state.report_service.list_templates().await?;
    Ok((StatusCode::OK, Json(templates)))
}

// =============================================================================
//  RELATÓRIOS
// =============================================================================

// POST /api/tasks/{id}/report
pub async fn submit_report(
    State(app_state): State<AppState>,
    AuthenticatedAccount(submitter): AuthenticatedAccount,
    Path(task_id): Path<Uuid>,
    Json(submission): Json<ReportSubmission>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .report_service
        .submit_report(task_id, submission, &submitter)
        .await?;
    Ok((StatusCode::CREATED, Json(report)))
}

// GET /api/tasks/{id}/report
pub async fn get_task_report(
    State(app_state): State<AppState>,
    AuthenticatedAccount(requester): AuthenticatedAccount,
    Path(task_id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state
        .report_service
        .get_report_for_task(task_id, &requester)
        .await?;
    Ok((StatusCode::OK, Json(report)))
}

// GET /api/reports/{id}
pub async fn get_report(
    State(app_state): State<AppState>,
    AuthenticatedAccount(requester): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let report = app_state.report_service.get_report(id, &requester).await?;
    Ok((StatusCode::OK, Json(report)))
}

// =============================================================================
//  COMENTÁRIOS
// =============================================================================

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AddCommentPayload {
    #[validate(length(min = 1, message = "O comentário não pode ser vazio"))]
    pub body: String,
}

// POST /api/reports/{id}/comments
pub async fn add_comment(
    State(app_state): State<AppState>,
    AuthenticatedAccount(author): AuthenticatedAccount,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddCommentPayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    let comment = app_state
        .report_service
        .add_comment(id, &author, &payload.body)
        .await?;
    Ok((StatusCode::CREATED, Json(comment)))
}

// GET /api/reports/{id}/comments
pub async fn list_comments(
    State(app_state): State<AppState>,
    AuthenticatedAccount(requester): AuthenticatedAccount,
    Path(id): Path<Uuid>,
) -> Result<impl IntoResponse, AppError> {
    let comments = app_state.report_service.list_comments(id, &requester).await?;
    Ok((StatusCode::OK, Json(comments)))
}
