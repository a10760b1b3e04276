// src/handlers/support.rs

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use validator::Validate;

use crate::{
    common::error::AppError,
    config::AppState,
    middleware::rbac::{RequireRole, StaffOnly},
};

// Repasse do chat ao vivo. Nada fica persistido aqui: a aplicação só
// encaminha para o fornecedor, autenticando com a chave do site.

// GET /api/support/chats
pub async fn list_chats(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
) -> Result<impl IntoResponse, AppError> {
    let chats = app_state.chat.list_chats(&app_state.chat_site_id).await?;
    Ok((StatusCode::OK, Json(chats)))
}

// GET /api/support/chats/{chat_id}/messages
pub async fn get_messages(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
    Path(chat_id): Path<String>,
) -> Result<impl IntoResponse, AppError> {
    let messages = app_state.chat.get_messages(&chat_id).await?;
    Ok((StatusCode::OK, Json(messages)))
}

#[derive(Debug, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct SendMessagePayload {
    #[validate(length(min = 1, message = "A mensagem não pode ser vazia"))]
    pub text: String,
}

// POST /api/support/chats/{chat_id}/messages
pub async fn send_message(
    State(app_state): State<AppState>,
    _guard: RequireRole<StaffOnly>,
    Path(chat_id): Path<String>,
    Json(payload): Json<SendMessagePayload>,
) -> Result<impl IntoResponse, AppError> {
    payload.validate()?;

    app_state.chat.send_message(&chat_id, &payload.text).await?;
    Ok(StatusCode::NO_CONTENT)
}
