// src/middleware/auth.rs

use axum::{
    extract::{FromRequestParts, State},
    http::request::Parts,
    middleware::Next,
    response::Response,
};
use jsonwebtoken::{DecodingKey, Validation, decode};

use crate::{common::error::AppError, config::AppState, models::account::{Account, Claims}};

// O middleware em si: valida o bearer token emitido pelo provedor de
// identidade e resolve o principal para a conta interna (criando a conta
// de cliente no primeiro contato).
pub async fn auth_guard(
    State(app_state): State<AppState>,
    mut request: axum::http::Request<axum::body::Body>,
    next: Next,
) -> Result<Response, AppError> {
    let headers = request.headers();
    let auth_header = headers.get("Authorization").and_then(|value| value.to_str().ok());

    if let Some(auth_header) = auth_header {
        if let Some(token) = auth_header.strip_prefix("Bearer ") {
            let validation = Validation::default();
            let token_data = decode::<Claims>(
                token,
                &DecodingKey::from_secret(app_state.jwt_secret.as_ref()),
                &validation,
            )
            .map_err(|_| AppError::InvalidToken)?;

            let account = app_state
                .account_service
                .resolve_principal(
                    &token_data.claims.sub,
                    token_data.claims.email.as_deref(),
                )
                .await?;

            // Insere a conta nos "extensions" da requisição
            request.extensions_mut().insert(account);
            return Ok(next.run(request).await);
        }
    }

    Err(AppError::InvalidToken)
}

// Extrator para obter a conta autenticada diretamente nos handlers
pub struct AuthenticatedAccount(pub Account);

impl<S> FromRequestParts<S> for AuthenticatedAccount
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Account>()
            .cloned()
            .map(AuthenticatedAccount)
            .ok_or(AppError::Unauthorized)
    }
}
