use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

// Taxonomia de erros da aplicação, com `thiserror` para melhor ergonomia.
// Os handlers traduzem tudo na borda via `IntoResponse`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Erro de validação")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Não autenticado")]
    Unauthorized,

    #[error("Token inválido")]
    InvalidToken,

    #[error("Acesso negado: {0}")]
    Forbidden(String),

    #[error("{0} não encontrado(a)")]
    NotFound(&'static str),

    #[error("Conflito: {0}")]
    Conflict(String),

    // Portão de workflow não satisfeito (ex.: técnico indisponível,
    // recibo ainda pendente).
    #[error("Pré-condição não satisfeita: {0}")]
    PreconditionFailed(String),

    #[error("Transição de status inválida: {from} -> {to}")]
    InvalidTransition { from: String, to: String },

    // Falha em um SaaS externo (identidade, pagamento, chat). O detalhe
    // do fornecedor vai para o log, nunca para o usuário final.
    #[error("Falha no serviço externo: {0}")]
    ExternalService(String),

    #[error("Erro de banco de dados")]
    DatabaseError(#[from] sqlx::Error),

    #[error("Erro interno do servidor")]
    InternalServerError(#[from] anyhow::Error),

    #[error("Erro de JWT: {0}")]
    JwtError(#[from] jsonwebtoken::errors::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized | AppError::InvalidToken | AppError::JwtError(_) => {
                StatusCode::UNAUTHORIZED
            }
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_)
            | AppError::PreconditionFailed(_)
            | AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
            AppError::ExternalService(_)
            | AppError::DatabaseError(_)
            | AppError::InternalServerError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        let error_message = match self {
            // Retorna todos os detalhes da validação, campo a campo.
            AppError::ValidationError(errors) => {
                let mut details = std::collections::HashMap::new();
                for (field, field_errors) in errors.field_errors() {
                    let messages: Vec<String> = field_errors
                        .iter()
                        .filter_map(|e| e.message.as_ref().map(|m| m.to_string()))
                        .collect();
                    details.insert(field.to_string(), messages);
                }
                let body = Json(json!({
                    "error": "Um ou mais campos são inválidos.",
                    "details": details,
                }));
                return (status, body).into_response();
            }

            AppError::Unauthorized => "Autenticação necessária.".to_string(),
            AppError::InvalidToken | AppError::JwtError(_) => {
                "Token de autenticação inválido ou ausente.".to_string()
            }
            AppError::Forbidden(msg) => msg,
            AppError::NotFound(entity) => format!("{} não encontrado(a).", entity),
            AppError::Conflict(msg) => msg,
            AppError::PreconditionFailed(msg) => msg,
            AppError::InvalidTransition { from, to } => {
                format!("Transição de status inválida: {} -> {}.", from, to)
            }

            // O detalhe fica no log; o usuário recebe uma mensagem genérica.
            ref e @ AppError::ExternalService(_) => {
                tracing::error!("Falha em serviço externo: {}", e);
                "Um serviço externo está indisponível no momento.".to_string()
            }
            ref e => {
                tracing::error!("Erro Interno do Servidor: {}", e);
                "Ocorreu um erro inesperado.".to_string()
            }
        };

        let body = Json(json!({ "error": error_message }));
        (status, body).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mapeamento_de_status_http() {
        assert_eq!(AppError::Unauthorized.status_code(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            AppError::Forbidden("x".into()).status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::NotFound("Tarefa").status_code(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Conflict("x".into()).status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::PreconditionFailed("x".into()).status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::InvalidTransition { from: "completed".into(), to: "assigned".into() }
                .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::ExternalService("detalhe do fornecedor".into()).status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }
}
