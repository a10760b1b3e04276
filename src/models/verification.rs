// src/models/verification.rs

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "verification_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Pending,
    Approved,
    Rejected,
}

impl VerificationStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            VerificationStatus::Pending => "pending",
            VerificationStatus::Approved => "approved",
            VerificationStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "id_document_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IdDocumentType {
    NationalId,
    Passport,
    DriversLicense,
    KebeleId,
}

// Registro de verificação de identidade (KYC). Uma linha por conta:
// o reenvio após rejeição reutiliza a mesma linha (mesmo id).
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Verification {
    pub id: Uuid,
    pub account_id: Uuid,
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub id_type: IdDocumentType,
    pub id_number: String,
    pub sub_city: String,
    pub woreda: String,
    pub address: Option<String>,
    pub document_url: Option<String>,
    pub status: VerificationStatus,
    pub rejection_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// O que fazer com um novo envio, dado o estado da linha existente.
#[derive(Debug, PartialEq, Eq)]
pub enum SubmitAction {
    // Nenhuma linha existe: insere uma nova, pendente.
    Insert,
    // A linha existente foi rejeitada: reseta no lugar (status -> pending,
    // motivo limpo), preservando o id.
    ResetInPlace,
    // Já existe uma verificação ativa (pendente ou aprovada).
    AlreadyActive,
}

/// Decide o destino de um envio. Só pode existir uma verificação
/// ativa (pendente ou aprovada) por conta.
pub fn submit_action(existing: Option<VerificationStatus>) -> SubmitAction {
    match existing {
        None => SubmitAction::Insert,
        Some(VerificationStatus::Rejected) => SubmitAction::ResetInPlace,
        Some(VerificationStatus::Pending) | Some(VerificationStatus::Approved) => {
            SubmitAction::AlreadyActive
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn envio_sem_historico_insere() {
        assert_eq!(submit_action(None), SubmitAction::Insert);
    }

    #[test]
    fn reenvio_apos_rejeicao_reutiliza_a_linha() {
        assert_eq!(
            submit_action(Some(VerificationStatus::Rejected)),
            SubmitAction::ResetInPlace
        );
    }

    #[test]
    fn verificacao_ativa_bloqueia_novo_envio() {
        assert_eq!(
            submit_action(Some(VerificationStatus::Pending)),
            SubmitAction::AlreadyActive
        );
        assert_eq!(
            submit_action(Some(VerificationStatus::Approved)),
            SubmitAction::AlreadyActive
        );
    }
}
