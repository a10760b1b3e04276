// src/services/verification_service.rs

use std::sync::Arc;

use sqlx::PgPool;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    clients::identity::IdentityProvider,
    common::error::AppError,
    db::{AccountRepository, VerificationRepository, verification_repo::VerificationFields},
    models::verification::{SubmitAction, Verification, VerificationStatus, submit_action},
    services::sync::sync_account_metadata,
};

#[derive(Clone)]
pub struct VerificationService {
    verification_repo: VerificationRepository,
    account_repo: AccountRepository,
    identity: Arc<dyn IdentityProvider>,
    pool: PgPool,
}

impl VerificationService {
    pub fn new(
        verification_repo: VerificationRepository,
        account_repo: AccountRepository,
        identity: Arc<dyn IdentityProvider>,
        pool: PgPool,
    ) -> Self {
        Self { verification_repo, account_repo, identity, pool }
    }

    /// Envio (ou reenvio) dos dados de identidade. Só pode existir uma
    /// verificação ativa por conta; depois de rejeitada, a mesma linha é
    /// reaproveitada com o status voltando para pendente.
    pub async fn submit(
        &self,
        account_id: Uuid,
        fields: VerificationFields,
    ) -> Result<Verification, AppError> {
        let existing = self.verification_repo.find_by_account(account_id).await?;

        match submit_action(existing.as_ref().map(|v| v.status)) {
            SubmitAction::Insert => {
                self.verification_repo.insert(&self.pool, account_id, &fields).await
            }
            SubmitAction::ResetInPlace => {
                let id = existing.expect("ResetInPlace implica linha existente").id;
                self.verification_repo
                    .reset_in_place(&self.pool, id, &fields)
                    .await?
                    // A linha deixou de estar rejeitada entre a leitura e a
                    // escrita: alguém decidiu no meio do caminho.
                    .ok_or_else(|| {
                        AppError::Conflict("Já existe uma verificação ativa para esta conta.".into())
                    })
            }
            SubmitAction::AlreadyActive => Err(AppError::Conflict(
                "Já existe uma verificação ativa para esta conta.".into(),
            )),
        }
    }

    pub async fn find_by_account(&self, account_id: Uuid) -> Result<Option<Verification>, AppError> {
        self.verification_repo.find_by_account(account_id).await
    }

    pub async fn list_pending(&self) -> Result<Vec<Verification>, AppError> {
        self.verification_repo.list_by_status(VerificationStatus::Pending).await
    }

    pub async fn approve(&self, verification_id: Uuid) -> Result<Verification, AppError> {
        self.decide(verification_id, VerificationStatus::Approved, None).await
    }

    pub async fn reject(&self, verification_id: Uuid, reason: &str) -> Result<Verification, AppError> {
        if reason.trim().is_empty() {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("length");
            err.message = Some("O motivo da rejeição é obrigatório.".into());
            errors.add("reason".into(), err);
            return Err(AppError::ValidationError(errors));
        }
        self.decide(verification_id, VerificationStatus::Rejected, Some(reason)).await
    }

    async fn decide(
        &self,
        verification_id: Uuid,
        status: VerificationStatus,
        reason: Option<&str>,
    ) -> Result<Verification, AppError> {
        let is_verified = status == VerificationStatus::Approved;

        let mut tx = self.pool.begin().await?;

        let verification = self
            .verification_repo
            .decide_if_pending(&mut *tx, verification_id, status, reason)
            .await?;

        let verification = match verification {
            Some(v) => v,
            // O update condicional não achou a linha pendente: ou ela não
            // existe, ou outra decisão chegou primeiro.
            None => {
                let current = self
                    .verification_repo
                    .find_by_id(verification_id)
                    .await?
                    .ok_or(AppError::NotFound("Verificação"))?;
                return Err(AppError::InvalidTransition {
                    from: current.status.as_str().into(),
                    to: status.as_str().into(),
                });
            }
        };

        self.account_repo
            .set_verified(&mut *tx, verification.account_id, is_verified)
            .await?;

        tx.commit().await?;

        // Sincronização com o provedor fora da transação: a decisão já
        // está commitada e a falha externa vira pendência de sync.
        if let Some(account) = self.account_repo.find_by_id(verification.account_id).await? {
            sync_account_metadata(&self.account_repo, &self.identity, &account).await?;
        }

        Ok(verification)
    }
}
