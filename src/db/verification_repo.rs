// src/db/verification_repo.rs

use chrono::NaiveDate;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::verification::{IdDocumentType, Verification, VerificationStatus},
};

// Dados de identidade de um envio (novo ou reenvio após rejeição).
#[derive(Debug, Clone)]
pub struct VerificationFields {
    pub full_name: String,
    pub date_of_birth: NaiveDate,
    pub id_type: IdDocumentType,
    pub id_number: String,
    pub sub_city: String,
    pub woreda: String,
    pub address: Option<String>,
    pub document_url: Option<String>,
}

#[derive(Clone)]
pub struct VerificationRepository {
    pool: PgPool,
}

impl VerificationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Verification>, AppError> {
        let maybe = sqlx::query_as::<_, Verification>("SELECT * FROM verifications WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_by_account(&self, account_id: Uuid) -> Result<Option<Verification>, AppError> {
        let maybe =
            sqlx::query_as::<_, Verification>("SELECT * FROM verifications WHERE account_id = $1")
                .bind(account_id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(maybe)
    }

    pub async fn list_by_status(
        &self,
        status: VerificationStatus,
    ) -> Result<Vec<Verification>, AppError> {
        let rows = sqlx::query_as::<_, Verification>(
            "SELECT * FROM verifications WHERE status = $1 ORDER BY created_at ASC",
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        fields: &VerificationFields,
    ) -> Result<Verification, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let verification = sqlx::query_as::<_, Verification>(
            r#"
            INSERT INTO verifications (
                account_id, full_name, date_of_birth, id_type, id_number,
                sub_city, woreda, address, document_url
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(&fields.full_name)
        .bind(fields.date_of_birth)
        .bind(fields.id_type)
        .bind(&fields.id_number)
        .bind(&fields.sub_city)
        .bind(&fields.woreda)
        .bind(&fields.address)
        .bind(&fields.document_url)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    // Corrida entre dois envios simultâneos da mesma conta:
                    // a restrição UNIQUE(account_id) decide o vencedor.
                    return AppError::Conflict(
                        "Já existe uma verificação para esta conta.".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(verification)
    }

    /// Reenvio após rejeição: reutiliza a mesma linha (mesmo id),
    /// voltando o status para 'pending' e limpando o motivo. O guarda
    /// `status = 'rejected'` fecha a janela de corrida com uma aprovação
    /// concorrente.
    pub async fn reset_in_place<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        fields: &VerificationFields,
    ) -> Result<Option<Verification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe = sqlx::query_as::<_, Verification>(
            r#"
            UPDATE verifications SET
                full_name = $2, date_of_birth = $3, id_type = $4, id_number = $5,
                sub_city = $6, woreda = $7, address = $8, document_url = $9,
                status = 'pending', rejection_reason = NULL, updated_at = NOW()
            WHERE id = $1 AND status = 'rejected'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(&fields.full_name)
        .bind(fields.date_of_birth)
        .bind(fields.id_type)
        .bind(&fields.id_number)
        .bind(&fields.sub_city)
        .bind(&fields.woreda)
        .bind(&fields.address)
        .bind(&fields.document_url)
        .fetch_optional(executor)
        .await?;

        Ok(maybe)
    }

    /// Atualização condicional pending -> {approved, rejected}. Retorna
    /// None se a linha não estava mais pendente (decisão concorrente).
    pub async fn decide_if_pending<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: VerificationStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Option<Verification>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe = sqlx::query_as::<_, Verification>(
            r#"
            UPDATE verifications
            SET status = $2, rejection_reason = $3, updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(rejection_reason)
        .fetch_optional(executor)
        .await?;

        Ok(maybe)
    }
}
