// src/db/application_repo.rs

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::application::{
        ApplicationDetails, ApprovalStatus, CostEstimate, Receipt, ServiceApplication,
        ServiceCategory,
    },
};

#[derive(Clone)]
pub struct ApplicationRepository {
    pool: PgPool,
}

impl ApplicationRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    // =========================================================================
    //  REQUISIÇÕES DE SERVIÇO
    // =========================================================================

    pub async fn insert_application<'e, E>(
        &self,
        executor: E,
        account_id: Uuid,
        category: ServiceCategory,
        service_type: &str,
        details: &ApplicationDetails,
        document_urls: &[String],
    ) -> Result<ServiceApplication, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let application = sqlx::query_as::<_, ServiceApplication>(
            r#"
            INSERT INTO service_applications (account_id, category, service_type, details, document_urls)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(account_id)
        .bind(category)
        .bind(service_type)
        .bind(Json(details))
        .bind(document_urls)
        .fetch_one(executor)
        .await?;

        Ok(application)
    }

    pub async fn find_application(&self, id: Uuid) -> Result<Option<ServiceApplication>, AppError> {
        let maybe = sqlx::query_as::<_, ServiceApplication>(
            "SELECT * FROM service_applications WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(maybe)
    }

    pub async fn list_applications(&self) -> Result<Vec<ServiceApplication>, AppError> {
        let rows = sqlx::query_as::<_, ServiceApplication>(
            "SELECT * FROM service_applications ORDER BY created_at DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_applications_by_account(
        &self,
        account_id: Uuid,
    ) -> Result<Vec<ServiceApplication>, AppError> {
        let rows = sqlx::query_as::<_, ServiceApplication>(
            "SELECT * FROM service_applications WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    /// Decisão da equipe sobre uma requisição pendente. O guarda
    /// `status = 'pending'` faz a segunda decisão concorrente perder.
    pub async fn decide_application_if_pending<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        status: ApprovalStatus,
        rejection_reason: Option<&str>,
    ) -> Result<Option<ServiceApplication>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe = sqlx::query_as::<_, ServiceApplication>(
            r#"
            UPDATE service_applications
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

    /// Cascata da confirmação de pagamento: promove a requisição dona do
    /// recibo, mas só se ela ainda está pendente. Uma decisão da equipe
    /// (aprovada ou rejeitada) nunca é sobrescrita pelo pagamento.
    pub async fn approve_application_if_pending<'e, E>(
        &self,
        executor: E,
        id: Uuid,
    ) -> Result<bool, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let result = sqlx::query(
            r#"
            UPDATE service_applications
            SET status = 'approved', updated_at = NOW()
            WHERE id = $1 AND status = 'pending'
            "#,
        )
        .bind(id)
        .execute(executor)
        .await?;
        Ok(result.rows_affected() == 1)
    }

    // =========================================================================
    //  RECIBOS
    // =========================================================================

    pub async fn insert_receipt<'e, E>(
        &self,
        executor: E,
        application_id: Uuid,
        account_id: Uuid,
        estimate: &CostEstimate,
    ) -> Result<Receipt, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let receipt = sqlx::query_as::<_, Receipt>(
            r#"
            INSERT INTO receipts (application_id, account_id, base_cost, rate, tax_amount, grand_total)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(application_id)
        .bind(account_id)
        .bind(estimate.base_cost)
        .bind(estimate.rate)
        .bind(estimate.tax_amount)
        .bind(estimate.grand_total)
        .fetch_one(executor)
        .await?;

        Ok(receipt)
    }

    pub async fn find_receipt(&self, id: Uuid) -> Result<Option<Receipt>, AppError> {
        let maybe = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_receipt_by_application(
        &self,
        application_id: Uuid,
    ) -> Result<Option<Receipt>, AppError> {
        let maybe = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE application_id = $1")
            .bind(application_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_receipt_by_tx_ref(&self, tx_ref: &str) -> Result<Option<Receipt>, AppError> {
        let maybe = sqlx::query_as::<_, Receipt>("SELECT * FROM receipts WHERE tx_ref = $1")
            .bind(tx_ref)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn list_receipts_by_account(&self, account_id: Uuid) -> Result<Vec<Receipt>, AppError> {
        let rows = sqlx::query_as::<_, Receipt>(
            "SELECT * FROM receipts WHERE account_id = $1 ORDER BY created_at DESC",
        )
        .bind(account_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn set_tx_ref<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        tx_ref: &str,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query("UPDATE receipts SET tx_ref = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(tx_ref)
            .execute(executor)
            .await?;
        Ok(())
    }

    /// Confirmação de pagamento. `paid` é monotônico: o guarda
    /// `paid = FALSE` garante que a transição acontece exatamente uma vez;
    /// uma reentrega de webhook devolve None e o chamador responde com o
    /// estado já gravado.
    pub async fn mark_paid_if_unpaid<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        tx_ref: &str,
        payment_date: DateTime<Utc>,
    ) -> Result<Option<Receipt>, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let maybe = sqlx::query_as::<_, Receipt>(
            r#"
            UPDATE receipts
            SET paid = TRUE, payment_date = $3, tx_ref = $2,
                status = 'approved', updated_at = NOW()
            WHERE id = $1 AND paid = FALSE
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(tx_ref)
        .bind(payment_date)
        .fetch_optional(executor)
        .await?;
        Ok(maybe)
    }
}
