// src/db/account_repo.rs

use sqlx::{Executor, PgPool, Postgres};
use uuid::Uuid;

use crate::{
    common::error::AppError,
    models::account::{Account, Role},
};

// Repositório de contas, responsável por todas as interações com a
// tabela 'accounts'.
#[derive(Clone)]
pub struct AccountRepository {
    pool: PgPool,
}

impl AccountRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, AppError> {
        let maybe = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn find_by_external_id(&self, external_id: &str) -> Result<Option<Account>, AppError> {
        let maybe = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE external_id = $1")
            .bind(external_id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(maybe)
    }

    pub async fn list_all(&self) -> Result<Vec<Account>, AppError> {
        let accounts =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts ORDER BY created_at DESC")
                .fetch_all(&self.pool)
                .await?;
        Ok(accounts)
    }

    pub async fn list_sync_pending(&self) -> Result<Vec<Account>, AppError> {
        let accounts =
            sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE sync_pending = TRUE")
                .fetch_all(&self.pool)
                .await?;
        Ok(accounts)
    }

    pub async fn insert<'e, E>(
        &self,
        executor: E,
        external_id: &str,
        email: &str,
        role: Role,
    ) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (external_id, email, role)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(email)
        .bind(role)
        .fetch_one(executor)
        .await
        .map_err(|e| {
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict("Esta conta já está cadastrada.".into());
                }
            }
            e.into()
        })?;

        Ok(account)
    }

    /// Primeiro contato idempotente: duas requisições concorrentes do
    /// mesmo principal convergem para a mesma linha, em vez de a perdedora
    /// quebrar na restrição UNIQUE de external_id.
    pub async fn insert_or_get_by_external_id(
        &self,
        external_id: &str,
        email: &str,
        role: Role,
    ) -> Result<Account, AppError> {
        let account = sqlx::query_as::<_, Account>(
            r#"
            INSERT INTO accounts (external_id, email, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (external_id) DO UPDATE SET updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(external_id)
        .bind(email)
        .bind(role)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| {
            // Sobra só a colisão de e-mail com outra conta.
            if let sqlx::Error::Database(db_err) = &e {
                if db_err.is_unique_violation() {
                    return AppError::Conflict(
                        "Este e-mail já está cadastrado em outra conta.".into(),
                    );
                }
            }
            e.into()
        })?;

        Ok(account)
    }

    pub async fn set_verified<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        is_verified: bool,
    ) -> Result<(), AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        sqlx::query(
            "UPDATE accounts SET is_verified = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(is_verified)
        .execute(executor)
        .await?;
        Ok(())
    }

    pub async fn set_role<'e, E>(&self, executor: E, id: Uuid, role: Role) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Conta"))?;
        Ok(account)
    }

    pub async fn set_disabled<'e, E>(
        &self,
        executor: E,
        id: Uuid,
        is_disabled: bool,
    ) -> Result<Account, AppError>
    where
        E: Executor<'e, Database = Postgres>,
    {
        let account = sqlx::query_as::<_, Account>(
            "UPDATE accounts SET is_disabled = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(is_disabled)
        .fetch_optional(executor)
        .await?
        .ok_or(AppError::NotFound("Conta"))?;
        Ok(account)
    }

    /// Marca (ou limpa) a pendência de sincronização com o provedor de
    /// identidade. Roda fora da transação principal: é exatamente o caso
    /// em que a escrita externa falhou depois do commit.
    pub async fn set_sync_pending(&self, id: Uuid, pending: bool) -> Result<(), AppError> {
        sqlx::query("UPDATE accounts SET sync_pending = $2, updated_at = NOW() WHERE id = $1")
            .bind(id)
            .bind(pending)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

// Precisa de um Postgres acessível: cargo test --features pg-tests
#[cfg(all(test, feature = "pg-tests"))]
mod pg_tests {
    use super::*;
    use sqlx::PgPool;

    #[sqlx::test]
    async fn primeiro_contato_concorrente_converge(pool: PgPool) {
        let repo = AccountRepository::new(pool);

        // Dois primeiros contatos do mesmo principal: a segunda inserção
        // cai no ON CONFLICT e devolve a linha da vencedora.
        let primeira = repo
            .insert_or_get_by_external_id("ext-1", "cliente@example.com", Role::Customer)
            .await
            .unwrap();
        let segunda = repo
            .insert_or_get_by_external_id("ext-1", "cliente@example.com", Role::Customer)
            .await
            .unwrap();

        assert_eq!(primeira.id, segunda.id);
        assert_eq!(segunda.email, "cliente@example.com");
    }

    #[sqlx::test]
    async fn email_de_outra_conta_ainda_colide(pool: PgPool) {
        let repo = AccountRepository::new(pool);

        repo.insert_or_get_by_external_id("ext-1", "cliente@example.com", Role::Customer)
            .await
            .unwrap();
        let err = repo
            .insert_or_get_by_external_id("ext-2", "cliente@example.com", Role::Customer)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::Conflict(_)));
    }
}
