// src/services/account_service.rs

use std::sync::Arc;

use futures_util::future::join_all;
use sqlx::PgPool;
use uuid::Uuid;
use validator::{ValidationError, ValidationErrors};

use crate::{
    clients::identity::{CreateProviderUser, IdentityProvider},
    common::error::AppError,
    db::{AccountRepository, TaskRepository},
    models::account::{Account, AccountView, Role},
    services::sync::sync_account_metadata,
};

#[derive(Clone)]
pub struct AccountService {
    account_repo: AccountRepository,
    task_repo: TaskRepository,
    identity: Arc<dyn IdentityProvider>,
    pool: PgPool,
}

impl AccountService {
    pub fn new(
        account_repo: AccountRepository,
        task_repo: TaskRepository,
        identity: Arc<dyn IdentityProvider>,
        pool: PgPool,
    ) -> Self {
        Self { account_repo, task_repo, identity, pool }
    }

    /// Resolve o principal do token para a conta interna, criando a conta
    /// de cliente no primeiro contato.
    pub async fn resolve_principal(
        &self,
        external_id: &str,
        email_claim: Option<&str>,
    ) -> Result<Account, AppError> {
        let account = match self.account_repo.find_by_external_id(external_id).await? {
            Some(account) => account,
            None => {
                // Primeiro contato: o e-mail vem do token ou, na falta
                // dele, do próprio provedor. O upsert faz dois primeiros
                // contatos concorrentes convergirem para a mesma conta.
                let email = match email_claim {
                    Some(email) => email.to_string(),
                    None => self.identity.get_user(external_id).await?.email,
                };
                self.account_repo
                    .insert_or_get_by_external_id(external_id, &email, Role::Customer)
                    .await?
            }
        };

        if account.is_disabled {
            return Err(AppError::Forbidden("Esta conta está desativada.".into()));
        }
        Ok(account)
    }

    pub async fn get_account(&self, id: Uuid) -> Result<Account, AppError> {
        self.account_repo.find_by_id(id).await?.ok_or(AppError::NotFound("Conta"))
    }

    /// Listagem enriquecida com os nomes de exibição do provedor, buscados
    /// em paralelo. Falha de enriquecimento degrada para um placeholder em
    /// vez de derrubar a listagem.
    pub async fn list_accounts(&self) -> Result<Vec<AccountView>, AppError> {
        let accounts = self.account_repo.list_all().await?;

        let lookups = accounts
            .iter()
            .map(|account| self.identity.get_user(&account.external_id));
        let users = join_all(lookups).await;

        let views = accounts
            .into_iter()
            .zip(users)
            .map(|(account, user)| {
                let display_name = match user {
                    Ok(user) => user.display_name(),
                    Err(e) => {
                        tracing::warn!(
                            "Falha ao enriquecer a conta {} com o provedor: {}",
                            account.id,
                            e
                        );
                        "Desconhecido".to_string()
                    }
                };
                AccountView { account, display_name }
            })
            .collect();

        Ok(views)
    }

    /// Provisiona um membro da equipe: primeiro o principal no provedor,
    /// depois a conta interna. Se a persistência interna falhar, o usuário
    /// recém-criado no provedor é removido (ação compensatória), para os
    /// dois repositórios não divergirem.
    pub async fn create_staff(
        &self,
        email: &str,
        password: &str,
        first_name: &str,
        last_name: &str,
        role: Role,
        technician_location: Option<(String, String)>, // (sub_city, woreda)
    ) -> Result<Account, AppError> {
        if role == Role::Customer {
            return Err(AppError::PreconditionFailed(
                "Contas de cliente são criadas pelo próprio fluxo de cadastro.".into(),
            ));
        }
        if role == Role::Technician && technician_location.is_none() {
            let mut errors = ValidationErrors::new();
            let mut err = ValidationError::new("required");
            err.message = Some("Técnicos precisam de subCity e woreda.".into());
            errors.add("technicianLocation".into(), err);
            return Err(AppError::ValidationError(errors));
        }

        let external_id = self
            .identity
            .create_user(&CreateProviderUser {
                email: email.to_string(),
                password: password.to_string(),
                first_name: first_name.to_string(),
                last_name: last_name.to_string(),
                username: email.split('@').next().unwrap_or(email).to_string(),
            })
            .await?;

        let created: Result<Account, AppError> = async {
            let mut tx = self.pool.begin().await?;
            let account = self.account_repo.insert(&mut *tx, &external_id, email, role).await?;
            if let Some((sub_city, woreda)) = &technician_location {
                self.task_repo
                    .insert_technician(&mut *tx, account.id, sub_city, woreda)
                    .await?;
            }
            tx.commit().await?;
            Ok(account)
        }
        .await;

        let account = match created {
            Ok(account) => account,
            Err(e) => {
                // Compensação: desfaz o usuário no provedor para não
                // deixar os dois repositórios divergentes.
                if let Err(cleanup) = self.identity.delete_user(&external_id).await {
                    tracing::error!(
                        "Persistência interna falhou E a compensação no provedor também: {}",
                        cleanup
                    );
                }
                return Err(e);
            }
        };

        sync_account_metadata(&self.account_repo, &self.identity, &account).await?;
        Ok(account)
    }

    /// Troca de papel, pareada com a escrita de metadados no provedor.
    pub async fn set_role(&self, account_id: Uuid, role: Role) -> Result<Account, AppError> {
        let account = self.account_repo.set_role(&self.pool, account_id, role).await?;
        sync_account_metadata(&self.account_repo, &self.identity, &account).await?;
        Ok(account)
    }

    /// Desativa (ou reativa) a conta aqui e no provedor. A escrita externa
    /// que falhar vira pendência de sincronização.
    pub async fn set_disabled(&self, account_id: Uuid, disabled: bool) -> Result<Account, AppError> {
        let account = self.account_repo.set_disabled(&self.pool, account_id, disabled).await?;

        if let Err(e) = self.identity.set_disabled(&account.external_id, disabled).await {
            tracing::warn!("Falha ao desativar a conta {} no provedor: {}", account.id, e);
            self.account_repo.set_sync_pending(account.id, true).await?;
        }

        Ok(account)
    }

    /// Reprocessa as contas com sincronização pendente. Devolve quantas
    /// conseguiram sincronizar.
    pub async fn retry_pending_sync(&self) -> Result<usize, AppError> {
        let pending = self.account_repo.list_sync_pending().await?;
        let mut synced = 0;

        for account in pending {
            sync_account_metadata(&self.account_repo, &self.identity, &account).await?;
            if !self.account_repo.find_by_id(account.id).await?.is_some_and(|a| a.sync_pending) {
                synced += 1;
            }
        }

        Ok(synced)
    }
}
