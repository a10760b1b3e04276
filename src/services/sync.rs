// src/services/sync.rs

use std::sync::Arc;

use crate::{
    clients::identity::{IdentityProvider, ProviderMetadata},
    common::error::AppError,
    db::AccountRepository,
    models::account::Account,
};

/// Escrita pareada dos metadados no provedor de identidade, depois que a
/// mutação interna já foi commitada. Se o provedor falhar, a conta fica
/// marcada como `sync_pending` para uma nova tentativa, em vez de
/// derrubar a requisição inteira.
pub async fn sync_account_metadata(
    account_repo: &AccountRepository,
    identity: &Arc<dyn IdentityProvider>,
    account: &Account,
) -> Result<(), AppError> {
    let metadata = ProviderMetadata {
        role: account.role,
        is_verified: account.is_verified,
    };

    match identity.update_metadata(&account.external_id, &metadata).await {
        Ok(()) => {
            if account.sync_pending {
                account_repo.set_sync_pending(account.id, false).await?;
            }
        }
        Err(e) => {
            tracing::warn!(
                "Falha ao sincronizar metadados da conta {} com o provedor: {}",
                account.id,
                e
            );
            account_repo.set_sync_pending(account.id, true).await?;
        }
    }

    Ok(())
}
