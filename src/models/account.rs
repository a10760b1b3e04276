// src/models/account.rs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

// --- Papéis ---
// Espelhado em `publicMetadata.role` no provedor de identidade.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "account_role", rename_all = "lowercase")] // Banco
#[serde(rename_all = "lowercase")] // JSON
pub enum Role {
    Customer,
    Cso,
    Estimator,
    Technician,
    Manager,
}

impl Role {
    /// Qualquer papel que não seja cliente é equipe interna.
    pub fn is_staff(&self) -> bool {
        !matches!(self, Role::Customer)
    }
}

// Conta interna vinculada a um principal do provedor de identidade externo.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub id: Uuid,
    pub external_id: String,
    pub email: String,
    pub role: Role,
    pub is_verified: bool,
    pub is_disabled: bool,
    // true quando a escrita pareada de metadados no provedor falhou
    // e ainda precisa ser refeita.
    pub sync_pending: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// Conta enriquecida com o nome de exibição vindo do provedor.
// Se o provedor falhar, `display_name` degrada para um placeholder.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountView {
    #[serde(flatten)]
    pub account: Account,
    pub display_name: String,
}

// Estrutura de dados ("claims") dentro do JWT emitido pelo provedor.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // ID externo do principal
    pub email: Option<String>,
    pub exp: usize,
    pub iat: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn somente_cliente_nao_e_equipe() {
        assert!(!Role::Customer.is_staff());
        for role in [Role::Cso, Role::Estimator, Role::Technician, Role::Manager] {
            assert!(role.is_staff());
        }
    }
}
