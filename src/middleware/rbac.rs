// src/middleware/rbac.rs

use axum::{extract::FromRequestParts, http::request::Parts};
use std::marker::PhantomData;

use crate::{common::error::AppError, models::account::{Account, Role}};

/// 1. O Trait que define quem pode passar pelo guardião
pub trait RoleDef: Send + Sync + 'static {
    fn allows(role: Role) -> bool;
    fn describe() -> &'static str;
}

/// 2. O Extractor (Guardião)
pub struct RequireRole<T>(pub PhantomData<T>);

// 3. Implementação do FromRequestParts

impl<T, S> FromRequestParts<S> for RequireRole<T>
where
    T: RoleDef,
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let account = parts.extensions.get::<Account>().ok_or(AppError::Unauthorized)?;

        if !T::allows(account.role) {
            return Err(AppError::Forbidden(format!(
                "Esta ação exige papel de {}.",
                T::describe()
            )));
        }

        Ok(RequireRole(PhantomData))
    }
}

// ---
// DEFINIÇÃO DOS PAPÉIS EXIGIDOS (TIPOS)
// ---

// Qualquer membro da equipe interna.
pub struct StaffOnly;
impl RoleDef for StaffOnly {
    fn allows(role: Role) -> bool {
        role.is_staff()
    }
    fn describe() -> &'static str {
        "equipe interna"
    }
}

// Atendimento e gerência: decisões de verificação, requisição e despacho.
pub struct DispatcherOnly;
impl RoleDef for DispatcherOnly {
    fn allows(role: Role) -> bool {
        matches!(role, Role::Cso | Role::Manager)
    }
    fn describe() -> &'static str {
        "atendimento (CSO) ou gerência"
    }
}

// Orçamentista e gerência: manutenção das tabelas de preços.
pub struct EstimatorOnly;
impl RoleDef for EstimatorOnly {
    fn allows(role: Role) -> bool {
        matches!(role, Role::Estimator | Role::Manager)
    }
    fn describe() -> &'static str {
        "orçamentista ou gerência"
    }
}

pub struct ManagerOnly;
impl RoleDef for ManagerOnly {
    fn allows(role: Role) -> bool {
        matches!(role, Role::Manager)
    }
    fn describe() -> &'static str {
        "gerência"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guardioes_por_papel() {
        assert!(StaffOnly::allows(Role::Cso));
        assert!(!StaffOnly::allows(Role::Customer));

        assert!(DispatcherOnly::allows(Role::Manager));
        assert!(!DispatcherOnly::allows(Role::Technician));

        assert!(EstimatorOnly::allows(Role::Estimator));
        assert!(!EstimatorOnly::allows(Role::Cso));

        assert!(ManagerOnly::allows(Role::Manager));
        assert!(!ManagerOnly::allows(Role::Estimator));
    }
}
