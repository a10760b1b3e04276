// src/clients/identity.rs

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{common::error::AppError, models::account::Role};

// Espelho, no provedor de identidade, do papel e do status de
// verificação internos. Toda mutação interna é pareada com uma escrita
// destes metadados (não há reconciliação automática).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderMetadata {
    pub role: Role,
    pub is_verified: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderUser {
    pub id: String,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub email: String,
}

impl ProviderUser {
    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            (None, Some(l)) => l.clone(),
            (None, None) => self.email.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateProviderUser {
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub username: String,
}

// O provedor de identidade visto pela aplicação. Trait para poder
// trocar por um dublê nos testes.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    async fn get_user(&self, external_id: &str) -> Result<ProviderUser, AppError>;

    /// Cria o principal no provedor e devolve o id externo.
    async fn create_user(&self, user: &CreateProviderUser) -> Result<String, AppError>;

    async fn delete_user(&self, external_id: &str) -> Result<(), AppError>;

    async fn set_disabled(&self, external_id: &str, disabled: bool) -> Result<(), AppError>;

    async fn update_metadata(
        &self,
        external_id: &str,
        metadata: &ProviderMetadata,
    ) -> Result<(), AppError>;
}

// Implementação HTTP real.
pub struct HttpIdentityProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpIdentityProvider {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self { http: reqwest::Client::new(), base_url, api_key }
    }

    async fn check(response: reqwest::Response) -> Result<reqwest::Response, AppError> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        Err(AppError::ExternalService(format!(
            "provedor de identidade respondeu {}: {}",
            status, body
        )))
    }
}

#[derive(Deserialize)]
struct CreatedUser {
    id: String,
}

#[async_trait]
impl IdentityProvider for HttpIdentityProvider {
    async fn get_user(&self, external_id: &str) -> Result<ProviderUser, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/users/{}", self.base_url, external_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;

        let user = Self::check(response)
            .await?
            .json::<ProviderUser>()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;
        Ok(user)
    }

    async fn create_user(&self, user: &CreateProviderUser) -> Result<String, AppError> {
        let response = self
            .http
            .post(format!("{}/v1/users", self.base_url))
            .bearer_auth(&self.api_key)
            .json(user)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;

        let created = Self::check(response)
            .await?
            .json::<CreatedUser>()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;
        Ok(created.id)
    }

    async fn delete_user(&self, external_id: &str) -> Result<(), AppError> {
        let response = self
            .http
            .delete(format!("{}/v1/users/{}", self.base_url, external_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn set_disabled(&self, external_id: &str, disabled: bool) -> Result<(), AppError> {
        let response = self
            .http
            .patch(format!("{}/v1/users/{}", self.base_url, external_id))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "disabled": disabled }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;
        Self::check(response).await?;
        Ok(())
    }

    async fn update_metadata(
        &self,
        external_id: &str,
        metadata: &ProviderMetadata,
    ) -> Result<(), AppError> {
        let response = self
            .http
            .patch(format!("{}/v1/users/{}/metadata", self.base_url, external_id))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "publicMetadata": metadata }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("provedor de identidade: {}", e)))?;
        Self::check(response).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nome_de_exibicao_degrada_para_o_email() {
        let user = ProviderUser {
            id: "u_1".into(),
            first_name: None,
            last_name: None,
            email: "cliente@example.com".into(),
        };
        assert_eq!(user.display_name(), "cliente@example.com");
    }

    #[test]
    fn nome_de_exibicao_completo() {
        let user = ProviderUser {
            id: "u_1".into(),
            first_name: Some("Abebe".into()),
            last_name: Some("Bikila".into()),
            email: "abebe@example.com".into(),
        };
        assert_eq!(user.display_name(), "Abebe Bikila");
    }
}
