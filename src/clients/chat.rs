// src/clients/chat.rs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::common::error::AppError;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Chat {
    pub id: String,
    pub visitor_name: Option<String>,
    pub last_message: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatMessage {
    pub id: String,
    pub sender: String,
    pub text: String,
    pub sent_at: Option<DateTime<Utc>>,
}

// Superfície de leitura/repasse do chat ao vivo. Nada é persistido
// localmente; a aplicação só faz proxy para o fornecedor.
#[async_trait]
pub trait ChatVendor: Send + Sync {
    async fn list_chats(&self, site_id: &str) -> Result<Vec<Chat>, AppError>;

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError>;

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), AppError>;
}

pub struct HttpChatVendor {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpChatVendor {
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
            "fornecedor de chat respondeu {}: {}",
            status, body
        )))
    }
}

#[async_trait]
impl ChatVendor for HttpChatVendor {
    async fn list_chats(&self, site_id: &str) -> Result<Vec<Chat>, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/sites/{}/chats", self.base_url, site_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("fornecedor de chat: {}", e)))?;

        let chats = Self::check(response)
            .await?
            .json::<Vec<Chat>>()
            .await
            .map_err(|e| AppError::ExternalService(format!("fornecedor de chat: {}", e)))?;
        Ok(chats)
    }

    async fn get_messages(&self, chat_id: &str) -> Result<Vec<ChatMessage>, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/chats/{}/messages", self.base_url, chat_id))
            .bearer_auth(&self.api_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("fornecedor de chat: {}", e)))?;

        let messages = Self::check(response)
            .await?
            .json::<Vec<ChatMessage>>()
            .await
            .map_err(|e| AppError::ExternalService(format!("fornecedor de chat: {}", e)))?;
        Ok(messages)
    }

    async fn send_message(&self, chat_id: &str, text: &str) -> Result<(), AppError> {
        let response = self
            .http
            .post(format!("{}/v1/chats/{}/messages", self.base_url, chat_id))
            .bearer_auth(&self.api_key)
            .json(&serde_json::json!({ "text": text }))
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("fornecedor de chat: {}", e)))?;
        Self::check(response).await?;
        Ok(())
    }
}
