// src/clients/payment.rs

use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::common::error::AppError;

#[derive(Debug, Clone, Serialize)]
pub struct InitializePayment {
    pub amount: Decimal,
    pub currency: String,
    pub email: String,
    pub name: String,
    pub tx_ref: String,
    pub callback_url: String,
    pub return_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutSession {
    pub checkout_url: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Success,
    Failed,
    Pending,
}

// Gateway de pagamento externo: inicializa um checkout e verifica o
// status de uma transação. O webhook assíncrono reentrega; a aplicação
// reverifica o tx_ref aqui antes de gravar.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn initialize(&self, request: &InitializePayment) -> Result<CheckoutSession, AppError>;

    async fn verify(&self, tx_ref: &str) -> Result<PaymentStatus, AppError>;
}

pub struct HttpPaymentGateway {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

impl HttpPaymentGateway {
    pub fn new(base_url: String, secret_key: String) -> Self {
        Self { http: reqwest::Client::new(), base_url, secret_key }
    }
}

// Envelope de resposta do gateway: { "status": "...", "data": {...} }.
#[derive(Deserialize)]
struct Envelope<T> {
    data: T,
}

#[derive(Deserialize)]
struct VerifyData {
    status: PaymentStatus,
}

#[async_trait]
impl PaymentGateway for HttpPaymentGateway {
    async fn initialize(&self, request: &InitializePayment) -> Result<CheckoutSession, AppError> {
        let response = self
            .http
            .post(format!("{}/v1/transaction/initialize", self.base_url))
            .bearer_auth(&self.secret_key)
            .json(request)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("gateway de pagamento: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "gateway de pagamento respondeu {}: {}",
                status, body
            )));
        }

        let envelope = response
            .json::<Envelope<CheckoutSession>>()
            .await
            .map_err(|e| AppError::ExternalService(format!("gateway de pagamento: {}", e)))?;
        Ok(envelope.data)
    }

    async fn verify(&self, tx_ref: &str) -> Result<PaymentStatus, AppError> {
        let response = self
            .http
            .get(format!("{}/v1/transaction/verify/{}", self.base_url, tx_ref))
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::ExternalService(format!("gateway de pagamento: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::ExternalService(format!(
                "gateway de pagamento respondeu {}: {}",
                status, body
            )));
        }

        let envelope = response
            .json::<Envelope<VerifyData>>()
            .await
            .map_err(|e| AppError::ExternalService(format!("gateway de pagamento: {}", e)))?;
        Ok(envelope.data.status)
    }
}
