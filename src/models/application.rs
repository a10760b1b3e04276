// src/models/application.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use sqlx::types::Json;
use uuid::Uuid;

// Status compartilhado por requisições e recibos (o recibo espelha
// o portão de aprovação).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "approval_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ApprovalStatus {
    Pending,
    Approved,
    Rejected,
}

impl ApprovalStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            ApprovalStatus::Pending => "pending",
            ApprovalStatus::Approved => "approved",
            ApprovalStatus::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, Hash)]
#[sqlx(type_name = "service_category", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServiceCategory {
    NewConnections,
    MeterReplacement,
    Maintenance,
    BillingDispute,
}

impl ServiceCategory {
    /// Categorias que exigem um custo calculado (e portanto um recibo)
    /// já na criação da requisição.
    pub fn requires_estimate(&self) -> bool {
        matches!(self, ServiceCategory::NewConnections | ServiceCategory::MeterReplacement)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "connection_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionType {
    Residential,
    Commercial,
    Industrial,
    Agricultural,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "voltage_level", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VoltageLevel {
    SinglePhase,
    ThreePhase,
    MediumVoltage,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq)]
#[sqlx(type_name = "meter_type", rename_all = "SCREAMING_SNAKE_CASE")]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MeterType {
    SinglePhase,
    ThreePhase,
    Prepaid,
    CtMeter,
}

// --- Detalhes da requisição ---
// União etiquetada por categoria em vez de um mapa solto: cada variante
// impõe estaticamente os campos que a categoria exige. A variante
// GENERIC fica como saco chave-valor para dados de repasse.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all_fields = "camelCase")]
pub enum ApplicationDetails {
    #[serde(rename = "NEW_CONNECTIONS")]
    NewConnection {
        connection_type: ConnectionType,
        voltage_level: VoltageLevel,
        plot_number: Option<String>,
    },
    #[serde(rename = "METER_REPLACEMENT")]
    MeterReplacement {
        meter_type: MeterType,
        meter_serial: Option<String>,
    },
    #[serde(rename = "GENERIC")]
    Generic {
        #[serde(default)]
        data: serde_json::Map<String, serde_json::Value>,
    },
}

impl ApplicationDetails {
    /// Verifica se a variante corresponde à categoria declarada.
    pub fn matches_category(&self, category: ServiceCategory) -> bool {
        match (self, category) {
            (ApplicationDetails::NewConnection { .. }, ServiceCategory::NewConnections) => true,
            (ApplicationDetails::MeterReplacement { .. }, ServiceCategory::MeterReplacement) => true,
            (ApplicationDetails::Generic { .. }, c) => !c.requires_estimate(),
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ServiceApplication {
    pub id: Uuid,
    pub account_id: Uuid,
    pub category: ServiceCategory,
    pub service_type: String,
    pub status: ApprovalStatus,
    pub rejection_reason: Option<String>,
    pub details: Json<ApplicationDetails>,
    pub document_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub id: Uuid,
    pub application_id: Uuid,
    pub account_id: Uuid,
    pub base_cost: Decimal,
    pub rate: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal, // Imutável após a criação
    pub status: ApprovalStatus,
    pub paid: bool, // Monotônico: false -> true, exatamente uma vez
    pub payment_date: Option<DateTime<Utc>>,
    pub tx_ref: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

// --- Tabelas de referência de precificação ---

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ConnectionPricing {
    pub id: Uuid,
    pub connection_type: ConnectionType,
    pub voltage_level: VoltageLevel,
    pub base_cost: Decimal,
    pub voltage_rate: Decimal,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MeterPricing {
    pub id: Uuid,
    pub meter_type: MeterType,
    pub base_cost: Decimal,
    pub installation_fee: Decimal,
    pub updated_at: DateTime<Utc>,
}

// --- Cálculo do orçamento ---

/// Alíquota fixa sobre o subtotal antes do imposto.
pub fn tax_rate() -> Decimal {
    Decimal::new(15, 2) // 15%
}

#[derive(Debug, Clone, PartialEq)]
pub struct CostEstimate {
    pub base_cost: Decimal,
    pub rate: Decimal,
    pub tax_amount: Decimal,
    pub grand_total: Decimal,
}

/// grand_total = (base + taxa) + imposto. Nenhum arredondamento antes
/// da persistência; arredondar só na exibição.
pub fn compute_estimate(base_cost: Decimal, rate: Decimal) -> CostEstimate {
    let subtotal = base_cost + rate;
    let tax_amount = subtotal * tax_rate();
    CostEstimate {
        base_cost,
        rate,
        tax_amount,
        grand_total: subtotal + tax_amount,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn orcamento_de_nova_ligacao() {
        // Cenário da documentação: base 1000, taxa 200 -> imposto 180, total 1380.
        let est = compute_estimate(Decimal::from(1000), Decimal::from(200));
        assert_eq!(est.tax_amount, Decimal::from(180));
        assert_eq!(est.grand_total, Decimal::from(1380));
    }

    #[test]
    fn imposto_sem_arredondamento_prematuro() {
        let est = compute_estimate(Decimal::new(10001, 2), Decimal::ZERO); // 100.01
        assert_eq!(est.tax_amount, Decimal::new(150015, 4)); // 15.0015, intacto
        assert_eq!(est.grand_total, Decimal::new(1150115, 4)); // 115.0115
    }

    #[test]
    fn detalhes_sao_etiquetados_pela_categoria() {
        let details: ApplicationDetails = serde_json::from_value(json!({
            "kind": "NEW_CONNECTIONS",
            "connectionType": "RESIDENTIAL",
            "voltageLevel": "SINGLE_PHASE"
        }))
        .unwrap();
        assert!(details.matches_category(ServiceCategory::NewConnections));
        assert!(!details.matches_category(ServiceCategory::MeterReplacement));
    }

    #[test]
    fn variante_generica_nao_vale_para_categorias_precificadas() {
        let details = ApplicationDetails::Generic { data: serde_json::Map::new() };
        assert!(details.matches_category(ServiceCategory::BillingDispute));
        assert!(details.matches_category(ServiceCategory::Maintenance));
        assert!(!details.matches_category(ServiceCategory::NewConnections));
    }

    #[test]
    fn categorias_precificadas() {
        assert!(ServiceCategory::NewConnections.requires_estimate());
        assert!(ServiceCategory::MeterReplacement.requires_estimate());
        assert!(!ServiceCategory::Maintenance.requires_estimate());
        assert!(!ServiceCategory::BillingDispute.requires_estimate());
    }
}
