// src/db/pricing_repo.rs

use rust_decimal::Decimal;
use sqlx::PgPool;

use crate::{
    common::error::AppError,
    models::application::{ConnectionPricing, ConnectionType, MeterPricing, MeterType, VoltageLevel},
};

// Dados de referência de precificação. Leitura frequente, escrita rara;
// a escrita é upsert por chave, para nunca deixar a tabela vazia no
// meio de uma atualização.
#[derive(Clone)]
pub struct PricingRepository {
    pool: PgPool,
}

impl PricingRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub async fn connection_price(
        &self,
        connection_type: ConnectionType,
        voltage_level: VoltageLevel,
    ) -> Result<Option<ConnectionPricing>, AppError> {
        let maybe = sqlx::query_as::<_, ConnectionPricing>(
            "SELECT * FROM connection_pricing WHERE connection_type = $1 AND voltage_level = $2",
        )
        .bind(connection_type)
        .bind(voltage_level)
        .fetch_optional(&self.pool)
        .await?;
        Ok(maybe)
    }

    pub async fn meter_price(&self, meter_type: MeterType) -> Result<Option<MeterPricing>, AppError> {
        let maybe =
            sqlx::query_as::<_, MeterPricing>("SELECT * FROM meter_pricing WHERE meter_type = $1")
                .bind(meter_type)
                .fetch_optional(&self.pool)
                .await?;
        Ok(maybe)
    }

    pub async fn list_connection_prices(&self) -> Result<Vec<ConnectionPricing>, AppError> {
        let rows = sqlx::query_as::<_, ConnectionPricing>(
            "SELECT * FROM connection_pricing ORDER BY connection_type, voltage_level",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn list_meter_prices(&self) -> Result<Vec<MeterPricing>, AppError> {
        let rows =
            sqlx::query_as::<_, MeterPricing>("SELECT * FROM meter_pricing ORDER BY meter_type")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows)
    }

    pub async fn upsert_connection_price(
        &self,
        connection_type: ConnectionType,
        voltage_level: VoltageLevel,
        base_cost: Decimal,
        voltage_rate: Decimal,
    ) -> Result<ConnectionPricing, AppError> {
        let row = sqlx::query_as::<_, ConnectionPricing>(
            r#"
            INSERT INTO connection_pricing (connection_type, voltage_level, base_cost, voltage_rate)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (connection_type, voltage_level)
            DO UPDATE SET base_cost = $3, voltage_rate = $4, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(connection_type)
        .bind(voltage_level)
        .bind(base_cost)
        .bind(voltage_rate)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn upsert_meter_price(
        &self,
        meter_type: MeterType,
        base_cost: Decimal,
        installation_fee: Decimal,
    ) -> Result<MeterPricing, AppError> {
        let row = sqlx::query_as::<_, MeterPricing>(
            r#"
            INSERT INTO meter_pricing (meter_type, base_cost, installation_fee)
            VALUES ($1, $2, $3)
            ON CONFLICT (meter_type)
            DO UPDATE SET base_cost = $2, installation_fee = $3, updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(meter_type)
        .bind(base_cost)
        .bind(installation_fee)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }
}
