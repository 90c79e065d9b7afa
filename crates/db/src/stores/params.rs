use async_trait::async_trait;
use chrono::Utc;
use sqlx::Row;
use tarifario_core::domain::params::PricingParameters;
use tarifario_core::errors::EngineError;
use tarifario_core::store::ParameterStore;

use super::{db_error, parse_decimal};
use crate::DbPool;

/// Singleton pricing parameters, kept as the single row with `id = 1`.
/// Writes are last-writer-wins upserts.
pub struct SqlParameterStore {
    pool: DbPool,
}

impl SqlParameterStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ParameterStore for SqlParameterStore {
    async fn load_current(&self) -> Result<PricingParameters, EngineError> {
        let row = sqlx::query(
            "SELECT service_margin_rate, product_margin_rate, sales_commission_rate, markup_rate
             FROM pricing_parameters WHERE id = 1",
        )
        .fetch_one(&self.pool)
        .await
        .map_err(db_error)?;

        let service_margin_rate: String =
            row.try_get("service_margin_rate").map_err(db_error)?;
        let product_margin_rate: String =
            row.try_get("product_margin_rate").map_err(db_error)?;
        let sales_commission_rate: String =
            row.try_get("sales_commission_rate").map_err(db_error)?;
        let markup_rate: String = row.try_get("markup_rate").map_err(db_error)?;

        Ok(PricingParameters {
            service_margin_rate: parse_decimal("service_margin_rate", &service_margin_rate)?,
            product_margin_rate: parse_decimal("product_margin_rate", &product_margin_rate)?,
            sales_commission_rate: parse_decimal(
                "sales_commission_rate",
                &sales_commission_rate,
            )?,
            markup_rate: parse_decimal("markup_rate", &markup_rate)?,
        })
    }

    async fn save_current(&self, params: PricingParameters) -> Result<(), EngineError> {
        sqlx::query(
            r#"
            INSERT INTO pricing_parameters (
                id, service_margin_rate, product_margin_rate, sales_commission_rate, markup_rate, updated_at
            ) VALUES (1, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                service_margin_rate = excluded.service_margin_rate,
                product_margin_rate = excluded.product_margin_rate,
                sales_commission_rate = excluded.sales_commission_rate,
                markup_rate = excluded.markup_rate,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(params.service_margin_rate.to_string())
        .bind(params.product_margin_rate.to_string())
        .bind(params.sales_commission_rate.to_string())
        .bind(params.markup_rate.to_string())
        .bind(Utc::now().to_rfc3339())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        Ok(())
    }
}
