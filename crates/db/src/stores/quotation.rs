use async_trait::async_trait;
use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tarifario_core::domain::catalog::{CatalogCategory, CatalogEntryId};
use tarifario_core::domain::quotation::{
    AdditionalCost, AdditionalCostCategory, LineItemId, LineSnapshot, Quotation, QuotationId,
    QuotationLineItem, QuotationStatus,
};
use tarifario_core::errors::EngineError;
use tarifario_core::store::QuotationStore;

use super::{db_error, decode_error, parse_decimal, parse_timestamp};
use crate::DbPool;

/// Quotations with their line-item snapshots and additional costs.
///
/// The aggregate is written as a whole inside one transaction. Snapshot
/// columns are only ever inserted; there is no statement here that updates
/// them in place.
pub struct SqlQuotationStore {
    pool: DbPool,
}

impl SqlQuotationStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    async fn load_lines(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<QuotationLineItem>, EngineError> {
        let rows = sqlx::query(
            r#"
            SELECT
                id,
                source_entry_id,
                is_custom,
                name_snapshot,
                description_snapshot,
                section_name_snapshot,
                category_name_snapshot,
                category_type_snapshot,
                CAST(cost_snapshot AS TEXT) AS cost_text,
                CAST(expenses_snapshot AS TEXT) AS expenses_text,
                CAST(utility_snapshot AS TEXT) AS utility_text,
                CAST(public_price_snapshot AS TEXT) AS public_price_text,
                CAST(unit_price AS TEXT) AS unit_price_text,
                quantity,
                position
            FROM quotation_line_item
            WHERE quotation_id = ?
            ORDER BY position ASC, id ASC
            "#,
        )
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(line_from_row).collect()
    }

    async fn load_additional_costs(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<AdditionalCost>, EngineError> {
        let rows = sqlx::query(
            "SELECT name, CAST(amount AS TEXT) AS amount_text, category
             FROM quotation_additional_cost WHERE quotation_id = ? ORDER BY id ASC",
        )
        .bind(&quotation_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter()
            .map(|row| {
                let name: String = row.try_get("name").map_err(db_error)?;
                let amount: String = row.try_get("amount_text").map_err(db_error)?;
                let category_raw: String = row.try_get("category").map_err(db_error)?;
                let category = AdditionalCostCategory::parse(&category_raw).ok_or_else(|| {
                    decode_error(format!("unknown additional cost category `{category_raw}`"))
                })?;
                Ok(AdditionalCost {
                    name,
                    amount: parse_decimal("additional_cost.amount", &amount)?,
                    category,
                })
            })
            .collect()
    }
}

fn line_from_row(row: &SqliteRow) -> Result<QuotationLineItem, EngineError> {
    let id: String = row.try_get("id").map_err(db_error)?;
    let source_entry_id: Option<String> = row.try_get("source_entry_id").map_err(db_error)?;
    let is_custom: bool = row.try_get("is_custom").map_err(db_error)?;
    let name: String = row.try_get("name_snapshot").map_err(db_error)?;
    let description: String = row.try_get("description_snapshot").map_err(db_error)?;
    let section_name: String = row.try_get("section_name_snapshot").map_err(db_error)?;
    let category_name: String = row.try_get("category_name_snapshot").map_err(db_error)?;
    let category_type_raw: String = row.try_get("category_type_snapshot").map_err(db_error)?;
    let cost: String = row.try_get("cost_text").map_err(db_error)?;
    let expenses: String = row.try_get("expenses_text").map_err(db_error)?;
    let utility: String = row.try_get("utility_text").map_err(db_error)?;
    let public_price: String = row.try_get("public_price_text").map_err(db_error)?;
    let unit_price: String = row.try_get("unit_price_text").map_err(db_error)?;
    let quantity: i64 = row.try_get("quantity").map_err(db_error)?;
    let position: i64 = row.try_get("position").map_err(db_error)?;

    let category_type = CatalogCategory::parse(&category_type_raw)
        .ok_or_else(|| decode_error(format!("unknown category type `{category_type_raw}`")))?;
    let quantity = u32::try_from(quantity)
        .map_err(|_| decode_error(format!("quantity `{quantity}` does not fit in u32")))?;
    let position = u32::try_from(position)
        .map_err(|_| decode_error(format!("position `{position}` does not fit in u32")))?;

    let snapshot = LineSnapshot {
        source_entry_id: source_entry_id.map(CatalogEntryId),
        name,
        description,
        section_name,
        category_name,
        category_type,
        cost: parse_decimal("cost_snapshot", &cost)?,
        expenses: parse_decimal("expenses_snapshot", &expenses)?,
        utility: parse_decimal("utility_snapshot", &utility)?,
        public_price: parse_decimal("public_price_snapshot", &public_price)?,
    };

    Ok(QuotationLineItem::new(
        LineItemId(id),
        snapshot,
        is_custom,
        parse_decimal("unit_price", &unit_price)?,
        quantity,
        position,
    ))
}

#[async_trait]
impl QuotationStore for SqlQuotationStore {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, EngineError> {
        let row = sqlx::query(
            "SELECT id, status, CAST(total_override AS TEXT) AS total_override_text, created_at
             FROM quotation WHERE id = ?",
        )
        .bind(&id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_error)?;

        let Some(row) = row else { return Ok(None) };

        let status_raw: String = row.try_get("status").map_err(db_error)?;
        let status = QuotationStatus::parse(&status_raw)
            .ok_or_else(|| decode_error(format!("unknown quotation status `{status_raw}`")))?;
        let total_override_raw: Option<String> =
            row.try_get("total_override_text").map_err(db_error)?;
        let total_override = total_override_raw
            .map(|value| parse_decimal("total_override", &value))
            .transpose()?;
        let created_at: String = row.try_get("created_at").map_err(db_error)?;

        let lines = self.load_lines(id).await?;
        let additional_costs = self.load_additional_costs(id).await?;

        Ok(Some(Quotation::from_stored(
            id.clone(),
            status,
            lines,
            additional_costs,
            total_override,
            parse_timestamp("created_at", &created_at)?,
        )))
    }

    async fn save(&self, quotation: Quotation) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;
        let now = Utc::now().to_rfc3339();

        sqlx::query(
            r#"
            INSERT INTO quotation (id, status, total_override, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                status = excluded.status,
                total_override = excluded.total_override,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&quotation.id.0)
        .bind(quotation.status().as_str())
        .bind(quotation.total_override().map(|total| total.to_string()))
        .bind(quotation.created_at.to_rfc3339())
        .bind(&now)
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM quotation_line_item WHERE quotation_id = ?")
            .bind(&quotation.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for line in quotation.lines() {
            let snapshot = line.snapshot();
            sqlx::query(
                r#"
                INSERT INTO quotation_line_item (
                    id, quotation_id, source_entry_id, is_custom,
                    name_snapshot, description_snapshot, section_name_snapshot,
                    category_name_snapshot, category_type_snapshot,
                    cost_snapshot, expenses_snapshot, utility_snapshot, public_price_snapshot,
                    unit_price, quantity, position
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
                "#,
            )
            .bind(&line.id().0)
            .bind(&quotation.id.0)
            .bind(snapshot.source_entry_id.as_ref().map(|id| id.0.clone()))
            .bind(line.is_custom())
            .bind(&snapshot.name)
            .bind(&snapshot.description)
            .bind(&snapshot.section_name)
            .bind(&snapshot.category_name)
            .bind(snapshot.category_type.as_str())
            .bind(snapshot.cost.to_string())
            .bind(snapshot.expenses.to_string())
            .bind(snapshot.utility.to_string())
            .bind(snapshot.public_price.to_string())
            .bind(line.unit_price().to_string())
            .bind(i64::from(line.quantity()))
            .bind(i64::from(line.position()))
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        sqlx::query("DELETE FROM quotation_additional_cost WHERE quotation_id = ?")
            .bind(&quotation.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for cost in &quotation.additional_costs {
            sqlx::query(
                "INSERT INTO quotation_additional_cost (quotation_id, name, amount, category)
                 VALUES (?, ?, ?, ?)",
            )
            .bind(&quotation.id.0)
            .bind(&cost.name)
            .bind(cost.amount.to_string())
            .bind(cost.category.as_str())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)
    }

    async fn list_pending(&self) -> Result<Vec<Quotation>, EngineError> {
        let rows = sqlx::query("SELECT id FROM quotation WHERE status = 'pending' ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let mut quotations = Vec::with_capacity(rows.len());
        for row in rows {
            let id: String = row.try_get("id").map_err(db_error)?;
            if let Some(quotation) = self.find_by_id(&QuotationId(id)).await? {
                quotations.push(quotation);
            }
        }
        Ok(quotations)
    }
}
