use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use tarifario_core::domain::catalog::{
    AccessoryExpense, CatalogCategory, CatalogEntry, CatalogEntryId,
};
use tarifario_core::errors::EngineError;
use tarifario_core::pricing::PriceQuote;
use tarifario_core::store::CatalogStore;

use super::{db_error, decode_error, parse_decimal, parse_timestamp};
use crate::DbPool;

/// Catalog entries with their accessory expense lines. The cached derived
/// columns are written on save and through `update_derived`; nothing else
/// touches them.
pub struct SqlCatalogStore {
    pool: DbPool,
}

impl SqlCatalogStore {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    fn entry_from_row(
        row: &SqliteRow,
        expenses: Vec<AccessoryExpense>,
    ) -> Result<CatalogEntry, EngineError> {
        let id: String = row.try_get("id").map_err(db_error)?;
        let name: String = row.try_get("name").map_err(db_error)?;
        let description: String = row.try_get("description").map_err(db_error)?;
        let section_name: String = row.try_get("section_name").map_err(db_error)?;
        let category_name: String = row.try_get("category_name").map_err(db_error)?;
        let category_raw: String = row.try_get("category").map_err(db_error)?;
        let cost: String = row.try_get("cost_text").map_err(db_error)?;
        let utility: String = row.try_get("utility_text").map_err(db_error)?;
        let public_price: String = row.try_get("public_price_text").map_err(db_error)?;
        let created_at: String = row.try_get("created_at").map_err(db_error)?;

        let category = CatalogCategory::parse(&category_raw)
            .ok_or_else(|| decode_error(format!("unknown catalog category `{category_raw}`")))?;

        Ok(CatalogEntry::from_stored(
            CatalogEntryId(id),
            name,
            description,
            section_name,
            category_name,
            category,
            parse_decimal("cost", &cost)?,
            expenses,
            PriceQuote {
                utility: parse_decimal("utility", &utility)?,
                public_price: parse_decimal("public_price", &public_price)?,
            },
            parse_timestamp("created_at", &created_at)?,
        ))
    }

    async fn load_expenses(
        &self,
        entry_id: &CatalogEntryId,
    ) -> Result<Vec<AccessoryExpense>, EngineError> {
        let rows = sqlx::query(
            "SELECT name, CAST(amount AS TEXT) AS amount_text
             FROM catalog_entry_expense WHERE entry_id = ? ORDER BY id ASC",
        )
        .bind(&entry_id.0)
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        rows.iter().map(expense_from_row).collect()
    }
}

fn expense_from_row(row: &SqliteRow) -> Result<AccessoryExpense, EngineError> {
    let name: String = row.try_get("name").map_err(db_error)?;
    let amount: String = row.try_get("amount_text").map_err(db_error)?;
    Ok(AccessoryExpense { name, amount: parse_decimal("expense.amount", &amount)? })
}

const SELECT_ENTRY: &str = r#"
    SELECT
        id,
        name,
        description,
        section_name,
        category_name,
        category,
        CAST(cost AS TEXT) AS cost_text,
        CAST(utility AS TEXT) AS utility_text,
        CAST(public_price AS TEXT) AS public_price_text,
        created_at
    FROM catalog_entry
"#;

#[async_trait]
impl CatalogStore for SqlCatalogStore {
    async fn find_by_id(&self, id: &CatalogEntryId) -> Result<Option<CatalogEntry>, EngineError> {
        let row = sqlx::query(&format!("{SELECT_ENTRY} WHERE id = ?"))
            .bind(&id.0)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error)?;

        match row {
            Some(row) => {
                let expenses = self.load_expenses(id).await?;
                Ok(Some(Self::entry_from_row(&row, expenses)?))
            }
            None => Ok(None),
        }
    }

    async fn list_all(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        let rows = sqlx::query(&format!("{SELECT_ENTRY} ORDER BY created_at ASC, id ASC"))
            .fetch_all(&self.pool)
            .await
            .map_err(db_error)?;

        let expense_rows = sqlx::query(
            "SELECT entry_id, name, CAST(amount AS TEXT) AS amount_text
             FROM catalog_entry_expense ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut expenses_by_entry: HashMap<String, Vec<AccessoryExpense>> = HashMap::new();
        for row in &expense_rows {
            let entry_id: String = row.try_get("entry_id").map_err(db_error)?;
            expenses_by_entry.entry(entry_id).or_default().push(expense_from_row(row)?);
        }

        let mut entries = Vec::with_capacity(rows.len());
        for row in &rows {
            let id: String = row.try_get("id").map_err(db_error)?;
            let expenses = expenses_by_entry.remove(&id).unwrap_or_default();
            entries.push(Self::entry_from_row(row, expenses)?);
        }
        Ok(entries)
    }

    async fn save(&self, entry: CatalogEntry) -> Result<(), EngineError> {
        let mut tx = self.pool.begin().await.map_err(db_error)?;

        sqlx::query(
            r#"
            INSERT INTO catalog_entry (
                id, name, description, section_name, category_name, category,
                cost, utility, public_price, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                section_name = excluded.section_name,
                category_name = excluded.category_name,
                category = excluded.category,
                cost = excluded.cost,
                utility = excluded.utility,
                public_price = excluded.public_price
            "#,
        )
        .bind(&entry.id.0)
        .bind(&entry.name)
        .bind(&entry.description)
        .bind(&entry.section_name)
        .bind(&entry.category_name)
        .bind(entry.category.as_str())
        .bind(entry.cost.to_string())
        .bind(entry.utility().to_string())
        .bind(entry.public_price().to_string())
        .bind(entry.created_at.to_rfc3339())
        .execute(&mut *tx)
        .await
        .map_err(db_error)?;

        sqlx::query("DELETE FROM catalog_entry_expense WHERE entry_id = ?")
            .bind(&entry.id.0)
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        for expense in &entry.accessory_expenses {
            sqlx::query(
                "INSERT INTO catalog_entry_expense (entry_id, name, amount) VALUES (?, ?, ?)",
            )
            .bind(&entry.id.0)
            .bind(&expense.name)
            .bind(expense.amount.to_string())
            .execute(&mut *tx)
            .await
            .map_err(db_error)?;
        }

        tx.commit().await.map_err(db_error)
    }

    async fn update_derived(
        &self,
        id: &CatalogEntryId,
        derived: PriceQuote,
    ) -> Result<(), EngineError> {
        let result =
            sqlx::query("UPDATE catalog_entry SET utility = ?, public_price = ? WHERE id = ?")
                .bind(derived.utility.to_string())
                .bind(derived.public_price.to_string())
                .bind(&id.0)
                .execute(&self.pool)
                .await
                .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(EngineError::CatalogEntryNotFound(id.0.clone()));
        }
        Ok(())
    }

    async fn delete(&self, id: &CatalogEntryId) -> Result<(), EngineError> {
        sqlx::query("DELETE FROM catalog_entry WHERE id = ?")
            .bind(&id.0)
            .execute(&self.pool)
            .await
            .map_err(db_error)?;
        Ok(())
    }
}
