//! Quotation line-item snapshot construction.
//!
//! Both paths produce a value object with no live dependency on the catalog:
//! deleting or mutating the source entry afterwards has zero effect on lines
//! built here.

use rust_decimal::Decimal;

use crate::domain::catalog::{CatalogCategory, CatalogEntry};
use crate::domain::params::PricingParameters;
use crate::domain::quotation::{LineItemId, LineSnapshot, QuotationLineItem};
use crate::errors::EngineError;
use crate::pricing;

/// Operator-supplied input for a line that is not backed by any catalog
/// entry.
#[derive(Clone, Debug, PartialEq)]
pub struct CustomLineInput {
    pub name: String,
    pub description: String,
    pub section_name: String,
    pub category_name: String,
    pub category_type: CatalogCategory,
    pub cost: Decimal,
    pub expenses: Decimal,
    pub unit_price: Decimal,
    pub quantity: u32,
}

/// Freeze a catalog entry's current descriptive labels and calculator output
/// into a new line item. `unit_price` defaults to the frozen public price
/// unless explicitly overridden.
pub fn from_catalog_entry(
    entry: &CatalogEntry,
    params: &PricingParameters,
    quantity: u32,
    unit_price_override: Option<Decimal>,
    position: u32,
) -> Result<QuotationLineItem, EngineError> {
    check_quantity(quantity)?;
    if let Some(unit_price) = unit_price_override {
        check_money("unit_price", unit_price)?;
    }

    let expenses = entry.accessory_expenses_total();
    let quote = pricing::price(entry.cost, expenses, entry.category, params);
    let snapshot = LineSnapshot {
        source_entry_id: Some(entry.id.clone()),
        name: entry.name.clone(),
        description: entry.description.clone(),
        section_name: entry.section_name.clone(),
        category_name: entry.category_name.clone(),
        category_type: entry.category,
        cost: entry.cost,
        expenses,
        utility: quote.utility,
        public_price: quote.public_price,
    };
    let unit_price = unit_price_override.unwrap_or(quote.public_price);

    Ok(QuotationLineItem::new(
        LineItemId::generate(),
        snapshot,
        false,
        unit_price,
        quantity,
        position,
    ))
}

/// Build a fully custom line item (`source_entry_id = None`, `is_custom`).
pub fn from_custom(
    input: &CustomLineInput,
    position: u32,
) -> Result<QuotationLineItem, EngineError> {
    if input.name.trim().is_empty() {
        return Err(EngineError::validation("name", "must not be empty"));
    }
    check_quantity(input.quantity)?;
    check_money("cost", input.cost)?;
    check_money("expenses", input.expenses)?;
    check_money("unit_price", input.unit_price)?;

    let snapshot = LineSnapshot {
        source_entry_id: None,
        name: input.name.clone(),
        description: input.description.clone(),
        section_name: input.section_name.clone(),
        category_name: input.category_name.clone(),
        category_type: input.category_type,
        cost: input.cost,
        expenses: input.expenses,
        // A custom line carries no derived margin; what the operator charges
        // above cost and expenses is the whole story.
        utility: Decimal::ZERO,
        public_price: input.unit_price,
    };

    Ok(QuotationLineItem::new(
        LineItemId::generate(),
        snapshot,
        true,
        input.unit_price,
        input.quantity,
        position,
    ))
}

fn check_quantity(quantity: u32) -> Result<(), EngineError> {
    if quantity == 0 {
        return Err(EngineError::validation("quantity", "must be at least 1"));
    }
    Ok(())
}

fn check_money(field: &'static str, value: Decimal) -> Result<(), EngineError> {
    if value < Decimal::ZERO {
        return Err(EngineError::validation(field, format!("`{value}` must be >= 0")));
    }
    Ok(())
}
