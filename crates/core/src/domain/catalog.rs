use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::params::PricingParameters;
use crate::errors::EngineError;
use crate::pricing::{self, PriceQuote};

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CatalogEntryId(pub String);

impl std::fmt::Display for CatalogEntryId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Selects which margin rate applies during price derivation.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CatalogCategory {
    Service,
    Product,
}

impl CatalogCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Service => "service",
            Self::Product => "product",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "service" => Some(Self::Service),
            "product" => Some(Self::Product),
            _ => None,
        }
    }
}

/// An expense line attached to a catalog entry. The entry's expense total is
/// always the sum of these, never an independently stored number.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryExpense {
    pub name: String,
    pub amount: Decimal,
}

/// A sellable catalog service with its cached derived price pair.
///
/// `utility` and `public_price` are a materialized view over
/// `(cost, expenses, category, current parameters)`. They are private and
/// only written through [`CatalogEntry::reprice`] or rehydrated verbatim by
/// storage via [`CatalogEntry::from_stored`]; there is no field-level edit.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CatalogEntry {
    pub id: CatalogEntryId,
    pub name: String,
    pub description: String,
    pub section_name: String,
    pub category_name: String,
    pub category: CatalogCategory,
    pub cost: Decimal,
    pub accessory_expenses: Vec<AccessoryExpense>,
    utility: Decimal,
    public_price: Decimal,
    pub created_at: DateTime<Utc>,
}

impl CatalogEntry {
    /// Create a new entry and derive its price pair immediately.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: CatalogEntryId,
        name: impl Into<String>,
        description: impl Into<String>,
        section_name: impl Into<String>,
        category_name: impl Into<String>,
        category: CatalogCategory,
        cost: Decimal,
        accessory_expenses: Vec<AccessoryExpense>,
        params: &PricingParameters,
    ) -> Result<Self, EngineError> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(EngineError::validation("name", "must not be empty"));
        }
        if cost < Decimal::ZERO {
            return Err(EngineError::validation("cost", format!("`{cost}` must be >= 0")));
        }
        for expense in &accessory_expenses {
            if expense.amount < Decimal::ZERO {
                return Err(EngineError::validation(
                    "accessory_expenses",
                    format!("expense `{}` has negative amount {}", expense.name, expense.amount),
                ));
            }
        }

        let mut entry = Self {
            id,
            name,
            description: description.into(),
            section_name: section_name.into(),
            category_name: category_name.into(),
            category,
            cost,
            accessory_expenses,
            utility: Decimal::ZERO,
            public_price: Decimal::ZERO,
            created_at: Utc::now(),
        };
        entry.reprice(params);
        Ok(entry)
    }

    /// Rehydrate a persisted entry, trusting the stored derived pair.
    #[allow(clippy::too_many_arguments)]
    pub fn from_stored(
        id: CatalogEntryId,
        name: String,
        description: String,
        section_name: String,
        category_name: String,
        category: CatalogCategory,
        cost: Decimal,
        accessory_expenses: Vec<AccessoryExpense>,
        derived: PriceQuote,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id,
            name,
            description,
            section_name,
            category_name,
            category,
            cost,
            accessory_expenses,
            utility: derived.utility,
            public_price: derived.public_price,
            created_at,
        }
    }

    pub fn accessory_expenses_total(&self) -> Decimal {
        self.accessory_expenses.iter().map(|expense| expense.amount).sum()
    }

    pub fn utility(&self) -> Decimal {
        self.utility
    }

    pub fn public_price(&self) -> Decimal {
        self.public_price
    }

    /// Re-derive and cache the price pair for the given parameters. The only
    /// in-domain writer of the cached fields.
    pub fn reprice(&mut self, params: &PricingParameters) -> PriceQuote {
        let quote =
            pricing::price(self.cost, self.accessory_expenses_total(), self.category, params);
        self.utility = quote.utility;
        self.public_price = quote.public_price;
        quote
    }
}
