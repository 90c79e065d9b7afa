use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::catalog::{CatalogCategory, CatalogEntryId};
use crate::errors::EngineError;
use crate::pricing::round2;

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct QuotationId(pub String);

impl std::fmt::Display for QuotationId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct LineItemId(pub String);

impl LineItemId {
    pub fn generate() -> Self {
        Self(format!("qli-{}", Uuid::new_v4()))
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuotationStatus {
    Draft,
    Pending,
    Approved,
    Rejected,
    Authorized,
    Expired,
    Archived,
}

impl QuotationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Pending => "pending",
            Self::Approved => "approved",
            Self::Rejected => "rejected",
            Self::Authorized => "authorized",
            Self::Expired => "expired",
            Self::Archived => "archived",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(Self::Draft),
            "pending" => Some(Self::Pending),
            "approved" => Some(Self::Approved),
            "rejected" => Some(Self::Rejected),
            "authorized" => Some(Self::Authorized),
            "expired" => Some(Self::Expired),
            "archived" => Some(Self::Archived),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdditionalCostCategory {
    PerSession,
    PerEvent,
    Discount,
}

impl AdditionalCostCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PerSession => "per_session",
            Self::PerEvent => "per_event",
            Self::Discount => "discount",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "per_session" => Some(Self::PerSession),
            "per_event" => Some(Self::PerEvent),
            "discount" => Some(Self::Discount),
            _ => None,
        }
    }
}

/// A flat cost attached to the quotation as a whole, outside any line item.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AdditionalCost {
    pub name: String,
    pub amount: Decimal,
    pub category: AdditionalCostCategory,
}

/// The frozen provenance copy a line item carries. Immutable once built:
/// [`QuotationLineItem`] only ever hands out shared references to it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineSnapshot {
    pub source_entry_id: Option<CatalogEntryId>,
    pub name: String,
    pub description: String,
    pub section_name: String,
    pub category_name: String,
    pub category_type: CatalogCategory,
    pub cost: Decimal,
    pub expenses: Decimal,
    pub utility: Decimal,
    pub public_price: Decimal,
}

/// One quotation line: an immutable snapshot plus the operational fields an
/// operator may still correct (`unit_price`, `quantity`, `position`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QuotationLineItem {
    id: LineItemId,
    is_custom: bool,
    snapshot: LineSnapshot,
    unit_price: Decimal,
    quantity: u32,
    position: u32,
}

impl QuotationLineItem {
    /// Assemble a line from an already-validated snapshot. Used by the
    /// snapshot builder and by storage rehydration.
    pub fn new(
        id: LineItemId,
        snapshot: LineSnapshot,
        is_custom: bool,
        unit_price: Decimal,
        quantity: u32,
        position: u32,
    ) -> Self {
        Self { id, is_custom, snapshot, unit_price, quantity, position }
    }

    pub fn id(&self) -> &LineItemId {
        &self.id
    }

    pub fn is_custom(&self) -> bool {
        self.is_custom
    }

    pub fn snapshot(&self) -> &LineSnapshot {
        &self.snapshot
    }

    pub fn unit_price(&self) -> Decimal {
        self.unit_price
    }

    pub fn quantity(&self) -> u32 {
        self.quantity
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn line_total(&self) -> Decimal {
        round2(self.unit_price * Decimal::from(self.quantity))
    }

    fn apply_edit(&mut self, edit: &LineEdit) -> Result<(), EngineError> {
        if let Some(unit_price) = edit.unit_price {
            if unit_price < Decimal::ZERO {
                return Err(EngineError::validation(
                    "unit_price",
                    format!("`{unit_price}` must be >= 0"),
                ));
            }
            self.unit_price = unit_price;
        }
        if let Some(quantity) = edit.quantity {
            if quantity == 0 {
                return Err(EngineError::validation("quantity", "must be at least 1"));
            }
            self.quantity = quantity;
        }
        if let Some(position) = edit.position {
            self.position = position;
        }
        Ok(())
    }
}

/// Operator correction to a line's operational fields. Snapshot fields have
/// no counterpart here on purpose.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LineEdit {
    pub unit_price: Option<Decimal>,
    pub quantity: Option<u32>,
    pub position: Option<u32>,
}

/// An ordered set of line-item snapshots plus flat additional costs.
///
/// Once a line is added, the quotation no longer depends on the catalog
/// entries it came from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Quotation {
    pub id: QuotationId,
    status: QuotationStatus,
    line_items: Vec<QuotationLineItem>,
    pub additional_costs: Vec<AdditionalCost>,
    total_override: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}

impl Quotation {
    pub fn new_draft(id: QuotationId) -> Self {
        Self {
            id,
            status: QuotationStatus::Draft,
            line_items: Vec::new(),
            additional_costs: Vec::new(),
            total_override: None,
            created_at: Utc::now(),
        }
    }

    /// Rehydrate a persisted quotation.
    pub fn from_stored(
        id: QuotationId,
        status: QuotationStatus,
        line_items: Vec<QuotationLineItem>,
        additional_costs: Vec<AdditionalCost>,
        total_override: Option<Decimal>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self { id, status, line_items, additional_costs, total_override, created_at }
    }

    pub fn status(&self) -> QuotationStatus {
        self.status
    }

    pub fn lines(&self) -> &[QuotationLineItem] {
        &self.line_items
    }

    pub fn total_override(&self) -> Option<Decimal> {
        self.total_override
    }

    pub fn set_total_override(&mut self, total: Option<Decimal>) {
        self.total_override = total;
    }

    /// The next free display position.
    pub fn next_position(&self) -> u32 {
        self.line_items.iter().map(|line| line.position() + 1).max().unwrap_or(0)
    }

    /// Line items may only change while the quotation is still negotiable.
    pub fn accepts_line_mutation(&self) -> bool {
        matches!(self.status, QuotationStatus::Draft | QuotationStatus::Pending)
    }

    pub fn can_transition_to(&self, next: QuotationStatus) -> bool {
        matches!(
            (self.status, next),
            (QuotationStatus::Draft, QuotationStatus::Pending)
                | (QuotationStatus::Pending, QuotationStatus::Approved)
                | (QuotationStatus::Pending, QuotationStatus::Rejected)
                | (QuotationStatus::Pending, QuotationStatus::Expired)
                | (QuotationStatus::Approved, QuotationStatus::Authorized)
                | (QuotationStatus::Authorized, QuotationStatus::Expired)
                | (QuotationStatus::Expired, QuotationStatus::Pending)
                | (
                    QuotationStatus::Draft
                    | QuotationStatus::Pending
                    | QuotationStatus::Approved
                    | QuotationStatus::Rejected
                    | QuotationStatus::Authorized
                    | QuotationStatus::Expired,
                    QuotationStatus::Archived,
                )
        )
    }

    pub fn transition_to(&mut self, next: QuotationStatus) -> Result<(), EngineError> {
        if self.can_transition_to(next) {
            self.status = next;
            return Ok(());
        }
        Err(EngineError::InvalidTransition { from: self.status, to: next })
    }

    pub fn add_line(&mut self, line: QuotationLineItem) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        self.line_items.push(line);
        self.line_items.sort_by_key(QuotationLineItem::position);
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &LineItemId) -> Result<QuotationLineItem, EngineError> {
        self.ensure_mutable()?;
        let index = self
            .line_items
            .iter()
            .position(|line| line.id() == line_id)
            .ok_or_else(|| EngineError::LineItemNotFound(line_id.0.clone()))?;
        Ok(self.line_items.remove(index))
    }

    pub fn update_line(&mut self, line_id: &LineItemId, edit: LineEdit) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        let line = self
            .line_items
            .iter_mut()
            .find(|line| line.id() == line_id)
            .ok_or_else(|| EngineError::LineItemNotFound(line_id.0.clone()))?;
        line.apply_edit(&edit)?;
        self.line_items.sort_by_key(QuotationLineItem::position);
        Ok(())
    }

    /// Swap in a wholesale-rebuilt line set. Used by the explicit rebuild and
    /// renewal operations only.
    pub fn replace_lines(&mut self, lines: Vec<QuotationLineItem>) -> Result<(), EngineError> {
        self.ensure_mutable()?;
        self.line_items = lines;
        self.line_items.sort_by_key(QuotationLineItem::position);
        Ok(())
    }

    /// The stored override wins once set; otherwise the total is derived from
    /// lines and additional costs, with discounts subtracted.
    pub fn total(&self) -> Decimal {
        if let Some(total) = self.total_override {
            return total;
        }
        let lines: Decimal = self.line_items.iter().map(QuotationLineItem::line_total).sum();
        let extras: Decimal = self
            .additional_costs
            .iter()
            .map(|cost| match cost.category {
                AdditionalCostCategory::Discount => -cost.amount,
                _ => cost.amount,
            })
            .sum();
        round2(lines + extras)
    }

    fn ensure_mutable(&self) -> Result<(), EngineError> {
        if self.accepts_line_mutation() {
            return Ok(());
        }
        Err(EngineError::LineItemsLocked(self.status))
    }
}
