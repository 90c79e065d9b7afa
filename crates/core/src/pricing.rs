//! Public-price derivation.
//!
//! The calculator is a pure function: no I/O, no clock, no randomness.
//! Identical inputs always produce identical outputs, which is what makes
//! quotation snapshots reproducible and the bulk recompute idempotent.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CatalogCategory;
use crate::domain::params::PricingParameters;

/// Currency rounding: two decimal places, half-up.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// The derived pair cached on every catalog entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceQuote {
    pub utility: Decimal,
    pub public_price: Decimal,
}

/// Every intermediate amount of the derivation, for display and audit.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceBreakdown {
    pub margin_rate: Decimal,
    pub utility: Decimal,
    pub subtotal: Decimal,
    pub markup_amount: Decimal,
    pub grossed_subtotal: Decimal,
    pub public_price: Decimal,
}

impl PriceBreakdown {
    pub fn quote(&self) -> PriceQuote {
        PriceQuote { utility: self.utility, public_price: self.public_price }
    }
}

/// Derive `{utility, public_price}` from cost, accessory expenses, and the
/// current parameters. Each intermediate step is rounded to two decimals
/// before feeding the next one.
pub fn price(
    cost: Decimal,
    expenses_total: Decimal,
    category: CatalogCategory,
    params: &PricingParameters,
) -> PriceQuote {
    price_with_breakdown(cost, expenses_total, category, params).quote()
}

/// Same derivation as [`price`], keeping every named intermediate amount.
///
/// A commission rate at or above 100% makes the gross-up denominator
/// non-positive; the public price is then defined as zero. Callers must treat
/// a zero public price on a nonzero-cost item as a misconfigured commission
/// rate, not as a free item.
pub fn price_with_breakdown(
    cost: Decimal,
    expenses_total: Decimal,
    category: CatalogCategory,
    params: &PricingParameters,
) -> PriceBreakdown {
    let margin_rate = params.margin_rate_for(category);
    let utility = round2(cost * margin_rate);
    let subtotal = round2(cost + expenses_total + utility);
    let markup_amount = round2(subtotal * params.markup_rate);
    let grossed_subtotal = round2(subtotal + markup_amount);

    let denominator = Decimal::ONE - params.sales_commission_rate;
    let public_price = if denominator > Decimal::ZERO {
        round2(grossed_subtotal / denominator)
    } else {
        Decimal::ZERO
    };

    PriceBreakdown { margin_rate, utility, subtotal, markup_amount, grossed_subtotal, public_price }
}
