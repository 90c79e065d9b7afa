use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::catalog::CatalogCategory;
use crate::errors::EngineError;

/// Global margin/commission configuration. A single record is current at any
/// time; storage keeps it as a last-writer-wins singleton.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingParameters {
    pub service_margin_rate: Decimal,
    pub product_margin_rate: Decimal,
    pub sales_commission_rate: Decimal,
    pub markup_rate: Decimal,
}

impl PricingParameters {
    /// Every rate must sit in `[0, 1)`. The commission bound doubles as the
    /// guard against a zero or negative gross-up denominator.
    pub fn validate(&self) -> Result<(), EngineError> {
        check_rate("service_margin_rate", self.service_margin_rate)?;
        check_rate("product_margin_rate", self.product_margin_rate)?;
        check_rate("sales_commission_rate", self.sales_commission_rate)?;
        check_rate("markup_rate", self.markup_rate)?;
        Ok(())
    }

    pub fn margin_rate_for(&self, category: CatalogCategory) -> Decimal {
        match category {
            CatalogCategory::Service => self.service_margin_rate,
            CatalogCategory::Product => self.product_margin_rate,
        }
    }
}

fn check_rate(field: &'static str, value: Decimal) -> Result<(), EngineError> {
    if value < Decimal::ZERO || value >= Decimal::ONE {
        return Err(EngineError::validation(field, format!("rate `{value}` must be within [0, 1)")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::PricingParameters;
    use crate::domain::catalog::CatalogCategory;
    use crate::errors::EngineError;

    fn params() -> PricingParameters {
        PricingParameters {
            service_margin_rate: Decimal::new(30, 2),
            product_margin_rate: Decimal::new(25, 2),
            sales_commission_rate: Decimal::new(10, 2),
            markup_rate: Decimal::new(5, 2),
        }
    }

    #[test]
    fn accepts_rates_within_unit_interval() {
        params().validate().expect("valid parameters");
    }

    #[test]
    fn rejects_rate_of_one_or_more() {
        let mut bad = params();
        bad.sales_commission_rate = Decimal::ONE;
        let error = bad.validate().expect_err("commission rate 1.0 must be rejected");
        assert!(matches!(
            error,
            EngineError::Validation { field: "sales_commission_rate", .. }
        ));
    }

    #[test]
    fn rejects_negative_rate() {
        let mut bad = params();
        bad.markup_rate = Decimal::new(-1, 2);
        let error = bad.validate().expect_err("negative markup must be rejected");
        assert!(matches!(error, EngineError::Validation { field: "markup_rate", .. }));
    }

    #[test]
    fn margin_rate_is_selected_by_category() {
        let params = params();
        assert_eq!(params.margin_rate_for(CatalogCategory::Service), Decimal::new(30, 2));
        assert_eq!(params.margin_rate_for(CatalogCategory::Product), Decimal::new(25, 2));
    }
}
