pub mod config;
pub mod domain;
pub mod errors;
pub mod pricing;
pub mod recalc;
pub mod service;
pub mod snapshot;
pub mod store;

pub use config::{ConfigError, DatabaseConfig, EngineConfig, LoggingConfig};
pub use domain::catalog::{AccessoryExpense, CatalogCategory, CatalogEntry, CatalogEntryId};
pub use domain::params::PricingParameters;
pub use domain::quotation::{
    AdditionalCost, AdditionalCostCategory, LineEdit, LineItemId, LineSnapshot, Quotation,
    QuotationId, QuotationLineItem, QuotationStatus,
};
pub use errors::EngineError;
pub use pricing::{PriceBreakdown, PriceQuote};
pub use recalc::{RecalculationService, RecomputeReport};
pub use service::{PriceDelta, QuotationService};
pub use snapshot::CustomLineInput;
pub use store::{CatalogStore, EngineEvent, EventSink, NullSink, ParameterStore, QuotationStore};
