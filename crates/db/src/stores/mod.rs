//! SQLite and in-memory implementations of the core storage traits.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tarifario_core::errors::EngineError;

pub mod catalog;
pub mod memory;
pub mod params;
pub mod quotation;

pub use catalog::SqlCatalogStore;
pub use memory::{
    FlakyCatalogStore, InMemoryCatalogStore, InMemoryParameterStore, InMemoryQuotationStore,
    RecordingSink,
};
pub use params::SqlParameterStore;
pub use quotation::SqlQuotationStore;

pub(crate) fn db_error(error: sqlx::Error) -> EngineError {
    EngineError::Storage(format!("database error: {error}"))
}

pub(crate) fn decode_error(reason: impl Into<String>) -> EngineError {
    EngineError::Storage(format!("decode error: {}", reason.into()))
}

pub(crate) fn parse_decimal(field: &str, value: &str) -> Result<Decimal, EngineError> {
    Decimal::from_str(value)
        .map_err(|error| decode_error(format!("invalid decimal for {field}: {error}")))
}

pub(crate) fn parse_timestamp(field: &str, value: &str) -> Result<DateTime<Utc>, EngineError> {
    DateTime::parse_from_rfc3339(value)
        .map(|timestamp| timestamp.with_timezone(&Utc))
        .map_err(|error| decode_error(format!("invalid timestamp for {field}: {error}")))
}
