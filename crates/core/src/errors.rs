use thiserror::Error;

use crate::domain::quotation::QuotationStatus;

/// Engine-level error taxonomy.
///
/// `Validation` and the not-found variants are recoverable boundary failures
/// and always name the offending field or record. `Storage` wraps whatever the
/// backing store reports; the engine never inspects its contents.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum EngineError {
    #[error("validation failed for `{field}`: {message}")]
    Validation { field: &'static str, message: String },
    #[error("catalog entry `{0}` not found")]
    CatalogEntryNotFound(String),
    #[error("quotation `{0}` not found")]
    QuotationNotFound(String),
    #[error("line item `{0}` not found on quotation")]
    LineItemNotFound(String),
    #[error("invalid quotation transition from {from:?} to {to:?}")]
    InvalidTransition { from: QuotationStatus, to: QuotationStatus },
    #[error("quotation in {0:?} state does not accept line item changes")]
    LineItemsLocked(QuotationStatus),
    #[error("storage failure: {0}")]
    Storage(String),
}

impl EngineError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation { field, message: message.into() }
    }
}
