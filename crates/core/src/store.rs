//! Storage traits the engine is generic over, plus the change-notification
//! hook downstream caches subscribe through.

use async_trait::async_trait;

use crate::domain::catalog::{CatalogEntry, CatalogEntryId};
use crate::domain::params::PricingParameters;
use crate::domain::quotation::{Quotation, QuotationId};
use crate::errors::EngineError;
use crate::pricing::PriceQuote;

/// Singleton pricing parameters. Last writer wins; no optimistic locking,
/// because the catalog recompute re-converges from whatever is current.
#[async_trait]
pub trait ParameterStore: Send + Sync {
    async fn load_current(&self) -> Result<PricingParameters, EngineError>;
    async fn save_current(&self, params: PricingParameters) -> Result<(), EngineError>;
}

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn find_by_id(&self, id: &CatalogEntryId) -> Result<Option<CatalogEntry>, EngineError>;
    async fn list_all(&self) -> Result<Vec<CatalogEntry>, EngineError>;
    async fn save(&self, entry: CatalogEntry) -> Result<(), EngineError>;
    /// Write the cached derived pair only. The single legitimate writer is
    /// the recalculation pass.
    async fn update_derived(
        &self,
        id: &CatalogEntryId,
        derived: PriceQuote,
    ) -> Result<(), EngineError>;
    async fn delete(&self, id: &CatalogEntryId) -> Result<(), EngineError>;
}

#[async_trait]
pub trait QuotationStore: Send + Sync {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, EngineError>;
    async fn save(&self, quotation: Quotation) -> Result<(), EngineError>;
    async fn list_pending(&self) -> Result<Vec<Quotation>, EngineError>;
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum EngineEvent {
    CatalogChanged,
    QuotationChanged(QuotationId),
}

/// Receives a signal after catalog repricing or quotation mutation so that
/// downstream cached views can invalidate themselves.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

/// Default sink for embedders that have nothing to invalidate.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullSink;

impl EventSink for NullSink {
    fn emit(&self, _event: EngineEvent) {}
}
