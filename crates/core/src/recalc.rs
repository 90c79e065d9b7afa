//! Catalog-wide recomputation of cached derived prices.
//!
//! A parameter update is two sequential, independently retriable phases:
//! persist the new parameters, then re-derive every catalog entry from them.
//! The second phase is best-effort and idempotent, so a partial failure never
//! rolls anything back; re-triggering the pass converges to the same state.

use std::sync::Arc;

use crate::domain::catalog::CatalogEntryId;
use crate::domain::params::PricingParameters;
use crate::errors::EngineError;
use crate::pricing::{self, PriceQuote};
use crate::store::{CatalogStore, EngineEvent, EventSink, ParameterStore};

/// Outcome of one bulk pass. Callers get counts, not line-by-line status;
/// failed entries are logged with their identity for retry.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RecomputeReport {
    pub total: usize,
    pub updated: usize,
    pub failed: usize,
}

impl RecomputeReport {
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

pub struct RecalculationService<P, C> {
    params: Arc<P>,
    catalog: Arc<C>,
    events: Arc<dyn EventSink>,
}

impl<P: ParameterStore, C: CatalogStore> RecalculationService<P, C> {
    pub fn new(params: Arc<P>, catalog: Arc<C>, events: Arc<dyn EventSink>) -> Self {
        Self { params, catalog, events }
    }

    /// Validate and persist new parameters, then reprice the whole catalog.
    ///
    /// The parameter write must succeed; the recompute that follows may
    /// complete partially, reported through [`RecomputeReport`]. Existing
    /// quotation line items are never touched.
    pub async fn update_parameters(
        &self,
        new: PricingParameters,
    ) -> Result<RecomputeReport, EngineError> {
        new.validate()?;
        self.params.save_current(new).await?;
        tracing::info!("pricing parameters updated, starting catalog recompute");
        self.recompute_all().await
    }

    /// Reprice every catalog entry against the currently stored parameters.
    /// Safe to re-trigger at any time as a repair action.
    pub async fn recompute_all(&self) -> Result<RecomputeReport, EngineError> {
        let params = self.params.load_current().await?;
        let entries = self.catalog.list_all().await?;

        let mut report = RecomputeReport { total: entries.len(), ..Default::default() };
        for entry in entries {
            let derived = pricing::price(
                entry.cost,
                entry.accessory_expenses_total(),
                entry.category,
                &params,
            );
            match self.catalog.update_derived(&entry.id, derived).await {
                Ok(()) => {
                    report.updated += 1;
                    tracing::debug!(entry = %entry.id, price = %derived.public_price, "entry repriced");
                }
                Err(error) => {
                    report.failed += 1;
                    tracing::warn!(entry = %entry.id, %error, "entry reprice failed, continuing");
                }
            }
        }

        tracing::info!(
            total = report.total,
            updated = report.updated,
            failed = report.failed,
            "catalog recompute pass finished"
        );
        self.events.emit(EngineEvent::CatalogChanged);
        Ok(report)
    }

    /// Reprice a single entry, used right after a direct edit to its cost or
    /// expenses rather than waiting for the next global pass.
    pub async fn recompute_entry(&self, id: &CatalogEntryId) -> Result<PriceQuote, EngineError> {
        let params = self.params.load_current().await?;
        let entry = self
            .catalog
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::CatalogEntryNotFound(id.0.clone()))?;

        let derived = pricing::price(
            entry.cost,
            entry.accessory_expenses_total(),
            entry.category,
            &params,
        );
        self.catalog.update_derived(id, derived).await?;
        self.events.emit(EngineEvent::CatalogChanged);
        Ok(derived)
    }
}
