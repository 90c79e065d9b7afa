//! Quotation operations over the storage traits.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::domain::catalog::{AccessoryExpense, CatalogEntry, CatalogEntryId};
use crate::domain::quotation::{LineEdit, LineItemId, Quotation, QuotationId, QuotationStatus};
use crate::errors::EngineError;
use crate::snapshot::{self, CustomLineInput};
use crate::store::{CatalogStore, EngineEvent, EventSink, ParameterStore, QuotationStore};

/// Price drift observed when a line is rebuilt against current catalog
/// prices, shown to the operator during renewal.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PriceDelta {
    pub name: String,
    pub old_unit_price: Decimal,
    pub new_unit_price: Decimal,
}

pub struct QuotationService<P, C, Q> {
    params: Arc<P>,
    catalog: Arc<C>,
    quotations: Arc<Q>,
    events: Arc<dyn EventSink>,
}

impl<P, C, Q> QuotationService<P, C, Q>
where
    P: ParameterStore,
    C: CatalogStore,
    Q: QuotationStore,
{
    pub fn new(
        params: Arc<P>,
        catalog: Arc<C>,
        quotations: Arc<Q>,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self { params, catalog, quotations, events }
    }

    pub async fn create_draft(&self) -> Result<Quotation, EngineError> {
        let quotation = Quotation::new_draft(QuotationId(format!("quo-{}", Uuid::new_v4())));
        self.quotations.save(quotation.clone()).await?;
        Ok(quotation)
    }

    /// Snapshot a catalog entry into the quotation. After this the line has
    /// no live dependency on the entry.
    pub async fn add_catalog_line(
        &self,
        quotation_id: &QuotationId,
        entry_id: &CatalogEntryId,
        quantity: u32,
        unit_price_override: Option<Decimal>,
    ) -> Result<Quotation, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        let entry = self
            .catalog
            .find_by_id(entry_id)
            .await?
            .ok_or_else(|| EngineError::CatalogEntryNotFound(entry_id.0.clone()))?;
        let params = self.params.load_current().await?;

        let line = snapshot::from_catalog_entry(
            &entry,
            &params,
            quantity,
            unit_price_override,
            quotation.next_position(),
        )?;
        quotation.add_line(line)?;
        self.persist(quotation).await
    }

    /// Add an ad-hoc line with no catalog backing. With `save_to_catalog` the
    /// custom entry is additionally persisted as a new catalog entry — an
    /// explicit, opt-in side effect.
    pub async fn add_custom_line(
        &self,
        quotation_id: &QuotationId,
        input: CustomLineInput,
        save_to_catalog: bool,
    ) -> Result<Quotation, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        let line = snapshot::from_custom(&input, quotation.next_position())?;
        quotation.add_line(line)?;

        if save_to_catalog {
            let params = self.params.load_current().await?;
            let expenses = if input.expenses > Decimal::ZERO {
                vec![AccessoryExpense { name: "accessories".to_string(), amount: input.expenses }]
            } else {
                Vec::new()
            };
            let entry = CatalogEntry::new(
                CatalogEntryId(format!("cat-{}", Uuid::new_v4())),
                input.name.clone(),
                input.description.clone(),
                input.section_name.clone(),
                input.category_name.clone(),
                input.category_type,
                input.cost,
                expenses,
                &params,
            )?;
            tracing::info!(entry = %entry.id, "custom line saved back to catalog");
            self.catalog.save(entry).await?;
            self.events.emit(EngineEvent::CatalogChanged);
        }

        self.persist(quotation).await
    }

    pub async fn update_line(
        &self,
        quotation_id: &QuotationId,
        line_id: &LineItemId,
        edit: LineEdit,
    ) -> Result<Quotation, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        quotation.update_line(line_id, edit)?;
        self.persist(quotation).await
    }

    pub async fn remove_line(
        &self,
        quotation_id: &QuotationId,
        line_id: &LineItemId,
    ) -> Result<Quotation, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        quotation.remove_line(line_id)?;
        self.persist(quotation).await
    }

    pub async fn transition(
        &self,
        quotation_id: &QuotationId,
        next: QuotationStatus,
    ) -> Result<Quotation, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        quotation.transition_to(next)?;
        self.persist(quotation).await
    }

    /// Explicitly re-snapshot every catalog-backed line against current
    /// catalog prices, replacing snapshots wholesale. Custom lines and lines
    /// whose source entry has been deleted are kept as-is. Never runs
    /// implicitly.
    pub async fn rebuild_lines(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<PriceDelta>, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        let deltas = self.rebuild_into(&mut quotation).await?;
        self.persist(quotation).await?;
        Ok(deltas)
    }

    /// Reactivate an expired quotation. The renewal re-runs the snapshot
    /// builder against current prices and reports the drift per line.
    /// Only an expired quotation qualifies; a draft also transitions to
    /// Pending legally, but renewing it would clobber its lines.
    pub async fn renew_expired(
        &self,
        quotation_id: &QuotationId,
    ) -> Result<Vec<PriceDelta>, EngineError> {
        let mut quotation = self.load_quotation(quotation_id).await?;
        if quotation.status() != QuotationStatus::Expired {
            return Err(EngineError::InvalidTransition {
                from: quotation.status(),
                to: QuotationStatus::Pending,
            });
        }
        quotation.transition_to(QuotationStatus::Pending)?;
        let deltas = self.rebuild_into(&mut quotation).await?;
        self.persist(quotation).await?;
        Ok(deltas)
    }

    /// Time-driven expiration sweep; the clock and cutoff come from the
    /// caller. Returns how many pending quotations expired.
    pub async fn expire_pending(
        &self,
        now: DateTime<Utc>,
        max_age: Duration,
    ) -> Result<usize, EngineError> {
        let mut expired = 0;
        for mut quotation in self.quotations.list_pending().await? {
            if quotation.created_at + max_age <= now {
                quotation.transition_to(QuotationStatus::Expired)?;
                let id = quotation.id.clone();
                self.quotations.save(quotation).await?;
                self.events.emit(EngineEvent::QuotationChanged(id));
                expired += 1;
            }
        }
        Ok(expired)
    }

    async fn rebuild_into(
        &self,
        quotation: &mut Quotation,
    ) -> Result<Vec<PriceDelta>, EngineError> {
        let params = self.params.load_current().await?;
        let mut deltas = Vec::new();
        let mut rebuilt = Vec::with_capacity(quotation.lines().len());

        for line in quotation.lines() {
            let source_entry_id =
                line.snapshot().source_entry_id.as_ref().filter(|_| !line.is_custom());
            let Some(entry_id) = source_entry_id else {
                rebuilt.push(line.clone());
                continue;
            };
            let Some(entry) = self.catalog.find_by_id(entry_id).await? else {
                tracing::warn!(entry = %entry_id, "source entry gone, keeping frozen line");
                rebuilt.push(line.clone());
                continue;
            };

            let fresh = snapshot::from_catalog_entry(
                &entry,
                &params,
                line.quantity(),
                None,
                line.position(),
            )?;
            if fresh.unit_price() != line.unit_price() {
                deltas.push(PriceDelta {
                    name: fresh.snapshot().name.clone(),
                    old_unit_price: line.unit_price(),
                    new_unit_price: fresh.unit_price(),
                });
            }
            rebuilt.push(fresh);
        }

        quotation.replace_lines(rebuilt)?;
        Ok(deltas)
    }

    async fn load_quotation(&self, id: &QuotationId) -> Result<Quotation, EngineError> {
        self.quotations
            .find_by_id(id)
            .await?
            .ok_or_else(|| EngineError::QuotationNotFound(id.0.clone()))
    }

    async fn persist(&self, quotation: Quotation) -> Result<Quotation, EngineError> {
        self.quotations.save(quotation.clone()).await?;
        self.events.emit(EngineEvent::QuotationChanged(quotation.id.clone()));
        Ok(quotation)
    }
}
