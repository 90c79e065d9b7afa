//! In-memory stores for deterministic tests, plus a failure-injecting
//! catalog store used to exercise the best-effort recompute path.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;
use tokio::sync::RwLock;

use tarifario_core::domain::catalog::{CatalogEntry, CatalogEntryId};
use tarifario_core::domain::params::PricingParameters;
use tarifario_core::domain::quotation::{Quotation, QuotationId, QuotationStatus};
use tarifario_core::errors::EngineError;
use tarifario_core::pricing::PriceQuote;
use tarifario_core::store::{CatalogStore, EngineEvent, EventSink, ParameterStore, QuotationStore};

#[derive(Default)]
pub struct InMemoryParameterStore {
    params: RwLock<PricingParameters>,
}

#[async_trait]
impl ParameterStore for InMemoryParameterStore {
    async fn load_current(&self) -> Result<PricingParameters, EngineError> {
        Ok(self.params.read().await.clone())
    }

    async fn save_current(&self, params: PricingParameters) -> Result<(), EngineError> {
        *self.params.write().await = params;
        Ok(())
    }
}

#[derive(Default)]
pub struct InMemoryCatalogStore {
    entries: RwLock<HashMap<String, CatalogEntry>>,
}

fn with_derived(entry: &CatalogEntry, derived: PriceQuote) -> CatalogEntry {
    CatalogEntry::from_stored(
        entry.id.clone(),
        entry.name.clone(),
        entry.description.clone(),
        entry.section_name.clone(),
        entry.category_name.clone(),
        entry.category,
        entry.cost,
        entry.accessory_expenses.clone(),
        derived,
        entry.created_at,
    )
}

#[async_trait]
impl CatalogStore for InMemoryCatalogStore {
    async fn find_by_id(&self, id: &CatalogEntryId) -> Result<Option<CatalogEntry>, EngineError> {
        Ok(self.entries.read().await.get(&id.0).cloned())
    }

    async fn list_all(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        let entries = self.entries.read().await;
        let mut all: Vec<CatalogEntry> = entries.values().cloned().collect();
        all.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(all)
    }

    async fn save(&self, entry: CatalogEntry) -> Result<(), EngineError> {
        self.entries.write().await.insert(entry.id.0.clone(), entry);
        Ok(())
    }

    async fn update_derived(
        &self,
        id: &CatalogEntryId,
        derived: PriceQuote,
    ) -> Result<(), EngineError> {
        let mut entries = self.entries.write().await;
        let entry = entries
            .get(&id.0)
            .ok_or_else(|| EngineError::CatalogEntryNotFound(id.0.clone()))?;
        let updated = with_derived(entry, derived);
        entries.insert(id.0.clone(), updated);
        Ok(())
    }

    async fn delete(&self, id: &CatalogEntryId) -> Result<(), EngineError> {
        self.entries.write().await.remove(&id.0);
        Ok(())
    }
}

/// Wraps a catalog store and fails `update_derived` for a chosen set of
/// entries, simulating a partially failing bulk pass.
pub struct FlakyCatalogStore {
    inner: InMemoryCatalogStore,
    failing: HashSet<String>,
}

impl FlakyCatalogStore {
    pub fn new(inner: InMemoryCatalogStore, failing: impl IntoIterator<Item = String>) -> Self {
        Self { inner, failing: failing.into_iter().collect() }
    }
}

#[async_trait]
impl CatalogStore for FlakyCatalogStore {
    async fn find_by_id(&self, id: &CatalogEntryId) -> Result<Option<CatalogEntry>, EngineError> {
        self.inner.find_by_id(id).await
    }

    async fn list_all(&self) -> Result<Vec<CatalogEntry>, EngineError> {
        self.inner.list_all().await
    }

    async fn save(&self, entry: CatalogEntry) -> Result<(), EngineError> {
        self.inner.save(entry).await
    }

    async fn update_derived(
        &self,
        id: &CatalogEntryId,
        derived: PriceQuote,
    ) -> Result<(), EngineError> {
        if self.failing.contains(&id.0) {
            return Err(EngineError::Storage(format!("injected write failure for `{}`", id.0)));
        }
        self.inner.update_derived(id, derived).await
    }

    async fn delete(&self, id: &CatalogEntryId) -> Result<(), EngineError> {
        self.inner.delete(id).await
    }
}

#[derive(Default)]
pub struct InMemoryQuotationStore {
    quotations: RwLock<HashMap<String, Quotation>>,
}

#[async_trait]
impl QuotationStore for InMemoryQuotationStore {
    async fn find_by_id(&self, id: &QuotationId) -> Result<Option<Quotation>, EngineError> {
        Ok(self.quotations.read().await.get(&id.0).cloned())
    }

    async fn save(&self, quotation: Quotation) -> Result<(), EngineError> {
        self.quotations.write().await.insert(quotation.id.0.clone(), quotation);
        Ok(())
    }

    async fn list_pending(&self) -> Result<Vec<Quotation>, EngineError> {
        let quotations = self.quotations.read().await;
        let mut pending: Vec<Quotation> = quotations
            .values()
            .filter(|quotation| quotation.status() == QuotationStatus::Pending)
            .cloned()
            .collect();
        pending.sort_by(|a, b| a.id.0.cmp(&b.id.0));
        Ok(pending)
    }
}

/// Collects emitted engine events for assertions.
#[derive(Default)]
pub struct RecordingSink {
    events: Mutex<Vec<EngineEvent>>,
}

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().expect("sink lock").clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&self, event: EngineEvent) {
        self.events.lock().expect("sink lock").push(event);
    }
}
