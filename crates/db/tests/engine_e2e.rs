//! End-to-end engine scenarios against a sqlite-backed store stack.

use std::sync::Arc;

use chrono::Duration;
use rust_decimal::Decimal;

use tarifario_core::domain::catalog::{CatalogCategory, CatalogEntry, CatalogEntryId};
use tarifario_core::domain::params::PricingParameters;
use tarifario_core::domain::quotation::QuotationStatus;
use tarifario_core::errors::EngineError;
use tarifario_core::recalc::RecalculationService;
use tarifario_core::service::QuotationService;
use tarifario_core::snapshot::CustomLineInput;
use tarifario_core::store::{CatalogStore, NullSink, ParameterStore, QuotationStore};
use tarifario_db::{
    connect_with_settings, migrations, DbPool, SqlCatalogStore, SqlParameterStore,
    SqlQuotationStore,
};

struct Engine {
    pool: DbPool,
    params: Arc<SqlParameterStore>,
    catalog: Arc<SqlCatalogStore>,
    quotations: Arc<SqlQuotationStore>,
    recalc: RecalculationService<SqlParameterStore, SqlCatalogStore>,
    service: QuotationService<SqlParameterStore, SqlCatalogStore, SqlQuotationStore>,
}

async fn engine() -> Engine {
    let pool = connect_with_settings("sqlite::memory:", 1, 30)
        .await
        .expect("connect test pool");
    migrations::run_pending(&pool).await.expect("run migrations");

    let params = Arc::new(SqlParameterStore::new(pool.clone()));
    let catalog = Arc::new(SqlCatalogStore::new(pool.clone()));
    let quotations = Arc::new(SqlQuotationStore::new(pool.clone()));
    let events = Arc::new(NullSink);

    Engine {
        pool,
        params: params.clone(),
        catalog: catalog.clone(),
        quotations: quotations.clone(),
        recalc: RecalculationService::new(params.clone(), catalog.clone(), events.clone()),
        service: QuotationService::new(params, catalog, quotations.clone(), events),
    }
}

fn initial_params() -> PricingParameters {
    PricingParameters {
        service_margin_rate: Decimal::new(20, 2),
        product_margin_rate: Decimal::new(20, 2),
        sales_commission_rate: Decimal::ZERO,
        markup_rate: Decimal::ZERO,
    }
}

async fn seed_entry(engine: &Engine, id: &str, cost: i64) -> CatalogEntry {
    let params = engine.params.load_current().await.expect("load params");
    let entry = CatalogEntry::new(
        CatalogEntryId(id.to_string()),
        "Aromatherapy session",
        "45 minutes",
        "Wellness",
        "Therapies",
        CatalogCategory::Service,
        Decimal::new(cost, 2),
        vec![],
        &params,
    )
    .expect("valid entry");
    engine.catalog.save(entry.clone()).await.expect("save entry");
    entry
}

#[tokio::test]
async fn parameter_change_reprices_catalog_but_not_existing_snapshots() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set initial params");

    let entry = seed_entry(&engine, "svc-1", 5000).await;
    assert_eq!(entry.utility(), Decimal::new(1000, 2));
    assert_eq!(entry.public_price(), Decimal::new(6000, 2));

    let quotation = engine.service.create_draft().await.expect("create draft");
    let quotation = engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 2, None)
        .await
        .expect("add catalog line");

    let line = &quotation.lines()[0];
    assert_eq!(line.unit_price(), Decimal::new(6000, 2));
    assert_eq!(line.snapshot().public_price, Decimal::new(6000, 2));
    assert_eq!(line.quantity(), 2);

    // Raise the service margin and fan the change out across the catalog.
    let mut steeper = initial_params();
    steeper.service_margin_rate = Decimal::new(50, 2);
    let report = engine.recalc.update_parameters(steeper).await.expect("update params");
    assert_eq!(report.total, 1);
    assert!(report.is_clean());

    let repriced = engine
        .catalog
        .find_by_id(&entry.id)
        .await
        .expect("find entry")
        .expect("entry present");
    assert_eq!(repriced.public_price(), Decimal::new(7500, 2));

    // The already-issued snapshot is frozen.
    let reloaded = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    assert_eq!(reloaded.lines()[0].snapshot().public_price, Decimal::new(6000, 2));
    assert_eq!(reloaded.lines()[0].unit_price(), Decimal::new(6000, 2));

    engine.pool.close().await;
}

#[tokio::test]
async fn recompute_is_idempotent() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    seed_entry(&engine, "svc-1", 5000).await;
    seed_entry(&engine, "svc-2", 12000).await;

    engine.recalc.recompute_all().await.expect("first pass");
    let after_first = engine.catalog.list_all().await.expect("list");

    let report = engine.recalc.recompute_all().await.expect("second pass");
    let after_second = engine.catalog.list_all().await.expect("list again");

    assert!(report.is_clean());
    assert_eq!(after_first, after_second);

    engine.pool.close().await;
}

#[tokio::test]
async fn custom_line_is_independent_of_catalog_state() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");

    let quotation = engine.service.create_draft().await.expect("create draft");
    let input = CustomLineInput {
        name: "Anniversary package".to_string(),
        description: "One-off".to_string(),
        section_name: "Events".to_string(),
        category_name: "Packages".to_string(),
        category_type: CatalogCategory::Service,
        cost: Decimal::new(10000, 2),
        expenses: Decimal::new(1500, 2),
        unit_price: Decimal::new(20000, 2),
        quantity: 1,
    };
    let quotation = engine
        .service
        .add_custom_line(&quotation.id, input, false)
        .await
        .expect("add custom line");

    let line = &quotation.lines()[0];
    assert!(line.is_custom());
    assert_eq!(line.snapshot().source_entry_id, None);

    // No catalog entry was created without opting in.
    assert!(engine.catalog.list_all().await.expect("list").is_empty());

    engine.pool.close().await;
}

#[tokio::test]
async fn custom_line_can_opt_into_catalog_persistence() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");

    let quotation = engine.service.create_draft().await.expect("create draft");
    let input = CustomLineInput {
        name: "Hot oil treatment".to_string(),
        description: String::new(),
        section_name: "Beauty".to_string(),
        category_name: "Hair".to_string(),
        category_type: CatalogCategory::Service,
        cost: Decimal::new(4000, 2),
        expenses: Decimal::ZERO,
        unit_price: Decimal::new(6500, 2),
        quantity: 1,
    };
    engine
        .service
        .add_custom_line(&quotation.id, input, true)
        .await
        .expect("add custom line with save");

    let entries = engine.catalog.list_all().await.expect("list");
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].name, "Hot oil treatment");
    // The saved entry is priced by the calculator, not by the ad-hoc price.
    assert_eq!(entries[0].public_price(), Decimal::new(4800, 2));

    engine.pool.close().await;
}

#[tokio::test]
async fn renewal_rebuilds_snapshots_and_reports_price_drift() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    let entry = seed_entry(&engine, "svc-1", 5000).await;

    let quotation = engine.service.create_draft().await.expect("create draft");
    let quotation = engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 1, None)
        .await
        .expect("add line");
    engine
        .service
        .transition(&quotation.id, QuotationStatus::Pending)
        .await
        .expect("draft -> pending");

    // Time passes, the quotation expires, and the margin goes up meanwhile.
    let created_at = quotation.created_at;
    let expired = engine
        .service
        .expire_pending(created_at + Duration::days(31), Duration::days(30))
        .await
        .expect("expiration sweep");
    assert_eq!(expired, 1);

    let mut steeper = initial_params();
    steeper.service_margin_rate = Decimal::new(50, 2);
    engine.recalc.update_parameters(steeper).await.expect("update params");

    let deltas = engine.service.renew_expired(&quotation.id).await.expect("renew");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].old_unit_price, Decimal::new(6000, 2));
    assert_eq!(deltas[0].new_unit_price, Decimal::new(7500, 2));

    let renewed = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    assert_eq!(renewed.status(), QuotationStatus::Pending);
    assert_eq!(renewed.lines()[0].snapshot().public_price, Decimal::new(7500, 2));

    engine.pool.close().await;
}

#[tokio::test]
async fn renewal_requires_an_expired_quotation() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    let entry = seed_entry(&engine, "svc-1", 5000).await;

    let quotation = engine.service.create_draft().await.expect("create draft");
    engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 1, Some(Decimal::new(5500, 2)))
        .await
        .expect("add line with manual price");

    let error = engine
        .service
        .renew_expired(&quotation.id)
        .await
        .expect_err("a draft cannot be renewed");
    assert!(matches!(
        error,
        EngineError::InvalidTransition {
            from: QuotationStatus::Draft,
            to: QuotationStatus::Pending
        }
    ));

    // The draft and its manual price survive the rejected call.
    let reloaded = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    assert_eq!(reloaded.status(), QuotationStatus::Draft);
    assert_eq!(reloaded.lines()[0].unit_price(), Decimal::new(5500, 2));

    engine.pool.close().await;
}

#[tokio::test]
async fn rebuild_keeps_lines_whose_source_entry_was_deleted() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    let entry = seed_entry(&engine, "svc-1", 5000).await;

    let quotation = engine.service.create_draft().await.expect("create draft");
    engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 1, None)
        .await
        .expect("add line");

    engine.catalog.delete(&entry.id).await.expect("delete entry");
    let mut steeper = initial_params();
    steeper.service_margin_rate = Decimal::new(50, 2);
    engine.recalc.update_parameters(steeper).await.expect("update params");

    let deltas = engine.service.rebuild_lines(&quotation.id).await.expect("rebuild");
    assert!(deltas.is_empty());

    // The orphaned line stays frozen at its original snapshot and price.
    let reloaded = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    assert_eq!(reloaded.lines().len(), 1);
    assert_eq!(reloaded.lines()[0].unit_price(), Decimal::new(6000, 2));
    assert_eq!(reloaded.lines()[0].snapshot().public_price, Decimal::new(6000, 2));
    assert_eq!(
        reloaded.lines()[0].snapshot().source_entry_id,
        Some(entry.id.clone())
    );

    engine.pool.close().await;
}

#[tokio::test]
async fn explicit_rebuild_resnapshots_catalog_lines_but_not_custom_ones() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    let entry = seed_entry(&engine, "svc-1", 5000).await;

    let quotation = engine.service.create_draft().await.expect("create draft");
    engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 1, None)
        .await
        .expect("add catalog line");
    let input = CustomLineInput {
        name: "Gift wrap".to_string(),
        description: String::new(),
        section_name: "Extras".to_string(),
        category_name: "Extras".to_string(),
        category_type: CatalogCategory::Service,
        cost: Decimal::new(500, 2),
        expenses: Decimal::ZERO,
        unit_price: Decimal::new(1200, 2),
        quantity: 1,
    };
    engine
        .service
        .add_custom_line(&quotation.id, input, false)
        .await
        .expect("add custom line");

    let mut steeper = initial_params();
    steeper.service_margin_rate = Decimal::new(50, 2);
    engine.recalc.update_parameters(steeper).await.expect("update params");

    let deltas = engine.service.rebuild_lines(&quotation.id).await.expect("rebuild");
    assert_eq!(deltas.len(), 1);
    assert_eq!(deltas[0].old_unit_price, Decimal::new(6000, 2));
    assert_eq!(deltas[0].new_unit_price, Decimal::new(7500, 2));

    let rebuilt = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    let catalog_line =
        rebuilt.lines().iter().find(|line| !line.is_custom()).expect("catalog line");
    let custom_line = rebuilt.lines().iter().find(|line| line.is_custom()).expect("custom line");
    assert_eq!(catalog_line.unit_price(), Decimal::new(7500, 2));
    assert_eq!(custom_line.unit_price(), Decimal::new(1200, 2));

    engine.pool.close().await;
}

#[tokio::test]
async fn deleting_the_source_entry_leaves_issued_lines_intact() {
    let engine = engine().await;
    engine.recalc.update_parameters(initial_params()).await.expect("set params");
    let entry = seed_entry(&engine, "svc-1", 5000).await;

    let quotation = engine.service.create_draft().await.expect("create draft");
    let quotation = engine
        .service
        .add_catalog_line(&quotation.id, &entry.id, 1, None)
        .await
        .expect("add line");

    engine.catalog.delete(&entry.id).await.expect("delete entry");

    let reloaded = engine
        .quotations
        .find_by_id(&quotation.id)
        .await
        .expect("find quotation")
        .expect("quotation present");
    assert_eq!(reloaded.lines().len(), 1);
    assert_eq!(reloaded.lines()[0].snapshot().name, "Aromatherapy session");
    assert_eq!(
        reloaded.lines()[0].snapshot().source_entry_id,
        Some(entry.id.clone())
    );

    engine.pool.close().await;
}
