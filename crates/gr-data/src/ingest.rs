//! Ingestion entry points for purchases, inventory snapshots, and market
//! prices.
//!
//! Validation happens here, before anything touches the store: a batch with
//! any invalid row is rejected wholesale, so the core never has to defend
//! against half-ingested uploads.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use gr_types::{
    CoreResult, InventorySnapshot, MarketPrice, PriceType, Purchase, Tenant, ValidationError,
};

use crate::store::Store;

/// One purchase row as uploaded, before ids and timestamps are assigned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurchaseRow {
    pub commodity: String,
    pub purchase_date: NaiveDate,
    pub delivery_start: NaiveDate,
    pub delivery_end: NaiveDate,
    pub quantity: Decimal,
    pub unit: String,
    pub price: Decimal,
    #[serde(default)]
    pub price_type: PriceType,
}

/// One inventory snapshot row as uploaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryRow {
    pub commodity: String,
    pub as_of: NaiveDate,
    pub quantity: Decimal,
}

/// Outcome of a successful batch ingestion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestReport {
    pub rows_accepted: usize,
    pub commodities_created: usize,
}

fn resolve_or_create_commodity(
    store: &Store,
    name: &str,
    unit: &str,
    created: &mut usize,
) -> Uuid {
    if let Some(existing) = store.commodity_by_name(name) {
        existing.id
    } else {
        let commodity = gr_types::Commodity::new(name, unit);
        let id = commodity.id;
        store.upsert_commodity(commodity);
        *created += 1;
        id
    }
}

/// Validate and ingest a batch of purchase rows for one tenant.
///
/// All-or-nothing: the first invalid row fails the whole batch and the store
/// is untouched. Unknown commodity names create new reference entries.
pub fn ingest_purchases(
    store: &Store,
    tenant: &Tenant,
    rows: Vec<PurchaseRow>,
) -> CoreResult<IngestReport> {
    let shard = store.shard(tenant.id)?;
    let mut created = 0usize;
    let mut purchases = Vec::with_capacity(rows.len());

    for row in rows {
        let commodity_id = resolve_or_create_commodity(store, &row.commodity, &row.unit, &mut created);
        let purchase = Purchase {
            id: Uuid::new_v4(),
            tenant_id: tenant.id,
            commodity_id,
            purchase_date: row.purchase_date,
            delivery_start: row.delivery_start,
            delivery_end: row.delivery_end,
            quantity: row.quantity,
            unit: row.unit,
            price: row.price,
            price_type: row.price_type,
            created_at: chrono::Utc::now(),
        };
        purchase.validate()?;
        purchases.push(purchase);
    }

    let accepted = purchases.len();
    shard.record_purchases(purchases);
    info!(
        tenant = %tenant.name,
        rows = accepted,
        commodities_created = created,
        "purchase batch ingested"
    );

    Ok(IngestReport {
        rows_accepted: accepted,
        commodities_created: created,
    })
}

/// Validate and ingest inventory snapshots. Commodity names must already
/// exist; a snapshot for an unknown commodity is a validation error, since
/// inventory without purchases nets nothing.
pub fn ingest_inventory(
    store: &Store,
    tenant: &Tenant,
    rows: Vec<InventoryRow>,
) -> CoreResult<IngestReport> {
    let shard = store.shard(tenant.id)?;
    let mut snapshots = Vec::with_capacity(rows.len());

    for row in rows {
        let commodity = store.commodity_by_name(&row.commodity).ok_or(
            ValidationError::UnknownCommodity {
                name: row.commodity.clone(),
            },
        )?;
        let snapshot = InventorySnapshot::new(tenant.id, commodity.id, row.as_of, row.quantity);
        snapshot.validate()?;
        snapshots.push(snapshot);
    }

    let accepted = snapshots.len();
    shard.record_inventory(snapshots);
    info!(tenant = %tenant.name, rows = accepted, "inventory batch ingested");

    Ok(IngestReport {
        rows_accepted: accepted,
        commodities_created: 0,
    })
}

/// Ingest externally sourced market prices. Prices are global, so no tenant
/// scoping here; only positivity is checked.
pub fn ingest_market_prices(store: &Store, prices: Vec<MarketPrice>) -> CoreResult<usize> {
    for price in &prices {
        if price.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice { price: price.price }.into());
        }
    }

    let accepted = prices.len();
    store.add_market_prices(prices);
    info!(rows = accepted, "market price batch ingested");
    Ok(accepted)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_types::CoreError;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn row(commodity: &str, quantity: Decimal) -> PurchaseRow {
        PurchaseRow {
            commodity: commodity.into(),
            purchase_date: d(2026, 1, 10),
            delivery_start: d(2026, 4, 1),
            delivery_end: d(2026, 4, 30),
            quantity,
            unit: "lb".into(),
            price: dec!(0.47),
            price_type: PriceType::Fixed,
        }
    }

    #[test]
    fn valid_batch_accepted_and_commodity_created() {
        let store = Store::new();
        let tenant = Tenant::new("mill");
        store.register_tenant(tenant.clone());

        let report =
            ingest_purchases(&store, &tenant, vec![row("sugar", dec!(100_000))]).unwrap();
        assert_eq!(report.rows_accepted, 1);
        assert_eq!(report.commodities_created, 1);

        let shard = store.shard(tenant.id).unwrap();
        assert_eq!(shard.read().purchases.len(), 1);
        assert!(store.commodity_by_name("sugar").is_some());
    }

    #[test]
    fn invalid_row_rejects_whole_batch() {
        let store = Store::new();
        let tenant = Tenant::new("mill");
        store.register_tenant(tenant.clone());

        let result = ingest_purchases(
            &store,
            &tenant,
            vec![row("sugar", dec!(100)), row("flour", dec!(-5))],
        );
        assert!(matches!(result, Err(CoreError::Validation(_))));

        let shard = store.shard(tenant.id).unwrap();
        assert!(shard.read().purchases.is_empty());
    }

    #[test]
    fn inventory_requires_known_commodity() {
        let store = Store::new();
        let tenant = Tenant::new("mill");
        store.register_tenant(tenant.clone());

        let result = ingest_inventory(
            &store,
            &tenant,
            vec![InventoryRow {
                commodity: "cocoa".into(),
                as_of: d(2026, 1, 1),
                quantity: dec!(100),
            }],
        );
        assert!(matches!(
            result,
            Err(CoreError::Validation(ValidationError::UnknownCommodity { .. }))
        ));
    }

    #[test]
    fn inventory_accepted_for_known_commodity() {
        let store = Store::new();
        let tenant = Tenant::new("mill");
        store.register_tenant(tenant.clone());
        ingest_purchases(&store, &tenant, vec![row("sugar", dec!(100))]).unwrap();

        let report = ingest_inventory(
            &store,
            &tenant,
            vec![InventoryRow {
                commodity: "sugar".into(),
                as_of: d(2026, 1, 1),
                quantity: dec!(500),
            }],
        )
        .unwrap();
        assert_eq!(report.rows_accepted, 1);
    }

    #[test]
    fn non_positive_market_price_rejected() {
        let store = Store::new();
        let sugar = Uuid::new_v4();
        let result = ingest_market_prices(
            &store,
            vec![MarketPrice::spot(sugar, d(2026, 1, 1), dec!(0), "t")],
        );
        assert!(result.is_err());
    }
}
