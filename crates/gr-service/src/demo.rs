//! Deterministic demo seed.
//!
//! Creates a demo tenant with two commodities, enough spot history for a
//! volatility estimate, a realistic purchase book and inventory position, and
//! a fresh mock forward curve. Used by the standalone binary on startup and
//! by integration tests that need a populated store.

use chrono::{Duration, NaiveDate};
use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use gr_data::{ingest_market_prices, InventoryRow, PurchaseRow};
use gr_types::{dates, CoreResult, MarketPrice, PriceType, Tenant, UserAccount};

use crate::api::Api;

pub const DEMO_SEED_SOURCE: &str = "demo_seed";

/// Handles to the seeded entities.
#[derive(Debug, Clone)]
pub struct DemoSeed {
    pub tenant: Tenant,
    pub user: UserAccount,
    pub as_of: NaiveDate,
}

/// Alternating spot series ending the day before `as_of`. The wiggle gives a
/// stable, known volatility so demo VaR numbers are plausible.
fn spot_series(
    commodity_id: Uuid,
    as_of: NaiveDate,
    low: Decimal,
    high: Decimal,
    points: i64,
) -> Vec<MarketPrice> {
    (0..points)
        .map(|i| {
            let price = if i % 2 == 0 { low } else { high };
            MarketPrice::spot(
                commodity_id,
                as_of - Duration::days(points - i),
                price,
                DEMO_SEED_SOURCE,
            )
        })
        .collect()
}

/// Last day of the month containing `d`.
fn month_end(d: NaiveDate) -> NaiveDate {
    dates::add_months(dates::month_start(d), 1) - Duration::days(1)
}

/// Seed the demo tenant. Idempotence is not a goal; call once per process.
pub fn seed_demo(api: &Api, as_of: NaiveDate) -> CoreResult<DemoSeed> {
    let tenant = Tenant::demo("demo-bakery");
    api.store().register_tenant(tenant.clone());
    let user = api.register_user(tenant.id, "demo-buyer")?;

    // Sugar delivers over one month three months out; flour spreads over two
    // months a little later.
    let sugar_month = dates::month_start(dates::add_months(as_of, 3));
    let flour_start = dates::month_start(dates::add_months(as_of, 4));
    let flour_end = month_end(dates::add_months(as_of, 5));

    api.upload_purchases(
        tenant.id,
        vec![
            PurchaseRow {
                commodity: "sugar".into(),
                purchase_date: as_of - Duration::days(30),
                delivery_start: sugar_month,
                delivery_end: month_end(sugar_month),
                quantity: Decimal::from(100_000),
                unit: "lb".into(),
                price: Decimal::new(47, 2),
                price_type: PriceType::Fixed,
            },
            PurchaseRow {
                commodity: "flour".into(),
                purchase_date: as_of - Duration::days(20),
                delivery_start: flour_start,
                delivery_end: flour_end,
                quantity: Decimal::from(60_000),
                unit: "lb".into(),
                price: Decimal::new(30, 2),
                price_type: PriceType::Fixed,
            },
        ],
    )?;

    api.upload_inventory(
        tenant.id,
        vec![InventoryRow {
            commodity: "sugar".into(),
            as_of: as_of - Duration::days(7),
            quantity: Decimal::from(10_000),
        }],
    )?;

    let sugar = api
        .store()
        .commodity_by_name("sugar")
        .ok_or_else(|| gr_types::internal_error!("demo seed lost the sugar commodity"))?;
    let flour = api
        .store()
        .commodity_by_name("flour")
        .ok_or_else(|| gr_types::internal_error!("demo seed lost the flour commodity"))?;

    let mut spots = spot_series(sugar.id, as_of, Decimal::new(46, 2), Decimal::new(48, 2), 45);
    spots.extend(spot_series(
        flour.id,
        as_of,
        Decimal::new(29, 2),
        Decimal::new(31, 2),
        45,
    ));
    ingest_market_prices(api.store(), spots)?;

    let quotes = api.refresh_market_data(tenant.id, as_of)?;
    info!(
        tenant = %tenant.name,
        forward_quotes = quotes,
        "demo tenant seeded"
    );

    Ok(DemoSeed {
        tenant,
        user,
        as_of,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::api::TimelineQuery;
    use gr_data::Store;
    use gr_risk::{DataQualityFlag, RiskConfig};

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn seed_builds_a_computable_world() {
        let api = Api::new(Arc::new(Store::new()), RiskConfig::default());
        let as_of = d(2026, 1, 15);
        let seed = seed_demo(&api, as_of).unwrap();

        assert!(seed.tenant.is_demo);

        // Buckets exist for both commodities.
        let shard = api.store().shard(seed.tenant.id).unwrap();
        assert!(!shard.read().buckets.is_empty());

        // Forward curve exists: five tenors per commodity.
        let sugar = api.store().commodity_by_name("sugar").unwrap();
        assert_eq!(api.store().forward_quotes(sugar.id, as_of).len(), 5);

        // And the timeline computes without gaps.
        let query = TimelineQuery {
            as_of: Some(as_of),
            ..TimelineQuery::default()
        };
        let response = api.var_timeline(seed.tenant.id, &query).unwrap();
        assert!(response.timeline.iter().all(|p| p.var_unhedged.is_some()));
        assert!(!response.timeline.iter().any(|p| p
            .flags
            .iter()
            .any(|f| matches!(f, DataQualityFlag::InsufficientHistory { .. }))));
    }

    #[test]
    fn seeded_exposure_months_carry_risk() {
        let api = Api::new(Arc::new(Store::new()), RiskConfig::default());
        let as_of = d(2026, 1, 15);
        let seed = seed_demo(&api, as_of).unwrap();

        let query = TimelineQuery {
            as_of: Some(as_of),
            ..TimelineQuery::default()
        };
        let response = api.var_timeline(seed.tenant.id, &query).unwrap();

        // Sugar delivers in April; that month must show positive VaR.
        let april = response
            .timeline
            .iter()
            .find(|p| p.month == d(2026, 4, 1))
            .unwrap();
        assert!(april.var_unhedged.unwrap() > Decimal::ZERO);
    }
}
