//! Mock futures quote generation for demo tenants.
//!
//! Real futures feeds are out of reach for a demo environment, so forward
//! quotes are synthesized per commodity: anchored at the tenant's average
//! purchase price, drifted upward per month of tenor (mild contango), with a
//! small random jitter so repeated refreshes look alive. Generated quotes are
//! tagged with a provenance source and replaced wholesale on every refresh.

use chrono::NaiveDate;
use rand::Rng;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use tracing::{info, warn};
use uuid::Uuid;

use gr_types::{dates, CoreResult, MarketPrice, Tenant};

use crate::store::Store;

pub const MOCK_SOURCE: &str = "mock_futures";

/// Tunables for the generator.
#[derive(Debug, Clone)]
pub struct MockFuturesConfig {
    /// Tenors to quote, in whole months from `as_of`.
    pub months_ahead: Vec<u32>,
    /// Fractional price drift per month of tenor.
    pub monthly_drift: f64,
    /// Max fractional jitter applied per quote, symmetric around zero.
    pub jitter: f64,
    /// Provenance tag written to every generated quote.
    pub source: String,
}

impl Default for MockFuturesConfig {
    fn default() -> Self {
        Self {
            months_ahead: vec![1, 3, 6, 9, 12],
            monthly_drift: 0.005,
            jitter: 0.01,
            source: MOCK_SOURCE.to_string(),
        }
    }
}

/// Generates the mock forward curve for one tenant's commodities.
#[derive(Debug, Clone, Default)]
pub struct MockFuturesGenerator {
    config: MockFuturesConfig,
}

impl MockFuturesGenerator {
    pub fn new(config: MockFuturesConfig) -> Self {
        Self { config }
    }

    /// Drop previously generated quotes and write a fresh curve for every
    /// commodity the tenant has purchased. Commodities with no purchase
    /// history get no curve (there is nothing to anchor on).
    ///
    /// Returns the number of quotes written.
    pub fn generate(&self, store: &Store, tenant: &Tenant, as_of: NaiveDate) -> CoreResult<usize> {
        let shard = store.shard(tenant.id)?;

        let anchors: Vec<(Uuid, Decimal)> = {
            let data = shard.read();
            let mut commodity_ids: Vec<Uuid> =
                data.purchases.iter().map(|p| p.commodity_id).collect();
            commodity_ids.sort();
            commodity_ids.dedup();

            commodity_ids
                .into_iter()
                .filter_map(|id| average_purchase_price(&data.purchases, id).map(|avg| (id, avg)))
                .collect()
        };

        if anchors.is_empty() {
            warn!(tenant = %tenant.name, "no purchase history, skipping mock futures");
            return Ok(0);
        }

        let removed = store.clear_market_prices_by_source(&self.config.source);

        let mut rng = rand::rng();
        let mut quotes = Vec::with_capacity(anchors.len() * self.config.months_ahead.len());
        for (commodity_id, anchor) in anchors {
            for &tenor in &self.config.months_ahead {
                let contract_month = dates::month_start(dates::add_months(as_of, tenor));
                let drift = 1.0 + self.config.monthly_drift * tenor as f64;
                let jitter = rng.random_range(-self.config.jitter..=self.config.jitter);
                let factor =
                    Decimal::from_f64_retain(drift * (1.0 + jitter)).unwrap_or(Decimal::ONE);
                let price = (anchor * factor).round_dp(4);
                quotes.push(MarketPrice::forward(
                    commodity_id,
                    as_of,
                    contract_month,
                    price,
                    &self.config.source,
                ));
            }
        }

        let written = quotes.len();
        store.add_market_prices(quotes);
        info!(
            tenant = %tenant.name,
            removed,
            written,
            "mock futures curve refreshed"
        );
        Ok(written)
    }
}

/// Quantity-weighted average purchase price for one commodity.
fn average_purchase_price(
    purchases: &[gr_types::Purchase],
    commodity_id: Uuid,
) -> Option<Decimal> {
    let mut notional = Decimal::ZERO;
    let mut quantity = Decimal::ZERO;
    for p in purchases.iter().filter(|p| p.commodity_id == commodity_id) {
        notional += p.price * p.quantity;
        quantity += p.quantity;
    }
    if quantity.is_zero() {
        None
    } else {
        Some(notional / quantity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_types::{Commodity, PriceType, Purchase};
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn purchase(tenant_id: Uuid, commodity_id: Uuid, quantity: Decimal, price: Decimal) -> Purchase {
        Purchase {
            id: Uuid::new_v4(),
            tenant_id,
            commodity_id,
            purchase_date: d(2026, 1, 10),
            delivery_start: d(2026, 4, 1),
            delivery_end: d(2026, 4, 30),
            quantity,
            unit: "lb".into(),
            price,
            price_type: PriceType::Fixed,
            created_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn weighted_average_anchor() {
        let tenant = Uuid::new_v4();
        let sugar = Uuid::new_v4();
        let purchases = vec![
            purchase(tenant, sugar, dec!(100), dec!(0.40)),
            purchase(tenant, sugar, dec!(300), dec!(0.60)),
        ];
        // (100*0.40 + 300*0.60) / 400 = 0.55
        assert_eq!(average_purchase_price(&purchases, sugar), Some(dec!(0.55)));
        assert_eq!(average_purchase_price(&purchases, Uuid::new_v4()), None);
    }

    #[test]
    fn generates_one_quote_per_tenor_per_commodity() {
        let store = Store::new();
        let tenant = Tenant::demo("demo");
        let shard = store.register_tenant(tenant.clone());
        let sugar = Commodity::new("sugar", "lb");
        let flour = Commodity::new("flour", "lb");
        store.upsert_commodity(sugar.clone());
        store.upsert_commodity(flour.clone());
        shard.record_purchases(vec![
            purchase(tenant.id, sugar.id, dec!(100_000), dec!(0.47)),
            purchase(tenant.id, flour.id, dec!(50_000), dec!(0.30)),
        ]);

        let generator = MockFuturesGenerator::default();
        let written = generator.generate(&store, &tenant, d(2026, 1, 15)).unwrap();
        assert_eq!(written, 10);

        let quotes = store.forward_quotes(sugar.id, d(2026, 1, 15));
        assert_eq!(quotes.len(), 5);
        assert!(quotes.iter().all(|q| q.source == MOCK_SOURCE));
        assert!(quotes
            .iter()
            .any(|q| q.contract_month == Some(d(2026, 2, 1))));
        assert!(quotes
            .iter()
            .any(|q| q.contract_month == Some(d(2027, 1, 1))));
    }

    #[test]
    fn refresh_replaces_previous_curve() {
        let store = Store::new();
        let tenant = Tenant::demo("demo");
        let shard = store.register_tenant(tenant.clone());
        let sugar = Commodity::new("sugar", "lb");
        store.upsert_commodity(sugar.clone());
        shard.record_purchases(vec![purchase(tenant.id, sugar.id, dec!(100), dec!(0.47))]);

        let generator = MockFuturesGenerator::default();
        generator.generate(&store, &tenant, d(2026, 1, 15)).unwrap();
        generator.generate(&store, &tenant, d(2026, 1, 16)).unwrap();

        let quotes = store.forward_quotes(sugar.id, d(2026, 1, 16));
        assert_eq!(quotes.len(), 5);
        assert!(quotes.iter().all(|q| q.observed_on == d(2026, 1, 16)));
    }

    #[test]
    fn quotes_stay_near_anchor() {
        let store = Store::new();
        let tenant = Tenant::demo("demo");
        let shard = store.register_tenant(tenant.clone());
        let sugar = Commodity::new("sugar", "lb");
        store.upsert_commodity(sugar.clone());
        shard.record_purchases(vec![purchase(tenant.id, sugar.id, dec!(100), dec!(0.47))]);

        MockFuturesGenerator::default()
            .generate(&store, &tenant, d(2026, 1, 15))
            .unwrap();

        // Max drift 6% at 12 months, max jitter 1%.
        for quote in store.forward_quotes(sugar.id, d(2026, 1, 15)) {
            assert!(quote.price > dec!(0.44), "price too low: {}", quote.price);
            assert!(quote.price < dec!(0.51), "price too high: {}", quote.price);
        }
    }

    #[test]
    fn no_purchases_means_no_curve() {
        let store = Store::new();
        let tenant = Tenant::demo("demo");
        store.register_tenant(tenant.clone());

        let written = MockFuturesGenerator::default()
            .generate(&store, &tenant, d(2026, 1, 15))
            .unwrap();
        assert_eq!(written, 0);
    }
}
