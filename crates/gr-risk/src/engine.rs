//! The VaR timeline engine.
//!
//! For every month in the requested range and every commodity with exposure
//! or hedges in that month, the engine computes
//! `VaR = z * sigma * price * |exposure|` and combines commodities under an
//! independence assumption (square root of the sum of squares). Exposure is
//! netted against the latest inventory snapshot and clamped at zero; the
//! hedged variant replaces `|net|` with `|net - hedged quantity|`, so
//! over-hedging shows up as risk instead of vanishing.

use chrono::NaiveDate;
use rust_decimal::prelude::*;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};
use tracing::debug;
use uuid::Uuid;

use gr_data::{CurveResolver, PriceSource, Store};
use gr_types::{dates, CoreError, CoreResult, MarketDataError, Tenant, ValidationError};

use crate::math::inverse_normal_cdf;
use crate::volatility::{RiskConfig, VolatilityEstimate, VolatilityEstimator};

/// A request for a VaR timeline over an inclusive month range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineRequest {
    pub confidence_level: f64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Market data observed after this date is invisible to the computation.
    pub as_of: NaiveDate,
}

impl TimelineRequest {
    /// Confidence must be a genuine upper-tail level; the inverse CDF handles
    /// the numerics but (0.5, 1.0) is the modeling contract.
    pub fn validate(&self) -> CoreResult<()> {
        if !(self.confidence_level > 0.5 && self.confidence_level < 1.0) {
            return Err(ValidationError::ConfidenceOutOfRange {
                confidence: self.confidence_level,
            }
            .into());
        }
        if self.end < self.start {
            return Err(ValidationError::InvertedDateRange {
                start: self.start,
                end: self.end,
            }
            .into());
        }
        Ok(())
    }
}

/// Hedged quantities per (commodity, contract month), overlaid on exposure.
#[derive(Debug, Clone, Default)]
pub struct HedgeOverlay {
    quantities: HashMap<(Uuid, NaiveDate), Decimal>,
}

impl HedgeOverlay {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Overlay from raw (commodity, month, quantity) lines. Quantities for
    /// the same key accumulate.
    pub fn from_lines(lines: impl IntoIterator<Item = (Uuid, NaiveDate, Decimal)>) -> Self {
        let mut quantities: HashMap<(Uuid, NaiveDate), Decimal> = HashMap::new();
        for (commodity_id, month, quantity) in lines {
            *quantities
                .entry((commodity_id, dates::month_start(month)))
                .or_default() += quantity;
        }
        Self { quantities }
    }

    pub fn quantity(&self, commodity_id: Uuid, month: NaiveDate) -> Decimal {
        self.quantities
            .get(&(commodity_id, month))
            .copied()
            .unwrap_or(Decimal::ZERO)
    }

    pub fn is_empty(&self) -> bool {
        self.quantities.is_empty()
    }

    fn commodities_for_month(&self, month: NaiveDate) -> impl Iterator<Item = Uuid> + '_ {
        self.quantities
            .keys()
            .filter(move |(_, m)| *m == month)
            .map(|(c, _)| *c)
    }
}

/// Why a timeline point is degraded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum DataQualityFlag {
    /// No price at all for the commodity in this month.
    MissingPrice { commodity_id: Uuid },
    /// Priced off a neighboring contract month.
    NearestForwardUsed {
        commodity_id: Uuid,
        used_month: NaiveDate,
    },
    /// Priced off the latest spot observation.
    SpotFallbackUsed { commodity_id: Uuid },
    /// Not enough spot history for a volatility estimate.
    InsufficientHistory {
        commodity_id: Uuid,
        observations: usize,
    },
}

/// One month of the timeline. `None` means the number could not be computed
/// at all; `Some(0)` means there is genuinely nothing at risk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelinePoint {
    pub month: NaiveDate,
    pub var_unhedged: Option<Decimal>,
    pub var_hedged: Option<Decimal>,
    pub flags: Vec<DataQualityFlag>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarTimeline {
    pub confidence_level: f64,
    pub as_of: NaiveDate,
    pub points: Vec<TimelinePoint>,
}

/// Single-bucket parametric VaR. Kept exact in `Decimal` up to the z*sigma
/// scale factor.
pub fn bucket_var(z: f64, sigma: f64, price: Decimal, exposure_abs: Decimal) -> Decimal {
    let scale = Decimal::from_f64_retain(z * sigma).unwrap_or(Decimal::ZERO);
    (scale * price * exposure_abs).round_dp(2)
}

/// Combine per-commodity VaR values under independence. A single value passes
/// through exactly; multiple values combine in quadrature.
fn combine_independent(vars: &[Decimal]) -> Decimal {
    match vars {
        [] => Decimal::ZERO,
        [single] => *single,
        many => {
            let sum_sq: f64 = many
                .iter()
                .filter_map(|v| v.to_f64())
                .map(|v| v * v)
                .sum();
            Decimal::from_f64_retain(sum_sq.sqrt())
                .unwrap_or(Decimal::ZERO)
                .round_dp(2)
        }
    }
}

/// Computes VaR timelines against the store.
#[derive(Debug, Clone, Default)]
pub struct VarEngine {
    resolver: CurveResolver,
    estimator: VolatilityEstimator,
}

impl VarEngine {
    pub fn new(config: RiskConfig) -> Self {
        Self {
            resolver: CurveResolver::new(),
            estimator: VolatilityEstimator::new(config),
        }
    }

    pub fn config(&self) -> &RiskConfig {
        self.estimator.config()
    }

    /// Compute the monthly VaR timeline for a tenant.
    ///
    /// `overlay` carries the hedged quantities to net against exposure; pass
    /// [`HedgeOverlay::empty`] for a purely unhedged view (the two series
    /// then coincide).
    pub fn compute_timeline(
        &self,
        store: &Store,
        tenant: &Tenant,
        request: &TimelineRequest,
        overlay: &HedgeOverlay,
    ) -> CoreResult<VarTimeline> {
        request.validate()?;
        let shard = store.shard(tenant.id)?;
        let z = inverse_normal_cdf(request.confidence_level)?;

        let data = shard.read();
        let months = dates::months_spanned(request.start, request.end);

        // One volatility estimate per commodity, shared across months.
        let commodity_ids: Vec<Uuid> = {
            let mut ids: BTreeSet<Uuid> =
                data.buckets.iter().map(|b| b.commodity_id).collect();
            ids.extend(overlay.quantities.keys().map(|(c, _)| *c));
            ids.into_iter().collect()
        };
        let sigmas = self
            .estimator
            .estimate_all(store, &commodity_ids, request.as_of);

        let mut points = Vec::with_capacity(months.len());
        for month in months {
            let mut flags = Vec::new();
            let mut unhedged_vars = Vec::new();
            let mut hedged_vars = Vec::new();
            let mut exposed = 0usize;
            let mut gapped = 0usize;

            let month_commodities: BTreeSet<Uuid> = data
                .buckets
                .iter()
                .filter(|b| b.bucket_month == month)
                .map(|b| b.commodity_id)
                .chain(overlay.commodities_for_month(month))
                .collect();

            for commodity_id in month_commodities {
                let gross: Decimal = data
                    .buckets
                    .iter()
                    .filter(|b| b.commodity_id == commodity_id && b.bucket_month == month)
                    .map(|b| b.quantity)
                    .sum();
                let on_hand = data.inventory_on_hand(commodity_id, month);
                let net = (gross - on_hand).max(Decimal::ZERO);
                let hedged_qty = overlay.quantity(commodity_id, month);
                let residual = (net - hedged_qty).abs();

                if net.is_zero() && residual.is_zero() {
                    continue;
                }
                exposed += 1;

                let sigma = match sigmas.get(&commodity_id) {
                    Some(VolatilityEstimate::Estimated { sigma, .. }) => *sigma,
                    Some(VolatilityEstimate::Insufficient { observations }) => {
                        flags.push(DataQualityFlag::InsufficientHistory {
                            commodity_id,
                            observations: *observations,
                        });
                        gapped += 1;
                        continue;
                    }
                    None => {
                        gapped += 1;
                        continue;
                    }
                };

                let price = match self.resolver.resolve(store, commodity_id, month, request.as_of)
                {
                    Ok(resolved) => {
                        match resolved.source {
                            PriceSource::ExactForward => {}
                            PriceSource::NearestForward { used, .. } => {
                                flags.push(DataQualityFlag::NearestForwardUsed {
                                    commodity_id,
                                    used_month: used,
                                });
                            }
                            PriceSource::SpotFallback => {
                                flags.push(DataQualityFlag::SpotFallbackUsed { commodity_id });
                            }
                        }
                        resolved.price
                    }
                    Err(CoreError::Market(MarketDataError::NoPriceAvailable { .. })) => {
                        flags.push(DataQualityFlag::MissingPrice { commodity_id });
                        gapped += 1;
                        continue;
                    }
                    Err(other) => return Err(other),
                };

                unhedged_vars.push(bucket_var(z, sigma, price, net));
                hedged_vars.push(bucket_var(z, sigma, price, residual));
            }

            // Nothing at risk is a real zero; an all-gapped month is unknown.
            let (var_unhedged, var_hedged) = if exposed == 0 {
                (Some(Decimal::ZERO), Some(Decimal::ZERO))
            } else if gapped == exposed {
                (None, None)
            } else {
                (
                    Some(combine_independent(&unhedged_vars)),
                    Some(combine_independent(&hedged_vars)),
                )
            };

            points.push(TimelinePoint {
                month,
                var_unhedged,
                var_hedged,
                flags,
            });
        }

        debug!(
            tenant = %tenant.name,
            months = points.len(),
            confidence = request.confidence_level,
            "timeline computed"
        );

        Ok(VarTimeline {
            confidence_level: request.confidence_level,
            as_of: request.as_of,
            points,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gr_types::{
        Commodity, ExposureBucket, InventorySnapshot, MarketPrice, PriceType, Purchase,
    };
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    /// Spot history engineered so the volatility estimate is ~sigma.
    fn seed_spots_with_sigma(store: &Store, commodity: Uuid, sigma: f64, end: NaiveDate) {
        let ratio = sigma.exp();
        let mut prices = Vec::new();
        for i in 0..40i64 {
            let value = if i % 2 == 0 { 100.0 } else { 100.0 * ratio };
            prices.push(MarketPrice::spot(
                commodity,
                end - chrono::Duration::days(40 - i),
                Decimal::from_f64_retain(value).unwrap(),
                "t",
            ));
        }
        store.add_market_prices(prices);
    }

    fn setup() -> (Store, Tenant, Commodity) {
        let store = Store::new();
        let tenant = Tenant::new("mill");
        store.register_tenant(tenant.clone());
        let sugar = Commodity::new("sugar", "lb");
        store.upsert_commodity(sugar.clone());
        (store, tenant, sugar)
    }

    fn bucket(tenant: &Tenant, commodity: Uuid, month: NaiveDate, qty: Decimal) -> ExposureBucket {
        ExposureBucket::new(tenant.id, commodity, month, qty, Some(Uuid::new_v4()))
    }

    fn request(confidence: f64) -> TimelineRequest {
        TimelineRequest {
            confidence_level: confidence,
            start: d(2026, 4, 1),
            end: d(2026, 4, 30),
            as_of: d(2026, 1, 15),
        }
    }

    #[test]
    fn bucket_var_matches_hand_calculation() {
        // 100,000 lbs at $0.47, sigma 5%, z(0.95) ~ 1.6449:
        // 1.6449 * 0.05 * 0.47 * 100000 ~ 3865.5
        let z = inverse_normal_cdf(0.95).unwrap();
        let var = bucket_var(z, 0.05, dec!(0.47), dec!(100_000));
        assert!(var > dec!(3860) && var < dec!(3870), "got {}", var);
    }

    #[test]
    fn timeline_end_to_end_single_commodity() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![MarketPrice::forward(
            sugar.id,
            d(2026, 1, 10),
            d(2026, 4, 1),
            dec!(0.47),
            "t",
        )]);

        let engine = VarEngine::default();
        let timeline = engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap();

        assert_eq!(timeline.points.len(), 1);
        let point = &timeline.points[0];
        let var = point.var_unhedged.unwrap();
        assert!(var > dec!(3700) && var < dec!(4050), "got {}", var);
        assert_eq!(point.var_hedged, point.var_unhedged);
        assert!(point.flags.is_empty());
    }

    #[test]
    fn higher_confidence_means_higher_var() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![MarketPrice::forward(
            sugar.id,
            d(2026, 1, 10),
            d(2026, 4, 1),
            dec!(0.47),
            "t",
        )]);

        let engine = VarEngine::default();
        let var95 = engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap()
            .points[0]
            .var_unhedged
            .unwrap();
        let var99 = engine
            .compute_timeline(&store, &tenant, &request(0.99), &HedgeOverlay::empty())
            .unwrap()
            .points[0]
            .var_unhedged
            .unwrap();
        assert!(var99 > var95);
    }

    #[test]
    fn inventory_nets_exposure_and_clamps_at_zero() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        shard.record_inventory(vec![InventorySnapshot::new(
            tenant.id,
            sugar.id,
            d(2026, 1, 1),
            dec!(150_000),
        )]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![MarketPrice::forward(
            sugar.id,
            d(2026, 1, 10),
            d(2026, 4, 1),
            dec!(0.47),
            "t",
        )]);

        let engine = VarEngine::default();
        let point = &engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap()
            .points[0];
        // Inventory exceeds exposure: clamped to zero, not negative.
        assert_eq!(point.var_unhedged, Some(Decimal::ZERO));
    }

    #[test]
    fn full_hedge_zeroes_hedged_var_only() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![MarketPrice::forward(
            sugar.id,
            d(2026, 1, 10),
            d(2026, 4, 1),
            dec!(0.47),
            "t",
        )]);

        let overlay =
            HedgeOverlay::from_lines(vec![(sugar.id, d(2026, 4, 1), dec!(100_000))]);
        let engine = VarEngine::default();
        let point = &engine
            .compute_timeline(&store, &tenant, &request(0.95), &overlay)
            .unwrap()
            .points[0];

        assert_eq!(point.var_hedged, Some(Decimal::ZERO));
        assert!(point.var_unhedged.unwrap() > Decimal::ZERO);
    }

    #[test]
    fn over_hedge_creates_residual_risk() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![MarketPrice::forward(
            sugar.id,
            d(2026, 1, 10),
            d(2026, 4, 1),
            dec!(0.47),
            "t",
        )]);

        let overlay =
            HedgeOverlay::from_lines(vec![(sugar.id, d(2026, 4, 1), dec!(150_000))]);
        let engine = VarEngine::default();
        let point = &engine
            .compute_timeline(&store, &tenant, &request(0.95), &overlay)
            .unwrap()
            .points[0];

        let hedged = point.var_hedged.unwrap();
        let unhedged = point.var_unhedged.unwrap();
        assert!(hedged > Decimal::ZERO);
        // |100k - 150k| = 50k residual: half the unhedged magnitude.
        assert!(hedged < unhedged);
    }

    #[test]
    fn no_exposure_is_exact_zero_not_gap() {
        let (store, tenant, _sugar) = setup();
        let engine = VarEngine::default();
        let timeline = engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap();
        assert_eq!(timeline.points[0].var_unhedged, Some(Decimal::ZERO));
        assert!(timeline.points[0].flags.is_empty());
    }

    #[test]
    fn missing_price_gaps_the_month_with_flag() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        // Spot history exists, so a spot fallback will fire before a missing
        // price; strip it by asking before any observation.
        let mut req = request(0.95);
        req.as_of = d(2020, 1, 1);

        let engine = VarEngine::default();
        let point = &engine
            .compute_timeline(&store, &tenant, &req, &HedgeOverlay::empty())
            .unwrap()
            .points[0];

        assert_eq!(point.var_unhedged, None);
        assert!(point
            .flags
            .iter()
            .any(|f| matches!(f, DataQualityFlag::InsufficientHistory { .. })
                || matches!(f, DataQualityFlag::MissingPrice { .. })));
    }

    #[test]
    fn spot_fallback_flagged_but_computed() {
        let (store, tenant, sugar) = setup();
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000))]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));

        let engine = VarEngine::default();
        let point = &engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap()
            .points[0];

        assert!(point.var_unhedged.is_some());
        assert!(point
            .flags
            .iter()
            .any(|f| matches!(f, DataQualityFlag::SpotFallbackUsed { .. })));
    }

    #[test]
    fn two_commodities_combine_in_quadrature() {
        let (store, tenant, sugar) = setup();
        let flour = Commodity::new("flour", "lb");
        store.upsert_commodity(flour.clone());
        let shard = store.shard(tenant.id).unwrap();
        shard.replace_buckets(vec![
            bucket(&tenant, sugar.id, d(2026, 4, 1), dec!(100_000)),
            bucket(&tenant, flour.id, d(2026, 4, 1), dec!(100_000)),
        ]);
        seed_spots_with_sigma(&store, sugar.id, 0.05, d(2026, 1, 14));
        seed_spots_with_sigma(&store, flour.id, 0.05, d(2026, 1, 14));
        store.add_market_prices(vec![
            MarketPrice::forward(sugar.id, d(2026, 1, 10), d(2026, 4, 1), dec!(0.47), "t"),
            MarketPrice::forward(flour.id, d(2026, 1, 10), d(2026, 4, 1), dec!(0.47), "t"),
        ]);

        let engine = VarEngine::default();
        let combined = engine
            .compute_timeline(&store, &tenant, &request(0.95), &HedgeOverlay::empty())
            .unwrap()
            .points[0]
            .var_unhedged
            .unwrap();

        // Equal independent legs: combined = leg * sqrt(2), well below the sum.
        let leg = bucket_var(inverse_normal_cdf(0.95).unwrap(), 0.05, dec!(0.47), dec!(100_000));
        let expected = leg.to_f64().unwrap() * 2f64.sqrt();
        let got = combined.to_f64().unwrap();
        assert!((got - expected).abs() / expected < 0.05, "got {}", got);
    }

    #[test]
    fn invalid_confidence_rejected() {
        let (store, tenant, _) = setup();
        let engine = VarEngine::default();
        let err = engine
            .compute_timeline(&store, &tenant, &request(1.2), &HedgeOverlay::empty())
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::ConfidenceOutOfRange { .. })
        ));
    }

    #[test]
    fn inverted_range_rejected() {
        let (store, tenant, _) = setup();
        let mut req = request(0.95);
        req.start = d(2026, 6, 1);
        req.end = d(2026, 4, 1);
        let engine = VarEngine::default();
        assert!(matches!(
            engine
                .compute_timeline(&store, &tenant, &req, &HedgeOverlay::empty())
                .unwrap_err(),
            CoreError::Validation(ValidationError::InvertedDateRange { .. })
        ));
    }

    #[test]
    fn months_are_ordered_and_unique() {
        let (store, tenant, _) = setup();
        let mut req = request(0.95);
        req.start = d(2026, 3, 15);
        req.end = d(2026, 7, 10);

        let engine = VarEngine::default();
        let timeline = engine
            .compute_timeline(&store, &tenant, &req, &HedgeOverlay::empty())
            .unwrap();

        let months: Vec<NaiveDate> = timeline.points.iter().map(|p| p.month).collect();
        assert_eq!(
            months,
            vec![d(2026, 3, 1), d(2026, 4, 1), d(2026, 5, 1), d(2026, 6, 1), d(2026, 7, 1)]
        );
    }
}
