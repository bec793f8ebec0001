//! Derives per-month exposure buckets from purchase delivery windows.
//!
//! A purchase whose delivery window spans several calendar months is prorated
//! across those months by day count. Proration conserves quantity exactly:
//! every month but the last gets `quantity * overlap_days / total_days`
//! rounded, and the last month gets the residual, so the bucket quantities
//! always sum back to the purchase quantity.
//!
//! Buckets are derived state. `rebuild` recomputes the full set from the
//! purchase ledger and swaps it in atomically; it is idempotent for the same
//! ledger content.

use rust_decimal::Decimal;
use tracing::info;
use uuid::Uuid;

use gr_data::Store;
use gr_types::{dates, CoreResult, ExposureBucket, IntegrityError, Purchase, Tenant};

/// Rebuilds a tenant's exposure buckets from its purchase ledger.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExposureAggregator;

impl ExposureAggregator {
    pub fn new() -> Self {
        Self
    }

    /// Recompute all buckets for the tenant and atomically replace the stored
    /// set. One bucket per (purchase, month), each tracing back to its source
    /// purchase; netting across purchases happens at read time.
    pub fn rebuild(&self, store: &Store, tenant: &Tenant) -> CoreResult<usize> {
        let shard = store.shard(tenant.id)?;

        let purchases = shard.read().purchases.clone();
        let mut buckets = Vec::new();
        for purchase in &purchases {
            buckets.extend(buckets_for_purchase(purchase)?);
        }

        let count = buckets.len();
        shard.replace_buckets(buckets);
        info!(
            tenant = %tenant.name,
            purchases = purchases.len(),
            buckets = count,
            "exposure buckets rebuilt"
        );
        Ok(count)
    }
}

/// Prorate one purchase across the calendar months its delivery window
/// touches.
///
/// A stored purchase with an inverted window is an integrity error: ingestion
/// rejects those, so seeing one here means the ledger was corrupted.
pub fn buckets_for_purchase(purchase: &Purchase) -> CoreResult<Vec<ExposureBucket>> {
    if purchase.delivery_end < purchase.delivery_start {
        return Err(IntegrityError::InvertedDeliveryWindow {
            purchase_id: purchase.id,
            start: purchase.delivery_start,
            end: purchase.delivery_end,
        }
        .into());
    }

    let months = dates::months_spanned(purchase.delivery_start, purchase.delivery_end);
    let total_days = Decimal::from(
        (purchase.delivery_end - purchase.delivery_start).num_days() + 1,
    );

    let mut buckets = Vec::with_capacity(months.len());
    let mut allocated = Decimal::ZERO;
    let last_index = months.len() - 1;

    for (i, month) in months.iter().enumerate() {
        let quantity = if i == last_index {
            // Residual to the last month so the parts sum exactly.
            purchase.quantity - allocated
        } else {
            let days = Decimal::from(dates::overlap_days(
                *month,
                purchase.delivery_start,
                purchase.delivery_end,
            ));
            let share = (purchase.quantity * days / total_days).round_dp(6);
            allocated += share;
            share
        };

        buckets.push(ExposureBucket::new(
            purchase.tenant_id,
            purchase.commodity_id,
            *month,
            quantity,
            Some(purchase.id),
        ));
    }

    Ok(buckets)
}

/// Sum of bucket quantities for one (commodity, month), before inventory
/// netting.
pub fn gross_exposure(
    buckets: &[ExposureBucket],
    commodity_id: Uuid,
    month: chrono::NaiveDate,
) -> Decimal {
    buckets
        .iter()
        .filter(|b| b.commodity_id == commodity_id && b.bucket_month == month)
        .map(|b| b.quantity)
        .sum()
}
