//! Read-side view over the executed-hedge ledger.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

use gr_data::Store;
use gr_types::{CoreResult, ExecutedHedge, HedgeStatus, Tenant};

/// Aggregate counters across the whole ledger.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortfolioSummary {
    pub total_hedges: usize,
    pub active_hedges: usize,
    pub expired_hedges: usize,
    pub total_notional: Decimal,
}

/// One ledger row with its derived status and display name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeRecord {
    pub commodity_name: String,
    pub status: HedgeStatus,
    pub notional: Decimal,
    #[serde(flatten)]
    pub hedge: ExecutedHedge,
}

/// Per-commodity totals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CommodityBreakdown {
    pub commodity_id: Uuid,
    pub commodity_name: String,
    pub hedge_count: usize,
    pub total_quantity: Decimal,
    pub total_notional: Decimal,
}

/// The full portfolio: summary, records newest-first, per-commodity rollup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PortfolioView {
    pub summary: PortfolioSummary,
    pub hedges: Vec<HedgeRecord>,
    pub breakdown: Vec<CommodityBreakdown>,
}

/// Build the portfolio view for a tenant. `as_of` decides which hedges still
/// count as active (contract month strictly in the future).
pub fn build_portfolio(store: &Store, tenant: &Tenant, as_of: NaiveDate) -> CoreResult<PortfolioView> {
    let shard = store.shard(tenant.id)?;
    let executed = shard.read().executed.clone();

    let mut records: Vec<HedgeRecord> = executed
        .into_iter()
        .map(|hedge| {
            let commodity_name = store
                .commodity(hedge.commodity_id)
                .map(|c| c.name)
                .unwrap_or_else(|| hedge.commodity_id.to_string());
            HedgeRecord {
                commodity_name,
                status: hedge.status(as_of),
                notional: hedge.notional(),
                hedge,
            }
        })
        .collect();
    records.sort_by(|a, b| b.hedge.executed_at.cmp(&a.hedge.executed_at));

    let active = records
        .iter()
        .filter(|r| r.status == HedgeStatus::Active)
        .count();
    let summary = PortfolioSummary {
        total_hedges: records.len(),
        active_hedges: active,
        expired_hedges: records.len() - active,
        total_notional: records.iter().map(|r| r.notional).sum(),
    };

    let mut by_commodity: BTreeMap<Uuid, CommodityBreakdown> = BTreeMap::new();
    for record in &records {
        let entry = by_commodity
            .entry(record.hedge.commodity_id)
            .or_insert_with(|| CommodityBreakdown {
                commodity_id: record.hedge.commodity_id,
                commodity_name: record.commodity_name.clone(),
                hedge_count: 0,
                total_quantity: Decimal::ZERO,
                total_notional: Decimal::ZERO,
            });
        entry.hedge_count += 1;
        entry.total_quantity += record.hedge.quantity;
        entry.total_notional += record.notional;
    }

    Ok(PortfolioView {
        summary,
        hedges: records,
        breakdown: by_commodity.into_values().collect(),
    })
}
