//! In-memory store with per-tenant shards.
//!
//! Tenant isolation is structural: all per-tenant reads and writes go through
//! the [`TenantShard`] for exactly one tenant id, and an unknown tenant id is
//! an authorization error, never an empty result. Commodities and market
//! prices are global reference data — read-only from tenant-scoped
//! computations, mutated only by the ingestion/market-data producers.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use dashmap::DashMap;
use parking_lot::{RwLock, RwLockReadGuard, RwLockWriteGuard};
use rust_decimal::Decimal;
use tracing::debug;
use uuid::Uuid;

use gr_types::{
    AuthorizationError, Commodity, CoreResult, ExecutedHedge, ExposureBucket, HedgeSession,
    InventorySnapshot, MarketPrice, Purchase, Tenant, UserAccount,
};

/// All mutable business data belonging to one tenant.
#[derive(Debug, Default, Clone)]
pub struct TenantData {
    pub users: Vec<UserAccount>,
    pub purchases: Vec<Purchase>,
    pub inventory: Vec<InventorySnapshot>,
    pub buckets: Vec<ExposureBucket>,
    pub sessions: HashMap<Uuid, HedgeSession>,
    pub executed: Vec<ExecutedHedge>,
}

impl TenantData {
    /// The user's currently active session, if any. "At most one open cart"
    /// is enforced by the session manager; if several exist the most recent
    /// wins.
    pub fn active_session_for(&self, user_id: Uuid) -> Option<&HedgeSession> {
        self.sessions
            .values()
            .filter(|s| s.user_id == user_id && s.is_active())
            .max_by_key(|s| s.created_at)
    }

    /// The user's most recent session regardless of state.
    pub fn latest_session_for(&self, user_id: Uuid) -> Option<&HedgeSession> {
        self.sessions
            .values()
            .filter(|s| s.user_id == user_id)
            .max_by_key(|s| s.created_at)
    }

    /// Latest inventory snapshot for the commodity at/before `as_of`; zero
    /// when no snapshot exists.
    pub fn inventory_on_hand(&self, commodity_id: Uuid, as_of: NaiveDate) -> Decimal {
        self.inventory
            .iter()
            .filter(|s| s.commodity_id == commodity_id && s.as_of <= as_of)
            .max_by_key(|s| s.as_of)
            .map(|s| s.quantity)
            .unwrap_or(Decimal::ZERO)
    }
}

/// One tenant's isolated slice of the store.
#[derive(Debug)]
pub struct TenantShard {
    tenant: Tenant,
    data: RwLock<TenantData>,
}

impl TenantShard {
    fn new(tenant: Tenant) -> Self {
        Self {
            tenant,
            data: RwLock::new(TenantData::default()),
        }
    }

    pub fn tenant(&self) -> &Tenant {
        &self.tenant
    }

    /// Read access to a momentarily consistent view of the tenant's data.
    pub fn read(&self) -> RwLockReadGuard<'_, TenantData> {
        self.data.read()
    }

    /// Exclusive access; session mutations and bucket replacement serialize
    /// here.
    pub fn write(&self) -> RwLockWriteGuard<'_, TenantData> {
        self.data.write()
    }

    pub fn record_user(&self, user: UserAccount) {
        self.write().users.push(user);
    }

    pub fn record_purchases(&self, purchases: Vec<Purchase>) {
        self.write().purchases.extend(purchases);
    }

    pub fn record_inventory(&self, snapshots: Vec<InventorySnapshot>) {
        self.write().inventory.extend(snapshots);
    }

    /// Atomically swap the tenant's derived exposure buckets. Readers never
    /// observe a half-written bucket set.
    pub fn replace_buckets(&self, buckets: Vec<ExposureBucket>) {
        let mut data = self.write();
        debug!(
            tenant = %self.tenant.name,
            old = data.buckets.len(),
            new = buckets.len(),
            "replacing exposure buckets"
        );
        data.buckets = buckets;
    }
}

/// Global reference data shared by all tenants.
#[derive(Debug, Default)]
struct ReferenceData {
    commodities: Vec<Commodity>,
}

/// The store: tenant shards plus global reference data.
#[derive(Debug, Default)]
pub struct Store {
    tenants: DashMap<Uuid, Arc<TenantShard>>,
    reference: RwLock<ReferenceData>,
    market: RwLock<Vec<MarketPrice>>,
}

impl Store {
    pub fn new() -> Self {
        Self::default()
    }

    // -- tenants -------------------------------------------------------------

    pub fn register_tenant(&self, tenant: Tenant) -> Arc<TenantShard> {
        let shard = Arc::new(TenantShard::new(tenant.clone()));
        self.tenants.insert(tenant.id, Arc::clone(&shard));
        shard
    }

    /// Shard lookup. An unknown tenant id is a hard authorization failure.
    pub fn shard(&self, tenant_id: Uuid) -> CoreResult<Arc<TenantShard>> {
        self.tenants
            .get(&tenant_id)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or_else(|| AuthorizationError::UnknownTenant { tenant_id }.into())
    }

    pub fn tenant_count(&self) -> usize {
        self.tenants.len()
    }

    // -- commodities (global, read-only to tenant computations) --------------

    pub fn upsert_commodity(&self, commodity: Commodity) {
        let mut reference = self.reference.write();
        if let Some(existing) = reference
            .commodities
            .iter_mut()
            .find(|c| c.name == commodity.name)
        {
            *existing = commodity;
        } else {
            reference.commodities.push(commodity);
        }
    }

    pub fn commodity(&self, id: Uuid) -> Option<Commodity> {
        self.reference
            .read()
            .commodities
            .iter()
            .find(|c| c.id == id)
            .cloned()
    }

    pub fn commodity_by_name(&self, name: &str) -> Option<Commodity> {
        self.reference
            .read()
            .commodities
            .iter()
            .find(|c| c.name == name)
            .cloned()
    }

    pub fn commodities(&self) -> Vec<Commodity> {
        self.reference.read().commodities.clone()
    }

    // -- market prices (global) ----------------------------------------------

    pub fn add_market_prices(&self, prices: Vec<MarketPrice>) {
        self.market.write().extend(prices);
    }

    /// Drop all quotes carrying the given provenance tag. Returns how many
    /// were removed.
    pub fn clear_market_prices_by_source(&self, source: &str) -> usize {
        let mut market = self.market.write();
        let before = market.len();
        market.retain(|p| p.source != source);
        before - market.len()
    }

    /// Spot observations for a commodity at/before `as_of`, ordered by
    /// observation date ascending.
    pub fn spot_history(&self, commodity_id: Uuid, as_of: NaiveDate) -> Vec<MarketPrice> {
        let mut history: Vec<MarketPrice> = self
            .market
            .read()
            .iter()
            .filter(|p| p.commodity_id == commodity_id && p.is_spot() && p.observed_on <= as_of)
            .cloned()
            .collect();
        history.sort_by_key(|p| p.observed_on);
        history
    }

    pub fn latest_spot(&self, commodity_id: Uuid, as_of: NaiveDate) -> Option<MarketPrice> {
        self.market
            .read()
            .iter()
            .filter(|p| p.commodity_id == commodity_id && p.is_spot() && p.observed_on <= as_of)
            .max_by_key(|p| p.observed_on)
            .cloned()
    }

    /// All forward quotes for a commodity observed at/before `as_of`.
    pub fn forward_quotes(&self, commodity_id: Uuid, as_of: NaiveDate) -> Vec<MarketPrice> {
        self.market
            .read()
            .iter()
            .filter(|p| p.commodity_id == commodity_id && p.is_forward() && p.observed_on <= as_of)
            .cloned()
            .collect()
    }

    /// Most recent forward quote for an exact contract month, if any.
    pub fn latest_forward(
        &self,
        commodity_id: Uuid,
        contract_month: NaiveDate,
        as_of: NaiveDate,
    ) -> Option<MarketPrice> {
        self.market
            .read()
            .iter()
            .filter(|p| {
                p.commodity_id == commodity_id
                    && p.contract_month == Some(contract_month)
                    && p.observed_on <= as_of
            })
            .max_by_key(|p| p.observed_on)
            .cloned()
    }
}
