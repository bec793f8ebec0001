//! Typed facade over the engine crates.
//!
//! This is the surface a transport layer (HTTP, CLI, tests) talks to. Every
//! call is tenant-scoped, resolves the caller's session where one is implied,
//! and returns domain types or a [`CoreError`] — no transport concerns leak
//! in either direction.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use crossbeam_channel::Sender;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use gr_data::{
    ingest_inventory, ingest_purchases, IngestReport, InventoryRow, MockFuturesGenerator,
    PurchaseRow, Store,
};
use gr_exposure::ExposureAggregator;
use gr_hedge::{build_portfolio, HedgeEvent, HedgeSessionManager, PortfolioView};
use gr_risk::{
    HedgeOverlay, RiskConfig, TimelinePoint, TimelineRequest, VarEngine,
};
use gr_types::{
    dates, CoreResult, ExecutedHedge, HedgeItemKey, HedgeSession, Tenant, UserAccount,
};

/// Parameters for a timeline query; unset fields take documented defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimelineQuery {
    /// When set, the user's active session items are overlaid on top of the
    /// executed ledger for the hedged series.
    pub user_id: Option<Uuid>,
    pub confidence_level: Option<f64>,
    /// Defaults to `as_of`.
    pub start: Option<NaiveDate>,
    /// Defaults to twelve months past the start.
    pub end: Option<NaiveDate>,
    /// Defaults to today.
    pub as_of: Option<NaiveDate>,
}

/// A proposed hedge line for a side-effect-free preview, before anything is
/// staged in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HedgeLine {
    pub commodity: String,
    pub contract_month: NaiveDate,
    pub quantity: Decimal,
}

/// The timeline as served to clients.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VarTimelineResponse {
    pub confidence_level: f64,
    pub currency: String,
    pub as_of: NaiveDate,
    pub timeline: Vec<TimelinePoint>,
}

/// Execution outcome plus the risk picture after the ledger write.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResponse {
    pub session_id: Uuid,
    pub hedges: Vec<ExecutedHedge>,
    pub total_notional: Decimal,
    /// Timeline recomputed against the ledger as it stands after this
    /// execution.
    pub post_execution_var: VarTimelineResponse,
}

/// Service facade. Cheap to share behind an `Arc` across handler tasks.
pub struct Api {
    store: Arc<Store>,
    engine: VarEngine,
    aggregator: ExposureAggregator,
    manager: HedgeSessionManager,
    mock: MockFuturesGenerator,
}

impl Api {
    pub fn new(store: Arc<Store>, config: RiskConfig) -> Self {
        let engine = VarEngine::new(config);
        let manager = HedgeSessionManager::new(Arc::clone(&store), engine.clone());
        Self {
            store,
            engine,
            aggregator: ExposureAggregator::new(),
            manager,
            mock: MockFuturesGenerator::default(),
        }
    }

    pub fn with_events(mut self, sender: Sender<HedgeEvent>) -> Self {
        self.manager = self.manager.with_events(sender);
        self
    }

    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    fn tenant(&self, tenant_id: Uuid) -> CoreResult<Tenant> {
        Ok(self.store.shard(tenant_id)?.tenant().clone())
    }

    // -- onboarding ----------------------------------------------------------

    pub fn register_tenant(&self, name: &str) -> Tenant {
        let tenant = Tenant::new(name);
        self.store.register_tenant(tenant.clone());
        tenant
    }

    pub fn register_user(&self, tenant_id: Uuid, username: &str) -> CoreResult<UserAccount> {
        let shard = self.store.shard(tenant_id)?;
        let user = UserAccount::new(tenant_id, username);
        shard.record_user(user.clone());
        Ok(user)
    }

    // -- ingestion -----------------------------------------------------------

    /// Ingest a purchase batch and rebuild the tenant's exposure buckets, so
    /// risk queries immediately reflect the upload.
    pub fn upload_purchases(
        &self,
        tenant_id: Uuid,
        rows: Vec<PurchaseRow>,
    ) -> CoreResult<IngestReport> {
        let tenant = self.tenant(tenant_id)?;
        let report = ingest_purchases(&self.store, &tenant, rows)?;
        self.aggregator.rebuild(&self.store, &tenant)?;
        Ok(report)
    }

    pub fn upload_inventory(
        &self,
        tenant_id: Uuid,
        rows: Vec<InventoryRow>,
    ) -> CoreResult<IngestReport> {
        let tenant = self.tenant(tenant_id)?;
        ingest_inventory(&self.store, &tenant, rows)
    }

    /// Refresh the mock forward curve for the tenant's commodities.
    pub fn refresh_market_data(&self, tenant_id: Uuid, as_of: NaiveDate) -> CoreResult<usize> {
        let tenant = self.tenant(tenant_id)?;
        self.mock.generate(&self.store, &tenant, as_of)
    }

    // -- risk ----------------------------------------------------------------

    /// The monthly VaR timeline. The hedged series nets the executed ledger,
    /// plus the caller's active session when `user_id` is set.
    pub fn var_timeline(
        &self,
        tenant_id: Uuid,
        query: &TimelineQuery,
    ) -> CoreResult<VarTimelineResponse> {
        let tenant = self.tenant(tenant_id)?;
        let request = self.resolve_request(query);

        let overlay = {
            let shard = self.store.shard(tenant_id)?;
            let data = shard.read();
            let session_items: Vec<(Uuid, NaiveDate, Decimal)> = query
                .user_id
                .and_then(|uid| data.active_session_for(uid))
                .map(|session| {
                    session
                        .items
                        .values()
                        .map(|i| (i.commodity_id, i.contract_month, i.quantity))
                        .collect()
                })
                .unwrap_or_default();
            HedgeOverlay::from_lines(
                data.executed
                    .iter()
                    .map(|h| (h.commodity_id, h.contract_month, h.quantity))
                    .chain(session_items),
            )
        };

        let timeline = self
            .engine
            .compute_timeline(&self.store, &tenant, &request, &overlay)?;
        Ok(VarTimelineResponse {
            confidence_level: timeline.confidence_level,
            currency: "USD".to_string(),
            as_of: timeline.as_of,
            timeline: timeline.points,
        })
    }

    /// Side-effect-free what-if: the proposed lines are overlaid on top of
    /// the executed ledger, without touching any session.
    pub fn var_preview(
        &self,
        tenant_id: Uuid,
        lines: &[HedgeLine],
        query: &TimelineQuery,
    ) -> CoreResult<VarTimelineResponse> {
        let tenant = self.tenant(tenant_id)?;
        let request = self.resolve_request(query);

        let mut resolved: Vec<(Uuid, NaiveDate, Decimal)> = Vec::with_capacity(lines.len());
        for line in lines {
            let commodity = self.store.commodity_by_name(&line.commodity).ok_or_else(|| {
                gr_types::ValidationError::UnknownCommodity {
                    name: line.commodity.clone(),
                }
            })?;
            resolved.push((commodity.id, line.contract_month, line.quantity));
        }

        let overlay = {
            let shard = self.store.shard(tenant_id)?;
            let data = shard.read();
            HedgeOverlay::from_lines(
                data.executed
                    .iter()
                    .map(|h| (h.commodity_id, h.contract_month, h.quantity))
                    .chain(resolved),
            )
        };

        let timeline = self
            .engine
            .compute_timeline(&self.store, &tenant, &request, &overlay)?;
        Ok(VarTimelineResponse {
            confidence_level: timeline.confidence_level,
            currency: "USD".to_string(),
            as_of: timeline.as_of,
            timeline: timeline.points,
        })
    }

    fn resolve_request(&self, query: &TimelineQuery) -> TimelineRequest {
        let as_of = query.as_of.unwrap_or_else(|| Utc::now().date_naive());
        let start = query.start.unwrap_or(as_of);
        let end = query.end.unwrap_or_else(|| dates::add_months(start, 12));
        TimelineRequest {
            confidence_level: query
                .confidence_level
                .unwrap_or(self.engine.config().default_confidence),
            start,
            end,
            as_of,
        }
    }

    // -- hedge sessions ------------------------------------------------------

    pub fn open_session(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        self.manager.open(&tenant, user_id)
    }

    pub fn current_session(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        self.manager.current(&tenant, user_id)
    }

    /// Stage a hedge in the user's active session.
    pub fn add_session_item(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        commodity: &str,
        contract_month: NaiveDate,
        quantity: Decimal,
        as_of: NaiveDate,
    ) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        self.manager
            .add_item(&tenant, session.id, commodity, contract_month, quantity, as_of)
    }

    pub fn update_session_item(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        key: HedgeItemKey,
        quantity: Decimal,
    ) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        self.manager.update_item(&tenant, session.id, key, quantity)
    }

    pub fn remove_session_item(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        key: HedgeItemKey,
    ) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        self.manager.remove_item(&tenant, session.id, key)
    }

    /// Timeline as it would look if the user's active session were executed.
    pub fn preview_session(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &TimelineQuery,
    ) -> CoreResult<VarTimelineResponse> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        let request = self.resolve_request(query);
        let timeline = self.manager.preview(&tenant, session.id, &request)?;
        Ok(VarTimelineResponse {
            confidence_level: timeline.confidence_level,
            currency: "USD".to_string(),
            as_of: timeline.as_of,
            timeline: timeline.points,
        })
    }

    /// Execute the user's active session, then recompute the timeline so the
    /// caller sees the risk picture their execution produced.
    pub fn execute_session(
        &self,
        tenant_id: Uuid,
        user_id: Uuid,
        query: &TimelineQuery,
    ) -> CoreResult<ExecutionResponse> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        let report = self.manager.execute(&tenant, session.id)?;
        let post_execution_var = self.var_timeline(tenant_id, query)?;
        Ok(ExecutionResponse {
            session_id: report.session_id,
            hedges: report.hedges,
            total_notional: report.total_notional,
            post_execution_var,
        })
    }

    pub fn cancel_session(&self, tenant_id: Uuid, user_id: Uuid) -> CoreResult<HedgeSession> {
        let tenant = self.tenant(tenant_id)?;
        let session = self.manager.current(&tenant, user_id)?;
        self.manager.cancel(&tenant, session.id)
    }

    // -- portfolio -----------------------------------------------------------

    pub fn portfolio(&self, tenant_id: Uuid, as_of: NaiveDate) -> CoreResult<PortfolioView> {
        let tenant = self.tenant(tenant_id)?;
        build_portfolio(&self.store, &tenant, as_of)
    }

    pub fn executed_hedges(&self, tenant_id: Uuid) -> CoreResult<Vec<ExecutedHedge>> {
        let shard = self.store.shard(tenant_id)?;
        let hedges = shard.read().executed.clone();
        Ok(hedges)
    }
}
