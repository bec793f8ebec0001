//! The hedge session state machine.
//!
//! A session is a mutable cart of hedge selections. `Active → Executed` and
//! `Active → Cancelled` are the only transitions; any operation against a
//! terminal session fails with a state conflict naming the current state.
//! Execution is all-or-nothing: the ledger rows and the status flip happen
//! under one write guard, so no observer ever sees a half-executed session.

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use crossbeam_channel::Sender;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use gr_data::Store;
use gr_risk::{HedgeOverlay, TimelineRequest, VarEngine, VarTimeline};
use gr_types::{
    dates, CoreResult, ExecutedHedge, HedgeItemKey, HedgeSession, MarketDataError, SessionError,
    Tenant, ValidationError,
};

use crate::events::{emit, HedgeEvent};

/// What an execution produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub session_id: Uuid,
    pub hedges: Vec<ExecutedHedge>,
    pub total_notional: Decimal,
}

/// Drives hedge sessions through their lifecycle.
pub struct HedgeSessionManager {
    store: Arc<Store>,
    engine: VarEngine,
    events: Option<Sender<HedgeEvent>>,
}

impl HedgeSessionManager {
    pub fn new(store: Arc<Store>, engine: VarEngine) -> Self {
        Self {
            store,
            engine,
            events: None,
        }
    }

    pub fn with_events(mut self, sender: Sender<HedgeEvent>) -> Self {
        self.events = Some(sender);
        self
    }

    /// Open a session for the user, or hand back their existing active one.
    /// A user has at most one open cart.
    pub fn open(&self, tenant: &Tenant, user_id: Uuid) -> CoreResult<HedgeSession> {
        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();

        if let Some(existing) = data.active_session_for(user_id) {
            return Ok(existing.clone());
        }

        let session = HedgeSession::open(tenant.id, user_id);
        emit(
            &self.events,
            HedgeEvent::SessionOpened {
                tenant_id: tenant.id,
                session_id: session.id,
                user_id,
                at: Utc::now(),
            },
        );
        info!(tenant = %tenant.name, session_id = %session.id, "hedge session opened");
        data.sessions.insert(session.id, session.clone());
        Ok(session)
    }

    /// The user's active session, if one exists.
    pub fn current(&self, tenant: &Tenant, user_id: Uuid) -> CoreResult<HedgeSession> {
        let shard = self.store.shard(tenant.id)?;
        let data = shard.read();
        data.active_session_for(user_id)
            .cloned()
            .ok_or_else(|| SessionError::NotFound.into())
    }

    /// Stage a hedge for (commodity, contract month), capturing the current
    /// forward quote as the price snapshot. Re-adding the same key replaces
    /// the staged quantity.
    ///
    /// Months without a forward quote cannot be hedged; there is no price to
    /// transact at.
    pub fn add_item(
        &self,
        tenant: &Tenant,
        session_id: Uuid,
        commodity_name: &str,
        contract_month: NaiveDate,
        quantity: Decimal,
        as_of: NaiveDate,
    ) -> CoreResult<HedgeSession> {
        if quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity { quantity }.into());
        }
        let commodity = self.store.commodity_by_name(commodity_name).ok_or_else(|| {
            ValidationError::UnknownCommodity {
                name: commodity_name.to_string(),
            }
        })?;

        let month = dates::month_start(contract_month);
        let quote = self
            .store
            .latest_forward(commodity.id, month, as_of)
            .ok_or(MarketDataError::NoPriceAvailable {
                commodity_id: commodity.id,
                month,
            })?;

        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();
        let session = active_session_mut(&mut data.sessions, session_id)?;
        session.upsert_item(
            HedgeItemKey {
                commodity_id: commodity.id,
                contract_month: month,
            },
            quantity,
            quote.price,
        );
        Ok(session.clone())
    }

    /// Change the staged quantity for an existing item, keeping its price
    /// snapshot.
    pub fn update_item(
        &self,
        tenant: &Tenant,
        session_id: Uuid,
        key: HedgeItemKey,
        quantity: Decimal,
    ) -> CoreResult<HedgeSession> {
        if quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity { quantity }.into());
        }

        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();
        let session = active_session_mut(&mut data.sessions, session_id)?;

        let item = session
            .items
            .get_mut(&key)
            .ok_or(SessionError::ItemNotFound {
                commodity_id: key.commodity_id,
                contract_month: key.contract_month,
            })?;
        item.quantity = quantity;
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    /// Remove a staged item. Removing an item that was never staged is an
    /// error, not a no-op.
    pub fn remove_item(
        &self,
        tenant: &Tenant,
        session_id: Uuid,
        key: HedgeItemKey,
    ) -> CoreResult<HedgeSession> {
        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();
        let session = active_session_mut(&mut data.sessions, session_id)?;

        if session.items.remove(&key).is_none() {
            return Err(SessionError::ItemNotFound {
                commodity_id: key.commodity_id,
                contract_month: key.contract_month,
            }
            .into());
        }
        session.updated_at = Utc::now();
        Ok(session.clone())
    }

    /// VaR timeline as it would look if this session were executed: staged
    /// items overlay on top of the already-executed ledger.
    pub fn preview(
        &self,
        tenant: &Tenant,
        session_id: Uuid,
        request: &TimelineRequest,
    ) -> CoreResult<VarTimeline> {
        let shard = self.store.shard(tenant.id)?;
        let overlay = {
            let data = shard.read();
            let session = data
                .sessions
                .get(&session_id)
                .ok_or(SessionError::NotFound)?;
            let lines = data
                .executed
                .iter()
                .map(|h| (h.commodity_id, h.contract_month, h.quantity))
                .chain(
                    session
                        .items
                        .values()
                        .map(|i| (i.commodity_id, i.contract_month, i.quantity)),
                );
            HedgeOverlay::from_lines(lines)
        };

        self.engine
            .compute_timeline(&self.store, tenant, request, &overlay)
    }

    /// Execute the session: one immutable ledger row per staged item, priced
    /// at the staged snapshot, and the status flip — all under one guard.
    pub fn execute(&self, tenant: &Tenant, session_id: Uuid) -> CoreResult<ExecutionReport> {
        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();

        let session = active_session_mut(&mut data.sessions, session_id)?;
        if session.items.is_empty() {
            return Err(SessionError::EmptyExecute.into());
        }

        let executed_at = Utc::now();
        let hedges: Vec<ExecutedHedge> = session
            .items
            .values()
            .map(|item| ExecutedHedge {
                id: Uuid::new_v4(),
                tenant_id: tenant.id,
                commodity_id: item.commodity_id,
                contract_month: item.contract_month,
                quantity: item.quantity,
                execution_price: item.price_snapshot,
                executed_at,
                session_id,
            })
            .collect();

        session.status = gr_types::SessionStatus::Executed;
        session.updated_at = executed_at;
        data.executed.extend(hedges.clone());

        let total_notional: Decimal = hedges.iter().map(|h| h.notional()).sum();
        emit(
            &self.events,
            HedgeEvent::SessionExecuted {
                tenant_id: tenant.id,
                session_id,
                item_count: hedges.len(),
                total_notional,
                at: executed_at,
            },
        );
        info!(
            tenant = %tenant.name,
            %session_id,
            hedges = hedges.len(),
            %total_notional,
            "hedge session executed"
        );

        Ok(ExecutionReport {
            session_id,
            hedges,
            total_notional,
        })
    }

    /// Cancel the session, discarding staged items. The ledger is untouched.
    pub fn cancel(&self, tenant: &Tenant, session_id: Uuid) -> CoreResult<HedgeSession> {
        let shard = self.store.shard(tenant.id)?;
        let mut data = shard.write();
        let session = active_session_mut(&mut data.sessions, session_id)?;

        session.status = gr_types::SessionStatus::Cancelled;
        session.updated_at = Utc::now();
        let snapshot = session.clone();

        emit(
            &self.events,
            HedgeEvent::SessionCancelled {
                tenant_id: tenant.id,
                session_id,
                at: snapshot.updated_at,
            },
        );
        info!(tenant = %tenant.name, %session_id, "hedge session cancelled");
        Ok(snapshot)
    }
}

/// Mutable handle to a session that must still be active.
fn active_session_mut(
    sessions: &mut std::collections::HashMap<Uuid, HedgeSession>,
    session_id: Uuid,
) -> Result<&mut HedgeSession, SessionError> {
    let session = sessions.get_mut(&session_id).ok_or(SessionError::NotFound)?;
    if !session.is_active() {
        return Err(SessionError::StateConflict {
            current: session.status,
        });
    }
    Ok(session)
}
