use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Lifecycle of a hedge session. `Active → Executed` and `Active → Cancelled`
/// are the only transitions; terminal states are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Active,
    Executed,
    Cancelled,
}

impl SessionStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SessionStatus::Active)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SessionStatus::Active => "active",
            SessionStatus::Executed => "executed",
            SessionStatus::Cancelled => "cancelled",
        };
        write!(f, "{}", s)
    }
}

/// Upsert key for staged hedge items within one session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct HedgeItemKey {
    pub commodity_id: Uuid,
    /// First day of the futures delivery month.
    pub contract_month: NaiveDate,
}

/// A staged hedge inside an active session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeSessionItem {
    pub commodity_id: Uuid,
    pub contract_month: NaiveDate,
    pub quantity: Decimal,
    /// Market price captured when the item was staged; used at execution.
    pub price_snapshot: Decimal,
    pub created_at: DateTime<Utc>,
}

/// A mutable cart of hedge selections owned by one user.
///
/// Items live inside the aggregate keyed by (commodity, contract month), so a
/// repeated add for the same key replaces the staged quantity instead of
/// appending a second row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HedgeSession {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Uuid,
    pub status: SessionStatus,
    pub items: BTreeMap<HedgeItemKey, HedgeSessionItem>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl HedgeSession {
    pub fn open(tenant_id: Uuid, user_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            user_id,
            status: SessionStatus::Active,
            items: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    /// Insert or replace the staged item for `key`. Returns `true` when an
    /// existing item was replaced.
    pub fn upsert_item(&mut self, key: HedgeItemKey, quantity: Decimal, price_snapshot: Decimal) -> bool {
        let replaced = self
            .items
            .insert(
                key,
                HedgeSessionItem {
                    commodity_id: key.commodity_id,
                    contract_month: key.contract_month,
                    quantity,
                    price_snapshot,
                    created_at: Utc::now(),
                },
            )
            .is_some();
        self.updated_at = Utc::now();
        replaced
    }
}

/// Whether an executed hedge's contract month is still in the future.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HedgeStatus {
    Active,
    Expired,
}

/// An immutable ledger record created only by executing a session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutedHedge {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub commodity_id: Uuid,
    pub contract_month: NaiveDate,
    pub quantity: Decimal,
    pub execution_price: Decimal,
    pub executed_at: DateTime<Utc>,
    pub session_id: Uuid,
}

impl ExecutedHedge {
    pub fn notional(&self) -> Decimal {
        self.quantity * self.execution_price
    }

    pub fn status(&self, as_of: NaiveDate) -> HedgeStatus {
        if self.contract_month > as_of {
            HedgeStatus::Active
        } else {
            HedgeStatus::Expired
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    #[test]
    fn status_terminality() {
        assert!(!SessionStatus::Active.is_terminal());
        assert!(SessionStatus::Executed.is_terminal());
        assert!(SessionStatus::Cancelled.is_terminal());
    }

    #[test]
    fn upsert_replaces_same_key() {
        let mut session = HedgeSession::open(Uuid::new_v4(), Uuid::new_v4());
        let key = HedgeItemKey {
            commodity_id: Uuid::new_v4(),
            contract_month: d(2026, 4, 1),
        };

        assert!(!session.upsert_item(key, dec!(50_000), dec!(0.47)));
        assert!(session.upsert_item(key, dec!(100_000), dec!(0.48)));

        assert_eq!(session.items.len(), 1);
        let item = &session.items[&key];
        assert_eq!(item.quantity, dec!(100_000));
        assert_eq!(item.price_snapshot, dec!(0.48));
    }

    #[test]
    fn distinct_keys_do_not_collide() {
        let mut session = HedgeSession::open(Uuid::new_v4(), Uuid::new_v4());
        let commodity = Uuid::new_v4();
        let april = HedgeItemKey {
            commodity_id: commodity,
            contract_month: d(2026, 4, 1),
        };
        let may = HedgeItemKey {
            commodity_id: commodity,
            contract_month: d(2026, 5, 1),
        };

        session.upsert_item(april, dec!(10), dec!(0.47));
        session.upsert_item(may, dec!(20), dec!(0.48));
        assert_eq!(session.items.len(), 2);
    }

    #[test]
    fn executed_hedge_status_by_contract_month() {
        let hedge = ExecutedHedge {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            commodity_id: Uuid::new_v4(),
            contract_month: d(2026, 4, 1),
            quantity: dec!(1000),
            execution_price: dec!(0.47),
            executed_at: Utc::now(),
            session_id: Uuid::new_v4(),
        };

        assert_eq!(hedge.status(d(2026, 1, 1)), HedgeStatus::Active);
        assert_eq!(hedge.status(d(2026, 6, 1)), HedgeStatus::Expired);
        assert_eq!(hedge.notional(), dec!(470.00));
    }
}
