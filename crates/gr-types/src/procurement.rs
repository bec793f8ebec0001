use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::ValidationError;

/// An isolated customer account. Every mutable business entity is scoped to
/// exactly one tenant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub is_demo: bool,
    pub created_at: DateTime<Utc>,
}

impl Tenant {
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            is_demo: false,
            created_at: Utc::now(),
        }
    }

    pub fn demo(name: &str) -> Self {
        Self {
            is_demo: true,
            ..Self::new(name)
        }
    }
}

/// An identity handle for hedge-session ownership. Credential handling lives
/// outside the core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserAccount {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub username: String,
    pub created_at: DateTime<Utc>,
}

impl UserAccount {
    pub fn new(tenant_id: Uuid, username: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            username: username.to_string(),
            created_at: Utc::now(),
        }
    }
}

/// How a purchase price was agreed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceType {
    #[default]
    Fixed,
    Floating,
}

/// An immutable historical procurement record — the source of truth for
/// exposure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Purchase {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub commodity_id: Uuid,
    pub purchase_date: NaiveDate,
    pub delivery_start: NaiveDate,
    pub delivery_end: NaiveDate,
    pub quantity: Decimal,
    pub unit: String,
    pub price: Decimal,
    pub price_type: PriceType,
    pub created_at: DateTime<Utc>,
}

impl Purchase {
    /// Check the ingestion invariants: positive quantity and price, and a
    /// delivery window with `end >= start`.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity <= Decimal::ZERO {
            return Err(ValidationError::NonPositiveQuantity {
                quantity: self.quantity,
            });
        }
        if self.price <= Decimal::ZERO {
            return Err(ValidationError::NonPositivePrice { price: self.price });
        }
        if self.delivery_end < self.delivery_start {
            return Err(ValidationError::InvertedDeliveryWindow {
                start: self.delivery_start,
                end: self.delivery_end,
            });
        }
        Ok(())
    }
}

/// Point-in-time on-hand quantity per commodity; nets exposure against stock.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InventorySnapshot {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub commodity_id: Uuid,
    pub as_of: NaiveDate,
    pub quantity: Decimal,
    pub created_at: DateTime<Utc>,
}

impl InventorySnapshot {
    pub fn new(tenant_id: Uuid, commodity_id: Uuid, as_of: NaiveDate, quantity: Decimal) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            commodity_id,
            as_of,
            quantity,
            created_at: Utc::now(),
        }
    }

    /// Inventory may be zero but never negative.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.quantity < Decimal::ZERO {
            return Err(ValidationError::NegativeInventory {
                quantity: self.quantity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn d(y: i32, m: u32, day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, day).unwrap()
    }

    fn purchase(quantity: Decimal, price: Decimal, start: NaiveDate, end: NaiveDate) -> Purchase {
        Purchase {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            commodity_id: Uuid::new_v4(),
            purchase_date: d(2026, 1, 10),
            delivery_start: start,
            delivery_end: end,
            quantity,
            unit: "lb".into(),
            price,
            price_type: PriceType::Fixed,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn valid_purchase_passes() {
        let p = purchase(dec!(100_000), dec!(0.47), d(2026, 4, 1), d(2026, 4, 30));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn zero_quantity_rejected() {
        let p = purchase(dec!(0), dec!(0.47), d(2026, 4, 1), d(2026, 4, 30));
        assert!(matches!(
            p.validate(),
            Err(ValidationError::NonPositiveQuantity { .. })
        ));
    }

    #[test]
    fn inverted_window_rejected() {
        let p = purchase(dec!(100), dec!(0.47), d(2026, 4, 30), d(2026, 4, 1));
        assert!(matches!(
            p.validate(),
            Err(ValidationError::InvertedDeliveryWindow { .. })
        ));
    }

    #[test]
    fn single_day_window_allowed() {
        let p = purchase(dec!(100), dec!(0.47), d(2026, 4, 15), d(2026, 4, 15));
        assert!(p.validate().is_ok());
    }

    #[test]
    fn inventory_zero_allowed_negative_rejected() {
        let t = Uuid::new_v4();
        let c = Uuid::new_v4();
        assert!(InventorySnapshot::new(t, c, d(2026, 1, 1), dec!(0))
            .validate()
            .is_ok());
        assert!(InventorySnapshot::new(t, c, d(2026, 1, 1), dec!(-1))
            .validate()
            .is_err());
    }
}
