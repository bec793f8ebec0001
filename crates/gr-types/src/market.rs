use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// A commodity traded/procured by tenants. Global reference data — shared
/// across tenants and never mutated by tenant-scoped operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Commodity {
    pub id: Uuid,
    pub name: String,
    /// Unit of measure, e.g. "lb" or "kg".
    pub unit: String,
    pub created_at: DateTime<Utc>,
}

impl Commodity {
    pub fn new(name: &str, unit: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.to_string(),
            unit: unit.to_string(),
            created_at: Utc::now(),
        }
    }
}

impl fmt::Display for Commodity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.unit)
    }
}

/// A single market price observation.
///
/// `contract_month == None` is a spot/historical price; `Some(month)` is a
/// forward/futures quote for delivery in that month (month-start date).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketPrice {
    pub id: Uuid,
    pub commodity_id: Uuid,
    /// Date the price was observed.
    pub observed_on: NaiveDate,
    pub contract_month: Option<NaiveDate>,
    pub price: Decimal,
    /// Provenance tag, e.g. "demo_seed" or "mock_futures".
    pub source: String,
    pub created_at: DateTime<Utc>,
}

impl MarketPrice {
    pub fn spot(commodity_id: Uuid, observed_on: NaiveDate, price: Decimal, source: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            commodity_id,
            observed_on,
            contract_month: None,
            price,
            source: source.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn forward(
        commodity_id: Uuid,
        observed_on: NaiveDate,
        contract_month: NaiveDate,
        price: Decimal,
        source: &str,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            commodity_id,
            observed_on,
            contract_month: Some(contract_month),
            price,
            source: source.to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn is_spot(&self) -> bool {
        self.contract_month.is_none()
    }

    pub fn is_forward(&self) -> bool {
        self.contract_month.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn spot_vs_forward() {
        let c = Commodity::new("sugar", "lb");
        let spot = MarketPrice::spot(
            c.id,
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            dec!(0.47),
            "demo_seed",
        );
        let fwd = MarketPrice::forward(
            c.id,
            NaiveDate::from_ymd_opt(2026, 1, 15).unwrap(),
            NaiveDate::from_ymd_opt(2026, 4, 1).unwrap(),
            dec!(0.48),
            "mock_futures",
        );

        assert!(spot.is_spot());
        assert!(!spot.is_forward());
        assert!(fwd.is_forward());
        assert_eq!(fwd.contract_month, NaiveDate::from_ymd_opt(2026, 4, 1));
    }

    #[test]
    fn commodity_display() {
        let c = Commodity::new("flour", "kg");
        assert_eq!(format!("{}", c), "flour (kg)");
    }
}
