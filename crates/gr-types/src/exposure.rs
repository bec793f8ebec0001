use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Derived net quantity of a commodity attributable to a delivery month.
///
/// One bucket per (purchase, month) so each bucket traces back to its
/// originating purchase; netting per (commodity, month) happens at read time.
/// Buckets are recomputed from purchases and never hand-edited.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExposureBucket {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub commodity_id: Uuid,
    /// First day of the delivery month.
    pub bucket_month: NaiveDate,
    pub quantity: Decimal,
    pub source_purchase_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl ExposureBucket {
    pub fn new(
        tenant_id: Uuid,
        commodity_id: Uuid,
        bucket_month: NaiveDate,
        quantity: Decimal,
        source_purchase_id: Option<Uuid>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            commodity_id,
            bucket_month,
            quantity,
            source_purchase_id,
            created_at: Utc::now(),
        }
    }
}
