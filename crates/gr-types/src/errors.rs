use chrono::NaiveDate;
use thiserror::Error;
use uuid::Uuid;

use crate::hedge::SessionStatus;

/// Main error type for the Granary core
#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    #[error("Data integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    #[error("Market data error: {0}")]
    Market(#[from] MarketDataError),

    #[error("Session error: {0}")]
    Session(#[from] SessionError),

    #[error("Authorization error: {0}")]
    Authorization(#[from] AuthorizationError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Malformed or out-of-range input — rejected at the boundary, never coerced
#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("quantity must be positive, got {quantity}")]
    NonPositiveQuantity { quantity: rust_decimal::Decimal },

    #[error("price must be positive, got {price}")]
    NonPositivePrice { price: rust_decimal::Decimal },

    #[error("inventory quantity must be non-negative, got {quantity}")]
    NegativeInventory { quantity: rust_decimal::Decimal },

    #[error("delivery window inverted: end {end} before start {start}")]
    InvertedDeliveryWindow { start: NaiveDate, end: NaiveDate },

    #[error("confidence level {confidence} outside supported range (0.5, 1.0)")]
    ConfidenceOutOfRange { confidence: f64 },

    #[error("date range inverted: end {end} before start {start}")]
    InvertedDateRange { start: NaiveDate, end: NaiveDate },

    #[error("unknown commodity: {name}")]
    UnknownCommodity { name: String },
}

/// An invariant the core assumes was enforced upstream has been violated.
/// Fatal to the current operation; never retried.
#[derive(Error, Debug)]
pub enum IntegrityError {
    #[error("stored purchase {purchase_id} has inverted delivery window {start}..{end}")]
    InvertedDeliveryWindow {
        purchase_id: Uuid,
        start: NaiveDate,
        end: NaiveDate,
    },

    #[error("commodity {commodity_id} referenced but not present in reference data")]
    MissingCommodity { commodity_id: Uuid },
}

/// Market data gaps — surfaced per affected computation, not silently
/// papered over with fabricated numbers.
#[derive(Error, Debug)]
pub enum MarketDataError {
    #[error("no price available for commodity {commodity_id} month {month}")]
    NoPriceAvailable { commodity_id: Uuid, month: NaiveDate },

    #[error(
        "insufficient spot history for commodity {commodity_id}: {observations} observations, need {required}"
    )]
    InsufficientHistory {
        commodity_id: Uuid,
        observations: usize,
        required: usize,
    },
}

/// Hedge-session lifecycle violations
#[derive(Error, Debug)]
pub enum SessionError {
    #[error("no hedge session found")]
    NotFound,

    #[error("session is {current}, operation requires an active session")]
    StateConflict { current: SessionStatus },

    #[error("cannot execute an empty hedge session")]
    EmptyExecute,

    #[error("no staged item for commodity {commodity_id} contract month {contract_month}")]
    ItemNotFound {
        commodity_id: Uuid,
        contract_month: NaiveDate,
    },
}

/// Cross-tenant access attempts — always fatal, never partially served
#[derive(Error, Debug)]
pub enum AuthorizationError {
    #[error("unknown tenant: {tenant_id}")]
    UnknownTenant { tenant_id: Uuid },

    #[error("entity belongs to tenant {expected}, caller is tenant {actual}")]
    TenantMismatch { expected: Uuid, actual: Uuid },
}

/// Result type alias for core operations
pub type CoreResult<T> = Result<T, CoreError>;

/// Macro for creating configuration errors
#[macro_export]
macro_rules! config_error {
    ($($arg:tt)*) => {
        $crate::CoreError::Config(format!($($arg)*))
    };
}

/// Macro for creating internal errors
#[macro_export]
macro_rules! internal_error {
    ($($arg:tt)*) => {
        $crate::CoreError::Internal(format!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_error_display() {
        let err = ValidationError::NonPositiveQuantity {
            quantity: dec!(-5),
        };
        assert!(err.to_string().contains("positive"));
        assert!(err.to_string().contains("-5"));
    }

    #[test]
    fn test_error_conversion() {
        let session_err = SessionError::StateConflict {
            current: SessionStatus::Executed,
        };
        let core_err: CoreError = session_err.into();

        match core_err {
            CoreError::Session(SessionError::StateConflict { current }) => {
                assert_eq!(current, SessionStatus::Executed);
            }
            _ => panic!("Expected Session error"),
        }
    }

    #[test]
    fn test_insufficient_history_counts_observations() {
        let err = MarketDataError::InsufficientHistory {
            commodity_id: uuid::Uuid::new_v4(),
            observations: 5,
            required: 20,
        };
        let text = err.to_string();
        assert!(text.contains("5 observations"));
        assert!(text.contains("need 20"));
    }

    #[test]
    fn test_state_conflict_reports_current_state() {
        let err = SessionError::StateConflict {
            current: SessionStatus::Cancelled,
        };
        assert!(err.to_string().contains("cancelled"));
    }

    #[test]
    fn test_macros() {
        let _config_err = config_error!("missing field: {}", "volatility_window");
        let _internal_err = internal_error!("something went wrong");
    }
}
