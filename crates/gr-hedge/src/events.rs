//! Best-effort lifecycle event emission.
//!
//! Events are advisory: downstream consumers (audit trails, notifications)
//! get them when the channel has room, and a full or disconnected channel
//! never blocks or fails the session operation itself.

use chrono::{DateTime, Utc};
use crossbeam_channel::{Receiver, Sender, TrySendError};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::warn;
use uuid::Uuid;

/// A hedge-session lifecycle notification.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum HedgeEvent {
    SessionOpened {
        tenant_id: Uuid,
        session_id: Uuid,
        user_id: Uuid,
        at: DateTime<Utc>,
    },
    SessionExecuted {
        tenant_id: Uuid,
        session_id: Uuid,
        item_count: usize,
        total_notional: Decimal,
        at: DateTime<Utc>,
    },
    SessionCancelled {
        tenant_id: Uuid,
        session_id: Uuid,
        at: DateTime<Utc>,
    },
}

/// Bounded channel for hedge events.
pub fn event_channel(capacity: usize) -> (Sender<HedgeEvent>, Receiver<HedgeEvent>) {
    crossbeam_channel::bounded(capacity)
}

/// Send without blocking; a dropped event is logged and forgotten.
pub fn emit(sender: &Option<Sender<HedgeEvent>>, event: HedgeEvent) {
    if let Some(sender) = sender {
        match sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                warn!(?event, "event channel full, dropping hedge event");
            }
            Err(TrySendError::Disconnected(_)) => {
                warn!("event channel disconnected, dropping hedge event");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn executed(session_id: Uuid) -> HedgeEvent {
        HedgeEvent::SessionExecuted {
            tenant_id: Uuid::new_v4(),
            session_id,
            item_count: 2,
            total_notional: dec!(47_000),
            at: Utc::now(),
        }
    }

    #[test]
    fn emit_delivers_when_room() {
        let (tx, rx) = event_channel(4);
        let session = Uuid::new_v4();
        emit(&Some(tx), executed(session));

        match rx.try_recv().unwrap() {
            HedgeEvent::SessionExecuted { session_id, .. } => assert_eq!(session_id, session),
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[test]
    fn emit_drops_when_full_without_panicking() {
        let (tx, _rx) = event_channel(1);
        emit(&Some(tx.clone()), executed(Uuid::new_v4()));
        emit(&Some(tx), executed(Uuid::new_v4()));
    }

    #[test]
    fn emit_is_noop_without_sender() {
        emit(&None, executed(Uuid::new_v4()));
    }
}
