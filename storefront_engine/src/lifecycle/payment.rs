use chrono::{DateTime, Utc};

use super::{TransitionError, TransitionOutcome};
use crate::db_types::{Payment, PaymentStatus};

/// How long a payment may sit in `pending`/`processing` before the session timer expires it.
pub const DEFAULT_PAYMENT_SESSION_WINDOW: std::time::Duration = std::time::Duration::from_secs(5 * 60);

/// Who is asking for the status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionCause {
    Operator,
    SessionTimer,
}

/// Payment attempt state machine.
///
/// `pending -> [processing] -> completed | failed | expired`. Terminal states absorb every later write.
pub struct PaymentLifecycle;

impl PaymentLifecycle {
    pub fn transition(
        current: PaymentStatus,
        requested: PaymentStatus,
        cause: TransitionCause,
    ) -> Result<TransitionOutcome<PaymentStatus>, TransitionError> {
        use PaymentStatus::*;
        if current.is_terminal() || current == requested {
            return Ok(TransitionOutcome::Unchanged);
        }
        let legal = match (cause, requested) {
            (TransitionCause::SessionTimer, Expired) => true,
            (TransitionCause::SessionTimer, _) => false,
            (TransitionCause::Operator, Expired) => false,
            (TransitionCause::Operator, Pending) => false,
            (TransitionCause::Operator, Processing | Completed | Failed) => true,
        };
        if legal {
            Ok(TransitionOutcome::Applied { from: current, to: requested })
        } else {
            Err(TransitionError::InvalidPaymentTransition { current, requested })
        }
    }

    /// True if the payment is still open and its session window has run out.
    pub fn session_elapsed(payment: &Payment, now: DateTime<Utc>, window: std::time::Duration) -> bool {
        let elapsed = now.signed_duration_since(payment.created_at).to_std();
        !payment.status.is_terminal() && elapsed.map(|e| e >= window).unwrap_or(false)
    }
}
