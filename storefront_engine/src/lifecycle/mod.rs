//! Order and payment state machines.
//!
//! Both machines are pure functions of `(current, requested)`. They never touch a store; callers look up the current
//! state, ask the machine whether the move is legal, and only then write.
mod order;
mod payment;

pub use order::OrderLifecycle;
pub use payment::{PaymentLifecycle, TransitionCause, DEFAULT_PAYMENT_SESSION_WINDOW};
use thiserror::Error;

use crate::db_types::{OrderStatusType, PaymentStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionOutcome<S> {
    Applied { from: S, to: S },
    /// The requested state is already in effect, or the machine is in a terminal state that absorbs further writes.
    Unchanged,
}

impl<S> TransitionOutcome<S> {
    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Order cannot move from {current} to {requested}")]
    InvalidOrderTransition { current: OrderStatusType, requested: OrderStatusType },
    #[error("Payment cannot move from {current} to {requested}")]
    InvalidPaymentTransition { current: PaymentStatus, requested: PaymentStatus },
}

impl TransitionError {
    /// The state the record was in when the move was refused.
    pub fn current_state(&self) -> &'static str {
        match self {
            Self::InvalidOrderTransition { current, .. } => current.as_str(),
            Self::InvalidPaymentTransition { current, .. } => current.as_str(),
        }
    }
}
