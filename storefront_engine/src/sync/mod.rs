//! # Checkout status synchronisation
//!
//! After checkout, the purchaser waits on a payment that an operator confirms out-of-band. The outcome reaches the
//! engine along two independent paths:
//!
//! * **push**: a [`RealtimeChannel`](crate::realtime::RealtimeChannel) subscription keyed by payment id, which
//!   delivers the `Payment` record as it is now and after every write;
//! * **poll**: a fixed-interval read of the `Order`, whose `payment_status` mirrors the payment.
//!
//! A [`SyncSession`] feeds both into one decision function. The first observation of `completed` from either path
//! settles the session: the injected [`SettleAction`] runs (it clears the purchaser's cart), the status becomes
//! [`SyncStatus::Settled`], and a redirect is published after a short delay. Settling is a single compare-and-set on
//! the session's state word, so it happens at most once no matter how the two paths interleave. Observations that
//! arrive afterwards are discarded.
//!
//! `failed` and `expired` payments, and orders that were failed or cancelled, surface as
//! [`SyncStatus::RetryableFailure`] without completing the session. Read failures on either path are absorbed and
//! retried. Each path counts its own consecutive failures and a success on a path resets its count. The status only
//! becomes [`SyncStatus::Unavailable`] when the poll is over budget and the push is over budget or unsubscribed. It
//! returns to `Waiting` as soon as that stops being true.
//!
//! The coordinator only ever reads the store.
mod coordinator;
mod session;
mod status;

use std::time::Duration;

pub use coordinator::SyncCoordinator;
pub use session::{SessionObserver, SyncSession};
pub use status::{Decision, ObservationSource, RetryReason, SyncStatus};
use thiserror::Error;

use crate::{
    cart::CartRepository,
    db_types::{OrderId, OrderStatusType, UserId},
};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(10);
pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_secs(2);
pub const DEFAULT_MAX_CONSECUTIVE_FAILURES: u32 = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncConfig {
    pub poll_interval: Duration,
    /// Delay between settling and publishing the redirect. May be zero.
    pub redirect_delay: Duration,
    /// Consecutive read failures tolerated on each path before that path counts as down.
    pub max_consecutive_failures: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            redirect_delay: DEFAULT_REDIRECT_DELAY,
            max_consecutive_failures: DEFAULT_MAX_CONSECUTIVE_FAILURES,
        }
    }
}

/// The one-time terminal side effect of a session. Must not block or suspend.
pub trait SettleAction: Send + Sync {
    fn settle(&self, order_id: &OrderId);
}

impl<F> SettleAction for F
where F: Fn(&OrderId) + Send + Sync
{
    fn settle(&self, order_id: &OrderId) {
        (self)(order_id)
    }
}

/// Settles by emptying the purchaser's cart.
pub struct ClearCart {
    carts: CartRepository,
    user_id: UserId,
}

impl ClearCart {
    pub fn new(carts: CartRepository, user_id: UserId) -> Self {
        Self { carts, user_id }
    }
}

impl SettleAction for ClearCart {
    fn settle(&self, order_id: &OrderId) {
        self.carts.clear(&self.user_id);
        log::info!("🔄️ Order {order_id} settled. Cart for {} cleared", self.user_id);
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SyncError {
    #[error("Payment status is currently unavailable")]
    SyncUnavailable,
    #[error("The payment session expired before the payment was confirmed")]
    SessionExpired,
    #[error("The payment failed: {}", .message.as_deref().unwrap_or("no reason given"))]
    PaymentFailed { message: Option<String> },
    #[error("The order is {0} and can no longer be paid")]
    OrderAnnulled(OrderStatusType),
    #[error("The session was closed before an outcome was reached")]
    Closed,
}
