use serde::{Deserialize, Serialize};

use crate::db_types::{OrderId, OrderStatusType};

/// What the purchaser's view should currently show.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum SyncStatus {
    Waiting,
    RetryableFailure { reason: RetryReason },
    /// Reads have failed more times in a row than the session tolerates. Observation continues.
    Unavailable,
    Settled { order_id: OrderId },
    Redirect { location: String },
}

impl SyncStatus {
    pub fn is_settled(&self) -> bool {
        matches!(self, Self::Settled { .. } | Self::Redirect { .. })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RetryReason {
    PaymentFailed { message: Option<String> },
    SessionExpired,
    OrderAnnulled { status: OrderStatusType },
}

/// The result of feeding one observation to a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// This observation settled the session.
    Settled,
    Pending,
    RetryableFailure(RetryReason),
    /// The session was already settled or closed; the observation had no effect.
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ObservationSource {
    Push,
    Poll,
}

impl std::fmt::Display for ObservationSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Push => f.write_str("push"),
            Self::Poll => f.write_str("poll"),
        }
    }
}
