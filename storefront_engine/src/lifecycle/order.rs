use super::{TransitionError, TransitionOutcome};
use crate::db_types::OrderStatusType;

/// Fulfilment state machine.
///
/// ```text
/// pending -> paid -> preparing -> out_for_delivery -> delivered
///    \________\__________\_______________\__________-> failed | cancelled
/// ```
pub struct OrderLifecycle;

impl OrderLifecycle {
    pub fn transition(
        current: OrderStatusType,
        requested: OrderStatusType,
    ) -> Result<TransitionOutcome<OrderStatusType>, TransitionError> {
        use OrderStatusType::*;
        if current == requested {
            return Ok(TransitionOutcome::Unchanged);
        }
        let legal = !current.is_terminal() &&
            (matches!(requested, Failed | Cancelled) || current.next_in_fulfilment() == Some(requested));
        if legal {
            Ok(TransitionOutcome::Applied { from: current, to: requested })
        } else {
            Err(TransitionError::InvalidOrderTransition { current, requested })
        }
    }

    pub fn can_cancel(current: OrderStatusType) -> bool {
        !current.is_terminal()
    }
}
