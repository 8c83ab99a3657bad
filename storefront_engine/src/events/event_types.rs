use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment, PaymentStatus};

/// A payment record was written by an operator or the session timer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentUpdatedEvent {
    pub previous_status: PaymentStatus,
    pub payment: Payment,
}

impl PaymentUpdatedEvent {
    pub fn new(previous_status: PaymentStatus, payment: Payment) -> Self {
        Self { previous_status, payment }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderModifiedEvent {
    pub old_order: Order,
    pub new_order: Order,
}

impl OrderModifiedEvent {
    pub fn new(old_order: Order, new_order: Order) -> Self {
        Self { old_order, new_order }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    PaymentUpdated(PaymentUpdatedEvent),
    OrderModified(OrderModifiedEvent),
}
