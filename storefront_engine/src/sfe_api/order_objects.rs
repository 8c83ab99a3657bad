use serde::{Deserialize, Serialize};

use crate::db_types::{Order, Payment};

/// Everything the purchaser needs after a successful checkout or payment retry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutReceipt {
    pub order: Order,
    pub payment: Payment,
}

/// The result of an operator write to a payment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "payment", rename_all = "snake_case")]
pub enum PaymentUpdate {
    Applied(Payment),
    /// The payment was already in the requested state, or is terminal and absorbed the write.
    Unchanged(Payment),
}

impl PaymentUpdate {
    pub fn payment(&self) -> &Payment {
        match self {
            Self::Applied(p) | Self::Unchanged(p) => p,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}

/// The result of an operator write to an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "order", rename_all = "snake_case")]
pub enum OrderUpdate {
    Applied(Order),
    Unchanged(Order),
}

impl OrderUpdate {
    pub fn order(&self) -> &Order {
        match self {
            Self::Applied(o) | Self::Unchanged(o) => o,
        }
    }

    pub fn is_applied(&self) -> bool {
        matches!(self, Self::Applied(_))
    }
}
