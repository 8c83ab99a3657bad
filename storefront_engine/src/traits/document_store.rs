use thiserror::Error;

use crate::{
    db_types::{OrderId, PaymentId, PaymentStatus},
    traits::{OrderManagement, PaymentManagement},
};

/// A backend that can hold both orders and payments. Anything implementing both traits qualifies.
pub trait DocumentStore: OrderManagement + PaymentManagement + Clone + 'static {}

impl<T> DocumentStore for T where T: OrderManagement + PaymentManagement + Clone + 'static {}

#[derive(Debug, Clone, Error)]
pub enum StoreError {
    #[error("Internal database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Order {0} already exists")]
    DuplicateOrder(OrderId),
    #[error("Payment {0} already exists")]
    DuplicatePayment(PaymentId),
    #[error("Payment {payment_id} is already {current} and cannot be changed")]
    TerminalPaymentStatus { payment_id: PaymentId, current: PaymentStatus },
    #[error("The payment status of order {order_id} is already {current} and cannot be changed")]
    TerminalOrderPaymentStatus { order_id: OrderId, current: PaymentStatus },
    #[error("Could not convert stored value: {0}")]
    ConversionError(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        StoreError::DatabaseError(e.to_string())
    }
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::OrderNotFound(_) | Self::PaymentNotFound(_))
    }
}
