use storefront_common::Cents;
use thiserror::Error;

use crate::{
    cart::CartError,
    db_types::{OrderId, OrderStatusType, PaymentId, PaymentStatus},
    lifecycle::TransitionError,
    traits::StoreError,
};

#[derive(Debug, Clone, Error)]
pub enum GatewayError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
}

impl From<StoreError> for GatewayError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::PaymentNotFound(id) => Self::PaymentNotFound(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum CheckoutApiError {
    #[error("Database error: {0}")]
    DatabaseError(String),
    #[error("Invalid cart: {0}")]
    InvalidCart(#[from] CartError),
    #[error("Cannot check out an empty cart")]
    EmptyCart,
    #[error("Shipping address is missing: {0}")]
    InvalidShippingAddress(String),
    #[error("Payment amount must be positive, but was {0}")]
    InvalidAmount(Cents),
    #[error("Order {0} does not exist")]
    OrderNotFound(OrderId),
    #[error("Payment {0} does not exist")]
    PaymentNotFound(PaymentId),
    #[error("Payment {0} already exists")]
    PaymentAlreadyExists(PaymentId),
    #[error("Order {0} belongs to someone else")]
    NotOrderOwner(OrderId),
    #[error("Order {order_id} is {status} and can no longer be paid for")]
    OrderClosed { order_id: OrderId, status: OrderStatusType },
    #[error("Payment {payment_id} is still {status}. Only failed or expired payments can be retried")]
    PaymentStillOpen { payment_id: PaymentId, status: PaymentStatus },
    #[error("{0}")]
    InvalidTransition(#[from] TransitionError),
}

impl From<StoreError> for CheckoutApiError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::OrderNotFound(id) => Self::OrderNotFound(id),
            StoreError::PaymentNotFound(id) => Self::PaymentNotFound(id),
            StoreError::DuplicatePayment(id) => Self::PaymentAlreadyExists(id),
            e => Self::DatabaseError(e.to_string()),
        }
    }
}
