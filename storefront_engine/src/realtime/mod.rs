//! Push-style payment status delivery.
//!
//! A [`RealtimeChannel`] hands out one [`Subscription`] per payment. A subscription delivers the payment as it is
//! right now, then every later write to it. If the channel loses messages it delivers a [`ChannelMessage::Error`],
//! re-reads the payment and carries on.
mod broadcast;
mod subscription;

use async_trait::async_trait;
pub use broadcast::{PaymentBroadcast, DEFAULT_BROADCAST_CAPACITY};
pub use subscription::Subscription;
use thiserror::Error;

use crate::{
    db_types::{Payment, PaymentId},
    traits::StoreError,
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChannelMessage {
    Update(Payment),
    /// Transient loss. The subscription stays open unless it is followed by the end of the stream.
    Error(String),
}

#[derive(Debug, Clone, Error)]
pub enum ChannelError {
    #[error("Payment {0} does not exist")]
    UnknownPayment(PaymentId),
    #[error("Could not read the current payment: {0}")]
    StoreError(#[from] StoreError),
}

#[async_trait]
pub trait RealtimeChannel: Send + Sync {
    async fn subscribe(&self, payment_id: &PaymentId) -> Result<Subscription, ChannelError>;
}
