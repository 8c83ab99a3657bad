use std::{future::Future, pin::Pin, sync::Arc};

use async_trait::async_trait;
use log::*;
use tokio::sync::{broadcast, broadcast::error::RecvError, mpsc};

use super::{ChannelError, ChannelMessage, RealtimeChannel, Subscription};
use crate::{
    db_types::{Payment, PaymentId},
    events::EventHooks,
    traits::PaymentManagement,
};

pub const DEFAULT_BROADCAST_CAPACITY: usize = 256;
const SUBSCRIPTION_BUFFER: usize = 16;

/// In-process [`RealtimeChannel`] fed by payment writes.
///
/// Wire it up by registering [`PaymentBroadcast::hooks`] with the event handlers, so that every
/// `PaymentUpdatedEvent` is republished here.
#[derive(Clone)]
pub struct PaymentBroadcast {
    sender: broadcast::Sender<Payment>,
    store: Arc<dyn PaymentManagement>,
}

impl PaymentBroadcast {
    pub fn new(store: Arc<dyn PaymentManagement>, capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender, store }
    }

    pub fn publish(&self, payment: Payment) {
        match self.sender.send(payment) {
            Ok(n) => trace!("🔄️ Payment update delivered to {n} listener(s)"),
            Err(e) => trace!("🔄️ No one is listening for {}", e.0.payment_id),
        }
    }

    /// Event hooks that republish payment updates on this channel.
    pub fn hooks(&self) -> EventHooks {
        let mut hooks = EventHooks::default();
        let channel = self.clone();
        hooks.on_payment_updated(move |ev| {
            let channel = channel.clone();
            Box::pin(async move { channel.publish(ev.payment) }) as Pin<Box<dyn Future<Output = ()> + Send>>
        });
        hooks
    }

    pub fn listener_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[async_trait]
impl RealtimeChannel for PaymentBroadcast {
    async fn subscribe(&self, payment_id: &PaymentId) -> Result<Subscription, ChannelError> {
        // Listen before reading, so a write that lands in between is not lost.
        let mut updates = self.sender.subscribe();
        let current = self
            .store
            .fetch_payment(payment_id)
            .await?
            .ok_or_else(|| ChannelError::UnknownPayment(payment_id.clone()))?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = Arc::clone(&self.store);
        let id = payment_id.clone();
        let forwarder = tokio::spawn(async move {
            if tx.send(ChannelMessage::Update(current)).await.is_err() {
                return;
            }
            loop {
                let msg = match updates.recv().await {
                    Ok(payment) if payment.payment_id == id => ChannelMessage::Update(payment),
                    Ok(_) => continue,
                    Err(RecvError::Lagged(n)) => {
                        warn!("🔄️ Subscription for {id} missed {n} update(s). Re-reading the payment");
                        if tx.send(ChannelMessage::Error(format!("missed {n} update(s)"))).await.is_err() {
                            break;
                        }
                        match store.fetch_payment(&id).await {
                            Ok(Some(payment)) => ChannelMessage::Update(payment),
                            Ok(None) => {
                                let _ = tx.send(ChannelMessage::Error(format!("payment {id} no longer exists"))).await;
                                break;
                            },
                            Err(e) => {
                                let _ = tx.send(ChannelMessage::Error(e.to_string())).await;
                                break;
                            },
                        }
                    },
                    Err(RecvError::Closed) => break,
                };
                if tx.send(msg).await.is_err() {
                    break;
                }
            }
            trace!("🔄️ Forwarder for {id} has stopped");
        });
        debug!("🔄️ New subscription for payment {payment_id}");
        Ok(Subscription::new(payment_id.clone(), rx, Some(forwarder)))
    }
}
