use log::*;
use tokio::{sync::mpsc, task::JoinHandle};

use super::ChannelMessage;
use crate::db_types::PaymentId;

/// A live feed of updates for one payment.
///
/// Closing releases the underlying listener. `close` may be called any number of times, and dropping the
/// subscription closes it too.
#[derive(Debug)]
pub struct Subscription {
    payment_id: PaymentId,
    receiver: mpsc::Receiver<ChannelMessage>,
    forwarder: Option<JoinHandle<()>>,
    closed: bool,
}

impl Subscription {
    /// `forwarder` is the task feeding `receiver`, if any. It is aborted on close.
    pub fn new(
        payment_id: PaymentId,
        receiver: mpsc::Receiver<ChannelMessage>,
        forwarder: Option<JoinHandle<()>>,
    ) -> Self {
        Self { payment_id, receiver, forwarder, closed: false }
    }

    pub fn payment_id(&self) -> &PaymentId {
        &self.payment_id
    }

    /// The next message, or `None` once the subscription is closed or the feed has ended.
    pub async fn recv(&mut self) -> Option<ChannelMessage> {
        if self.is_closed() {
            return None;
        }
        self.receiver.recv().await
    }

    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        if let Some(forwarder) = self.forwarder.take() {
            forwarder.abort();
        }
        self.receiver.close();
        trace!("🔄️ Subscription for {} closed", self.payment_id);
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}
