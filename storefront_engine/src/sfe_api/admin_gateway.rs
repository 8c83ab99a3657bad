use std::{fmt::Debug, time::Duration};

use chrono::Utc;
use log::*;
use tokio::task::JoinHandle;

use crate::{
    db_types::{Order, OrderId, OrderStatusType, Payment, PaymentId, PaymentStatus},
    events::{EventProducers, OrderModifiedEvent, PaymentUpdatedEvent},
    lifecycle::{OrderLifecycle, PaymentLifecycle, TransitionCause, TransitionOutcome},
    sfe_api::{
        errors::GatewayError,
        order_objects::{OrderUpdate, PaymentUpdate},
    },
    traits::{DocumentStore, StoreError},
};

const SESSION_EXPIRED_MESSAGE: &str = "Payment session expired";

/// `AdminActionGateway` is the only writer of payment outcomes and fulfilment states.
///
/// Every write is checked against the relevant lifecycle first. A successful payment write is always published, then
/// mirrored onto the owning order's `payment_status`. If the mirror write fails, the next write for the same payment
/// (an operator repeat or the session timer) repairs it. Otherwise the two records only disagree if someone uses the
/// legacy [`Self::set_order_payment_status`] action.
#[derive(Clone)]
pub struct AdminActionGateway<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for AdminActionGateway<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "AdminActionGateway")
    }
}

impl<B> AdminActionGateway<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }

    pub fn db(&self) -> &B {
        &self.db
    }
}

impl<B> AdminActionGateway<B>
where B: DocumentStore
{
    /// Operator action: record the outcome of a payment attempt.
    ///
    /// Requests for the current state, or for anything once the payment is terminal, return
    /// [`PaymentUpdate::Unchanged`]. Operators cannot expire a payment; only the session timer can.
    pub async fn set_payment_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
        message: Option<String>,
    ) -> Result<PaymentUpdate, GatewayError> {
        self.apply_payment_status(payment_id, status, message, TransitionCause::Operator).await
    }

    /// Session timer action: moves a still-open payment to `expired`. Terminal payments are left alone.
    pub async fn expire_payment(&self, payment_id: &PaymentId) -> Result<PaymentUpdate, GatewayError> {
        self.apply_payment_status(
            payment_id,
            PaymentStatus::Expired,
            Some(SESSION_EXPIRED_MESSAGE.to_string()),
            TransitionCause::SessionTimer,
        )
        .await
    }

    async fn apply_payment_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
        message: Option<String>,
        cause: TransitionCause,
    ) -> Result<PaymentUpdate, GatewayError> {
        let payment = self.fetch_payment(payment_id).await?;
        let from = match PaymentLifecycle::transition(payment.status, status, cause)? {
            TransitionOutcome::Applied { from, .. } => from,
            TransitionOutcome::Unchanged => {
                debug!("🛂 Payment {payment_id} is already {}. Ignoring request for {status}", payment.status);
                if payment.status.is_terminal() {
                    self.repair_mirror(&payment).await?;
                }
                return Ok(PaymentUpdate::Unchanged(payment));
            },
        };
        let updated = match self.db.update_payment_status(payment_id, status, message).await {
            Ok(p) => p,
            Err(StoreError::TerminalPaymentStatus { current, .. }) => {
                // Another writer got there first
                debug!("🛂 Payment {payment_id} became {current} while we were updating it to {status}");
                let payment = self.fetch_payment(payment_id).await?;
                return Ok(PaymentUpdate::Unchanged(payment));
            },
            Err(e) => return Err(e.into()),
        };
        info!("🛂 Payment {payment_id} moved from {from} to {status}");
        debug!("🛂📬️ Notifying payment updated hook subscribers");
        self.producers.publish_payment_updated(PaymentUpdatedEvent::new(from, updated.clone())).await;
        // The payment write stands. A stale mirror is repaired by the next write for this payment.
        if let Err(e) = self.mirror_onto_order(&updated).await {
            warn!("🛂 Payment {payment_id} is {status} but its order mirror could not be updated. {e}");
        }
        Ok(PaymentUpdate::Applied(updated))
    }

    /// Re-publishes a terminal payment and re-mirrors it if its order still records an open status for it.
    async fn repair_mirror(&self, payment: &Payment) -> Result<(), GatewayError> {
        if payment.order_id.is_placeholder() {
            return Ok(());
        }
        let Some(order) = self.db.fetch_order(&payment.order_id).await? else {
            return Ok(());
        };
        let stale = order.payment_id.as_ref() == Some(&payment.payment_id)
            && order.payment_status != payment.status
            && !order.payment_status.is_terminal();
        if !stale {
            return Ok(());
        }
        info!(
            "🛂 Order {} still records {} for payment {}, which is {}. Repairing the mirror",
            order.order_id, order.payment_status, payment.payment_id, payment.status
        );
        self.producers.publish_payment_updated(PaymentUpdatedEvent::new(order.payment_status, payment.clone())).await;
        self.mirror_onto_order(payment).await
    }

    async fn mirror_onto_order(&self, payment: &Payment) -> Result<(), GatewayError> {
        if payment.order_id.is_placeholder() {
            debug!("🛂 Payment {} is not linked to an order yet. Nothing to mirror", payment.payment_id);
            return Ok(());
        }
        let Some(old_order) = self.db.fetch_order(&payment.order_id).await? else {
            warn!("🛂 Payment {} points at order {}, which does not exist", payment.payment_id, payment.order_id);
            return Ok(());
        };
        if old_order.payment_id.as_ref() != Some(&payment.payment_id) {
            debug!(
                "🛂 Order {} has moved on to payment {:?}. Not mirroring the status of {}",
                old_order.order_id, old_order.payment_id, payment.payment_id
            );
            return Ok(());
        }
        match self.db.update_order_payment_status(&old_order.order_id, payment.status).await {
            Ok(new_order) => {
                self.producers.publish_order_modified(OrderModifiedEvent::new(old_order, new_order)).await;
                Ok(())
            },
            Err(StoreError::TerminalOrderPaymentStatus { order_id, current }) => {
                warn!(
                    "🛂 Drift: payment {} is {} but order {order_id} already records {current}. Leaving the order as is",
                    payment.payment_id, payment.status
                );
                Ok(())
            },
            Err(e) => Err(e.into()),
        }
    }

    /// Operator action: move an order along its fulfilment path, or fail/cancel it.
    pub async fn set_order_status(
        &self,
        order_id: &OrderId,
        status: OrderStatusType,
    ) -> Result<OrderUpdate, GatewayError> {
        let old_order = self.fetch_order(order_id).await?;
        match OrderLifecycle::transition(old_order.status, status)? {
            TransitionOutcome::Unchanged => {
                debug!("🛂 Order {order_id} is already {status}");
                Ok(OrderUpdate::Unchanged(old_order))
            },
            TransitionOutcome::Applied { from, to } => {
                let new_order = self.db.update_order_status(order_id, to).await?;
                info!("🛂 Order {order_id} moved from {from} to {to}");
                self.producers.publish_order_modified(OrderModifiedEvent::new(old_order, new_order.clone())).await;
                Ok(OrderUpdate::Applied(new_order))
            },
        }
    }

    /// Legacy operator action: write the order's mirrored payment status directly, without touching the payment
    /// record. The payment lifecycle rules still apply to the field. Any disagreement with the payment record is
    /// logged.
    pub async fn set_order_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<OrderUpdate, GatewayError> {
        let old_order = self.fetch_order(order_id).await?;
        if let TransitionOutcome::Unchanged =
            PaymentLifecycle::transition(old_order.payment_status, status, TransitionCause::Operator)?
        {
            debug!("🛂 Order {order_id} already records payment status {}", old_order.payment_status);
            return Ok(OrderUpdate::Unchanged(old_order));
        }
        let new_order = match self.db.update_order_payment_status(order_id, status).await {
            Ok(o) => o,
            Err(StoreError::TerminalOrderPaymentStatus { .. }) => {
                let order = self.fetch_order(order_id).await?;
                return Ok(OrderUpdate::Unchanged(order));
            },
            Err(e) => return Err(e.into()),
        };
        info!("🛂 Order {order_id} payment status set to {status} directly");
        self.log_drift(&new_order).await;
        self.producers.publish_order_modified(OrderModifiedEvent::new(old_order, new_order.clone())).await;
        Ok(OrderUpdate::Applied(new_order))
    }

    async fn log_drift(&self, order: &Order) {
        let Some(payment_id) = &order.payment_id else {
            return;
        };
        match self.db.fetch_payment(payment_id).await {
            Ok(Some(payment)) if payment.status != order.payment_status => warn!(
                "🛂 Drift: order {} records payment status {} but payment {payment_id} is {}",
                order.order_id, order.payment_status, payment.status
            ),
            Ok(_) => {},
            Err(e) => warn!("🛂 Could not check payment {payment_id} for drift. {e}"),
        }
    }

    /// Expires every open payment whose session window has run out. Returns the payments that were expired.
    ///
    /// This is the backstop for payments whose session timer was lost, e.g. across a server restart. Failures on
    /// individual payments are logged and skipped.
    pub async fn expire_stale_payments(&self, window: Duration) -> Result<Vec<Payment>, GatewayError> {
        let open = self.db.fetch_payments_with_status(&[PaymentStatus::Pending, PaymentStatus::Processing]).await?;
        let now = Utc::now();
        let mut expired = Vec::new();
        for payment in open.into_iter().filter(|p| PaymentLifecycle::session_elapsed(p, now, window)) {
            match self.expire_payment(&payment.payment_id).await {
                Ok(PaymentUpdate::Applied(p)) => expired.push(p),
                Ok(PaymentUpdate::Unchanged(_)) => {},
                Err(e) => warn!("🛂 Could not expire payment {}. {e}", payment.payment_id),
            }
        }
        if !expired.is_empty() {
            info!("🛂 Expired {} stale payments", expired.len());
        }
        Ok(expired)
    }

    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Payment, GatewayError> {
        self.db.fetch_payment(payment_id).await?.ok_or_else(|| GatewayError::PaymentNotFound(payment_id.clone()))
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Order, GatewayError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| GatewayError::OrderNotFound(order_id.clone()))
    }
}

impl<B> AdminActionGateway<B>
where B: DocumentStore + Send + Sync
{
    /// Spawns the session timer for a payment. When `window` elapses the payment is expired if it is still open.
    ///
    /// Abort the returned handle to cancel the timer.
    pub fn start_session_timer(&self, payment_id: PaymentId, window: Duration) -> JoinHandle<()> {
        let gateway = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(window).await;
            match gateway.expire_payment(&payment_id).await {
                Ok(PaymentUpdate::Applied(_)) => info!("🛂 Session for payment {payment_id} has expired"),
                Ok(PaymentUpdate::Unchanged(p)) => {
                    trace!("🛂 Session timer for payment {payment_id} fired after it became {}", p.status)
                },
                Err(e) => warn!("🛂 Session timer for payment {payment_id} could not expire it. {e}"),
            }
        })
    }
}
