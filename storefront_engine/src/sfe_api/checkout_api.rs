use std::fmt::Debug;

use log::*;
use storefront_common::Cents;

use crate::{
    cart::Cart,
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentId, PaymentStatus, ShippingAddress, UserId},
    events::{EventProducers, OrderModifiedEvent},
    lifecycle::{OrderLifecycle, TransitionOutcome},
    sfe_api::{errors::CheckoutApiError, order_objects::CheckoutReceipt},
    traits::DocumentStore,
};

/// `CheckoutApi` is the purchaser side of the engine: turning a cart into an order, opening payment attempts against
/// it, and cancelling it.
///
/// The purchaser never decides a payment's outcome. That is left to the
/// [`AdminActionGateway`](crate::AdminActionGateway).
pub struct CheckoutApi<B> {
    db: B,
    producers: EventProducers,
}

impl<B> Debug for CheckoutApi<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "CheckoutApi")
    }
}

impl<B: Clone> Clone for CheckoutApi<B> {
    fn clone(&self) -> Self {
        Self { db: self.db.clone(), producers: self.producers.clone() }
    }
}

impl<B> CheckoutApi<B> {
    pub fn new(db: B, producers: EventProducers) -> Self {
        Self { db, producers }
    }
}

impl<B> CheckoutApi<B>
where B: DocumentStore
{
    /// Submits the cart as a new order and opens the first payment attempt for it.
    ///
    /// The payment is opened first, against the placeholder order id, so that a taken payment reference is rejected
    /// before any order is written. Once the order exists the two records are linked to each other.
    ///
    /// The cart itself is not cleared here. That only happens once the payment settles.
    pub async fn checkout(
        &self,
        user_id: &UserId,
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_id: PaymentId,
    ) -> Result<CheckoutReceipt, CheckoutApiError> {
        validate_checkout(cart, &shipping_address)?;
        let totals = cart.totals();
        self.open_payment(payment_id.clone(), totals.total, cart.currency(), None).await?;
        let order = self.insert_order(user_id, cart, shipping_address, Some(payment_id.clone())).await?;
        let payment = self.db.link_payment_to_order(&payment_id, &order.order_id).await?;
        info!("🧾 Checkout complete. Order {} awaits payment {payment_id} of {}", order.order_id, order.total);
        Ok(CheckoutReceipt { order, payment })
    }

    /// Submits the cart as a new order without opening a payment for it.
    pub async fn submit_order(
        &self,
        user_id: &UserId,
        cart: &Cart,
        shipping_address: ShippingAddress,
    ) -> Result<Order, CheckoutApiError> {
        validate_checkout(cart, &shipping_address)?;
        self.insert_order(user_id, cart, shipping_address, None).await
    }

    async fn insert_order(
        &self,
        user_id: &UserId,
        cart: &Cart,
        shipping_address: ShippingAddress,
        payment_id: Option<PaymentId>,
    ) -> Result<Order, CheckoutApiError> {
        let mut order = NewOrder::from_cart(OrderId::random(), user_id.clone(), cart, shipping_address);
        if let Some(payment_id) = payment_id {
            order = order.with_payment_id(payment_id);
        }
        let order = self.db.insert_order(order).await?;
        debug!("🧾 Order {} submitted for {user_id} with {} items", order.order_id, order.items.len());
        Ok(order)
    }

    /// Opens a payment attempt. If `order_id` is `None`, the payment is opened against the placeholder order and must
    /// be linked with [`Self::link_payment`] later.
    pub async fn open_payment(
        &self,
        payment_id: PaymentId,
        amount: Cents,
        currency: &str,
        order_id: Option<OrderId>,
    ) -> Result<Payment, CheckoutApiError> {
        if !amount.is_positive() {
            return Err(CheckoutApiError::InvalidAmount(amount));
        }
        let order_id = order_id.unwrap_or_else(OrderId::placeholder);
        let payment = self.db.insert_payment(NewPayment::new(payment_id, order_id, amount, currency)).await?;
        debug!("🧾 Payment {} opened for {} {currency}", payment.payment_id, payment.amount);
        Ok(payment)
    }

    /// Links an open payment and an order to each other. The order's mirrored payment status is reset to `pending`.
    pub async fn link_payment(
        &self,
        payment_id: &PaymentId,
        order_id: &OrderId,
    ) -> Result<CheckoutReceipt, CheckoutApiError> {
        let old_order = self.order(order_id).await?;
        self.payment(payment_id).await?;
        let payment = self.db.link_payment_to_order(payment_id, order_id).await?;
        let order = self.db.attach_payment(order_id, payment_id).await?;
        debug!("🧾 Payment {payment_id} linked to order {order_id}");
        self.producers.publish_order_modified(OrderModifiedEvent::new(old_order, order.clone())).await;
        Ok(CheckoutReceipt { order, payment })
    }

    /// Opens a new payment attempt for an order whose previous attempt failed or expired.
    ///
    /// The order, and with it the shipping address, is kept. Only the payment reference changes.
    pub async fn retry_payment(
        &self,
        user_id: &UserId,
        order_id: &OrderId,
        payment_id: PaymentId,
    ) -> Result<CheckoutReceipt, CheckoutApiError> {
        let order = self.owned_order(user_id, order_id).await?;
        if order.status.is_terminal() {
            return Err(CheckoutApiError::OrderClosed { order_id: order_id.clone(), status: order.status });
        }
        if let Some(current) = &order.payment_id {
            let previous = self.payment(current).await?;
            if !matches!(previous.status, PaymentStatus::Failed | PaymentStatus::Expired) {
                return Err(CheckoutApiError::PaymentStillOpen { payment_id: current.clone(), status: previous.status });
            }
        }
        let payment = self.open_payment(payment_id, order.total, &order.currency, Some(order_id.clone())).await?;
        let new_order = self.db.attach_payment(order_id, &payment.payment_id).await?;
        info!("🧾 Order {order_id} will be retried with payment {}", payment.payment_id);
        self.producers.publish_order_modified(OrderModifiedEvent::new(order, new_order.clone())).await;
        Ok(CheckoutReceipt { order: new_order, payment })
    }

    /// The purchaser's cancellation path. It can only ever move an order to `cancelled`.
    pub async fn cancel_order(&self, user_id: &UserId, order_id: &OrderId) -> Result<Order, CheckoutApiError> {
        let order = self.owned_order(user_id, order_id).await?;
        match OrderLifecycle::transition(order.status, OrderStatusType::Cancelled)? {
            TransitionOutcome::Unchanged => Ok(order),
            TransitionOutcome::Applied { .. } => {
                let new_order = self.db.update_order_status(order_id, OrderStatusType::Cancelled).await?;
                info!("🧾 Order {order_id} was cancelled by {user_id}");
                self.producers.publish_order_modified(OrderModifiedEvent::new(order, new_order.clone())).await;
                Ok(new_order)
            },
        }
    }

    pub async fn order(&self, order_id: &OrderId) -> Result<Order, CheckoutApiError> {
        self.db.fetch_order(order_id).await?.ok_or_else(|| CheckoutApiError::OrderNotFound(order_id.clone()))
    }

    pub async fn payment(&self, payment_id: &PaymentId) -> Result<Payment, CheckoutApiError> {
        self.db.fetch_payment(payment_id).await?.ok_or_else(|| CheckoutApiError::PaymentNotFound(payment_id.clone()))
    }

    pub async fn orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, CheckoutApiError> {
        Ok(self.db.fetch_orders_for_user(user_id).await?)
    }

    async fn owned_order(&self, user_id: &UserId, order_id: &OrderId) -> Result<Order, CheckoutApiError> {
        let order = self.order(order_id).await?;
        if &order.user_id != user_id {
            warn!("🧾 {user_id} tried to act on order {order_id}, which belongs to {}", order.user_id);
            return Err(CheckoutApiError::NotOrderOwner(order_id.clone()));
        }
        Ok(order)
    }
}

fn validate_checkout(cart: &Cart, shipping_address: &ShippingAddress) -> Result<(), CheckoutApiError> {
    if cart.is_empty() {
        return Err(CheckoutApiError::EmptyCart);
    }
    let missing = shipping_address.missing_fields();
    if !missing.is_empty() {
        return Err(CheckoutApiError::InvalidShippingAddress(missing.join(", ")));
    }
    Ok(())
}
