//! A thread-safe, in-process [`DocumentStore`](crate::traits::DocumentStore).
//!
//! Follows the same contract as [`SqliteDatabase`](crate::SqliteDatabase), including refusing to overwrite terminal
//! payment statuses. Used in tests and when embedding the engine without a database.
use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
};

use async_trait::async_trait;
use chrono::Utc;
use log::*;
use tokio::sync::RwLock;

use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentId, PaymentStatus, UserId},
    traits::{OrderManagement, PaymentManagement, StoreError},
};

#[derive(Debug, Default, Clone)]
pub struct InMemoryStore {
    orders: Arc<RwLock<HashMap<OrderId, Order>>>,
    payments: Arc<RwLock<HashMap<PaymentId, Payment>>>,
    next_id: Arc<AtomicI64>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn next_id(&self) -> i64 {
        self.next_id.fetch_add(1, Ordering::Relaxed) + 1
    }
}

#[async_trait]
impl OrderManagement for InMemoryStore {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        if orders.contains_key(&order.order_id) {
            return Err(StoreError::DuplicateOrder(order.order_id));
        }
        let order = Order {
            id: self.next_id(),
            order_id: order.order_id,
            user_id: order.user_id,
            items: order.items,
            shipping_address: order.shipping_address,
            payment_id: order.payment_id,
            subtotal: order.totals.subtotal,
            tax: order.totals.tax,
            shipping: order.totals.shipping,
            total: order.totals.total,
            currency: order.currency,
            status: OrderStatusType::Pending,
            payment_status: PaymentStatus::Pending,
            created_at: order.created_at,
            updated_at: order.created_at,
        };
        debug!("🗃️ Order {} stored in memory", order.order_id);
        orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        Ok(self.orders.read().await.get(order_id).cloned())
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id).ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        order.status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn update_order_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id).ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        if order.payment_status.is_terminal() && order.payment_status != status {
            return Err(StoreError::TerminalOrderPaymentStatus {
                order_id: order_id.clone(),
                current: order.payment_status,
            });
        }
        order.payment_status = status;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn attach_payment(&self, order_id: &OrderId, payment_id: &PaymentId) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().await;
        let order = orders.get_mut(order_id).ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
        order.payment_id = Some(payment_id.clone());
        order.payment_status = PaymentStatus::Pending;
        order.updated_at = Utc::now();
        Ok(order.clone())
    }

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let orders = self.orders.read().await;
        let mut result = orders.values().filter(|o| &o.user_id == user_id).cloned().collect::<Vec<_>>();
        result.sort_by_key(|o| (o.created_at, o.id));
        Ok(result)
    }
}

#[async_trait]
impl PaymentManagement for InMemoryStore {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut payments = self.payments.write().await;
        if payments.contains_key(&payment.payment_id) {
            return Err(StoreError::DuplicatePayment(payment.payment_id));
        }
        let payment = Payment {
            id: self.next_id(),
            payment_id: payment.payment_id,
            order_id: payment.order_id,
            amount: payment.amount,
            currency: payment.currency,
            status: PaymentStatus::Pending,
            message: None,
            created_at: payment.created_at,
            updated_at: payment.created_at,
        };
        payments.insert(payment.payment_id.clone(), payment.clone());
        Ok(payment)
    }

    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, StoreError> {
        Ok(self.payments.read().await.get(payment_id).cloned())
    }

    async fn update_payment_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
        message: Option<String>,
    ) -> Result<Payment, StoreError> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(payment_id).ok_or_else(|| StoreError::PaymentNotFound(payment_id.clone()))?;
        if payment.status.is_terminal() {
            return Err(StoreError::TerminalPaymentStatus { payment_id: payment_id.clone(), current: payment.status });
        }
        payment.status = status;
        if message.is_some() {
            payment.message = message;
        }
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn link_payment_to_order(&self, payment_id: &PaymentId, order_id: &OrderId) -> Result<Payment, StoreError> {
        let mut payments = self.payments.write().await;
        let payment = payments.get_mut(payment_id).ok_or_else(|| StoreError::PaymentNotFound(payment_id.clone()))?;
        payment.order_id = order_id.clone();
        payment.updated_at = Utc::now();
        Ok(payment.clone())
    }

    async fn fetch_payments_with_status(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>, StoreError> {
        let payments = self.payments.read().await;
        let mut result = payments.values().filter(|p| statuses.contains(&p.status)).cloned().collect::<Vec<_>>();
        result.sort_by_key(|p| (p.created_at, p.id));
        Ok(result)
    }
}
