use async_trait::async_trait;

use crate::{
    db_types::{NewOrder, Order, OrderId, OrderStatusType, PaymentId, PaymentStatus, UserId},
    traits::StoreError,
};

/// Order records in the durable store.
///
/// Backends do not enforce the order lifecycle; that is the caller's job. They do refuse to overwrite a terminal
/// `payment_status` mirror with a different value.
#[async_trait]
pub trait OrderManagement: Send + Sync {
    /// Stores a new order with `status = pending` and `payment_status = pending`. Fails with
    /// [`StoreError::DuplicateOrder`] if the order id is taken.
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError>;

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError>;

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, StoreError>;

    /// Writes the order's mirrored payment status. Returns [`StoreError::TerminalOrderPaymentStatus`] if the field
    /// already holds a different terminal value.
    async fn update_order_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order, StoreError>;

    /// Binds a (new) payment attempt to the order and resets the mirrored payment status to `pending`.
    async fn attach_payment(&self, order_id: &OrderId, payment_id: &PaymentId) -> Result<Order, StoreError>;

    /// All orders placed by the user, oldest first.
    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError>;
}
