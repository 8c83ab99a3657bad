use async_trait::async_trait;

use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentId, PaymentStatus},
    traits::StoreError,
};

/// Payment records in the durable store.
#[async_trait]
pub trait PaymentManagement: Send + Sync {
    /// Stores a new payment in the `pending` state. Payment ids are supplied by the caller; a repeated id fails with
    /// [`StoreError::DuplicatePayment`].
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError>;

    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, StoreError>;

    /// Conditionally updates the payment status. A payment that is already terminal is never overwritten; the call
    /// fails with [`StoreError::TerminalPaymentStatus`] instead.
    async fn update_payment_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
        message: Option<String>,
    ) -> Result<Payment, StoreError>;

    /// Points the payment at its order. Used when the payment was opened against the placeholder order id.
    async fn link_payment_to_order(&self, payment_id: &PaymentId, order_id: &OrderId) -> Result<Payment, StoreError>;

    async fn fetch_payments_with_status(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>, StoreError>;
}
