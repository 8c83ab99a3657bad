use std::fmt::Display;

use serde::{Deserialize, Serialize};
use storefront_common::Cents;
use storefront_engine::{
    cart::{Cart, CartLine, CartTotals, LineId},
    db_types::{OrderStatusType, PaymentId, PaymentStatus, ProductId, ShippingAddress, UserId},
    order_objects::CheckoutReceipt,
    sync::SyncStatus,
};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonResponse {
    pub success: bool,
    pub message: String,
}

impl JsonResponse {
    pub fn success<S: Display>(message: S) -> Self {
        Self { success: true, message: message.to_string() }
    }

    pub fn failure<S: Display>(message: S) -> Self {
        Self { success: false, message: message.to_string() }
    }
}

//--------------------------------------          Cart          --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddLineRequest {
    pub product_id: ProductId,
    pub unit_price: Cents,
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SetQuantityRequest {
    pub quantity: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartResponse {
    pub lines: Vec<CartLine>,
    pub totals: CartTotals,
    pub currency: String,
    /// Set when the request created a line, or added to an existing one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line_id: Option<LineId>,
}

impl CartResponse {
    pub fn new(cart: &Cart) -> Self {
        Self { lines: cart.lines().to_vec(), totals: cart.totals(), currency: cart.currency().to_string(), line_id: None }
    }

    pub fn with_line_id(mut self, line_id: LineId) -> Self {
        self.line_id = Some(line_id);
        self
    }
}

//--------------------------------------        Checkout        --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutRequest {
    pub shipping_address: ShippingAddress,
    /// The payment reference generated for this attempt.
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CheckoutResponse {
    #[serde(flatten)]
    pub receipt: CheckoutReceipt,
    pub session: SyncStatus,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryRequest {
    pub user_id: UserId,
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CancelRequest {
    pub user_id: UserId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionResponse {
    pub payment_id: PaymentId,
    pub status: SyncStatus,
    pub drift_observed: bool,
}

//--------------------------------------         Admin          --------------------------------------------------------
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentStatusUpdate {
    pub status: PaymentStatus,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderStatusUpdate {
    pub status: OrderStatusType,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderPaymentStatusUpdate {
    pub status: PaymentStatus,
}
