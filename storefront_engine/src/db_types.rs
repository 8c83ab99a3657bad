use std::{fmt::Display, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use storefront_common::Cents;
use thiserror::Error;

use crate::cart::{Cart, CartLine, CartTotals};

#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid value: {0}")]
pub struct ConversionError(String);

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident, $fmt:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Type, Serialize, Deserialize)]
        #[sqlx(transparent)]
        #[serde(transparent)]
        pub struct $name(pub String);

        impl $name {
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl From<String> for $name {
            fn from(s: String) -> Self {
                Self(s)
            }
        }

        impl From<&str> for $name {
            fn from(s: &str) -> Self {
                Self(s.to_string())
            }
        }

        impl Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, $fmt, self.0)
            }
        }
    };
}

//--------------------------------------       Identifiers      --------------------------------------------------------
string_id!(
    /// Identifies an order. Assigned by checkout when the order is submitted.
    OrderId,
    "#{}"
);
string_id!(
    /// Identifies a single payment attempt. Always supplied by the caller; the store never generates these.
    PaymentId,
    "[{}]"
);
string_id!(UserId, "{}");
string_id!(ProductId, "{}");

const PLACEHOLDER_ORDER_ID: &str = "__unassigned__";

impl OrderId {
    /// Generates a fresh order id, e.g. `ORD-00A1B2C3D4E5`.
    pub fn random() -> Self {
        let n = rand::random::<u64>() & 0xFFFF_FFFF_FFFF;
        Self(format!("ORD-{n:012X}"))
    }

    /// The sentinel a payment carries before its order exists.
    pub fn placeholder() -> Self {
        Self(PLACEHOLDER_ORDER_ID.to_string())
    }

    pub fn is_placeholder(&self) -> bool {
        self.0 == PLACEHOLDER_ORDER_ID
    }
}

//--------------------------------------     OrderStatusType    --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum OrderStatusType {
    /// Submitted at checkout, awaiting payment confirmation.
    Pending,
    Paid,
    Preparing,
    OutForDelivery,
    /// Terminal.
    Delivered,
    /// Terminal. Operator override from any non-terminal state.
    Failed,
    /// Terminal. Operator override, or the purchaser cancellation path.
    Cancelled,
}

impl OrderStatusType {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Delivered | Self::Failed | Self::Cancelled)
    }

    /// The next state on the normal fulfilment path, if any.
    pub fn next_in_fulfilment(&self) -> Option<Self> {
        match self {
            Self::Pending => Some(Self::Paid),
            Self::Paid => Some(Self::Preparing),
            Self::Preparing => Some(Self::OutForDelivery),
            Self::OutForDelivery => Some(Self::Delivered),
            Self::Delivered | Self::Failed | Self::Cancelled => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Paid => "paid",
            Self::Preparing => "preparing",
            Self::OutForDelivery => "out_for_delivery",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl Display for OrderStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OrderStatusType {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "paid" => Ok(Self::Paid),
            "preparing" => Ok(Self::Preparing),
            "out_for_delivery" => Ok(Self::OutForDelivery),
            "delivered" => Ok(Self::Delivered),
            "failed" => Ok(Self::Failed),
            "cancelled" => Ok(Self::Cancelled),
            s => Err(ConversionError(format!("Invalid order status: {s}"))),
        }
    }
}

//--------------------------------------      PaymentStatus     --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    /// A payment reference has been generated, but nobody has confirmed it yet.
    Pending,
    Processing,
    Completed,
    Failed,
    /// The payment session window elapsed before confirmation.
    Expired,
}

impl PaymentStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Expired)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PaymentStatus {
    type Err = ConversionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "processing" => Ok(Self::Processing),
            "completed" => Ok(Self::Completed),
            "failed" => Ok(Self::Failed),
            "expired" => Ok(Self::Expired),
            s => Err(ConversionError(format!("Invalid payment status: {s}"))),
        }
    }
}

//--------------------------------------     ShippingAddress    --------------------------------------------------------
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub recipient: String,
    pub line1: String,
    #[serde(default)]
    pub line2: Option<String>,
    pub city: String,
    pub postal_code: String,
    pub country: String,
}

impl ShippingAddress {
    /// Returns the names of required fields that are blank.
    pub fn missing_fields(&self) -> Vec<&'static str> {
        [
            ("recipient", &self.recipient),
            ("line1", &self.line1),
            ("city", &self.city),
            ("postal_code", &self.postal_code),
            ("country", &self.country),
        ]
        .into_iter()
        .filter(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
        .collect()
    }
}

//--------------------------------------        LineItem        --------------------------------------------------------
/// An immutable copy of a cart line, frozen into an order at submission time.
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub unit_price: Cents,
    pub quantity: u32,
}

impl From<&CartLine> for LineItem {
    fn from(line: &CartLine) -> Self {
        Self { product_id: line.product_id.clone(), unit_price: line.unit_price, quantity: line.quantity }
    }
}

//--------------------------------------          Order         --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    /// The payment attempt currently bound to this order.
    pub payment_id: Option<PaymentId>,
    pub subtotal: Cents,
    pub tax: Cents,
    pub shipping: Cents,
    pub total: Cents,
    pub currency: String,
    pub status: OrderStatusType,
    /// Mirror of the bound payment's status. See [`crate::sync`] for how disagreement with the payment record is
    /// treated.
    pub payment_status: PaymentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Order {
    pub fn totals(&self) -> CartTotals {
        CartTotals { subtotal: self.subtotal, tax: self.tax, shipping: self.shipping, total: self.total }
    }
}

//--------------------------------------        NewOrder        --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub items: Vec<LineItem>,
    pub shipping_address: ShippingAddress,
    pub payment_id: Option<PaymentId>,
    pub totals: CartTotals,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewOrder {
    /// Snapshots the cart's lines and freezes its current totals.
    pub fn from_cart(order_id: OrderId, user_id: UserId, cart: &Cart, shipping_address: ShippingAddress) -> Self {
        Self {
            order_id,
            user_id,
            items: cart.lines().iter().map(LineItem::from).collect(),
            shipping_address,
            payment_id: None,
            totals: cart.totals(),
            currency: cart.currency().to_string(),
            created_at: Utc::now(),
        }
    }

    pub fn with_payment_id(mut self, payment_id: PaymentId) -> Self {
        self.payment_id = Some(payment_id);
        self
    }
}

//--------------------------------------         Payment        --------------------------------------------------------
#[derive(Debug, Clone, PartialEq, Eq, FromRow, Serialize, Deserialize)]
pub struct Payment {
    pub id: i64,
    pub payment_id: PaymentId,
    /// May be [`OrderId::placeholder`] if the payment was opened before the order was submitted.
    pub order_id: OrderId,
    pub amount: Cents,
    pub currency: String,
    pub status: PaymentStatus,
    /// Optional operator-supplied note, e.g. the reason a payment failed.
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

//--------------------------------------       NewPayment       --------------------------------------------------------
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub payment_id: PaymentId,
    pub order_id: OrderId,
    pub amount: Cents,
    pub currency: String,
    pub created_at: DateTime<Utc>,
}

impl NewPayment {
    pub fn new(payment_id: PaymentId, order_id: OrderId, amount: Cents, currency: &str) -> Self {
        Self { payment_id, order_id, amount, currency: currency.to_string(), created_at: Utc::now() }
    }
}
