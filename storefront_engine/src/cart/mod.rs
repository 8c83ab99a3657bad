//! Cart pricing engine
//!
//! A [`Cart`] is an ordered list of [`CartLine`]s. Totals are never stored; every call to [`Cart::totals`] prices the
//! current lines against the cart's [`PricingPolicy`]:
//!
//! * `subtotal = Σ(unit_price × quantity)`
//! * `tax = subtotal × tax_rate`, rounded half-up to the cent
//! * `shipping = 0` if `subtotal ≥ free_shipping_threshold`, otherwise the flat shipping cost
//! * `total = subtotal + tax + shipping`
//!
//! Every mutation is validated up front, so a cart can never reach a state whose totals overflow.
mod repository;

use std::fmt::Display;

use log::*;
use serde::{Deserialize, Serialize};
use storefront_common::{Cents, DEFAULT_CURRENCY_CODE};
use thiserror::Error;

pub use repository::CartRepository;

use crate::db_types::ProductId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("A product id is required")]
    EmptyProductId,
    #[error("Unit price must be positive, but was {0}")]
    NonPositivePrice(Cents),
    #[error("Quantity must be positive, but was {0}")]
    NonPositiveQuantity(i64),
    #[error("Cart line {0} does not exist")]
    LineNotFound(LineId),
    #[error("The cart total is too large to represent")]
    Overflow,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LineId(pub u64);

impl Display for LineId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartLine {
    pub line_id: LineId,
    pub product_id: ProductId,
    pub unit_price: Cents,
    pub quantity: u32,
}

impl CartLine {
    pub fn line_total(&self) -> Option<Cents> {
        self.unit_price.checked_mul(self.quantity)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CartTotals {
    pub subtotal: Cents,
    pub tax: Cents,
    pub shipping: Cents,
    pub total: Cents,
}

//--------------------------------------     PricingPolicy      --------------------------------------------------------
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PricingPolicy {
    /// Tax rate in basis points. 800 is 8%.
    pub tax_rate_bps: u32,
    pub free_shipping_threshold: Cents,
    pub flat_shipping_cost: Cents,
}

impl Default for PricingPolicy {
    fn default() -> Self {
        Self {
            tax_rate_bps: 800,
            free_shipping_threshold: Cents::from(5_000),
            flat_shipping_cost: Cents::from(599),
        }
    }
}

impl PricingPolicy {
    /// Prices a set of lines. Returns `None` if any intermediate amount overflows.
    pub fn price(&self, lines: &[CartLine]) -> Option<CartTotals> {
        let subtotal = lines.iter().try_fold(Cents::ZERO, |acc, line| acc.checked_add(line.line_total()?))?;
        let tax = subtotal.checked_apply_rate_bps(self.tax_rate_bps)?;
        let shipping =
            if subtotal >= self.free_shipping_threshold { Cents::ZERO } else { self.flat_shipping_cost };
        let total = subtotal.checked_add(tax)?.checked_add(shipping)?;
        Some(CartTotals { subtotal, tax, shipping, total })
    }
}

//--------------------------------------          Cart          --------------------------------------------------------
/// Only built through [`Cart::new`] and the line editing methods, which enforce positive prices and quantities.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cart {
    lines: Vec<CartLine>,
    next_line_id: u64,
    policy: PricingPolicy,
    currency: String,
}

impl Default for Cart {
    fn default() -> Self {
        Self::new(PricingPolicy::default(), DEFAULT_CURRENCY_CODE)
    }
}

impl Cart {
    pub fn new(policy: PricingPolicy, currency: &str) -> Self {
        Self { lines: Vec::new(), next_line_id: 1, policy, currency: currency.to_string() }
    }

    /// Lines in insertion order.
    pub fn lines(&self) -> &[CartLine] {
        &self.lines
    }

    pub fn currency(&self) -> &str {
        &self.currency
    }

    pub fn policy(&self) -> &PricingPolicy {
        &self.policy
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn line(&self, line_id: LineId) -> Option<&CartLine> {
        self.lines.iter().find(|l| l.line_id == line_id)
    }

    /// Adds `qty` units of a product. If the product is already in the cart at the same unit price, that line's
    /// quantity is increased instead and its id is returned.
    pub fn add_line(&mut self, product_id: ProductId, unit_price: Cents, qty: i64) -> Result<LineId, CartError> {
        if product_id.as_str().trim().is_empty() {
            return Err(CartError::EmptyProductId);
        }
        if !unit_price.is_positive() {
            return Err(CartError::NonPositivePrice(unit_price));
        }
        if qty <= 0 {
            return Err(CartError::NonPositiveQuantity(qty));
        }
        let qty = u32::try_from(qty).map_err(|_| CartError::Overflow)?;
        let mut lines = self.lines.clone();
        let (line_id, is_new) =
            match lines.iter_mut().find(|l| l.product_id == product_id && l.unit_price == unit_price) {
                Some(line) => {
                    line.quantity = line.quantity.checked_add(qty).ok_or(CartError::Overflow)?;
                    (line.line_id, false)
                },
                None => {
                    let line_id = LineId(self.next_line_id);
                    lines.push(CartLine { line_id, product_id, unit_price, quantity: qty });
                    (line_id, true)
                },
            };
        self.commit(lines)?;
        if is_new {
            self.next_line_id += 1;
        }
        trace!("🛒 Line {line_id} now holds {qty} more unit(s)");
        Ok(line_id)
    }

    /// Sets the quantity of an existing line. A quantity of zero or less removes the line.
    pub fn set_quantity(&mut self, line_id: LineId, qty: i64) -> Result<(), CartError> {
        if qty <= 0 {
            return self.remove_line(line_id);
        }
        let qty = u32::try_from(qty).map_err(|_| CartError::Overflow)?;
        let mut lines = self.lines.clone();
        let line = lines.iter_mut().find(|l| l.line_id == line_id).ok_or(CartError::LineNotFound(line_id))?;
        line.quantity = qty;
        self.commit(lines)
    }

    pub fn remove_line(&mut self, line_id: LineId) -> Result<(), CartError> {
        let before = self.lines.len();
        self.lines.retain(|l| l.line_id != line_id);
        if self.lines.len() == before {
            return Err(CartError::LineNotFound(line_id));
        }
        trace!("🛒 Removed line {line_id}");
        Ok(())
    }

    pub fn totals(&self) -> CartTotals {
        // Mutations reject any line set that cannot be priced, so this never falls back in practice.
        self.policy.price(&self.lines).unwrap_or_default()
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }

    fn commit(&mut self, lines: Vec<CartLine>) -> Result<(), CartError> {
        if self.policy.price(&lines).is_none() {
            debug!("🛒 Rejecting cart update: totals overflow");
            return Err(CartError::Overflow);
        }
        self.lines = lines;
        Ok(())
    }
}
