//! Storefront Engine
//!
//! The storefront engine is the core of a retail ordering pipeline. A cart is priced, converted into an order and paid
//! for out-of-band: a human operator confirms the payment against a reference the purchaser supplied. The purchaser's
//! view has to learn about that confirmation exactly once, even though it lives in two records (the payment and the
//! order's mirror of it) and reaches the purchaser through two mechanisms (a push subscription and a poll).
//!
//! The library is divided into these sections:
//! 1. Pricing ([`mod@cart`]). Pure computation over cart lines, plus per-user cart storage.
//! 2. State machines ([`mod@lifecycle`]) for orders and payments.
//! 3. The document store contracts ([`mod@traits`]) and two backends: [`SqliteDatabase`] and [`InMemoryStore`].
//! 4. The public API ([`mod@sfe_api`]). [`CheckoutApi`] is used by purchasers, [`AdminActionGateway`] by operators.
//! 5. Synchronisation ([`mod@sync`]). A [`SyncCoordinator`] watches one order/payment pair through a
//!    [`RealtimeChannel`](realtime::RealtimeChannel) and the store, and settles the checkout exactly once.
//!
//! Writes made through the public API are announced as events ([`mod@events`]). The in-process realtime channel
//! ([`PaymentBroadcast`](realtime::PaymentBroadcast)) is fed by those events.
pub mod cart;
pub mod db_types;
pub mod events;
pub mod lifecycle;
mod memory;
pub mod realtime;
pub mod sfe_api;
#[cfg(feature = "sqlite")]
pub mod sqlite;
pub mod sync;
pub mod traits;

#[cfg(any(feature = "test_utils", test))]
pub mod test_utils;

pub use memory::InMemoryStore;
pub use sfe_api::{
    admin_gateway::AdminActionGateway,
    checkout_api::CheckoutApi,
    errors::{CheckoutApiError, GatewayError},
    order_objects,
};
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteDatabase;
pub use sync::{SyncCoordinator, SyncSession};
