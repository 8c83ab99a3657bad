//! # Storefront engine public API
//!
//! The `sfe_api` module exposes the programmatic API of the storefront engine. Like the store traits, it is split by
//! audience:
//!
//! * [`checkout_api`] is the purchaser side: submitting orders, opening and retrying payments, cancelling.
//! * [`admin_gateway`] is the operator side, and the only writer of payment outcomes and fulfilment states.
//!
//! # API usage
//!
//! An API instance is created by supplying a backend that implements [`DocumentStore`](crate::traits::DocumentStore),
//! plus the event producers that should hear about writes.
//!
//! ```rust,ignore
//! use storefront_engine::{AdminActionGateway, SqliteDatabase, events::EventProducers};
//! let db = SqliteDatabase::new_with_url(...).await?;
//! let gateway = AdminActionGateway::new(db, EventProducers::default());
//! gateway.set_payment_status(&payment_id, PaymentStatus::Completed, None).await?;
//! ```
pub mod admin_gateway;
pub mod checkout_api;
pub mod errors;
pub mod order_objects;
