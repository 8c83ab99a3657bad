//! # Document store contracts
//!
//! The engine keeps two kinds of records: orders and payments. They describe the same checkout but are written
//! independently, which is why an order carries its own mirror of the payment status.
//!
//! * [`OrderManagement`] reads and writes order records.
//! * [`PaymentManagement`] reads and writes payment attempt records.
//! * [`DocumentStore`] is the union of the two, and is what the public APIs are generic over.
//!
//! The traits use `async_trait` so that they can be used as trait objects (e.g. `Arc<dyn OrderManagement>`) from
//! spawned tasks.
mod document_store;
mod order_management;
mod payment_management;

pub use document_store::{DocumentStore, StoreError};
pub use order_management::OrderManagement;
pub use payment_management::PaymentManagement;
