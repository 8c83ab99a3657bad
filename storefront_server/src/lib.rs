//! # Storefront server
//! This crate hosts the HTTP surface of the storefront. It is responsible for:
//! * Serving the purchaser's cart, and turning it into an order and a payment at checkout.
//! * Running a checkout sync session for every open payment, so the purchaser sees the outcome as soon as either the
//!   payment record or the order record reports it.
//! * Accepting operator decisions about payments and orders.
//! * Expiring payments whose session window ran out.
//!
//! ## Configuration
//! The server is configured via environment variables. See [config](config/index.html) for more information.
//!
//! ## Routes
//! The server exposes the following routes:
//! * `/health`: A health check route that returns a 200 OK response.
//! * `/cart/{user}` and `/cart/{user}/lines[/{line}]`: read and edit a cart.
//! * `/checkout/{user}`: check out, and `/checkout/session/{payment}` to follow or close the session.
//! * `/orders/{order}`, `/orders/{order}/retry`, `/orders/{order}/cancel`, `/payments/{payment}`,
//!   `/users/{user}/orders`: purchaser order actions and reads.
//! * `/admin/payments/{payment}/status`, `/admin/orders/{order}/status`, `/admin/orders/{order}/payment_status`:
//!   operator actions.

pub mod cli;
pub mod config;
pub mod data_objects;
pub mod errors;
pub mod expiry_worker;
pub mod routes;
pub mod server;
pub mod sessions;
