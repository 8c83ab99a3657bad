//! # SQLite Database methods
//!
//! "Low-level" SQLite interactions, written as free functions that accept a `&mut SqliteConnection`. Callers can
//! pass a pooled connection, or `&mut *tx` to run several calls inside one transaction.
use std::env;

use log::info;
use sqlx::{sqlite::SqlitePoolOptions, Error as SqlxError, SqlitePool};

pub mod orders;
pub mod payments;

const SQLITE_DB_URL: &str = "sqlite://data/storefront.db";

/// Statuses a record can never leave, as SQL literals.
pub(crate) const TERMINAL_PAYMENT_STATUSES: &str = "('completed', 'failed', 'expired')";

pub fn db_url() -> String {
    let result = env::var("SF_DATABASE_URL").unwrap_or_else(|_| {
        info!("🗃️ SF_DATABASE_URL is not set. Using the default.");
        SQLITE_DB_URL.to_string()
    });
    info!("🗃️ Using database URL: {result}");
    result
}

pub async fn new_pool(url: &str, max_connections: u32) -> Result<SqlitePool, SqlxError> {
    let pool = SqlitePoolOptions::new().max_connections(max_connections).connect(url).await?;
    Ok(pool)
}
