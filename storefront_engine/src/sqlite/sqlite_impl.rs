//! `SqliteDatabase` is the durable [`DocumentStore`](crate::traits::DocumentStore) backend. It implements the store
//! traits from [`crate::traits`] on top of a sqlx connection pool.
use std::fmt::Debug;

use async_trait::async_trait;
use log::*;
use sqlx::SqlitePool;

use super::db::{db_url, new_pool, orders, payments};
use crate::{
    db_types::{NewOrder, NewPayment, Order, OrderId, OrderStatusType, Payment, PaymentId, PaymentStatus, UserId},
    traits::{OrderManagement, PaymentManagement, StoreError},
};

#[derive(Clone)]
pub struct SqliteDatabase {
    url: String,
    pool: SqlitePool,
}

impl Debug for SqliteDatabase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "SqliteDatabase ({:?})", self.pool)
    }
}

#[async_trait]
impl OrderManagement for SqliteDatabase {
    async fn insert_order(&self, order: NewOrder) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::insert_order(order, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn fetch_order(&self, order_id: &OrderId) -> Result<Option<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_order_by_order_id(order_id, &mut conn).await
    }

    async fn update_order_status(&self, order_id: &OrderId, status: OrderStatusType) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::update_status(order_id, status, &mut conn).await
    }

    async fn update_order_payment_status(
        &self,
        order_id: &OrderId,
        status: PaymentStatus,
    ) -> Result<Order, StoreError> {
        let mut tx = self.pool.begin().await?;
        let order = orders::update_payment_status(order_id, status, &mut tx).await?;
        tx.commit().await?;
        Ok(order)
    }

    async fn attach_payment(&self, order_id: &OrderId, payment_id: &PaymentId) -> Result<Order, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::attach_payment(order_id, payment_id, &mut conn).await
    }

    async fn fetch_orders_for_user(&self, user_id: &UserId) -> Result<Vec<Order>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        orders::fetch_orders_for_user(user_id, &mut conn).await
    }
}

#[async_trait]
impl PaymentManagement for SqliteDatabase {
    async fn insert_payment(&self, payment: NewPayment) -> Result<Payment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::insert_payment(payment, &mut conn).await
    }

    async fn fetch_payment(&self, payment_id: &PaymentId) -> Result<Option<Payment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let payment = payments::fetch_payment(payment_id, &mut conn).await?;
        Ok(payment)
    }

    async fn update_payment_status(
        &self,
        payment_id: &PaymentId,
        status: PaymentStatus,
        message: Option<String>,
    ) -> Result<Payment, StoreError> {
        let mut tx = self.pool.begin().await?;
        let payment = payments::update_status(payment_id, status, message, &mut tx).await?;
        tx.commit().await?;
        Ok(payment)
    }

    async fn link_payment_to_order(&self, payment_id: &PaymentId, order_id: &OrderId) -> Result<Payment, StoreError> {
        let mut conn = self.pool.acquire().await?;
        payments::link_to_order(payment_id, order_id, &mut conn).await
    }

    async fn fetch_payments_with_status(&self, statuses: &[PaymentStatus]) -> Result<Vec<Payment>, StoreError> {
        let mut conn = self.pool.acquire().await?;
        let payments = payments::fetch_with_status(statuses, &mut conn).await?;
        Ok(payments)
    }
}

impl SqliteDatabase {
    /// Connects to the database named by `SF_DATABASE_URL`, falling back to the default location.
    pub async fn new(max_connections: u32) -> Result<Self, sqlx::Error> {
        let url = db_url();
        SqliteDatabase::new_with_url(url.as_str(), max_connections).await
    }

    pub async fn new_with_url(url: &str, max_connections: u32) -> Result<Self, sqlx::Error> {
        trace!("🗃️ Creating new database connection pool with url {url}");
        let pool = new_pool(url, max_connections).await?;
        let url = url.to_string();
        Ok(Self { url, pool })
    }

    pub fn url(&self) -> &str {
        self.url.as_str()
    }

    /// Returns a reference to the database connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Applies the embedded schema migrations.
    pub async fn run_migrations(&self) -> Result<(), sqlx::migrate::MigrateError> {
        sqlx::migrate!("./src/sqlite/migrations").run(&self.pool).await?;
        info!("🗃️ Migrations complete");
        Ok(())
    }
}
