use chrono::{DateTime, Utc};
use log::*;
use sqlx::{types::Json, FromRow, SqliteConnection};
use storefront_common::Cents;

use super::TERMINAL_PAYMENT_STATUSES;
use crate::{
    db_types::{
        LineItem,
        NewOrder,
        Order,
        OrderId,
        OrderStatusType,
        PaymentId,
        PaymentStatus,
        ShippingAddress,
        UserId,
    },
    traits::StoreError,
};

/// The `orders` table row. Line items live in `order_items` and are joined in by [`fetch_items`].
#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    order_id: OrderId,
    user_id: UserId,
    payment_id: Option<PaymentId>,
    shipping_address: Json<ShippingAddress>,
    subtotal: Cents,
    tax: Cents,
    shipping: Cents,
    total: Cents,
    currency: String,
    status: OrderStatusType,
    payment_status: PaymentStatus,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl OrderRow {
    fn into_order(self, items: Vec<LineItem>) -> Order {
        Order {
            id: self.id,
            order_id: self.order_id,
            user_id: self.user_id,
            items,
            shipping_address: self.shipping_address.0,
            payment_id: self.payment_id,
            subtotal: self.subtotal,
            tax: self.tax,
            shipping: self.shipping,
            total: self.total,
            currency: self.currency,
            status: self.status,
            payment_status: self.payment_status,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Inserts the order and its line items. This is not atomic on its own; wrap the call in a transaction and pass
/// `&mut *tx` as the connection.
pub async fn insert_order(order: NewOrder, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let order_id = order.order_id.clone();
    let row: OrderRow = sqlx::query_as(
        r#"
            INSERT INTO orders (
                order_id,
                user_id,
                payment_id,
                shipping_address,
                subtotal,
                tax,
                shipping,
                total,
                currency,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $10)
            RETURNING *;
        "#,
    )
    .bind(&order.order_id)
    .bind(&order.user_id)
    .bind(&order.payment_id)
    .bind(Json(&order.shipping_address))
    .bind(order.totals.subtotal)
    .bind(order.totals.tax)
    .bind(order.totals.shipping)
    .bind(order.totals.total)
    .bind(&order.currency)
    .bind(order.created_at)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => StoreError::DuplicateOrder(order_id.clone()),
        _ => StoreError::from(e),
    })?;
    for (position, item) in order.items.iter().enumerate() {
        sqlx::query(
            "INSERT INTO order_items (order_id, position, product_id, unit_price, quantity) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(&order_id)
        .bind(position as i64)
        .bind(&item.product_id)
        .bind(item.unit_price)
        .bind(item.quantity)
        .execute(&mut *conn)
        .await?;
    }
    debug!("🗃️ Order {order_id} inserted with id {} and {} line(s)", row.id, order.items.len());
    Ok(row.into_order(order.items))
}

async fn fetch_items(order_id: &OrderId, conn: &mut SqliteConnection) -> Result<Vec<LineItem>, sqlx::Error> {
    sqlx::query_as("SELECT product_id, unit_price, quantity FROM order_items WHERE order_id = $1 ORDER BY position")
        .bind(order_id)
        .fetch_all(conn)
        .await
}

async fn hydrate(row: OrderRow, conn: &mut SqliteConnection) -> Result<Order, StoreError> {
    let items = fetch_items(&row.order_id, conn).await?;
    Ok(row.into_order(items))
}

pub async fn fetch_order_by_order_id(
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Option<Order>, StoreError> {
    let row: Option<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE order_id = $1").bind(order_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => Ok(Some(hydrate(row, conn).await?)),
        None => Ok(None),
    }
}

/// Returns all orders for the user, ordered by `created_at` in ascending order.
pub async fn fetch_orders_for_user(user_id: &UserId, conn: &mut SqliteConnection) -> Result<Vec<Order>, StoreError> {
    let rows: Vec<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at, id")
        .bind(user_id)
        .fetch_all(&mut *conn)
        .await?;
    let mut orders = Vec::with_capacity(rows.len());
    for row in rows {
        orders.push(hydrate(row, conn).await?);
    }
    Ok(orders)
}

pub async fn update_status(
    order_id: &OrderId,
    status: OrderStatusType,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let row: Option<OrderRow> =
        sqlx::query_as("UPDATE orders SET status = $1, updated_at = $2 WHERE order_id = $3 RETURNING *")
            .bind(status)
            .bind(Utc::now())
            .bind(order_id)
            .fetch_optional(&mut *conn)
            .await?;
    let row = row.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
    trace!("🗃️ Order {order_id} status set to {status}");
    hydrate(row, conn).await
}

/// Writes the mirrored payment status, unless the field already holds a different terminal value.
pub async fn update_payment_status(
    order_id: &OrderId,
    status: PaymentStatus,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let sql = format!(
        "UPDATE orders SET payment_status = $1, updated_at = $2 WHERE order_id = $3 AND (payment_status NOT IN \
         {TERMINAL_PAYMENT_STATUSES} OR payment_status = $1) RETURNING *"
    );
    let row: Option<OrderRow> =
        sqlx::query_as(&sql).bind(status).bind(Utc::now()).bind(order_id).fetch_optional(&mut *conn).await?;
    match row {
        Some(row) => hydrate(row, conn).await,
        None => match fetch_order_by_order_id(order_id, conn).await? {
            Some(order) => {
                Err(StoreError::TerminalOrderPaymentStatus { order_id: order_id.clone(), current: order.payment_status })
            },
            None => Err(StoreError::OrderNotFound(order_id.clone())),
        },
    }
}

pub async fn attach_payment(
    order_id: &OrderId,
    payment_id: &PaymentId,
    conn: &mut SqliteConnection,
) -> Result<Order, StoreError> {
    let row: Option<OrderRow> = sqlx::query_as(
        "UPDATE orders SET payment_id = $1, payment_status = 'pending', updated_at = $2 WHERE order_id = $3 RETURNING *",
    )
    .bind(payment_id)
    .bind(Utc::now())
    .bind(order_id)
    .fetch_optional(&mut *conn)
    .await?;
    let row = row.ok_or_else(|| StoreError::OrderNotFound(order_id.clone()))?;
    debug!("🗃️ Payment {payment_id} attached to order {order_id}");
    hydrate(row, conn).await
}
