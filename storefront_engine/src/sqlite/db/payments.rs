use chrono::Utc;
use log::*;
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::TERMINAL_PAYMENT_STATUSES;
use crate::{
    db_types::{NewPayment, OrderId, Payment, PaymentId, PaymentStatus},
    traits::StoreError,
};

pub async fn insert_payment(payment: NewPayment, conn: &mut SqliteConnection) -> Result<Payment, StoreError> {
    let payment_id = payment.payment_id.clone();
    let payment: Payment = sqlx::query_as(
        r#"
            INSERT INTO payments (payment_id, order_id, amount, currency, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *;
        "#,
    )
    .bind(payment.payment_id)
    .bind(payment.order_id)
    .bind(payment.amount)
    .bind(payment.currency)
    .bind(payment.created_at)
    .fetch_one(conn)
    .await
    .map_err(|e| match e {
        sqlx::Error::Database(err) if err.is_unique_violation() => StoreError::DuplicatePayment(payment_id),
        _ => StoreError::from(e),
    })?;
    debug!("🗃️ Payment {} inserted for order {}", payment.payment_id, payment.order_id);
    Ok(payment)
}

pub async fn fetch_payment(payment_id: &PaymentId, conn: &mut SqliteConnection) -> Result<Option<Payment>, sqlx::Error> {
    sqlx::query_as("SELECT * FROM payments WHERE payment_id = $1").bind(payment_id).fetch_optional(conn).await
}

/// Updates the status of a payment that is not yet terminal. A `None` message leaves any existing message in place.
pub async fn update_status(
    payment_id: &PaymentId,
    status: PaymentStatus,
    message: Option<String>,
    conn: &mut SqliteConnection,
) -> Result<Payment, StoreError> {
    let sql = format!(
        "UPDATE payments SET status = $1, message = COALESCE($2, message), updated_at = $3 WHERE payment_id = $4 AND \
         status NOT IN {TERMINAL_PAYMENT_STATUSES} RETURNING *"
    );
    let updated: Option<Payment> = sqlx::query_as(&sql)
        .bind(status)
        .bind(message)
        .bind(Utc::now())
        .bind(payment_id)
        .fetch_optional(&mut *conn)
        .await?;
    match updated {
        Some(payment) => {
            trace!("🗃️ Payment {payment_id} status set to {status}");
            Ok(payment)
        },
        None => match fetch_payment(payment_id, conn).await? {
            Some(p) => Err(StoreError::TerminalPaymentStatus { payment_id: payment_id.clone(), current: p.status }),
            None => Err(StoreError::PaymentNotFound(payment_id.clone())),
        },
    }
}

pub async fn link_to_order(
    payment_id: &PaymentId,
    order_id: &OrderId,
    conn: &mut SqliteConnection,
) -> Result<Payment, StoreError> {
    let payment: Option<Payment> =
        sqlx::query_as("UPDATE payments SET order_id = $1, updated_at = $2 WHERE payment_id = $3 RETURNING *")
            .bind(order_id)
            .bind(Utc::now())
            .bind(payment_id)
            .fetch_optional(conn)
            .await?;
    payment.ok_or_else(|| StoreError::PaymentNotFound(payment_id.clone()))
}

/// Fetches payments in any of the given states, oldest first.
pub async fn fetch_with_status(
    statuses: &[PaymentStatus],
    conn: &mut SqliteConnection,
) -> Result<Vec<Payment>, sqlx::Error> {
    if statuses.is_empty() {
        return Ok(Vec::new());
    }
    let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM payments WHERE status IN (");
    let mut list = builder.separated(", ");
    for status in statuses {
        list.push_bind(*status);
    }
    list.push_unseparated(") ORDER BY created_at, id");
    builder.build_query_as::<Payment>().fetch_all(conn).await
}
