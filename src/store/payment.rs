//! Payment order persistence. The PENDING-only settlement guard is a
//! compare-and-set in SQL, so two racing `proceed` calls cannot both win.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::payment::{PaymentMethod, PaymentStatus};
use crate::domain::PaymentOrder;
use crate::{Error, Result};

#[derive(sqlx::FromRow)]
struct PaymentOrderRow {
    id: Uuid,
    user_id: Uuid,
    amount: i64,
    status: String,
    method: String,
    payment_id: Option<String>,
    payment_link_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl PaymentOrderRow {
    fn into_domain(self, order_ids: Vec<Uuid>) -> Result<PaymentOrder> {
        let status = PaymentStatus::parse(&self.status).ok_or_else(|| {
            Error::Database(sqlx::Error::Decode(
                format!("unknown payment status: {}", self.status).into(),
            ))
        })?;
        let method = PaymentMethod::parse(&self.method).ok_or_else(|| {
            Error::Database(sqlx::Error::Decode(
                format!("unknown payment method: {}", self.method).into(),
            ))
        })?;
        Ok(PaymentOrder {
            id: self.id,
            user_id: self.user_id,
            amount: self.amount,
            status,
            method,
            payment_id: self.payment_id,
            payment_link_id: self.payment_link_id,
            order_ids,
            created_at: self.created_at,
        })
    }
}

pub async fn insert_payment_order(conn: &mut PgConnection, po: &PaymentOrder) -> Result<()> {
    sqlx::query(
        "INSERT INTO payment_orders (id, user_id, amount, status, method, payment_id,
                                     payment_link_id, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
    )
    .bind(po.id)
    .bind(po.user_id)
    .bind(po.amount)
    .bind(po.status.as_str())
    .bind(po.method.as_str())
    .bind(&po.payment_id)
    .bind(&po.payment_link_id)
    .bind(po.created_at)
    .execute(&mut *conn)
    .await?;
    for order_id in &po.order_ids {
        sqlx::query("INSERT INTO payment_order_orders (payment_order_id, order_id) VALUES ($1, $2)")
            .bind(po.id)
            .bind(order_id)
            .execute(&mut *conn)
            .await?;
    }
    Ok(())
}

async fn order_ids_for(conn: &mut PgConnection, payment_order_id: Uuid) -> Result<Vec<Uuid>> {
    let rows: Vec<(Uuid,)> = sqlx::query_as(
        "SELECT order_id FROM payment_order_orders WHERE payment_order_id = $1 ORDER BY order_id",
    )
    .bind(payment_order_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(|(id,)| id).collect())
}

pub async fn find_by_id(conn: &mut PgConnection, id: Uuid) -> Result<Option<PaymentOrder>> {
    let row: Option<PaymentOrderRow> = sqlx::query_as("SELECT * FROM payment_orders WHERE id = $1")
        .bind(id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else { return Ok(None) };
    let order_ids = order_ids_for(conn, row.id).await?;
    row.into_domain(order_ids).map(Some)
}

pub async fn find_by_link_id(
    conn: &mut PgConnection,
    payment_link_id: &str,
) -> Result<Option<PaymentOrder>> {
    let row: Option<PaymentOrderRow> =
        sqlx::query_as("SELECT * FROM payment_orders WHERE payment_link_id = $1")
            .bind(payment_link_id)
            .fetch_optional(&mut *conn)
            .await?;
    let Some(row) = row else { return Ok(None) };
    let order_ids = order_ids_for(conn, row.id).await?;
    row.into_domain(order_ids).map(Some)
}

pub async fn set_payment_link(
    conn: &mut PgConnection,
    id: Uuid,
    payment_link_id: &str,
) -> Result<()> {
    sqlx::query("UPDATE payment_orders SET payment_link_id = $2 WHERE id = $1")
        .bind(id)
        .bind(payment_link_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// PENDING → COMPLETED compare-and-set. Returns `false` when the row was
/// not pending (already settled or failed).
pub async fn proceed(
    conn: &mut PgConnection,
    id: Uuid,
    payment_id: &str,
    payment_link_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        "UPDATE payment_orders
         SET status = $2, payment_id = $3, payment_link_id = $4
         WHERE id = $1 AND status = $5",
    )
    .bind(id)
    .bind(PaymentStatus::Completed.as_str())
    .bind(payment_id)
    .bind(payment_link_id)
    .bind(PaymentStatus::Pending.as_str())
    .execute(conn)
    .await?;
    Ok(result.rows_affected() == 1)
}
