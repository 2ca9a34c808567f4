//! Order persistence. Orders and their lines are written once at split
//! time and never priced again; only `status` moves afterward.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::aggregates::order::ShippingAddress;
use crate::domain::payment::{PaymentDetails, PaymentStatus};
use crate::domain::value_objects::PriceSnapshot;
use crate::domain::{Order, OrderLine, OrderStatus};
use crate::{Error, Result};

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid,
    business_id: String,
    user_id: Uuid,
    seller_id: Uuid,
    shipping_address_id: Uuid,
    list_total: i64,
    selling_total: i64,
    total_items: i32,
    status: String,
    payment_status: String,
    payment_id: Option<String>,
    created_at: DateTime<Utc>,
    deliver_due: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct OrderLineRow {
    id: Uuid,
    order_id: Uuid,
    product_id: Uuid,
    user_id: Option<Uuid>,
    size: Option<String>,
    quantity: i32,
    list_price: i64,
    selling_price: i64,
}

impl From<OrderLineRow> for OrderLine {
    fn from(row: OrderLineRow) -> Self {
        OrderLine {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            user_id: row.user_id,
            size: row.size,
            quantity: row.quantity,
            price: PriceSnapshot { list: row.list_price, selling: row.selling_price },
        }
    }
}

fn parse_status(raw: &str) -> Result<OrderStatus> {
    OrderStatus::parse(raw).ok_or_else(|| {
        Error::Database(sqlx::Error::Decode(format!("unknown order status: {raw}").into()))
    })
}

impl OrderRow {
    fn into_domain(self, lines: Vec<OrderLine>) -> Result<Order> {
        let status = parse_status(&self.status)?;
        let payment_status = PaymentStatus::parse(&self.payment_status).ok_or_else(|| {
            Error::Database(sqlx::Error::Decode(
                format!("unknown payment status: {}", self.payment_status).into(),
            ))
        })?;
        Ok(Order {
            id: self.id,
            business_id: self.business_id,
            user_id: self.user_id,
            seller_id: self.seller_id,
            shipping_address_id: self.shipping_address_id,
            lines,
            list_total: self.list_total,
            selling_total: self.selling_total,
            total_items: self.total_items,
            status,
            payment: PaymentDetails { status: payment_status, payment_id: self.payment_id },
            created_at: self.created_at,
            deliver_due: self.deliver_due,
        })
    }
}

/// Link the shipping address to the user, reusing an identical one if it is
/// already on file.
pub async fn ensure_address(
    conn: &mut PgConnection,
    user_id: Uuid,
    address: &ShippingAddress,
) -> Result<Uuid> {
    let existing: Option<(Uuid,)> = sqlx::query_as(
        "SELECT id FROM addresses
         WHERE user_id = $1 AND name = $2 AND street = $3 AND city = $4
           AND state IS NOT DISTINCT FROM $5 AND zip = $6 AND country = $7",
    )
    .bind(user_id)
    .bind(&address.name)
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.zip)
    .bind(&address.country)
    .fetch_optional(&mut *conn)
    .await?;
    if let Some((id,)) = existing {
        return Ok(id);
    }
    let id = Uuid::new_v4();
    sqlx::query(
        "INSERT INTO addresses (id, user_id, name, street, city, state, zip, country, phone, created_at)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, NOW())",
    )
    .bind(id)
    .bind(user_id)
    .bind(&address.name)
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.state)
    .bind(&address.zip)
    .bind(&address.country)
    .bind(&address.phone)
    .execute(conn)
    .await?;
    Ok(id)
}

pub async fn insert_order(conn: &mut PgConnection, order: &Order) -> Result<()> {
    sqlx::query(
        "INSERT INTO orders (id, business_id, user_id, seller_id, shipping_address_id,
                             list_total, selling_total, total_items, status,
                             payment_status, payment_id, created_at, deliver_due)
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)",
    )
    .bind(order.id)
    .bind(&order.business_id)
    .bind(order.user_id)
    .bind(order.seller_id)
    .bind(order.shipping_address_id)
    .bind(order.list_total)
    .bind(order.selling_total)
    .bind(order.total_items)
    .bind(order.status.as_str())
    .bind(order.payment.status.as_str())
    .bind(&order.payment.payment_id)
    .bind(order.created_at)
    .bind(order.deliver_due)
    .execute(&mut *conn)
    .await?;
    for line in &order.lines {
        sqlx::query(
            "INSERT INTO order_lines (id, order_id, product_id, user_id, size, quantity,
                                      list_price, selling_price)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8)",
        )
        .bind(line.id)
        .bind(line.order_id)
        .bind(line.product_id)
        .bind(line.user_id)
        .bind(&line.size)
        .bind(line.quantity)
        .bind(line.price.list)
        .bind(line.price.selling)
        .execute(&mut *conn)
        .await?;
    }
    Ok(())
}

async fn lines_for_orders(
    conn: &mut PgConnection,
    order_ids: &[Uuid],
) -> Result<HashMap<Uuid, Vec<OrderLine>>> {
    let rows: Vec<OrderLineRow> = sqlx::query_as(
        "SELECT id, order_id, product_id, user_id, size, quantity, list_price, selling_price
         FROM order_lines WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(order_ids)
    .fetch_all(conn)
    .await?;
    let mut by_order: HashMap<Uuid, Vec<OrderLine>> = HashMap::new();
    for row in rows {
        by_order.entry(row.order_id).or_default().push(row.into());
    }
    Ok(by_order)
}

pub async fn find_order(conn: &mut PgConnection, order_id: Uuid) -> Result<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as("SELECT * FROM orders WHERE id = $1")
        .bind(order_id)
        .fetch_optional(&mut *conn)
        .await?;
    let Some(row) = row else { return Ok(None) };
    let mut lines = lines_for_orders(conn, &[row.id]).await?;
    row.into_domain(lines.remove(&order_id).unwrap_or_default()).map(Some)
}

pub async fn orders_by_user(conn: &mut PgConnection, user_id: Uuid) -> Result<Vec<Order>> {
    let rows: Vec<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE user_id = $1 ORDER BY created_at DESC")
            .bind(user_id)
            .fetch_all(&mut *conn)
            .await?;
    collect_orders(conn, rows).await
}

pub async fn orders_by_seller(conn: &mut PgConnection, seller_id: Uuid) -> Result<Vec<Order>> {
    let rows: Vec<OrderRow> =
        sqlx::query_as("SELECT * FROM orders WHERE seller_id = $1 ORDER BY created_at DESC")
            .bind(seller_id)
            .fetch_all(&mut *conn)
            .await?;
    collect_orders(conn, rows).await
}

async fn collect_orders(conn: &mut PgConnection, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let mut lines = lines_for_orders(conn, &ids).await?;
    rows.into_iter()
        .map(|row| {
            let order_lines = lines.remove(&row.id).unwrap_or_default();
            row.into_domain(order_lines)
        })
        .collect()
}

pub async fn update_status(
    conn: &mut PgConnection,
    order_id: Uuid,
    status: OrderStatus,
) -> Result<()> {
    sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
        .bind(order_id)
        .bind(status.as_str())
        .execute(conn)
        .await?;
    Ok(())
}
