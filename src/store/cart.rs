//! Cart persistence.
//!
//! Two layers of race protection around find-or-create and merge: partial
//! unique indexes on the owner columns, and a per-owner transaction
//! advisory lock taken before any mutate-then-recompute sequence.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use uuid::Uuid;

use crate::domain::value_objects::{PriceSnapshot, TotalsSnapshot};
use crate::domain::{Cart, CartLine, CartOwner};
use crate::{Error, Result};

#[derive(sqlx::FromRow)]
struct CartRow {
    id: Uuid,
    user_id: Option<Uuid>,
    temp_id: Option<String>,
    coupon_code: Option<String>,
    quantity: i32,
    list_total: i64,
    selling_total: i64,
    discount_pct: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CartRow {
    fn into_domain(self, lines: Vec<CartLine>) -> Result<Cart> {
        let owner = match (self.user_id, self.temp_id) {
            (Some(user_id), _) => CartOwner::User(user_id),
            (None, Some(temp_id)) => CartOwner::Anonymous(temp_id),
            (None, None) => {
                return Err(Error::Database(sqlx::Error::Decode(
                    "cart row without an owner".into(),
                )))
            }
        };
        Ok(Cart {
            id: self.id,
            owner,
            coupon_code: self.coupon_code,
            lines,
            totals: TotalsSnapshot {
                quantity: self.quantity,
                list_total: self.list_total,
                selling_total: self.selling_total,
                discount_pct: self.discount_pct,
            },
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct CartLineRow {
    id: Uuid,
    cart_id: Uuid,
    product_id: Uuid,
    user_id: Option<Uuid>,
    size: Option<String>,
    quantity: i32,
    list_price: i64,
    selling_price: i64,
}

impl From<CartLineRow> for CartLine {
    fn from(row: CartLineRow) -> Self {
        CartLine {
            id: row.id,
            cart_id: row.cart_id,
            product_id: row.product_id,
            user_id: row.user_id,
            size: row.size,
            quantity: row.quantity,
            price: PriceSnapshot { list: row.list_price, selling: row.selling_price },
        }
    }
}

const LINE_COLUMNS: &str =
    "id, cart_id, product_id, user_id, size, quantity, list_price, selling_price";

/// Take the single-writer advisory lock for this owner's cart, held until
/// the surrounding transaction ends.
pub async fn lock_owner(conn: &mut PgConnection, owner: &CartOwner) -> Result<()> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtextextended($1, 0))")
        .bind(owner.lock_key())
        .execute(conn)
        .await?;
    Ok(())
}

async fn lines_for_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<Vec<CartLine>> {
    let rows: Vec<CartLineRow> = sqlx::query_as(&format!(
        "SELECT {LINE_COLUMNS} FROM cart_lines WHERE cart_id = $1 ORDER BY id"
    ))
    .bind(cart_id)
    .fetch_all(conn)
    .await?;
    Ok(rows.into_iter().map(CartLine::from).collect())
}

async fn fetch_cart_row(
    conn: &mut PgConnection,
    owner: &CartOwner,
    lock_row: bool,
) -> Result<Option<CartRow>> {
    let suffix = if lock_row { " FOR UPDATE" } else { "" };
    let query = match owner {
        CartOwner::User(_) => format!("SELECT * FROM carts WHERE user_id = $1{suffix}"),
        CartOwner::Anonymous(_) => format!("SELECT * FROM carts WHERE temp_id = $1{suffix}"),
    };
    let row = match owner {
        CartOwner::User(id) => sqlx::query_as(&query).bind(id).fetch_optional(conn).await?,
        CartOwner::Anonymous(id) => sqlx::query_as(&query).bind(id).fetch_optional(conn).await?,
    };
    Ok(row)
}

pub async fn find_cart(conn: &mut PgConnection, owner: &CartOwner) -> Result<Option<Cart>> {
    find_cart_inner(conn, owner, false).await
}

/// Like [`find_cart`] but locks the cart row (`FOR UPDATE`) so a concurrent
/// merge cannot consume it mid-operation.
pub async fn find_cart_locked(conn: &mut PgConnection, owner: &CartOwner) -> Result<Option<Cart>> {
    find_cart_inner(conn, owner, true).await
}

async fn find_cart_inner(
    conn: &mut PgConnection,
    owner: &CartOwner,
    lock_row: bool,
) -> Result<Option<Cart>> {
    let Some(row) = fetch_cart_row(conn, owner, lock_row).await? else {
        return Ok(None);
    };
    let lines = lines_for_cart(conn, row.id).await?;
    row.into_domain(lines).map(Some)
}

/// Find-or-create, race-safe: the insert swallows a unique-index conflict
/// and the re-select picks up whichever row won.
pub async fn find_or_create_cart(conn: &mut PgConnection, owner: &CartOwner) -> Result<Cart> {
    if let Some(cart) = find_cart(conn, owner).await? {
        return Ok(cart);
    }
    sqlx::query(
        "INSERT INTO carts (id, user_id, temp_id, quantity, list_total, selling_total, discount_pct, created_at, updated_at)
         VALUES ($1, $2, $3, 0, 0, 0, 0, NOW(), NOW())
         ON CONFLICT DO NOTHING",
    )
    .bind(Uuid::new_v4())
    .bind(owner.user_id())
    .bind(owner.temp_id())
    .execute(&mut *conn)
    .await?;
    find_cart(conn, owner).await?.ok_or(Error::CartNotFound)
}

/// Upsert the (cart, product) line, accumulating quantity and recomputing
/// the snapshot as `new_quantity × unit price` in one statement.
#[allow(clippy::too_many_arguments)]
pub async fn upsert_line(
    conn: &mut PgConnection,
    cart_id: Uuid,
    product_id: Uuid,
    user_id: Option<Uuid>,
    size: Option<&str>,
    quantity: i32,
    unit_list: i64,
    unit_selling: i64,
) -> Result<CartLine> {
    let row: CartLineRow = sqlx::query_as(&format!(
        "INSERT INTO cart_lines (id, cart_id, product_id, user_id, size, quantity, list_price, selling_price)
         VALUES ($1, $2, $3, $4, $5, $6, $6 * $7, $6 * $8)
         ON CONFLICT (cart_id, product_id) DO UPDATE SET
             quantity = cart_lines.quantity + EXCLUDED.quantity,
             list_price = (cart_lines.quantity + EXCLUDED.quantity) * $7,
             selling_price = (cart_lines.quantity + EXCLUDED.quantity) * $8,
             user_id = EXCLUDED.user_id
         RETURNING {LINE_COLUMNS}"
    ))
    .bind(Uuid::new_v4())
    .bind(cart_id)
    .bind(product_id)
    .bind(user_id)
    .bind(size)
    .bind(quantity)
    .bind(unit_list)
    .bind(unit_selling)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

/// A line together with its cart's owner, for authorization checks.
pub async fn find_line(
    conn: &mut PgConnection,
    line_id: Uuid,
) -> Result<Option<(CartLine, CartOwner)>> {
    #[derive(sqlx::FromRow)]
    struct LineWithOwner {
        #[sqlx(flatten)]
        line: CartLineRow,
        cart_user_id: Option<Uuid>,
        cart_temp_id: Option<String>,
    }

    let row: Option<LineWithOwner> = sqlx::query_as(
        "SELECT l.id, l.cart_id, l.product_id, l.user_id, l.size, l.quantity,
                l.list_price, l.selling_price,
                c.user_id AS cart_user_id, c.temp_id AS cart_temp_id
         FROM cart_lines l JOIN carts c ON c.id = l.cart_id
         WHERE l.id = $1",
    )
    .bind(line_id)
    .fetch_optional(conn)
    .await?;
    let Some(row) = row else { return Ok(None) };
    let owner = match (row.cart_user_id, row.cart_temp_id) {
        (Some(user_id), _) => CartOwner::User(user_id),
        (None, Some(temp_id)) => CartOwner::Anonymous(temp_id),
        (None, None) => {
            return Err(Error::Database(sqlx::Error::Decode("cart row without an owner".into())))
        }
    };
    Ok(Some((row.line.into(), owner)))
}

pub async fn set_line_quantity(
    conn: &mut PgConnection,
    line_id: Uuid,
    quantity: i32,
    price: PriceSnapshot,
) -> Result<CartLine> {
    let row: CartLineRow = sqlx::query_as(&format!(
        "UPDATE cart_lines SET quantity = $2, list_price = $3, selling_price = $4
         WHERE id = $1 RETURNING {LINE_COLUMNS}"
    ))
    .bind(line_id)
    .bind(quantity)
    .bind(price.list)
    .bind(price.selling)
    .fetch_one(conn)
    .await?;
    Ok(row.into())
}

pub async fn delete_line(conn: &mut PgConnection, line_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_lines WHERE id = $1")
        .bind(line_id)
        .execute(conn)
        .await?;
    Ok(())
}

pub async fn save_totals(
    conn: &mut PgConnection,
    cart_id: Uuid,
    totals: &TotalsSnapshot,
) -> Result<()> {
    sqlx::query(
        "UPDATE carts SET quantity = $2, list_total = $3, selling_total = $4,
                          discount_pct = $5, updated_at = NOW()
         WHERE id = $1",
    )
    .bind(cart_id)
    .bind(totals.quantity)
    .bind(totals.list_total)
    .bind(totals.selling_total)
    .bind(totals.discount_pct)
    .execute(conn)
    .await?;
    Ok(())
}

/// Atomically swap the anonymous tag for the user tag and stamp every
/// line's denormalized owner.
pub async fn reassign_cart(conn: &mut PgConnection, cart_id: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("UPDATE carts SET user_id = $2, temp_id = NULL, updated_at = NOW() WHERE id = $1")
        .bind(cart_id)
        .bind(user_id)
        .execute(&mut *conn)
        .await?;
    sqlx::query("UPDATE cart_lines SET user_id = $2 WHERE cart_id = $1")
        .bind(cart_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Persist one merged line: summed quantity, rescaled snapshot, stamped
/// owner.
pub async fn apply_merged_line(conn: &mut PgConnection, line: &CartLine) -> Result<()> {
    sqlx::query(
        "UPDATE cart_lines SET quantity = $2, list_price = $3, selling_price = $4, user_id = $5
         WHERE id = $1",
    )
    .bind(line.id)
    .bind(line.quantity)
    .bind(line.price.list)
    .bind(line.price.selling)
    .bind(line.user_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Re-parent an anonymous line onto the user's cart (ownership transfer,
/// not copy).
pub async fn reparent_line(
    conn: &mut PgConnection,
    line_id: Uuid,
    new_cart_id: Uuid,
    user_id: Uuid,
) -> Result<()> {
    sqlx::query("UPDATE cart_lines SET cart_id = $2, user_id = $3 WHERE id = $1")
        .bind(line_id)
        .bind(new_cart_id)
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Remove a cart; lines cascade.
pub async fn delete_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM carts WHERE id = $1")
        .bind(cart_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Empty a cart after checkout consumed it: lines removed, totals zeroed.
pub async fn clear_cart(conn: &mut PgConnection, cart_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM cart_lines WHERE cart_id = $1")
        .bind(cart_id)
        .execute(&mut *conn)
        .await?;
    save_totals(conn, cart_id, &TotalsSnapshot::default()).await
}
