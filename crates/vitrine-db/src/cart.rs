//! The cart consistency engine.
//!
//! Every mutating operation that touches both a cart line and the user's
//! denormalized `shopping_cart` mirror runs inside a single transaction:
//! commit on success, and any early `?` return drops the transaction, which
//! rolls back. The product row is locked `FOR UPDATE` for the duration of a
//! stock-sensitive mutation, so two requests racing on the same product
//! serialize instead of double-selling the last unit, and a racing duplicate
//! add lands on the `ON CONFLICT` merge path rather than failing.
//!
//! Status toggles (save-for-later / move-to-cart) never touch the mirror —
//! it tracks membership, not status — so they run as plain statements.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::{PgConnection, PgPool};
use thiserror::Error;
use uuid::Uuid;
use vitrine_core::quantity::{self, MergeOutcome};

use crate::users;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CartItemStatus {
    Active,
    SavedForLater,
    OutOfStock,
}

impl CartItemStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::SavedForLater => "saved_for_later",
            Self::OutOfStock => "out_of_stock",
        }
    }

    #[must_use]
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "active" => Some(Self::Active),
            "saved_for_later" => Some(Self::SavedForLater),
            "out_of_stock" => Some(Self::OutOfStock),
            _ => None,
        }
    }
}

#[derive(Debug, Error)]
pub enum CartError {
    #[error("user not found")]
    UserNotFound,
    #[error("account is inactive")]
    AccountInactive,
    #[error("product not found")]
    ProductNotFound,
    #[error("cart item not found")]
    ItemNotFound,
    #[error("quantity must be between {min} and {max}, got {requested}", min = quantity::MIN_QUANTITY, max = quantity::MAX_QUANTITY)]
    QuantityOutOfBounds { requested: i32 },
    #[error("product is out of stock")]
    OutOfStock,
    #[error("only {available} left in stock, requested {requested}")]
    InsufficientStock { requested: i32, available: i32 },
    #[error("cart line cannot exceed {max} units (would be {total})", max = quantity::MAX_QUANTITY)]
    QuantityCapExceeded { total: i32 },
    #[error("maximum available stock reached ({available})")]
    MaxStockReached { available: i32 },
    #[error("quantity cannot go below 1; delete the item instead")]
    MinQuantityReached,
    #[error("item is already {status}")]
    AlreadyInStatus { status: &'static str },
    #[error("invalid cart status: {0}")]
    InvalidStatus(String),
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// A row from the `cart_items` table.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_add: Decimal,
    pub variant: Option<serde_json::Value>,
    pub status: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the live product fields the read path needs.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRow {
    pub id: Uuid,
    pub product_id: Uuid,
    pub quantity: i32,
    pub price_at_add: Decimal,
    pub variant: Option<serde_json::Value>,
    pub status: String,
    pub product_name: String,
    pub brand: Option<String>,
    pub current_price: Decimal,
    pub count_in_stock: i32,
    pub discount: Decimal,
    pub images: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Advisory: an active line whose live stock is gone or below the cart quantity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StockIssue {
    pub product_id: Uuid,
    pub product_name: String,
    pub quantity: i32,
    pub available: i32,
}

/// Advisory: a line whose stamped price no longer matches the live price.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PriceChange {
    pub product_id: Uuid,
    pub product_name: String,
    pub old_price: Decimal,
    pub new_price: Decimal,
    pub difference: Decimal,
    pub percent_change: String,
}

/// The full cart read: lines plus advisories computed fresh on every read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartView {
    pub items: Vec<CartLineRow>,
    pub stock_issues: Vec<StockIssue>,
    pub price_changes: Vec<PriceChange>,
}

#[derive(Debug, Clone)]
pub struct AddToCart {
    pub product_id: Uuid,
    pub quantity: i32,
    pub variant: Option<serde_json::Value>,
}

/// Result of an add: the written line, and whether it merged into an
/// existing one (merged adds answer 200, fresh adds 201).
#[derive(Debug, Clone)]
pub struct AddOutcome {
    pub item: CartItemRow,
    pub merged: bool,
}

/// Result of a set-quantity: `changed == false` is the idempotent no-op.
#[derive(Debug, Clone)]
pub struct SetOutcome {
    pub item: CartItemRow,
    pub changed: bool,
}

const CART_COLUMNS: &str =
    "id, user_id, product_id, quantity, price_at_add, variant, status, created_at, updated_at";

#[derive(Debug, sqlx::FromRow)]
struct LockedProduct {
    price: Decimal,
    count_in_stock: i32,
}

// ---------------------------------------------------------------------------
// Locking helpers (lock order: user → product → cart item)
// ---------------------------------------------------------------------------

async fn lock_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), CartError> {
    let is_active: Option<bool> =
        sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1 FOR UPDATE")
            .bind(user_id)
            .fetch_optional(conn)
            .await?;
    match is_active {
        None => Err(CartError::UserNotFound),
        Some(false) => Err(CartError::AccountInactive),
        Some(true) => Ok(()),
    }
}

async fn check_user(conn: &mut PgConnection, user_id: Uuid) -> Result<(), CartError> {
    let is_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(conn)
        .await?;
    match is_active {
        None => Err(CartError::UserNotFound),
        Some(false) => Err(CartError::AccountInactive),
        Some(true) => Ok(()),
    }
}

async fn lock_product(
    conn: &mut PgConnection,
    product_id: Uuid,
) -> Result<LockedProduct, CartError> {
    sqlx::query_as::<_, LockedProduct>(
        "SELECT price, count_in_stock FROM products WHERE id = $1 FOR UPDATE",
    )
    .bind(product_id)
    .fetch_optional(conn)
    .await?
    .ok_or(CartError::ProductNotFound)
}

async fn lock_item(
    conn: &mut PgConnection,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<Option<CartItemRow>, CartError> {
    let row = sqlx::query_as::<_, CartItemRow>(&format!(
        "SELECT {CART_COLUMNS} FROM cart_items \
         WHERE user_id = $1 AND product_id = $2 FOR UPDATE"
    ))
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(conn)
    .await?;
    Ok(row)
}

async fn fetch_item(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemRow, CartError> {
    sqlx::query_as::<_, CartItemRow>(&format!(
        "SELECT {CART_COLUMNS} FROM cart_items WHERE user_id = $1 AND product_id = $2"
    ))
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(pool)
    .await?
    .ok_or(CartError::ItemNotFound)
}

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// Fetch the user's cart with fresh stock and price advisories.
///
/// Advisories are computed against the live product row on every read and are
/// never persisted; they cover active lines only.
///
/// # Errors
///
/// Returns [`CartError::UserNotFound`] / [`CartError::AccountInactive`] for
/// bad callers, or [`CartError::Db`] if a query fails.
pub async fn get_cart(pool: &PgPool, user_id: Uuid) -> Result<CartView, CartError> {
    let mut conn = pool.acquire().await?;
    check_user(&mut conn, user_id).await?;

    let items = sqlx::query_as::<_, CartLineRow>(
        "SELECT ci.id, ci.product_id, ci.quantity, ci.price_at_add, ci.variant, ci.status, \
                p.name AS product_name, p.brand, p.price AS current_price, \
                p.count_in_stock, p.discount, p.images, \
                ci.created_at, ci.updated_at \
         FROM cart_items ci \
         JOIN products p ON p.id = ci.product_id \
         WHERE ci.user_id = $1 \
         ORDER BY ci.created_at ASC",
    )
    .bind(user_id)
    .fetch_all(&mut *conn)
    .await?;
    drop(conn);

    let mut stock_issues = Vec::new();
    let mut price_changes = Vec::new();
    for line in &items {
        if line.status != CartItemStatus::Active.as_str() {
            continue;
        }
        if line.count_in_stock == 0 || line.count_in_stock < line.quantity {
            stock_issues.push(StockIssue {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                available: line.count_in_stock,
            });
        }
        if line.price_at_add != line.current_price {
            price_changes.push(PriceChange {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                old_price: line.price_at_add,
                new_price: line.current_price,
                difference: line.current_price - line.price_at_add,
                percent_change: percent_change(line.price_at_add, line.current_price),
            });
        }
    }

    Ok(CartView {
        items,
        stock_issues,
        price_changes,
    })
}

/// Signed percent change between the stamped and live price, two decimals.
fn percent_change(old: Decimal, new: Decimal) -> String {
    if old.is_zero() {
        return "0.00".to_string();
    }
    let pct = (new - old) / old * Decimal::from(100);
    format!("{:.2}", pct.round_dp(2))
}

// ---------------------------------------------------------------------------
// Mutations
// ---------------------------------------------------------------------------

/// Add a product to the cart, merging quantities if a line already exists.
///
/// The merge *sums* quantities; both the 100-unit cap and the live stock are
/// re-checked against the merged total, and the stamped price is refreshed to
/// the product's current price. The user's mirror set gains the product id in
/// the same transaction.
///
/// # Errors
///
/// See [`CartError`]; any error aborts the whole transaction, leaving neither
/// the line nor the mirror half-written.
pub async fn add_item(
    pool: &PgPool,
    user_id: Uuid,
    request: &AddToCart,
) -> Result<AddOutcome, CartError> {
    if !quantity::in_bounds(request.quantity) {
        return Err(CartError::QuantityOutOfBounds {
            requested: request.quantity,
        });
    }

    let mut tx = pool.begin().await?;
    lock_user(&mut tx, user_id).await?;
    let product = lock_product(&mut tx, request.product_id).await?;
    if product.count_in_stock == 0 {
        return Err(CartError::OutOfStock);
    }

    let existing = lock_item(&mut tx, user_id, request.product_id).await?;
    let current = existing.as_ref().map_or(0, |item| item.quantity);
    let total = match quantity::merge(current, request.quantity, product.count_in_stock) {
        MergeOutcome::Merged(total) => total,
        MergeOutcome::ExceedsCap { total } => {
            return Err(CartError::QuantityCapExceeded { total });
        }
        MergeOutcome::ExceedsStock { total, available } => {
            return Err(CartError::InsufficientStock {
                requested: total,
                available,
            });
        }
    };

    // The upsert also covers the duplicate-key race: a concurrent first add
    // that slipped in between our lock and this statement merges here instead
    // of surfacing a conflict.
    let item = sqlx::query_as::<_, CartItemRow>(&format!(
        "INSERT INTO cart_items (user_id, product_id, quantity, price_at_add, variant, status) \
         VALUES ($1, $2, $3, $4, $5, 'active') \
         ON CONFLICT (user_id, product_id) DO UPDATE SET \
             quantity     = $3, \
             price_at_add = $4, \
             variant      = COALESCE($5, cart_items.variant), \
             status       = 'active', \
             updated_at   = NOW() \
         RETURNING {CART_COLUMNS}"
    ))
    .bind(user_id)
    .bind(request.product_id)
    .bind(total)
    .bind(product.price)
    .bind(&request.variant)
    .fetch_one(&mut *tx)
    .await?;

    users::mirror_add(&mut tx, user_id, request.product_id).await?;
    tx.commit().await?;

    Ok(AddOutcome {
        item,
        merged: existing.is_some(),
    })
}

/// Replace a line's quantity outright (not additive).
///
/// Setting the current quantity again is an idempotent no-op; otherwise the
/// new quantity is validated against live stock and the price re-stamped.
///
/// # Errors
///
/// See [`CartError`].
pub async fn set_quantity(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
    new_quantity: i32,
) -> Result<SetOutcome, CartError> {
    if !quantity::in_bounds(new_quantity) {
        return Err(CartError::QuantityOutOfBounds {
            requested: new_quantity,
        });
    }

    let mut tx = pool.begin().await?;
    check_user(&mut tx, user_id).await?;
    let product = lock_product(&mut tx, product_id).await?;
    let item = lock_item(&mut tx, user_id, product_id)
        .await?
        .ok_or(CartError::ItemNotFound)?;

    if item.quantity == new_quantity {
        tx.commit().await?;
        return Ok(SetOutcome {
            item,
            changed: false,
        });
    }

    if product.count_in_stock == 0 {
        return Err(CartError::OutOfStock);
    }
    if new_quantity > product.count_in_stock {
        return Err(CartError::InsufficientStock {
            requested: new_quantity,
            available: product.count_in_stock,
        });
    }

    let item = update_quantity(&mut tx, item.id, new_quantity, Some(product.price)).await?;
    tx.commit().await?;
    Ok(SetOutcome {
        item,
        changed: true,
    })
}

/// Increase a line's quantity by one, bounded by the cap and live stock.
///
/// # Errors
///
/// See [`CartError`]; hitting live stock yields [`CartError::MaxStockReached`].
pub async fn increment_item(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemRow, CartError> {
    let mut tx = pool.begin().await?;
    check_user(&mut tx, user_id).await?;
    let product = lock_product(&mut tx, product_id).await?;
    let item = lock_item(&mut tx, user_id, product_id)
        .await?
        .ok_or(CartError::ItemNotFound)?;

    let total = item.quantity + 1;
    if total > quantity::MAX_QUANTITY {
        return Err(CartError::QuantityCapExceeded { total });
    }
    if total > product.count_in_stock {
        return Err(CartError::MaxStockReached {
            available: product.count_in_stock,
        });
    }

    let item = update_quantity(&mut tx, item.id, total, None).await?;
    tx.commit().await?;
    Ok(item)
}

/// Decrease a line's quantity by one.
///
/// Decrementing below one is rejected; deleting the line is the way to reach
/// zero.
///
/// # Errors
///
/// See [`CartError`].
pub async fn decrement_item(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemRow, CartError> {
    let mut tx = pool.begin().await?;
    check_user(&mut tx, user_id).await?;
    let item = lock_item(&mut tx, user_id, product_id)
        .await?
        .ok_or(CartError::ItemNotFound)?;

    if item.quantity <= quantity::MIN_QUANTITY {
        return Err(CartError::MinQuantityReached);
    }

    let item = update_quantity(&mut tx, item.id, item.quantity - 1, None).await?;
    tx.commit().await?;
    Ok(item)
}

async fn update_quantity(
    conn: &mut PgConnection,
    item_id: Uuid,
    new_quantity: i32,
    restamp_price: Option<Decimal>,
) -> Result<CartItemRow, CartError> {
    let row = sqlx::query_as::<_, CartItemRow>(&format!(
        "UPDATE cart_items \
         SET quantity = $2, \
             price_at_add = COALESCE($3, price_at_add), \
             updated_at = NOW() \
         WHERE id = $1 \
         RETURNING {CART_COLUMNS}"
    ))
    .bind(item_id)
    .bind(new_quantity)
    .bind(restamp_price)
    .fetch_one(conn)
    .await?;
    Ok(row)
}

/// Remove one line and pull its product id from the user's mirror set.
///
/// # Errors
///
/// Returns [`CartError::ItemNotFound`] if the caller owns no such line.
pub async fn remove_item(pool: &PgPool, user_id: Uuid, product_id: Uuid) -> Result<(), CartError> {
    let mut tx = pool.begin().await?;
    lock_user(&mut tx, user_id).await?;

    let deleted: Option<Uuid> = sqlx::query_scalar(
        "DELETE FROM cart_items WHERE user_id = $1 AND product_id = $2 RETURNING product_id",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_optional(&mut *tx)
    .await?;
    let Some(product_id) = deleted else {
        return Err(CartError::ItemNotFound);
    };

    users::mirror_remove(&mut tx, user_id, &[product_id]).await?;
    tx.commit().await?;
    Ok(())
}

/// Remove several lines at once. Unknown product ids are skipped, not errors.
///
/// Returns the number of lines actually removed.
///
/// # Errors
///
/// See [`CartError`].
pub async fn remove_items(
    pool: &PgPool,
    user_id: Uuid,
    product_ids: &[Uuid],
) -> Result<u64, CartError> {
    let mut tx = pool.begin().await?;
    lock_user(&mut tx, user_id).await?;

    let deleted: Vec<Uuid> = sqlx::query_scalar(
        "DELETE FROM cart_items WHERE user_id = $1 AND product_id = ANY($2) RETURNING product_id",
    )
    .bind(user_id)
    .bind(product_ids)
    .fetch_all(&mut *tx)
    .await?;

    users::mirror_remove(&mut tx, user_id, &deleted).await?;
    tx.commit().await?;
    Ok(deleted.len() as u64)
}

/// Clear the cart, optionally scoped to one status.
///
/// A scoped clear pulls only the deleted product ids from the mirror; an
/// unscoped clear empties it.
///
/// Returns the number of lines removed.
///
/// # Errors
///
/// See [`CartError`].
pub async fn clear(
    pool: &PgPool,
    user_id: Uuid,
    status: Option<CartItemStatus>,
) -> Result<u64, CartError> {
    let mut tx = pool.begin().await?;
    lock_user(&mut tx, user_id).await?;

    let removed = match status {
        Some(status) => {
            let deleted: Vec<Uuid> = sqlx::query_scalar(
                "DELETE FROM cart_items WHERE user_id = $1 AND status = $2 RETURNING product_id",
            )
            .bind(user_id)
            .bind(status.as_str())
            .fetch_all(&mut *tx)
            .await?;
            users::mirror_remove(&mut tx, user_id, &deleted).await?;
            deleted.len() as u64
        }
        None => {
            let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
            users::mirror_clear(&mut tx, user_id).await?;
            result.rows_affected()
        }
    };

    tx.commit().await?;
    Ok(removed)
}

/// Park an active line as saved-for-later. The mirror is untouched: it tracks
/// cart membership, not line status.
///
/// # Errors
///
/// Returns [`CartError::AlreadyInStatus`] if the line is already saved.
pub async fn save_for_later(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemRow, CartError> {
    let item = fetch_item(pool, user_id, product_id).await?;
    if item.status == CartItemStatus::SavedForLater.as_str() {
        return Err(CartError::AlreadyInStatus {
            status: CartItemStatus::SavedForLater.as_str(),
        });
    }

    let row = sqlx::query_as::<_, CartItemRow>(&format!(
        "UPDATE cart_items SET status = 'saved_for_later', updated_at = NOW() \
         WHERE id = $1 RETURNING {CART_COLUMNS}"
    ))
    .bind(item.id)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Move a saved line back to the active cart, re-validating live stock and
/// re-stamping the price.
///
/// # Errors
///
/// Returns [`CartError::AlreadyInStatus`] if the line is already active, or a
/// stock error if the saved quantity can no longer be fulfilled.
pub async fn move_to_cart(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<CartItemRow, CartError> {
    let item = fetch_item(pool, user_id, product_id).await?;
    if item.status == CartItemStatus::Active.as_str() {
        return Err(CartError::AlreadyInStatus {
            status: CartItemStatus::Active.as_str(),
        });
    }

    let product = crate::products::get_stock_price(pool, product_id)
        .await
        .map_err(|e| match e {
            crate::DbError::Sqlx(e) => CartError::Db(e),
            _ => CartError::ProductNotFound,
        })?
        .ok_or(CartError::ProductNotFound)?;
    if product.count_in_stock == 0 {
        return Err(CartError::OutOfStock);
    }
    if item.quantity > product.count_in_stock {
        return Err(CartError::InsufficientStock {
            requested: item.quantity,
            available: product.count_in_stock,
        });
    }

    let row = sqlx::query_as::<_, CartItemRow>(&format!(
        "UPDATE cart_items SET status = 'active', price_at_add = $2, updated_at = NOW() \
         WHERE id = $1 RETURNING {CART_COLUMNS}"
    ))
    .bind(item.id)
    .bind(product.price)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_round_trips_through_strings() {
        for status in [
            CartItemStatus::Active,
            CartItemStatus::SavedForLater,
            CartItemStatus::OutOfStock,
        ] {
            assert_eq!(CartItemStatus::parse(status.as_str()), Some(status));
        }
        assert_eq!(CartItemStatus::parse("deleted"), None);
    }

    #[test]
    fn percent_change_formats_two_decimals() {
        let old = Decimal::new(10_000, 2); // 100.00
        let new = Decimal::new(12_000, 2); // 120.00
        assert_eq!(percent_change(old, new), "20.00");
    }

    #[test]
    fn percent_change_handles_drops_and_zero_base() {
        let old = Decimal::new(8_000, 2); // 80.00
        let new = Decimal::new(6_000, 2); // 60.00
        assert_eq!(percent_change(old, new), "-25.00");
        assert_eq!(percent_change(Decimal::ZERO, new), "0.00");
    }

    #[test]
    fn error_messages_carry_self_correction_detail() {
        let err = CartError::MaxStockReached { available: 5 };
        assert_eq!(err.to_string(), "maximum available stock reached (5)");

        let err = CartError::InsufficientStock {
            requested: 7,
            available: 5,
        };
        assert_eq!(err.to_string(), "only 5 left in stock, requested 7");
    }
}
