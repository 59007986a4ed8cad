//! Wishlist storage and aggregation.
//!
//! Wishlist items carry a *snapshot* of product display fields taken at add
//! time. The snapshot drifts as the catalog changes and is only refreshed by
//! an explicit [`sync`]; items whose product has since been deleted are kept,
//! so the list never silently shrinks.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum WishlistError {
    #[error("user not found")]
    UserNotFound,
    #[error("account is inactive")]
    AccountInactive,
    #[error("product not found")]
    ProductNotFound,
    #[error("product is already in the wishlist")]
    Duplicate,
    #[error("wishlist item not found")]
    ItemNotFound,
    #[error(transparent)]
    Db(#[from] sqlx::Error),
}

/// A row from the `wishlist_items` table. All display fields are snapshots.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistItemRow {
    pub id: Uuid,
    pub user_id: Uuid,
    pub product_id: Uuid,
    pub title: String,
    pub image: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub brand: Option<String>,
    pub rating: Decimal,
    pub discount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Aggregate statistics over one user's wishlist, computed in a single query.
///
/// `total_savings` sums `old_price - price` over items whose old price is
/// higher; everything else is zero-filled for an empty list.
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct WishlistStats {
    pub total_items: i64,
    pub total_value: Decimal,
    pub total_savings: Decimal,
    pub average_price: Decimal,
    pub min_price: Decimal,
    pub max_price: Decimal,
    pub discounted_count: i64,
}

/// Outcome of a snapshot sync pass.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncReport {
    pub scanned: u64,
    pub updated: u64,
    pub unchanged: u64,
    pub missing: u64,
}

const WISHLIST_COLUMNS: &str = "id, user_id, product_id, title, image, price, old_price, \
     brand, rating, discount, created_at, updated_at";

/// The live product slice a snapshot is taken from.
#[derive(Debug, sqlx::FromRow)]
struct ProductSnapshot {
    name: String,
    brand: Option<String>,
    price: Decimal,
    old_price: Option<Decimal>,
    rating: Decimal,
    discount: Decimal,
    images: serde_json::Value,
}

/// Pull the first image url out of the product's `[{url, publicId}, ..]` array.
fn first_image_url(images: &serde_json::Value) -> Option<String> {
    images
        .get(0)?
        .get("url")?
        .as_str()
        .map(std::string::ToString::to_string)
}

fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.code().as_deref() == Some("23505"))
}

async fn check_user(pool: &PgPool, user_id: Uuid) -> Result<(), WishlistError> {
    let is_active: Option<bool> = sqlx::query_scalar("SELECT is_active FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_optional(pool)
        .await?;
    match is_active {
        None => Err(WishlistError::UserNotFound),
        Some(false) => Err(WishlistError::AccountInactive),
        Some(true) => Ok(()),
    }
}

async fn fetch_snapshot(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<Option<ProductSnapshot>, sqlx::Error> {
    sqlx::query_as::<_, ProductSnapshot>(
        "SELECT name, brand, price, old_price, rating, discount, images \
         FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await
}

// ---------------------------------------------------------------------------
// Operations
// ---------------------------------------------------------------------------

/// Add a product to the wishlist, snapshotting its current display fields.
///
/// # Errors
///
/// Returns [`WishlistError::Duplicate`] if the product is already listed, or
/// [`WishlistError::ProductNotFound`] if it does not exist.
pub async fn add_item(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<WishlistItemRow, WishlistError> {
    check_user(pool, user_id).await?;
    let product = fetch_snapshot(pool, product_id)
        .await?
        .ok_or(WishlistError::ProductNotFound)?;

    let row = sqlx::query_as::<_, WishlistItemRow>(&format!(
        "INSERT INTO wishlist_items \
             (user_id, product_id, title, image, price, old_price, brand, rating, discount) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
         RETURNING {WISHLIST_COLUMNS}"
    ))
    .bind(user_id)
    .bind(product_id)
    .bind(&product.name)
    .bind(first_image_url(&product.images))
    .bind(product.price)
    .bind(product.old_price)
    .bind(&product.brand)
    .bind(product.rating)
    .bind(product.discount)
    .fetch_one(pool)
    .await
    .map_err(|e| {
        if is_unique_violation(&e) {
            WishlistError::Duplicate
        } else {
            WishlistError::Db(e)
        }
    })?;
    Ok(row)
}

/// Remove one wishlist entry.
///
/// # Errors
///
/// Returns [`WishlistError::ItemNotFound`] if the caller has no such entry.
pub async fn remove_item(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<(), WishlistError> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1 AND product_id = $2")
        .bind(user_id)
        .bind(product_id)
        .execute(pool)
        .await?;
    if result.rows_affected() == 0 {
        return Err(WishlistError::ItemNotFound);
    }
    Ok(())
}

/// Remove every wishlist entry for the user. Returns the number removed.
///
/// # Errors
///
/// Returns [`WishlistError::Db`] if the delete fails.
pub async fn clear(pool: &PgPool, user_id: Uuid) -> Result<u64, WishlistError> {
    let result = sqlx::query("DELETE FROM wishlist_items WHERE user_id = $1")
        .bind(user_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected())
}

/// Whether the user has wishlisted the given product.
///
/// # Errors
///
/// Returns [`WishlistError::Db`] if the query fails.
pub async fn contains(
    pool: &PgPool,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<bool, WishlistError> {
    let exists: bool = sqlx::query_scalar(
        "SELECT EXISTS (SELECT 1 FROM wishlist_items WHERE user_id = $1 AND product_id = $2)",
    )
    .bind(user_id)
    .bind(product_id)
    .fetch_one(pool)
    .await?;
    Ok(exists)
}

/// Number of items on the user's wishlist.
///
/// # Errors
///
/// Returns [`WishlistError::Db`] if the query fails.
pub async fn count(pool: &PgPool, user_id: Uuid) -> Result<i64, WishlistError> {
    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM wishlist_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await?;
    Ok(count)
}

/// The user's wishlist, newest first.
///
/// # Errors
///
/// Returns [`WishlistError::UserNotFound`] / [`WishlistError::AccountInactive`]
/// for bad callers, or [`WishlistError::Db`] if the query fails.
pub async fn list(pool: &PgPool, user_id: Uuid) -> Result<Vec<WishlistItemRow>, WishlistError> {
    check_user(pool, user_id).await?;
    let rows = sqlx::query_as::<_, WishlistItemRow>(&format!(
        "SELECT {WISHLIST_COLUMNS} FROM wishlist_items \
         WHERE user_id = $1 ORDER BY created_at DESC"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

/// Aggregate stats over the snapshots (not live prices), in one statement.
/// An empty wishlist yields a zero-filled row, not NULLs.
///
/// # Errors
///
/// Returns [`WishlistError::Db`] if the query fails.
pub async fn stats(pool: &PgPool, user_id: Uuid) -> Result<WishlistStats, WishlistError> {
    let stats = sqlx::query_as::<_, WishlistStats>(
        "SELECT COUNT(*) AS total_items, \
                COALESCE(SUM(price), 0) AS total_value, \
                COALESCE(SUM(CASE WHEN old_price > price THEN old_price - price ELSE 0 END), 0) \
                    AS total_savings, \
                COALESCE(ROUND(AVG(price), 2), 0) AS average_price, \
                COALESCE(MIN(price), 0) AS min_price, \
                COALESCE(MAX(price), 0) AS max_price, \
                COUNT(*) FILTER (WHERE discount > 0) AS discounted_count \
         FROM wishlist_items WHERE user_id = $1",
    )
    .bind(user_id)
    .fetch_one(pool)
    .await?;
    Ok(stats)
}

/// Refresh every snapshot from the live catalog.
///
/// Items whose product no longer exists are counted as `missing` and left in
/// place with their last known snapshot.
///
/// # Errors
///
/// Returns [`WishlistError::Db`] if any query fails; items already refreshed
/// before the failure stay refreshed.
pub async fn sync(pool: &PgPool, user_id: Uuid) -> Result<SyncReport, WishlistError> {
    check_user(pool, user_id).await?;
    let items = sqlx::query_as::<_, WishlistItemRow>(&format!(
        "SELECT {WISHLIST_COLUMNS} FROM wishlist_items WHERE user_id = $1 ORDER BY created_at"
    ))
    .bind(user_id)
    .fetch_all(pool)
    .await?;

    let mut report = SyncReport {
        scanned: items.len() as u64,
        ..SyncReport::default()
    };

    for item in &items {
        let Some(live) = fetch_snapshot(pool, item.product_id).await? else {
            report.missing += 1;
            continue;
        };
        let image = first_image_url(&live.images);
        if !snapshot_drifted(item, &live, image.as_deref()) {
            report.unchanged += 1;
            continue;
        }
        sqlx::query(
            "UPDATE wishlist_items \
             SET title = $2, image = $3, price = $4, old_price = $5, brand = $6, \
                 rating = $7, discount = $8, updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(item.id)
        .bind(&live.name)
        .bind(image)
        .bind(live.price)
        .bind(live.old_price)
        .bind(&live.brand)
        .bind(live.rating)
        .bind(live.discount)
        .execute(pool)
        .await?;
        report.updated += 1;
    }

    tracing::info!(
        user_id = %user_id,
        scanned = report.scanned,
        updated = report.updated,
        missing = report.missing,
        "wishlist sync finished"
    );
    Ok(report)
}

fn snapshot_drifted(item: &WishlistItemRow, live: &ProductSnapshot, image: Option<&str>) -> bool {
    item.title != live.name
        || item.price != live.price
        || item.old_price != live.old_price
        || item.brand != live.brand
        || item.rating != live.rating
        || item.discount != live.discount
        || item.image.as_deref() != image
}
