//! Database operations for the `products` table: filtered catalog listing,
//! facet aggregation, and the admin write path.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use sqlx::PgPool;
use uuid::Uuid;
use vitrine_core::filter::{CatalogScope, Pagination, ProductFilter, SortSpec};

use crate::DbError;

// ---------------------------------------------------------------------------
// Row types
// ---------------------------------------------------------------------------

/// A row from the `products` table.
///
/// Serializes directly as the catalog wire shape (camelCase).
#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ProductRow {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub discount: Decimal,
    pub count_in_stock: i32,
    pub rating: Decimal,
    pub category_id: Option<Uuid>,
    pub cat_id: Option<String>,
    pub sub_cat_id: Option<String>,
    pub third_sub_cat_id: Option<String>,
    pub product_ram: Vec<String>,
    pub size: Vec<String>,
    pub product_weight: Vec<String>,
    pub locations: serde_json::Value,
    pub is_featured: bool,
    pub images: serde_json::Value,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// The live stock/price slice of a product, read by every cart operation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct StockPriceRow {
    pub id: Uuid,
    pub name: String,
    pub price: Decimal,
    pub count_in_stock: i32,
}

/// One page of a filtered catalog listing plus the unpaginated total.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub items: Vec<ProductRow>,
    pub total: i64,
}

/// Facet aggregation over a catalog scope, used to populate filter UIs.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AvailableFilters {
    pub brands: Vec<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    pub ram_options: Vec<String>,
    pub size_options: Vec<String>,
    pub weight_options: Vec<String>,
}

const PRODUCT_COLUMNS: &str = "p.id, p.name, p.description, p.brand, p.price, p.old_price, \
     p.discount, p.count_in_stock, p.rating, p.category_id, p.cat_id, p.sub_cat_id, \
     p.third_sub_cat_id, p.product_ram, p.size, p.product_weight, p.locations, p.is_featured, \
     p.images, p.created_at, p.updated_at";

// Scope ($1..$3) plus user filter ($4..$13). All predicates collapse to TRUE
// when their parameter is NULL, so one statement covers every combination.
const FILTER_WHERE: &str = "($1::text IS NULL OR p.cat_id = $1) \
     AND ($2::text IS NULL OR p.sub_cat_id = $2) \
     AND ($3::text IS NULL OR p.third_sub_cat_id = $3) \
     AND ($4::float8 IS NULL OR p.price >= $4) \
     AND ($5::float8 IS NULL OR p.price <= $5) \
     AND ($6::text IS NULL OR p.brand ILIKE '%' || $6 || '%') \
     AND ($7::float8 IS NULL OR p.rating >= $7) \
     AND ($8::boolean IS NULL OR \
          (CASE WHEN $8 THEN p.count_in_stock > 0 ELSE p.count_in_stock = 0 END)) \
     AND ($9::float8 IS NULL OR p.discount >= $9) \
     AND ($10::text[] IS NULL OR p.product_ram && $10) \
     AND ($11::text[] IS NULL OR p.size && $11) \
     AND ($12::text[] IS NULL OR p.product_weight && $12) \
     AND ($13::text IS NULL OR EXISTS ( \
          SELECT 1 FROM jsonb_array_elements(p.locations) AS loc \
          WHERE loc->>'value' ILIKE '%' || $13 || '%' \
             OR loc->>'label' ILIKE '%' || $13 || '%'))";

const SCOPE_WHERE: &str = "($1::text IS NULL OR p.cat_id = $1) \
     AND ($2::text IS NULL OR p.sub_cat_id = $2) \
     AND ($3::text IS NULL OR p.third_sub_cat_id = $3)";

fn facet_array(values: &[String]) -> Option<&[String]> {
    if values.is_empty() {
        None
    } else {
        Some(values)
    }
}

/// Escape LIKE/ILIKE metacharacters so user input is matched literally.
/// Postgres treats `\` as the escape character by default.
fn escape_like(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_")
}

// ---------------------------------------------------------------------------
// Catalog queries
// ---------------------------------------------------------------------------

/// Runs the filtered, sorted, paginated catalog listing and its COUNT twin.
///
/// The ORDER BY expression is spliced from [`SortSpec::order_by_sql`], whose
/// column names come from a compile-time whitelist; all user values arrive
/// through bind parameters.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if either query fails.
pub async fn list_products(
    pool: &PgPool,
    scope: &CatalogScope,
    filter: &ProductFilter,
    sort: &SortSpec,
    pagination: &Pagination,
) -> Result<ProductPage, DbError> {
    let list_sql = format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE {FILTER_WHERE} \
         ORDER BY {order_by} LIMIT $14 OFFSET $15",
        order_by = sort.order_by_sql(),
    );

    let brand = filter.brand.as_deref().map(escape_like);
    let location = filter.location.as_deref().map(escape_like);

    let items = sqlx::query_as::<_, ProductRow>(&list_sql)
        .bind(scope.cat_id.as_deref())
        .bind(scope.sub_cat_id.as_deref())
        .bind(scope.third_sub_cat_id.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(brand.as_deref())
        .bind(filter.rating)
        .bind(filter.in_stock)
        .bind(filter.discount)
        .bind(facet_array(&filter.ram))
        .bind(facet_array(&filter.sizes))
        .bind(facet_array(&filter.weights))
        .bind(location.as_deref())
        .bind(pagination.limit)
        .bind(pagination.offset())
        .fetch_all(pool)
        .await?;

    let count_sql = format!("SELECT COUNT(*) FROM products p WHERE {FILTER_WHERE}");
    let total: i64 = sqlx::query_scalar(&count_sql)
        .bind(scope.cat_id.as_deref())
        .bind(scope.sub_cat_id.as_deref())
        .bind(scope.third_sub_cat_id.as_deref())
        .bind(filter.min_price)
        .bind(filter.max_price)
        .bind(brand.as_deref())
        .bind(filter.rating)
        .bind(filter.in_stock)
        .bind(filter.discount)
        .bind(facet_array(&filter.ram))
        .bind(facet_array(&filter.sizes))
        .bind(facet_array(&filter.weights))
        .bind(location.as_deref())
        .fetch_one(pool)
        .await?;

    Ok(ProductPage { items, total })
}

/// Facet aggregation scoped to the *base* category filter only.
///
/// Deliberately ignores the user's own narrowing so the UI can keep showing
/// every option that is still available within the category. The five
/// aggregate queries are independent, so they run concurrently on the pool.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if any aggregate query fails.
pub async fn available_filters(
    pool: &PgPool,
    scope: &CatalogScope,
) -> Result<AvailableFilters, DbError> {
    let cat = scope.cat_id.as_deref();
    let sub = scope.sub_cat_id.as_deref();
    let third = scope.third_sub_cat_id.as_deref();

    let brands_sql = format!(
        "SELECT DISTINCT p.brand FROM products p \
         WHERE {SCOPE_WHERE} AND p.brand IS NOT NULL ORDER BY p.brand"
    );
    let brands = async {
        sqlx::query_scalar::<_, String>(&brands_sql)
            .bind(cat)
            .bind(sub)
            .bind(third)
            .fetch_all(pool)
            .await
            .map_err(DbError::from)
    };

    let price_sql =
        format!("SELECT MIN(p.price), MAX(p.price) FROM products p WHERE {SCOPE_WHERE}");
    let price_range = async {
        sqlx::query_as::<_, (Option<Decimal>, Option<Decimal>)>(&price_sql)
            .bind(cat)
            .bind(sub)
            .bind(third)
            .fetch_one(pool)
            .await
            .map_err(DbError::from)
    };

    let (brands, (min_price, max_price), ram_options, size_options, weight_options) = tokio::try_join!(
        brands,
        price_range,
        distinct_options(pool, "product_ram", scope),
        distinct_options(pool, "size", scope),
        distinct_options(pool, "product_weight", scope),
    )?;

    Ok(AvailableFilters {
        brands,
        min_price,
        max_price,
        ram_options,
        size_options,
        weight_options,
    })
}

/// Distinct values of one of the array facet columns within the scope.
/// `column` is a compile-time literal supplied by [`available_filters`].
async fn distinct_options(
    pool: &PgPool,
    column: &'static str,
    scope: &CatalogScope,
) -> Result<Vec<String>, DbError> {
    let rows = sqlx::query_scalar::<_, String>(&format!(
        "SELECT DISTINCT opt FROM products p, unnest(p.{column}) AS opt \
         WHERE {SCOPE_WHERE} ORDER BY opt"
    ))
    .bind(scope.cat_id.as_deref())
    .bind(scope.sub_cat_id.as_deref())
    .bind(scope.third_sub_cat_id.as_deref())
    .fetch_all(pool)
    .await?;
    Ok(rows)
}

// ---------------------------------------------------------------------------
// Single-product operations
// ---------------------------------------------------------------------------

/// Returns a product by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_product(pool: &PgPool, product_id: Uuid) -> Result<Option<ProductRow>, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "SELECT {PRODUCT_COLUMNS} FROM products p WHERE p.id = $1"
    ))
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Returns the live stock/price slice for a product, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_stock_price(
    pool: &PgPool,
    product_id: Uuid,
) -> Result<Option<StockPriceRow>, DbError> {
    let row = sqlx::query_as::<_, StockPriceRow>(
        "SELECT id, name, price, count_in_stock FROM products WHERE id = $1",
    )
    .bind(product_id)
    .fetch_optional(pool)
    .await?;
    Ok(row)
}

/// Fields accepted by the admin create path. Images arrive as already-uploaded
/// `{url, publicId}` pairs; this layer never talks to the image store.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: Option<String>,
    pub brand: Option<String>,
    pub price: Decimal,
    pub old_price: Option<Decimal>,
    pub discount: Decimal,
    pub count_in_stock: i32,
    pub rating: Decimal,
    pub category_id: Option<Uuid>,
    pub cat_id: Option<String>,
    pub sub_cat_id: Option<String>,
    pub third_sub_cat_id: Option<String>,
    pub product_ram: Vec<String>,
    pub size: Vec<String>,
    pub product_weight: Vec<String>,
    pub locations: serde_json::Value,
    pub is_featured: bool,
    pub images: serde_json::Value,
}

/// Creates a product row and returns it.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the insert fails.
pub async fn create_product(pool: &PgPool, product: &NewProduct) -> Result<ProductRow, DbError> {
    let row = sqlx::query_as::<_, ProductRow>(&format!(
        "INSERT INTO products \
             (name, description, brand, price, old_price, discount, count_in_stock, rating, \
              category_id, cat_id, sub_cat_id, third_sub_cat_id, product_ram, size, \
              product_weight, locations, is_featured, images) \
         VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18) \
         RETURNING {columns}",
        columns = PRODUCT_COLUMNS.replace("p.", ""),
    ))
    .bind(&product.name)
    .bind(&product.description)
    .bind(&product.brand)
    .bind(product.price)
    .bind(product.old_price)
    .bind(product.discount)
    .bind(product.count_in_stock)
    .bind(product.rating)
    .bind(product.category_id)
    .bind(&product.cat_id)
    .bind(&product.sub_cat_id)
    .bind(&product.third_sub_cat_id)
    .bind(&product.product_ram)
    .bind(&product.size)
    .bind(&product.product_weight)
    .bind(&product.locations)
    .bind(product.is_featured)
    .bind(&product.images)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Deletes a product. Returns `true` if a row was removed.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn delete_product(pool: &PgPool, product_id: Uuid) -> Result<bool, DbError> {
    let result = sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(product_id)
        .execute(pool)
        .await?;
    Ok(result.rows_affected() > 0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escape_like_neutralizes_wildcards() {
        assert_eq!(escape_like("100%"), "100\\%");
        assert_eq!(escape_like("a_b"), "a\\_b");
        assert_eq!(escape_like("back\\slash"), "back\\\\slash");
        assert_eq!(escape_like("plain"), "plain");
    }
}
