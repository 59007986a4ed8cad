//! Catalog handlers: public listing/detail plus the admin write path.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use uuid::Uuid;
use vitrine_core::filter::{CatalogScope, Pagination, ProductFilter, RawProductQuery, SortSpec};
use vitrine_db::{NewProduct, ProductRow};

use super::{map_db_error, parse_uuid, ApiError, ApiOk, AppState};
use crate::middleware::CallerId;

// ---------------------------------------------------------------------------
// Read path
// ---------------------------------------------------------------------------

/// GET /api/v1/products — filtered, sorted, paginated catalog listing.
///
/// The response carries the page of products, pagination metadata, the echo
/// of the filters that were actually applied, and the facet options still
/// available within the category scope.
pub(in crate::api) async fn list_products(
    State(state): State<AppState>,
    Query(raw): Query<RawProductQuery>,
) -> Result<Json<ApiOk<Vec<ProductRow>>>, ApiError> {
    let scope = CatalogScope::from_query(&raw);
    let filter = ProductFilter::from_query(&raw);
    let sort = SortSpec::parse(raw.sort_by.as_deref());
    let pagination = Pagination::from_raw(raw.page.as_deref(), raw.limit.as_deref());

    let page = vitrine_db::list_products(&state.pool, &scope, &filter, &sort, &pagination)
        .await
        .map_err(|e| map_db_error(&e))?;
    let facets = vitrine_db::available_filters(&state.pool, &scope)
        .await
        .map_err(|e| map_db_error(&e))?;

    let mut ok = ApiOk::new("products retrieved", page.items);
    ok.pagination = Some(pagination.meta(page.total));
    ok.applied_filters = Some(filter);
    ok.available_filters = Some(facets);
    Ok(Json(ok))
}

/// GET /api/v1/products/:id — single product detail.
pub(in crate::api) async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<ApiOk<ProductRow>>, ApiError> {
    let product_id = parse_uuid("id", &id)?;
    let product = vitrine_db::get_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(&e))?
        .ok_or_else(|| ApiError::not_found("product not found"))?;
    Ok(Json(ApiOk::new("product retrieved", product)))
}

// ---------------------------------------------------------------------------
// Admin write path
// ---------------------------------------------------------------------------

/// Images arrive as already-uploaded `{url, publicId}` pairs; the server
/// never talks to the image store.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(in crate::api) struct CreateProductRequest {
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

impl Default for CreateProductRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            description: None,
            brand: None,
            price: Decimal::ZERO,
            old_price: None,
            discount: Decimal::ZERO,
            count_in_stock: 0,
            rating: Decimal::ZERO,
            category_id: None,
            cat_id: None,
            sub_cat_id: None,
            third_sub_cat_id: None,
            product_ram: Vec::new(),
            size: Vec::new(),
            product_weight: Vec::new(),
            locations: serde_json::json!([]),
            is_featured: false,
            images: serde_json::json!([]),
        }
    }
}

fn validate_create(body: &CreateProductRequest) -> Result<String, ApiError> {
    let name = body.name.trim().to_owned();
    if name.is_empty() || name.len() > 200 {
        return Err(ApiError::validation("name must be 1-200 characters"));
    }
    if body.price < Decimal::ZERO {
        return Err(ApiError::validation("price must not be negative"));
    }
    if body.discount < Decimal::ZERO || body.discount > Decimal::from(100) {
        return Err(ApiError::validation("discount must be between 0 and 100"));
    }
    if body.rating < Decimal::ZERO || body.rating > Decimal::from(5) {
        return Err(ApiError::validation("rating must be between 0 and 5"));
    }
    if body.count_in_stock < 0 {
        return Err(ApiError::validation("countInStock must not be negative"));
    }
    Ok(name)
}

/// POST /api/v1/products — create a product.
pub(in crate::api) async fn create_product(
    State(state): State<AppState>,
    _caller: CallerId,
    Json(body): Json<CreateProductRequest>,
) -> Result<(StatusCode, Json<ApiOk<ProductRow>>), ApiError> {
    let name = validate_create(&body)?;

    let new_product = NewProduct {
        name,
        description: body.description,
        brand: body.brand,
        price: body.price,
        old_price: body.old_price,
        discount: body.discount,
        count_in_stock: body.count_in_stock,
        rating: body.rating,
        category_id: body.category_id,
        cat_id: body.cat_id,
        sub_cat_id: body.sub_cat_id,
        third_sub_cat_id: body.third_sub_cat_id,
        product_ram: body.product_ram,
        size: body.size,
        product_weight: body.product_weight,
        locations: body.locations,
        is_featured: body.is_featured,
        images: body.images,
    };

    let row = vitrine_db::create_product(&state.pool, &new_product)
        .await
        .map_err(|e| map_db_error(&e))?;

    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new("product created", row)),
    ))
}

/// DELETE /api/v1/products/:id — remove a product from the catalog.
///
/// Cart lines and wishlist snapshots referencing it are left in place; the
/// cart read path reports them and wishlist sync counts them as missing.
pub(in crate::api) async fn delete_product(
    State(state): State<AppState>,
    _caller: CallerId,
    Path(id): Path<String>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let product_id = parse_uuid("id", &id)?;
    let deleted = vitrine_db::delete_product(&state.pool, product_id)
        .await
        .map_err(|e| map_db_error(&e))?;
    if !deleted {
        return Err(ApiError::not_found("product not found"));
    }
    Ok(Json(ApiOk::new(
        "product deleted",
        serde_json::json!({ "deleted": true }),
    )))
}
