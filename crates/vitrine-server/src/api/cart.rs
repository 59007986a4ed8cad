//! Cart handlers. All operations act on the authenticated caller's own cart;
//! stock and quantity rules are enforced in `vitrine_db::cart` and surface
//! here as enveloped 400/404/409 responses with self-correction details.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use vitrine_db::{cart, AddToCart, CartItemRow, CartItemStatus, CartView};

use super::{map_cart_error, parse_uuid, ApiError, ApiOk, AppState};
use crate::middleware::CallerId;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct AddToCartRequest {
    pub product_id: String,
    pub quantity: i32,
    pub variant: Option<serde_json::Value>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct SetQuantityRequest {
    pub quantity: i32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct BatchDeleteRequest {
    pub product_ids: Vec<String>,
}

#[derive(Debug, Deserialize)]
pub(in crate::api) struct ClearQuery {
    pub status: Option<String>,
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// GET /api/v1/cart — the caller's cart with fresh stock/price advisories.
pub(in crate::api) async fn get_cart(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<CartView>>, ApiError> {
    let view = cart::get_cart(&state.pool, caller.0)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new("cart retrieved", view)))
}

/// POST /api/v1/cart/items — add a product, merging into an existing line.
///
/// A fresh line answers 201; a merge into an existing line answers 200.
pub(in crate::api) async fn add_item(
    State(state): State<AppState>,
    caller: CallerId,
    Json(body): Json<AddToCartRequest>,
) -> Result<(StatusCode, Json<ApiOk<CartItemRow>>), ApiError> {
    let product_id = parse_uuid("productId", &body.product_id)?;
    let outcome = cart::add_item(
        &state.pool,
        caller.0,
        &AddToCart {
            product_id,
            quantity: body.quantity,
            variant: body.variant,
        },
    )
    .await
    .map_err(map_cart_error)?;

    let (status, message) = if outcome.merged {
        (StatusCode::OK, "cart item quantity updated")
    } else {
        (StatusCode::CREATED, "item added to cart")
    };
    Ok((status, Json(ApiOk::new(message, outcome.item))))
}

/// PUT /api/v1/cart/items/:product_id — replace the line quantity outright.
pub(in crate::api) async fn set_quantity(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
    Json(body): Json<SetQuantityRequest>,
) -> Result<Json<ApiOk<CartItemRow>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let outcome = cart::set_quantity(&state.pool, caller.0, product_id, body.quantity)
        .await
        .map_err(map_cart_error)?;
    let message = if outcome.changed {
        "cart item quantity updated"
    } else {
        "cart item quantity unchanged"
    };
    Ok(Json(ApiOk::new(message, outcome.item)))
}

/// POST /api/v1/cart/items/:product_id/increment
pub(in crate::api) async fn increment_item(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<CartItemRow>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let item = cart::increment_item(&state.pool, caller.0, product_id)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new("cart item quantity updated", item)))
}

/// POST /api/v1/cart/items/:product_id/decrement
pub(in crate::api) async fn decrement_item(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<CartItemRow>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let item = cart::decrement_item(&state.pool, caller.0, product_id)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new("cart item quantity updated", item)))
}

/// POST /api/v1/cart/items/:product_id/save — park the line for later.
pub(in crate::api) async fn save_for_later(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<CartItemRow>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let item = cart::save_for_later(&state.pool, caller.0, product_id)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new("item saved for later", item)))
}

/// POST /api/v1/cart/items/:product_id/activate — move a saved line back.
pub(in crate::api) async fn move_to_cart(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<CartItemRow>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let item = cart::move_to_cart(&state.pool, caller.0, product_id)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new("item moved to cart", item)))
}

/// DELETE /api/v1/cart/items/:product_id
pub(in crate::api) async fn remove_item(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    cart::remove_item(&state.pool, caller.0, product_id)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new(
        "item removed from cart",
        serde_json::json!({ "removed": true }),
    )))
}

/// POST /api/v1/cart/items/batch-delete — remove several lines at once.
///
/// Product ids not present in the cart are skipped; the response reports how
/// many lines were actually removed.
pub(in crate::api) async fn remove_batch(
    State(state): State<AppState>,
    caller: CallerId,
    Json(body): Json<BatchDeleteRequest>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    if body.product_ids.is_empty() {
        return Err(ApiError::validation("productIds must not be empty"));
    }
    let mut product_ids = Vec::with_capacity(body.product_ids.len());
    for raw in &body.product_ids {
        product_ids.push(parse_uuid("productIds", raw)?);
    }

    let removed = cart::remove_items(&state.pool, caller.0, &product_ids)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new(
        "items removed from cart",
        serde_json::json!({ "removed": removed }),
    )))
}

/// DELETE /api/v1/cart?status= — clear the cart, optionally one status only.
pub(in crate::api) async fn clear_cart(
    State(state): State<AppState>,
    caller: CallerId,
    Query(query): Query<ClearQuery>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let status = match query.status.as_deref() {
        None | Some("") => None,
        Some(raw) => Some(CartItemStatus::parse(raw).ok_or_else(|| {
            ApiError::validation(format!("invalid cart status: '{raw}'"))
        })?),
    };

    let removed = cart::clear(&state.pool, caller.0, status)
        .await
        .map_err(map_cart_error)?;
    Ok(Json(ApiOk::new(
        "cart cleared",
        serde_json::json!({ "removed": removed }),
    )))
}
