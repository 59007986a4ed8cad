//! Wishlist handlers: snapshot add/remove, membership, aggregation, sync.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Deserialize;
use vitrine_db::{wishlist, SyncReport, WishlistItemRow, WishlistStats};

use super::{map_wishlist_error, parse_uuid, ApiError, ApiOk, AppState};
use crate::middleware::CallerId;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(in crate::api) struct AddToWishlistRequest {
    pub product_id: String,
}

/// GET /api/v1/wishlist — the caller's wishlist, newest first.
pub(in crate::api) async fn list(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<Vec<WishlistItemRow>>>, ApiError> {
    let items = wishlist::list(&state.pool, caller.0)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new("wishlist retrieved", items)))
}

/// GET /api/v1/wishlist/count
pub(in crate::api) async fn count(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let count = wishlist::count(&state.pool, caller.0)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new(
        "wishlist count retrieved",
        serde_json::json!({ "count": count }),
    )))
}

/// GET /api/v1/wishlist/stats — aggregates over the stored snapshots.
pub(in crate::api) async fn stats(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<WishlistStats>>, ApiError> {
    let stats = wishlist::stats(&state.pool, caller.0)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new("wishlist stats retrieved", stats)))
}

/// GET /api/v1/wishlist/items/:product_id — membership check.
pub(in crate::api) async fn contains(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    let in_wishlist = wishlist::contains(&state.pool, caller.0, product_id)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new(
        "wishlist membership checked",
        serde_json::json!({ "inWishlist": in_wishlist }),
    )))
}

/// POST /api/v1/wishlist/items — add a product, snapshotting its display
/// fields. Duplicate adds answer 409.
pub(in crate::api) async fn add_item(
    State(state): State<AppState>,
    caller: CallerId,
    Json(body): Json<AddToWishlistRequest>,
) -> Result<(StatusCode, Json<ApiOk<WishlistItemRow>>), ApiError> {
    let product_id = parse_uuid("productId", &body.product_id)?;
    let item = wishlist::add_item(&state.pool, caller.0, product_id)
        .await
        .map_err(map_wishlist_error)?;
    Ok((
        StatusCode::CREATED,
        Json(ApiOk::new("item added to wishlist", item)),
    ))
}

/// DELETE /api/v1/wishlist/items/:product_id
pub(in crate::api) async fn remove_item(
    State(state): State<AppState>,
    caller: CallerId,
    Path(product_id): Path<String>,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let product_id = parse_uuid("productId", &product_id)?;
    wishlist::remove_item(&state.pool, caller.0, product_id)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new(
        "item removed from wishlist",
        serde_json::json!({ "removed": true }),
    )))
}

/// DELETE /api/v1/wishlist — clear the whole wishlist.
pub(in crate::api) async fn clear(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<serde_json::Value>>, ApiError> {
    let removed = wishlist::clear(&state.pool, caller.0)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new(
        "wishlist cleared",
        serde_json::json!({ "removed": removed }),
    )))
}

/// POST /api/v1/wishlist/sync — refresh snapshots from the live catalog.
pub(in crate::api) async fn sync(
    State(state): State<AppState>,
    caller: CallerId,
) -> Result<Json<ApiOk<SyncReport>>, ApiError> {
    let report = wishlist::sync(&state.pool, caller.0)
        .await
        .map_err(map_wishlist_error)?;
    Ok(Json(ApiOk::new("wishlist synced", report)))
}
