mod cart;
mod products;
mod wishlist;

use axum::{
    extract::State,
    http::{header, HeaderName, Method, StatusCode},
    response::IntoResponse,
    routing::{get, post, put},
    Json, Router,
};
use serde::Serialize;
use sqlx::PgPool;
use tower::ServiceBuilder;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use uuid::Uuid;
use vitrine_core::filter::{PaginationMeta, ProductFilter};
use vitrine_db::{AvailableFilters, CartError, DbError, WishlistError};

use crate::middleware::request_id;

#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
}

// ---------------------------------------------------------------------------
// Response envelope
// ---------------------------------------------------------------------------

/// Success envelope: `{ success: true, message, data?, pagination?, ... }`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiOk<T: Serialize> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pagination: Option<PaginationMeta>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub applied_filters: Option<ProductFilter>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available_filters: Option<AvailableFilters>,
}

impl<T: Serialize> ApiOk<T> {
    pub fn new(message: impl Into<String>, data: T) -> Self {
        Self {
            success: true,
            message: message.into(),
            data: Some(data),
            pagination: None,
            applied_filters: None,
            available_filters: None,
        }
    }
}

/// Error envelope: `{ success: false, error: true, message, details? }`.
/// The `code` picks the HTTP status and never reaches the wire.
#[derive(Debug)]
pub struct ApiError {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

#[derive(Debug, Serialize)]
struct ErrorEnvelope<'a> {
    success: bool,
    error: bool,
    message: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<&'a serde_json::Value>,
}

impl ApiError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new("validation_error", message)
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::new("not_found", message)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.code {
            "validation_error" | "bad_request" => StatusCode::BAD_REQUEST,
            "unauthorized" => StatusCode::UNAUTHORIZED,
            "forbidden" => StatusCode::FORBIDDEN,
            "not_found" => StatusCode::NOT_FOUND,
            "conflict" => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = Json(ErrorEnvelope {
            success: false,
            error: true,
            message: &self.message,
            details: self.details.as_ref(),
        })
        .into_response();
        (status, body).into_response()
    }
}

// ---------------------------------------------------------------------------
// Domain error mapping
// ---------------------------------------------------------------------------

pub(super) fn map_db_error(error: &DbError) -> ApiError {
    tracing::error!(error = %error, "database query failed");
    ApiError::new("internal_error", "database query failed")
}

pub(super) fn map_cart_error(error: CartError) -> ApiError {
    let message = error.to_string();
    match error {
        CartError::UserNotFound | CartError::ProductNotFound | CartError::ItemNotFound => {
            ApiError::not_found(message)
        }
        CartError::AccountInactive => ApiError::new("forbidden", message),
        CartError::AlreadyInStatus { .. } => ApiError::new("conflict", message),
        CartError::InsufficientStock {
            requested,
            available,
        } => ApiError::validation(message).with_details(serde_json::json!({
            "requested": requested,
            "available": available,
        })),
        CartError::MaxStockReached { available } => ApiError::validation(message)
            .with_details(serde_json::json!({ "available": available })),
        CartError::QuantityCapExceeded { total } => {
            ApiError::validation(message).with_details(serde_json::json!({ "total": total }))
        }
        CartError::QuantityOutOfBounds { .. }
        | CartError::OutOfStock
        | CartError::MinQuantityReached
        | CartError::InvalidStatus(_) => ApiError::validation(message),
        CartError::Db(e) => {
            tracing::error!(error = %e, "cart query failed");
            ApiError::new("internal_error", "database query failed")
        }
    }
}

pub(super) fn map_wishlist_error(error: WishlistError) -> ApiError {
    let message = error.to_string();
    match error {
        WishlistError::UserNotFound
        | WishlistError::ProductNotFound
        | WishlistError::ItemNotFound => ApiError::not_found(message),
        WishlistError::AccountInactive => ApiError::new("forbidden", message),
        WishlistError::Duplicate => ApiError::new("conflict", message),
        WishlistError::Db(e) => {
            tracing::error!(error = %e, "wishlist query failed");
            ApiError::new("internal_error", "database query failed")
        }
    }
}

/// Parse a path or body value that should be a UUID, answering an enveloped
/// 400 instead of axum's bare rejection.
pub(super) fn parse_uuid(field: &str, raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw.trim())
        .map_err(|_| ApiError::validation(format!("'{field}' must be a valid UUID, got '{raw}'")))
}

// ---------------------------------------------------------------------------
// Router
// ---------------------------------------------------------------------------

fn build_cors() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(tower_http::cors::Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static("x-user-id"),
            HeaderName::from_static("x-request-id"),
        ])
}

// Identity-requiring handlers take the `CallerId` extractor, which answers
// 401 itself; the router needs no auth layer.
pub fn build_app(state: AppState) -> Router {
    Router::new()
        .route("/api/v1/health", get(health))
        .route(
            "/api/v1/products",
            get(products::list_products).post(products::create_product),
        )
        .route(
            "/api/v1/products/{id}",
            get(products::get_product).delete(products::delete_product),
        )
        .route(
            "/api/v1/cart",
            get(cart::get_cart).delete(cart::clear_cart),
        )
        .route("/api/v1/cart/items", post(cart::add_item))
        .route(
            "/api/v1/cart/items/{product_id}",
            put(cart::set_quantity).delete(cart::remove_item),
        )
        .route(
            "/api/v1/cart/items/{product_id}/increment",
            post(cart::increment_item),
        )
        .route(
            "/api/v1/cart/items/{product_id}/decrement",
            post(cart::decrement_item),
        )
        .route(
            "/api/v1/cart/items/{product_id}/save",
            post(cart::save_for_later),
        )
        .route(
            "/api/v1/cart/items/{product_id}/activate",
            post(cart::move_to_cart),
        )
        .route("/api/v1/cart/items/batch-delete", post(cart::remove_batch))
        .route(
            "/api/v1/wishlist",
            get(wishlist::list).delete(wishlist::clear),
        )
        .route("/api/v1/wishlist/count", get(wishlist::count))
        .route("/api/v1/wishlist/stats", get(wishlist::stats))
        .route("/api/v1/wishlist/items", post(wishlist::add_item))
        .route(
            "/api/v1/wishlist/items/{product_id}",
            get(wishlist::contains).delete(wishlist::remove_item),
        )
        .route("/api/v1/wishlist/sync", post(wishlist::sync))
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(build_cors())
                .layer(axum::middleware::from_fn(request_id)),
        )
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthData {
    status: &'static str,
    database: &'static str,
}

async fn health(State(state): State<AppState>) -> impl IntoResponse {
    match vitrine_db::health_check(&state.pool).await {
        Ok(()) => (
            StatusCode::OK,
            Json(ApiOk::new(
                "service healthy",
                HealthData {
                    status: "ok",
                    database: "ok",
                },
            )),
        ),
        Err(e) => {
            tracing::warn!(error = %e, "health check: database unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(ApiOk::new(
                    "service degraded",
                    HealthData {
                        status: "degraded",
                        database: "unavailable",
                    },
                )),
            )
        }
    }
}
