//! Product filter/sort/pagination builder.
//!
//! Turns untrusted string query parameters into a validated filter, a
//! whitelisted sort order, and pagination metadata. The db layer binds the
//! validated values; nothing user-controlled ever reaches SQL as text except
//! through bind parameters or the whitelisted sort columns.

use serde::{Deserialize, Serialize};

/// Raw catalog query parameters as they arrive on the wire.
///
/// Every field is an optional string: validation and coercion happen in
/// [`ProductFilter::from_query`], [`SortSpec::parse`], and
/// [`Pagination::from_raw`], never in serde.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RawProductQuery {
    pub cat_id: Option<String>,
    pub sub_cat_id: Option<String>,
    pub third_sub_cat_id: Option<String>,
    pub min_price: Option<String>,
    pub max_price: Option<String>,
    pub brand: Option<String>,
    pub rating: Option<String>,
    pub in_stock: Option<String>,
    pub discount: Option<String>,
    pub product_ram: Option<String>,
    pub size: Option<String>,
    pub product_weight: Option<String>,
    pub location: Option<String>,
    pub sort_by: Option<String>,
    pub page: Option<String>,
    pub limit: Option<String>,
}

/// The base filter: a category scope already fixed by the caller.
///
/// Facet aggregations are computed against this scope only, so "available
/// filters" reflect the category rather than the user's own narrowing.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CatalogScope {
    pub cat_id: Option<String>,
    pub sub_cat_id: Option<String>,
    pub third_sub_cat_id: Option<String>,
}

impl CatalogScope {
    #[must_use]
    pub fn from_query(raw: &RawProductQuery) -> Self {
        Self {
            cat_id: non_empty(raw.cat_id.as_deref()),
            sub_cat_id: non_empty(raw.sub_cat_id.as_deref()),
            third_sub_cat_id: non_empty(raw.third_sub_cat_id.as_deref()),
        }
    }
}

/// Validated product filter, applied on top of a [`CatalogScope`].
///
/// Serializes as the `appliedFilters` echo in list responses.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rating: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub in_stock: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub discount: Option<f64>,
    #[serde(rename = "productRam", skip_serializing_if = "Vec::is_empty")]
    pub ram: Vec<String>,
    #[serde(rename = "size", skip_serializing_if = "Vec::is_empty")]
    pub sizes: Vec<String>,
    #[serde(rename = "productWeight", skip_serializing_if = "Vec::is_empty")]
    pub weights: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
}

impl ProductFilter {
    /// Parse and validate the user-supplied filter parameters.
    ///
    /// Invalid or out-of-range values are dropped, never rejected: a garbled
    /// `rating=abc` simply does not filter. When both price bounds are
    /// present and `minPrice > maxPrice` the two are swapped so the resulting
    /// range is always well-formed. Swapping (rather than rejecting) silently
    /// changes caller intent and is kept only for compatibility; do not
    /// change it without product sign-off.
    #[must_use]
    pub fn from_query(raw: &RawProductQuery) -> Self {
        let mut min_price = parse_float(raw.min_price.as_deref(), |v| v >= 0.0);
        let mut max_price = parse_float(raw.max_price.as_deref(), |v| v >= 0.0);
        if let (Some(lo), Some(hi)) = (min_price, max_price) {
            if lo > hi {
                tracing::warn!(min = lo, max = hi, "minPrice > maxPrice, swapping bounds");
                min_price = Some(hi);
                max_price = Some(lo);
            }
        }

        Self {
            min_price,
            max_price,
            brand: non_empty(raw.brand.as_deref()),
            rating: parse_float(raw.rating.as_deref(), |v| (0.0..=5.0).contains(&v)),
            in_stock: parse_bool(raw.in_stock.as_deref()),
            discount: parse_float(raw.discount.as_deref(), |v| v >= 0.0),
            ram: parse_facet_list(raw.product_ram.as_deref()),
            sizes: parse_facet_list(raw.size.as_deref()),
            weights: parse_facet_list(raw.product_weight.as_deref()),
            location: non_empty(raw.location.as_deref()),
        }
    }
}

fn non_empty(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim).filter(|s| !s.is_empty()).map(ToOwned::to_owned)
}

fn parse_float(raw: Option<&str>, valid: impl Fn(f64) -> bool) -> Option<f64> {
    raw.and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|v| v.is_finite() && valid(*v))
}

fn parse_bool(raw: Option<&str>) -> Option<bool> {
    match raw.map(str::trim) {
        Some("true") | Some("1") => Some(true),
        Some("false") | Some("0") => Some(false),
        _ => None,
    }
}

/// Comma-separated facet values: trimmed, empties dropped, first occurrence wins.
fn parse_facet_list(raw: Option<&str>) -> Vec<String> {
    let mut out: Vec<String> = Vec::new();
    if let Some(raw) = raw {
        for part in raw.split(',') {
            let value = part.trim();
            if !value.is_empty() && !out.iter().any(|v| v == value) {
                out.push(value.to_owned());
            }
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Sorting
// ---------------------------------------------------------------------------

/// Sortable product fields; the only names allowed to reach an ORDER BY.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    Name,
    Price,
    Rating,
    CreatedAt,
    Discount,
    CountInStock,
    Brand,
}

impl SortField {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "name" => Some(Self::Name),
            "price" => Some(Self::Price),
            "rating" => Some(Self::Rating),
            "createdAt" => Some(Self::CreatedAt),
            "discount" => Some(Self::Discount),
            "countInStock" => Some(Self::CountInStock),
            "brand" => Some(Self::Brand),
            _ => None,
        }
    }

    /// Column name in the `products` table. Static by construction.
    #[must_use]
    pub fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Price => "price",
            Self::Rating => "rating",
            Self::CreatedAt => "created_at",
            Self::Discount => "discount",
            Self::CountInStock => "count_in_stock",
            Self::Brand => "brand",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SortOrder {
    pub field: SortField,
    pub direction: SortDirection,
}

/// An ordered list of whitelisted sort keys.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortSpec(Vec<SortOrder>);

impl Default for SortSpec {
    /// Newest first.
    fn default() -> Self {
        Self(vec![SortOrder {
            field: SortField::CreatedAt,
            direction: SortDirection::Desc,
        }])
    }
}

impl SortSpec {
    /// Parse a comma-separated sort expression such as `-price,name`.
    ///
    /// A leading `-` means descending. Unknown fields are dropped with a
    /// warning; if nothing valid remains (or the input is absent) the result
    /// defaults to `createdAt` descending.
    #[must_use]
    pub fn parse(raw: Option<&str>) -> Self {
        let mut orders = Vec::new();
        for token in raw.unwrap_or_default().split(',') {
            let token = token.trim();
            if token.is_empty() {
                continue;
            }
            let (name, direction) = match token.strip_prefix('-') {
                Some(rest) => (rest, SortDirection::Desc),
                None => (token, SortDirection::Asc),
            };
            match SortField::parse(name) {
                Some(field) => {
                    if !orders.iter().any(|o: &SortOrder| o.field == field) {
                        orders.push(SortOrder { field, direction });
                    }
                }
                None => tracing::warn!(field = name, "dropping unknown sort field"),
            }
        }

        if orders.is_empty() {
            Self::default()
        } else {
            Self(orders)
        }
    }

    #[must_use]
    pub fn orders(&self) -> &[SortOrder] {
        &self.0
    }

    /// Render the ORDER BY expression. Safe to splice into SQL: every column
    /// name comes from [`SortField::column`].
    #[must_use]
    pub fn order_by_sql(&self) -> String {
        self.0
            .iter()
            .map(|o| {
                let dir = match o.direction {
                    SortDirection::Asc => "ASC",
                    SortDirection::Desc => "DESC",
                };
                format!("p.{} {}", o.field.column(), dir)
            })
            .collect::<Vec<_>>()
            .join(", ")
    }
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

pub const DEFAULT_PAGE_SIZE: i64 = 10;
pub const MAX_PAGE_SIZE: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    pub page: i64,
    pub limit: i64,
}

impl Default for Pagination {
    fn default() -> Self {
        Self {
            page: 1,
            limit: DEFAULT_PAGE_SIZE,
        }
    }
}

impl Pagination {
    /// Coerce raw `page`/`limit` strings.
    ///
    /// Non-numeric or missing input falls back to the defaults (1, 10);
    /// `page` is floored at 1 and `limit` clamped into `[1, 100]`.
    #[must_use]
    pub fn from_raw(page: Option<&str>, limit: Option<&str>) -> Self {
        let page = page
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(1)
            .max(1);
        let limit = limit
            .and_then(|s| s.trim().parse::<i64>().ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
            .clamp(1, MAX_PAGE_SIZE);
        Self { page, limit }
    }

    #[must_use]
    pub fn offset(&self) -> i64 {
        (self.page - 1) * self.limit
    }

    /// Compute the response pagination block for a given total row count.
    #[must_use]
    pub fn meta(&self, total_products: i64) -> PaginationMeta {
        let total_products = total_products.max(0);
        let total_pages = total_products.div_ceil(self.limit);
        let has_next_page = self.page < total_pages;
        let has_prev_page = self.page > 1 && total_pages > 0;
        PaginationMeta {
            current_page: self.page,
            total_pages,
            total_products,
            has_next_page,
            has_prev_page,
            next_page: has_next_page.then(|| self.page + 1),
            prev_page: has_prev_page.then(|| self.page - 1),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationMeta {
    pub current_page: i64,
    pub total_pages: i64,
    pub total_products: i64,
    pub has_next_page: bool,
    pub has_prev_page: bool,
    pub next_page: Option<i64>,
    pub prev_page: Option<i64>,
}
