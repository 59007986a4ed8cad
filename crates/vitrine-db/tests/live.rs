//! Live integration tests for vitrine-db using `#[sqlx::test]`.
//!
//! Each test gets a fresh, fully-migrated Postgres database spun up by the
//! sqlx test harness. The `migrations` path is relative to the crate root
//! (`crates/vitrine-db/`), so `"../../migrations"` resolves to the workspace
//! migration directory.

use rust_decimal::Decimal;
use uuid::Uuid;
use vitrine_core::filter::{CatalogScope, Pagination, ProductFilter, RawProductQuery, SortSpec};
use vitrine_db::{
    cart, list_products, wishlist, AddToCart, CartError, CartItemStatus, WishlistError,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Insert a minimal user row and return its generated `id`.
async fn insert_test_user(pool: &sqlx::PgPool, email: &str, is_active: bool) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO users (email, is_active) VALUES ($1, $2) RETURNING id",
    )
    .bind(email)
    .bind(is_active)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_user failed for '{email}': {e}"))
}

/// Insert a product with the given price/stock and return its generated `id`.
async fn insert_test_product(pool: &sqlx::PgPool, name: &str, price: &str, stock: i32) -> Uuid {
    sqlx::query_scalar::<_, Uuid>(
        "INSERT INTO products (name, brand, price, count_in_stock, cat_id, images) \
         VALUES ($1, 'TestBrand', $2::numeric, $3, 'electronics', \
                 '[{\"url\": \"https://cdn.example/p.jpg\", \"publicId\": \"p\"}]'::jsonb) \
         RETURNING id",
    )
    .bind(name)
    .bind(price)
    .bind(stock)
    .fetch_one(pool)
    .await
    .unwrap_or_else(|e| panic!("insert_test_product failed for '{name}': {e}"))
}

async fn mirror_of(pool: &sqlx::PgPool, user_id: Uuid) -> Vec<Uuid> {
    sqlx::query_scalar("SELECT shopping_cart FROM users WHERE id = $1")
        .bind(user_id)
        .fetch_one(pool)
        .await
        .expect("fetch mirror failed")
}

fn query_parts(
    raw: &RawProductQuery,
) -> (CatalogScope, ProductFilter, SortSpec, Pagination) {
    (
        CatalogScope::from_query(raw),
        ProductFilter::from_query(raw),
        SortSpec::parse(raw.sort_by.as_deref()),
        Pagination::from_raw(raw.page.as_deref(), raw.limit.as_deref()),
    )
}

fn dec(s: &str) -> Decimal {
    s.parse().expect("bad decimal literal")
}

// ---------------------------------------------------------------------------
// Section 1: Catalog listing
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_filters_by_price_range(pool: sqlx::PgPool) {
    insert_test_product(&pool, "Cheap", "10.00", 5).await;
    insert_test_product(&pool, "Mid", "50.00", 5).await;
    insert_test_product(&pool, "Expensive", "200.00", 5).await;

    let raw = RawProductQuery {
        min_price: Some("20".to_string()),
        max_price: Some("100".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);

    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");

    assert_eq!(page.total, 1);
    assert_eq!(page.items.len(), 1);
    assert_eq!(page.items[0].name, "Mid");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_swaps_inverted_price_range(pool: sqlx::PgPool) {
    insert_test_product(&pool, "Mid", "50.00", 5).await;

    // min > max arrives swapped, so this still matches.
    let raw = RawProductQuery {
        min_price: Some("100".to_string()),
        max_price: Some("20".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);

    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");
    assert_eq!(page.total, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_sorts_by_price_descending(pool: sqlx::PgPool) {
    insert_test_product(&pool, "A", "10.00", 5).await;
    insert_test_product(&pool, "B", "30.00", 5).await;
    insert_test_product(&pool, "C", "20.00", 5).await;

    let raw = RawProductQuery {
        sort_by: Some("-price".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);

    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");

    let names: Vec<&str> = page.items.iter().map(|p| p.name.as_str()).collect();
    assert_eq!(names, vec!["B", "C", "A"]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_paginates_with_accurate_total(pool: sqlx::PgPool) {
    for i in 0..5 {
        insert_test_product(&pool, &format!("P{i}"), "10.00", 5).await;
    }

    let raw = RawProductQuery {
        page: Some("2".to_string()),
        limit: Some("2".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);

    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");

    assert_eq!(page.total, 5, "total must be unpaginated");
    assert_eq!(page.items.len(), 2);

    let meta = pagination.meta(page.total);
    assert_eq!(meta.total_pages, 3);
    assert!(meta.has_next_page);
    assert!(meta.has_prev_page);
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_in_stock_filter_excludes_empty_stock(pool: sqlx::PgPool) {
    insert_test_product(&pool, "Stocked", "10.00", 3).await;
    insert_test_product(&pool, "Gone", "10.00", 0).await;

    let raw = RawProductQuery {
        in_stock: Some("true".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);

    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "Stocked");
}

#[sqlx::test(migrations = "../../migrations")]
async fn list_products_brand_wildcards_match_literally(pool: sqlx::PgPool) {
    insert_test_product(&pool, "Shirt", "10.00", 5).await;
    let cotton = insert_test_product(&pool, "Towel", "10.00", 5).await;
    sqlx::query("UPDATE products SET brand = '100% Cotton' WHERE id = $1")
        .bind(cotton)
        .execute(&pool)
        .await
        .unwrap();

    // '%' is a literal character to search for, not match-everything.
    let raw = RawProductQuery {
        brand: Some("%".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);
    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");
    assert_eq!(page.total, 1);
    assert_eq!(page.items[0].name, "Towel");

    // '_' does not act as match-any-character either.
    let raw = RawProductQuery {
        brand: Some("T_stBrand".to_string()),
        ..RawProductQuery::default()
    };
    let (scope, filter, sort, pagination) = query_parts(&raw);
    let page = list_products(&pool, &scope, &filter, &sort, &pagination)
        .await
        .expect("list_products failed");
    assert_eq!(page.total, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn available_filters_aggregates_scope_not_user_filters(pool: sqlx::PgPool) {
    insert_test_product(&pool, "A", "10.00", 5).await;
    insert_test_product(&pool, "B", "90.00", 5).await;

    let raw = RawProductQuery {
        cat_id: Some("electronics".to_string()),
        ..RawProductQuery::default()
    };
    let scope = CatalogScope::from_query(&raw);

    let facets = vitrine_db::available_filters(&pool, &scope)
        .await
        .expect("available_filters failed");

    assert_eq!(facets.brands, vec!["TestBrand".to_string()]);
    assert_eq!(facets.min_price, Some(dec("10.00")));
    assert_eq!(facets.max_price, Some(dec("90.00")));
}

// ---------------------------------------------------------------------------
// Section 2: Cart engine
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn add_item_creates_line_and_mirrors_product(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 10).await;

    let outcome = cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 2,
            variant: None,
        },
    )
    .await
    .expect("add_item failed");

    assert!(!outcome.merged, "first add must not be a merge");
    assert_eq!(outcome.item.quantity, 2);
    assert_eq!(outcome.item.price_at_add, dec("25.00"));
    assert_eq!(outcome.item.status, "active");
    assert_eq!(mirror_of(&pool, user_id).await, vec![product_id]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn add_item_merges_quantities_against_live_stock(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 5).await;
    let add = |q| AddToCart {
        product_id,
        quantity: q,
        variant: None,
    };

    cart::add_item(&pool, user_id, &add(3)).await.unwrap();

    // 3 + 2 = 5 fits the stock of 5 and merges into one line.
    let outcome = cart::add_item(&pool, user_id, &add(2))
        .await
        .expect("merge add failed");
    assert!(outcome.merged);
    assert_eq!(outcome.item.quantity, 5);

    // 5 + 3 = 8 exceeds stock; the line stays at 5.
    let err = cart::add_item(&pool, user_id, &add(3))
        .await
        .expect_err("over-stock merge should fail");
    assert!(matches!(
        err,
        CartError::InsufficientStock {
            requested: 8,
            available: 5
        }
    ));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "merging must never create a second line");
    assert_eq!(mirror_of(&pool, user_id).await, vec![product_id]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn add_item_rejects_out_of_stock_and_bad_quantities(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let gone = insert_test_product(&pool, "Gone", "25.00", 0).await;
    let stocked = insert_test_product(&pool, "Widget", "25.00", 10).await;

    let err = cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id: gone,
            quantity: 1,
            variant: None,
        },
    )
    .await
    .expect_err("out-of-stock add should fail");
    assert!(matches!(err, CartError::OutOfStock));

    for bad in [0, -1, 101] {
        let err = cart::add_item(
            &pool,
            user_id,
            &AddToCart {
                product_id: stocked,
                quantity: bad,
                variant: None,
            },
        )
        .await
        .expect_err("out-of-bounds quantity should fail");
        assert!(matches!(err, CartError::QuantityOutOfBounds { .. }));
    }

    assert!(
        mirror_of(&pool, user_id).await.is_empty(),
        "failed adds must leave the mirror untouched"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn add_item_rejects_inactive_and_unknown_users(pool: sqlx::PgPool) {
    let inactive = insert_test_user(&pool, "inactive@example.com", false).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 10).await;
    let add = AddToCart {
        product_id,
        quantity: 1,
        variant: None,
    };

    let err = cart::add_item(&pool, inactive, &add)
        .await
        .expect_err("inactive user should fail");
    assert!(matches!(err, CartError::AccountInactive));

    let err = cart::add_item(&pool, Uuid::new_v4(), &add)
        .await
        .expect_err("unknown user should fail");
    assert!(matches!(err, CartError::UserNotFound));
}

#[sqlx::test(migrations = "../../migrations")]
async fn set_quantity_is_absolute_and_idempotent(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 10).await;
    cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 2,
            variant: None,
        },
    )
    .await
    .unwrap();

    let outcome = cart::set_quantity(&pool, user_id, product_id, 7)
        .await
        .expect("set_quantity failed");
    assert!(outcome.changed);
    assert_eq!(outcome.item.quantity, 7, "set replaces, never adds");

    let outcome = cart::set_quantity(&pool, user_id, product_id, 7)
        .await
        .expect("idempotent set failed");
    assert!(!outcome.changed, "same quantity must be a no-op");

    let err = cart::set_quantity(&pool, user_id, product_id, 11)
        .await
        .expect_err("over-stock set should fail");
    assert!(matches!(
        err,
        CartError::InsufficientStock {
            requested: 11,
            available: 10
        }
    ));
}

#[sqlx::test(migrations = "../../migrations")]
async fn increment_stops_at_live_stock(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 3).await;
    cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 2,
            variant: None,
        },
    )
    .await
    .unwrap();

    let item = cart::increment_item(&pool, user_id, product_id)
        .await
        .expect("increment failed");
    assert_eq!(item.quantity, 3);

    let err = cart::increment_item(&pool, user_id, product_id)
        .await
        .expect_err("increment past stock should fail");
    assert!(matches!(err, CartError::MaxStockReached { available: 3 }));
    assert_eq!(
        err.to_string(),
        "maximum available stock reached (3)",
        "message must name the limit so the client can self-correct"
    );
}

#[sqlx::test(migrations = "../../migrations")]
async fn decrement_refuses_to_drop_below_one(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 10).await;
    cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 2,
            variant: None,
        },
    )
    .await
    .unwrap();

    let item = cart::decrement_item(&pool, user_id, product_id)
        .await
        .expect("decrement failed");
    assert_eq!(item.quantity, 1);

    let err = cart::decrement_item(&pool, user_id, product_id)
        .await
        .expect_err("decrement at 1 should fail");
    assert!(matches!(err, CartError::MinQuantityReached));

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 1, "the line survives; deletion is explicit");
}

#[sqlx::test(migrations = "../../migrations")]
async fn remove_and_clear_keep_mirror_consistent(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let first = insert_test_product(&pool, "First", "10.00", 10).await;
    let second = insert_test_product(&pool, "Second", "20.00", 10).await;
    for product_id in [first, second] {
        cart::add_item(
            &pool,
            user_id,
            &AddToCart {
                product_id,
                quantity: 1,
                variant: None,
            },
        )
        .await
        .unwrap();
    }
    assert_eq!(mirror_of(&pool, user_id).await.len(), 2);

    cart::remove_item(&pool, user_id, first)
        .await
        .expect("remove_item failed");
    assert_eq!(mirror_of(&pool, user_id).await, vec![second]);

    let err = cart::remove_item(&pool, user_id, first)
        .await
        .expect_err("removing twice should fail");
    assert!(matches!(err, CartError::ItemNotFound));

    let removed = cart::clear(&pool, user_id, None).await.expect("clear failed");
    assert_eq!(removed, 1);
    assert!(mirror_of(&pool, user_id).await.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_remove_skips_unknown_ids_and_empties_mirror(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let first = insert_test_product(&pool, "First", "10.00", 10).await;
    let second = insert_test_product(&pool, "Second", "20.00", 10).await;
    for product_id in [first, second] {
        cart::add_item(
            &pool,
            user_id,
            &AddToCart {
                product_id,
                quantity: 1,
                variant: None,
            },
        )
        .await
        .unwrap();
    }

    let removed = cart::remove_items(&pool, user_id, &[first, second, Uuid::new_v4()])
        .await
        .expect("batch remove failed");
    assert_eq!(removed, 2, "unknown ids are skipped, not errors");

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM cart_items WHERE user_id = $1")
        .bind(user_id)
        .fetch_one(&pool)
        .await
        .unwrap();
    assert_eq!(count, 0);
    assert!(mirror_of(&pool, user_id).await.is_empty());
}

#[sqlx::test(migrations = "../../migrations")]
async fn batch_remove_retains_unlisted_lines_in_mirror(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let first = insert_test_product(&pool, "First", "10.00", 10).await;
    let second = insert_test_product(&pool, "Second", "20.00", 10).await;
    let third = insert_test_product(&pool, "Third", "30.00", 10).await;
    for product_id in [first, second, third] {
        cart::add_item(
            &pool,
            user_id,
            &AddToCart {
                product_id,
                quantity: 1,
                variant: None,
            },
        )
        .await
        .unwrap();
    }

    let removed = cart::remove_items(&pool, user_id, &[first, second])
        .await
        .expect("batch remove failed");
    assert_eq!(removed, 2);

    let view = cart::get_cart(&pool, user_id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, third);
    assert_eq!(mirror_of(&pool, user_id).await, vec![third]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn clear_scoped_to_status_spares_other_lines(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let active = insert_test_product(&pool, "Active", "10.00", 10).await;
    let saved = insert_test_product(&pool, "Saved", "20.00", 10).await;
    for product_id in [active, saved] {
        cart::add_item(
            &pool,
            user_id,
            &AddToCart {
                product_id,
                quantity: 1,
                variant: None,
            },
        )
        .await
        .unwrap();
    }
    cart::save_for_later(&pool, user_id, saved).await.unwrap();

    let removed = cart::clear(&pool, user_id, Some(CartItemStatus::Active))
        .await
        .expect("scoped clear failed");
    assert_eq!(removed, 1);

    // Saved line survives, and so does its mirror entry.
    let view = cart::get_cart(&pool, user_id).await.unwrap();
    assert_eq!(view.items.len(), 1);
    assert_eq!(view.items[0].product_id, saved);
    assert_eq!(mirror_of(&pool, user_id).await, vec![saved]);
}

#[sqlx::test(migrations = "../../migrations")]
async fn save_for_later_round_trip_revalidates_stock(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 5).await;
    cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 4,
            variant: None,
        },
    )
    .await
    .unwrap();

    let item = cart::save_for_later(&pool, user_id, product_id)
        .await
        .expect("save_for_later failed");
    assert_eq!(item.status, "saved_for_later");
    assert_eq!(
        mirror_of(&pool, user_id).await,
        vec![product_id],
        "status toggles never touch the mirror"
    );

    let err = cart::save_for_later(&pool, user_id, product_id)
        .await
        .expect_err("double save should fail");
    assert!(matches!(err, CartError::AlreadyInStatus { .. }));

    // Stock dropped below the saved quantity while it was parked.
    sqlx::query("UPDATE products SET count_in_stock = 2 WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();

    let err = cart::move_to_cart(&pool, user_id, product_id)
        .await
        .expect_err("move with insufficient stock should fail");
    assert!(matches!(
        err,
        CartError::InsufficientStock {
            requested: 4,
            available: 2
        }
    ));

    // Restock and restamp: moving back refreshes the price.
    sqlx::query("UPDATE products SET count_in_stock = 10, price = 30.00 WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();
    let item = cart::move_to_cart(&pool, user_id, product_id)
        .await
        .expect("move_to_cart failed");
    assert_eq!(item.status, "active");
    assert_eq!(item.price_at_add, dec("30.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn get_cart_reports_stock_and_price_advisories(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "100.00", 10).await;
    cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 5,
            variant: None,
        },
    )
    .await
    .unwrap();

    // Catalog moves under the cart: price up 20%, stock down to 2.
    sqlx::query("UPDATE products SET price = 120.00, count_in_stock = 2 WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();

    let view = cart::get_cart(&pool, user_id).await.expect("get_cart failed");
    assert_eq!(view.items.len(), 1, "advisories never remove the line");
    assert_eq!(view.items[0].quantity, 5, "quantity is not auto-adjusted");

    assert_eq!(view.stock_issues.len(), 1);
    assert_eq!(view.stock_issues[0].available, 2);

    assert_eq!(view.price_changes.len(), 1);
    let change = &view.price_changes[0];
    assert_eq!(change.old_price, dec("100.00"));
    assert_eq!(change.new_price, dec("120.00"));
    assert_eq!(change.difference, dec("20.00"));
    assert_eq!(change.percent_change, "20.00");
}

/// Full shopper flow: add below stock, catalog price moves, advisory fires,
/// increments climb to the stock ceiling and then stop.
#[sqlx::test(migrations = "../../migrations")]
async fn cart_flow_add_reprice_increment_to_ceiling(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "100.00", 5).await;

    let outcome = cart::add_item(
        &pool,
        user_id,
        &AddToCart {
            product_id,
            quantity: 3,
            variant: None,
        },
    )
    .await
    .expect("add failed");
    assert_eq!(outcome.item.quantity, 3);
    assert_eq!(outcome.item.price_at_add, dec("100.00"));
    assert_eq!(outcome.item.status, "active");

    sqlx::query("UPDATE products SET price = 120.00 WHERE id = $1")
        .bind(product_id)
        .execute(&pool)
        .await
        .unwrap();

    let view = cart::get_cart(&pool, user_id).await.expect("get_cart failed");
    assert_eq!(view.price_changes.len(), 1);
    assert_eq!(view.price_changes[0].difference, dec("20.00"));
    assert_eq!(view.price_changes[0].percent_change, "20.00");

    cart::increment_item(&pool, user_id, product_id)
        .await
        .expect("increment to 4 failed");
    let item = cart::increment_item(&pool, user_id, product_id)
        .await
        .expect("increment to 5 failed");
    assert_eq!(item.quantity, 5, "quantity equal to stock is allowed");

    let err = cart::increment_item(&pool, user_id, product_id)
        .await
        .expect_err("increment past stock should fail");
    assert_eq!(err.to_string(), "maximum available stock reached (5)");
}

// ---------------------------------------------------------------------------
// Section 3: Wishlist
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_add_snapshots_and_rejects_duplicates(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let product_id = insert_test_product(&pool, "Widget", "25.00", 10).await;

    let item = wishlist::add_item(&pool, user_id, product_id)
        .await
        .expect("wishlist add failed");
    assert_eq!(item.title, "Widget");
    assert_eq!(item.price, dec("25.00"));
    assert_eq!(item.image.as_deref(), Some("https://cdn.example/p.jpg"));

    let err = wishlist::add_item(&pool, user_id, product_id)
        .await
        .expect_err("duplicate add should fail");
    assert!(matches!(err, WishlistError::Duplicate));

    assert!(wishlist::contains(&pool, user_id, product_id).await.unwrap());
}

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_stats_zero_filled_when_empty(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;

    let stats = wishlist::stats(&pool, user_id).await.expect("stats failed");
    assert_eq!(stats.total_items, 0);
    assert_eq!(stats.total_value, Decimal::ZERO);
    assert_eq!(stats.total_savings, Decimal::ZERO);
    assert_eq!(stats.average_price, Decimal::ZERO);
    assert_eq!(stats.min_price, Decimal::ZERO);
    assert_eq!(stats.max_price, Decimal::ZERO);
    assert_eq!(stats.discounted_count, 0);
}

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_stats_aggregate_snapshot_values(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let cheap = insert_test_product(&pool, "Cheap", "10.00", 5).await;
    let dear = insert_test_product(&pool, "Dear", "30.00", 5).await;
    sqlx::query("UPDATE products SET old_price = 40.00, discount = 25 WHERE id = $1")
        .bind(dear)
        .execute(&pool)
        .await
        .unwrap();

    wishlist::add_item(&pool, user_id, cheap).await.unwrap();
    wishlist::add_item(&pool, user_id, dear).await.unwrap();

    let stats = wishlist::stats(&pool, user_id).await.expect("stats failed");
    assert_eq!(stats.total_items, 2);
    assert_eq!(stats.total_value, dec("40.00"));
    assert_eq!(stats.total_savings, dec("10.00"));
    assert_eq!(stats.average_price, dec("20.00"));
    assert_eq!(stats.min_price, dec("10.00"));
    assert_eq!(stats.max_price, dec("30.00"));
    assert_eq!(stats.discounted_count, 1);
}

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_sync_refreshes_drifted_snapshots(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let drifting = insert_test_product(&pool, "Drifting", "25.00", 10).await;
    let stable = insert_test_product(&pool, "Stable", "15.00", 10).await;
    let doomed = insert_test_product(&pool, "Doomed", "5.00", 10).await;
    for id in [drifting, stable, doomed] {
        wishlist::add_item(&pool, user_id, id).await.unwrap();
    }

    sqlx::query("UPDATE products SET price = 35.00, name = 'Drifting v2' WHERE id = $1")
        .bind(drifting)
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query("DELETE FROM products WHERE id = $1")
        .bind(doomed)
        .execute(&pool)
        .await
        .unwrap();

    let report = wishlist::sync(&pool, user_id).await.expect("sync failed");
    assert_eq!(report.scanned, 3);
    assert_eq!(report.updated, 1);
    assert_eq!(report.unchanged, 1);
    assert_eq!(report.missing, 1);

    let items = wishlist::list(&pool, user_id).await.unwrap();
    assert_eq!(items.len(), 3, "missing products keep their last snapshot");
    let refreshed = items
        .iter()
        .find(|i| i.product_id == drifting)
        .expect("drifting item missing");
    assert_eq!(refreshed.title, "Drifting v2");
    assert_eq!(refreshed.price, dec("35.00"));
    let kept = items
        .iter()
        .find(|i| i.product_id == doomed)
        .expect("doomed item missing");
    assert_eq!(kept.price, dec("5.00"));
}

#[sqlx::test(migrations = "../../migrations")]
async fn wishlist_remove_and_clear(pool: sqlx::PgPool) {
    let user_id = insert_test_user(&pool, "a@example.com", true).await;
    let first = insert_test_product(&pool, "First", "10.00", 5).await;
    let second = insert_test_product(&pool, "Second", "20.00", 5).await;
    wishlist::add_item(&pool, user_id, first).await.unwrap();
    wishlist::add_item(&pool, user_id, second).await.unwrap();

    wishlist::remove_item(&pool, user_id, first)
        .await
        .expect("remove failed");
    let err = wishlist::remove_item(&pool, user_id, first)
        .await
        .expect_err("double remove should fail");
    assert!(matches!(err, WishlistError::ItemNotFound));

    let removed = wishlist::clear(&pool, user_id).await.expect("clear failed");
    assert_eq!(removed, 1);
    assert!(wishlist::list(&pool, user_id).await.unwrap().is_empty());
}
