//! Database operations for the `users` table, including the denormalized
//! `shopping_cart` mirror of active cart product ids.

use chrono::{DateTime, Utc};
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use crate::DbError;

/// A row from the `users` table.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct UserRow {
    pub id: Uuid,
    pub email: String,
    pub display_name: Option<String>,
    pub is_active: bool,
    pub shopping_cart: Vec<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

const USER_COLUMNS: &str =
    "id, email, display_name, is_active, shopping_cart, created_at, updated_at";

/// Creates a user and returns the full inserted row.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails (including unique email violations).
pub async fn create_user(
    pool: &PgPool,
    email: &str,
    display_name: Option<&str>,
) -> Result<UserRow, DbError> {
    let row = sqlx::query_as::<_, UserRow>(&format!(
        "INSERT INTO users (email, display_name) VALUES ($1, $2) RETURNING {USER_COLUMNS}"
    ))
    .bind(email)
    .bind(display_name)
    .fetch_one(pool)
    .await?;
    Ok(row)
}

/// Returns a user by id, or `None` if not found.
///
/// # Errors
///
/// Returns [`DbError::Sqlx`] if the query fails.
pub async fn get_user(pool: &PgPool, user_id: Uuid) -> Result<Option<UserRow>, DbError> {
    let row =
        sqlx::query_as::<_, UserRow>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(user_id)
            .fetch_optional(pool)
            .await?;
    Ok(row)
}

// ---------------------------------------------------------------------------
// shopping_cart mirror — only ever called inside a cart transaction
// ---------------------------------------------------------------------------

/// Idempotent add of a product id to the user's mirror set.
pub(crate) async fn mirror_add(
    conn: &mut PgConnection,
    user_id: Uuid,
    product_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query(
        "UPDATE users \
         SET shopping_cart = array_append(shopping_cart, $2), updated_at = NOW() \
         WHERE id = $1 AND NOT ($2 = ANY(shopping_cart))",
    )
    .bind(user_id)
    .bind(product_id)
    .execute(conn)
    .await?;
    Ok(())
}

/// Removes exactly the given product ids from the mirror, leaving the rest.
pub(crate) async fn mirror_remove(
    conn: &mut PgConnection,
    user_id: Uuid,
    product_ids: &[Uuid],
) -> Result<(), sqlx::Error> {
    if product_ids.is_empty() {
        return Ok(());
    }
    sqlx::query(
        "UPDATE users \
         SET shopping_cart = ( \
             SELECT COALESCE(array_agg(pid), '{}') \
             FROM unnest(shopping_cart) AS pid \
             WHERE pid <> ALL($2) \
         ), updated_at = NOW() \
         WHERE id = $1",
    )
    .bind(user_id)
    .bind(product_ids)
    .execute(conn)
    .await?;
    Ok(())
}

/// Empties the mirror set.
pub(crate) async fn mirror_clear(
    conn: &mut PgConnection,
    user_id: Uuid,
) -> Result<(), sqlx::Error> {
    sqlx::query("UPDATE users SET shopping_cart = '{}', updated_at = NOW() WHERE id = $1")
        .bind(user_id)
        .execute(conn)
        .await?;
    Ok(())
}
