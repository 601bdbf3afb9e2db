//! Key/value storage for cart, history and preferences
//!
//! Values are JSON text under versioned keys. Reads never fail on bad
//! content: a corrupt value is logged and replaced by its default, so a
//! damaged entry cannot lock the user out of the cart.

use crate::budget::clamp_household_size;
use crate::cart::{Cart, CartItem};
use crate::history::{normalize_history_response, CartHistory, CartHistoryRecord};
use crate::Result;
use serde_json::Value;
use sqlx::SqlitePool;
use tracing::{debug, warn};
use uuid::Uuid;

pub const CART_KEY: &str = "honoua_cart_v1";
pub const CART_HISTORY_KEY: &str = "honoua_cart_history_v1";
pub const HOUSEHOLD_SIZE_KEY: &str = "honoua_household_size";
pub const USER_ID_KEY: &str = "honoua_user_id";

pub async fn get_item(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM local_storage WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;

    Ok(value)
}

/// Insert or overwrite
pub async fn set_item(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO local_storage (key, value, updated_at)
        VALUES (?, ?, CURRENT_TIMESTAMP)
        ON CONFLICT(key) DO UPDATE SET
            value = excluded.value,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(key)
    .bind(value)
    .execute(pool)
    .await?;

    Ok(())
}

/// Returns true when a value was removed
pub async fn remove_item(pool: &SqlitePool, key: &str) -> Result<bool> {
    let result = sqlx::query("DELETE FROM local_storage WHERE key = ?")
        .bind(key)
        .execute(pool)
        .await?;

    Ok(result.rows_affected() > 0)
}

/// Stored JSON for `key`, `None` when absent or unparseable
async fn get_json(pool: &SqlitePool, key: &str) -> Result<Option<Value>> {
    let Some(raw) = get_item(pool, key).await? else {
        return Ok(None);
    };

    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!("Ignoring corrupt value under {}: {}", key, e);
            Ok(None)
        }
    }
}

/// Stored cart; malformed items are dropped
pub async fn load_cart(pool: &SqlitePool) -> Result<Cart> {
    let items = match get_json(pool, CART_KEY).await? {
        Some(Value::Array(items)) => items,
        Some(_) => {
            warn!("Stored cart is not a list, starting with an empty cart");
            return Ok(Cart::new());
        }
        None => return Ok(Cart::new()),
    };

    let items = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<CartItem>(item) {
            Ok(item) => Some(item),
            Err(e) => {
                warn!("Dropping malformed cart item: {}", e);
                None
            }
        })
        .collect();

    Ok(Cart::from_items(items))
}

pub async fn save_cart(pool: &SqlitePool, cart: &Cart) -> Result<()> {
    let json = serde_json::to_string(cart)?;
    set_item(pool, CART_KEY, &json).await?;
    debug!("Saved cart ({} items)", cart.items().len());
    Ok(())
}

/// Stored history (newest first), trimmed to `limit`
pub async fn load_cart_history(pool: &SqlitePool, limit: usize) -> Result<CartHistory> {
    let records = match get_json(pool, CART_HISTORY_KEY).await? {
        Some(value) => normalize_history_response(&value),
        None => Vec::new(),
    };

    Ok(CartHistory::from_records(records, limit))
}

/// Prepend a validated cart and persist the trimmed history
pub async fn append_cart_history(
    pool: &SqlitePool,
    record: CartHistoryRecord,
    limit: usize,
) -> Result<CartHistory> {
    let mut history = load_cart_history(pool, limit).await?;
    history.push_front(record);

    let json = serde_json::to_string(&history.records())?;
    set_item(pool, CART_HISTORY_KEY, &json).await?;

    Ok(history)
}

/// Saved household size, else `default` (both clamped to 1..=12)
pub async fn household_size(pool: &SqlitePool, default: u32) -> Result<u32> {
    let default = clamp_household_size(f64::from(default));

    let Some(raw) = get_item(pool, HOUSEHOLD_SIZE_KEY).await? else {
        return Ok(default);
    };

    match raw.trim().parse::<f64>() {
        Ok(n) if n.is_finite() => Ok(clamp_household_size(n)),
        _ => {
            warn!("Ignoring invalid household size '{}'", raw);
            Ok(default)
        }
    }
}

/// Clamp and persist a household size; returns the stored value
pub async fn set_household_size(pool: &SqlitePool, raw: f64) -> Result<u32> {
    let size = clamp_household_size(raw);
    set_item(pool, HOUSEHOLD_SIZE_KEY, &size.to_string()).await?;
    Ok(size)
}

/// Stable anonymous user id, created on first use
pub async fn user_id(pool: &SqlitePool) -> Result<String> {
    if let Some(id) = get_item(pool, USER_ID_KEY).await? {
        if !id.trim().is_empty() {
            return Ok(id);
        }
    }

    let id = format!("uid_{}", Uuid::new_v4().simple());
    set_item(pool, USER_ID_KEY, &id).await?;
    debug!("Generated user id {}", id);
    Ok(id)
}
