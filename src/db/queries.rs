use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::models::{NewUser, User, WatermarkUpdate};

// ========== Users ==========

/// Get a user by their Hacker News username.
pub async fn get_user_by_username(pool: &SqlitePool, hn_username: &str) -> Result<Option<User>> {
    sqlx::query_as("SELECT * FROM users WHERE hn_username = ?")
        .bind(hn_username)
        .fetch_optional(pool)
        .await
        .context("Failed to fetch user by username")
}

/// List all verified users, in stable username order.
pub async fn list_verified_users(pool: &SqlitePool) -> Result<Vec<User>> {
    sqlx::query_as("SELECT * FROM users WHERE is_verified = 1 ORDER BY hn_username")
        .fetch_all(pool)
        .await
        .context("Failed to list verified users")
}

/// Insert a new user, returning its ID.
pub async fn insert_user(pool: &SqlitePool, user: &NewUser) -> Result<i64> {
    let result = sqlx::query(
        r"
        INSERT INTO users (hn_username, email, is_verified, last_checked, created_at)
        VALUES (?, ?, ?, ?, ?)
        ",
    )
    .bind(&user.hn_username)
    .bind(&user.email)
    .bind(user.is_verified)
    .bind(user.last_checked)
    .bind(Utc::now())
    .execute(pool)
    .await
    .context("Failed to insert user")?;

    Ok(result.last_insert_rowid())
}

// ========== Watermark ==========

/// Advance a user's `last_checked` watermark from `observed` to `next`.
///
/// This is an optimistic compare-and-swap: the write only lands if the stored
/// watermark still equals the value this cycle read at the start. A lost race
/// (another cycle advanced it first) is reported as [`WatermarkUpdate::Conflict`]
/// and nothing is overwritten.
pub async fn advance_watermark(
    pool: &SqlitePool,
    hn_username: &str,
    observed: DateTime<Utc>,
    next: DateTime<Utc>,
) -> Result<WatermarkUpdate> {
    debug_assert!(next >= observed, "watermark must not move backwards");

    let result = sqlx::query(
        r"
        UPDATE users
        SET last_checked = ?
        WHERE hn_username = ? AND last_checked = ?
        ",
    )
    .bind(next)
    .bind(hn_username)
    .bind(observed)
    .execute(pool)
    .await
    .context("Failed to advance watermark")?;

    if result.rows_affected() == 1 {
        Ok(WatermarkUpdate::Advanced)
    } else {
        Ok(WatermarkUpdate::Conflict)
    }
}
