use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A subscriber watching their Hacker News activity.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: i64,
    /// Case-sensitive Hacker News handle.
    pub hn_username: String,
    pub email: String,
    /// Unverified users are never polled.
    pub is_verified: bool,
    /// Exclusive lower bound for "new" activity on the next check.
    pub last_checked: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Fields for creating a subscriber.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub hn_username: String,
    pub email: String,
    pub is_verified: bool,
    pub last_checked: DateTime<Utc>,
}

/// Result of a compare-and-swap watermark write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatermarkUpdate {
    /// The watermark was advanced from the observed value.
    Advanced,
    /// Another cycle already moved the watermark; nothing was written.
    Conflict,
}
