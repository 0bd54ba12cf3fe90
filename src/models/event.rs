use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

/// A bookable event with a fixed seat pool.
///
/// `available_seats` is the single source of truth for remaining capacity:
/// it always equals `total_seats` minus the seats held by live bookings.
/// Only the guarded ledger writes may change it.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Event {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub total_seats: i32,
    pub available_seats: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Insert payload for a new event. `total_seats` becomes the initial
/// `available_seats`.
#[derive(Debug, Clone, Deserialize)]
pub struct NewEvent {
    pub name: String,
    pub description: Option<String>,
    pub date: DateTime<Utc>,
    pub total_seats: i32,
}
