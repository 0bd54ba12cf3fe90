//! Storage seam for the seat inventory.
//!
//! Three narrow traits sit between the services and the backing store: the
//! event catalog, the booking ledger, and the user directory. The ledger's
//! write operations are *guarded*: each one pairs a booking-row change with
//! the matching adjustment of the event's `available_seats` counter, and
//! applies both only if the counter still holds the value the caller read.
//! A guard rejection is reported as `Ok(None)` so the caller can re-read and
//! retry; it is not an error.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::{Booking, Event, NewBooking, NewEvent, NewUser, User};

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Owner of event records and their availability counters.
#[async_trait]
pub trait EventCatalog: Send + Sync {
    /// Insert a new event with `available_seats` primed to `total_seats`.
    async fn create(&self, event: NewEvent) -> StoreResult<Event>;

    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Event>>;

    async fn all(&self) -> StoreResult<Vec<Event>>;
}

/// Owner of booking records.
///
/// `reserve`, `resize` and `release` are the only operations that touch an
/// event's `available_seats`, and each commits the counter adjustment and the
/// booking-row change as one atomic unit. `expected_available` is the
/// optimistic-concurrency token: the write applies only while the counter
/// still equals it.
#[async_trait]
pub trait BookingLedger: Send + Sync {
    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Booking>>;

    /// All live bookings held by one user. Runs a fresh query per call.
    async fn for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>>;

    /// Insert a booking and decrement the event counter by its seat count.
    async fn reserve(
        &self,
        booking: NewBooking,
        expected_available: i32,
    ) -> StoreResult<Option<Booking>>;

    /// Change a booking's seat count and shift the event counter by the
    /// difference. Also requires the booking row to still hold `prior_seats`.
    async fn resize(
        &self,
        id: Uuid,
        event_id: Uuid,
        new_seats: i32,
        prior_seats: i32,
        expected_available: i32,
    ) -> StoreResult<Option<Booking>>;

    /// Delete a booking and return its seats to the event counter.
    async fn release(
        &self,
        id: Uuid,
        event_id: Uuid,
        seats: i32,
        expected_available: i32,
    ) -> StoreResult<Option<()>>;
}

/// Identity collaborator: lookup and creation of users by unique email.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    async fn by_email(&self, email: &str) -> StoreResult<Option<User>>;

    async fn create(&self, user: NewUser) -> StoreResult<User>;
}
