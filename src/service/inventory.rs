//! Seat-inventory coordinator.
//!
//! Every mutating operation follows the same shape: read the event, check
//! capacity against the availability value just read, then hand that value to
//! the ledger as the optimistic-concurrency token for the guarded write. A
//! rejected guard means another writer changed the counter since the read;
//! the loser re-reads fresh state and tries again, up to a bounded number of
//! attempts. A plain availability check without the matching guarded write is
//! only advisory and is never relied on by itself.

use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Booking, Event, NewBooking, NewEvent, NewUser};
use crate::repository::{BookingLedger, EventCatalog, UserDirectory};
use crate::utils::error::AppError;

/// Attempts per operation before a guard rejection is surfaced to the caller.
const MAX_ATTEMPTS: u32 = 5;
/// Base delay between attempts; doubles each retry.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(10);

#[derive(Clone)]
pub struct InventoryService {
    catalog: Arc<dyn EventCatalog>,
    ledger: Arc<dyn BookingLedger>,
    users: Arc<dyn UserDirectory>,
}

impl InventoryService {
    pub fn new(
        catalog: Arc<dyn EventCatalog>,
        ledger: Arc<dyn BookingLedger>,
        users: Arc<dyn UserDirectory>,
    ) -> Self {
        Self {
            catalog,
            ledger,
            users,
        }
    }

    pub async fn create_event(&self, event: NewEvent) -> Result<Event, AppError> {
        if event.name.trim().is_empty() {
            return Err(AppError::ValidationError(
                "Event name must not be empty".to_string(),
            ));
        }
        if event.total_seats <= 0 {
            return Err(AppError::ValidationError(
                "total_seats must be a positive integer".to_string(),
            ));
        }

        let event = self.catalog.create(event).await?;
        info!(event_id = %event.id, total_seats = event.total_seats, "Event created");
        Ok(event)
    }

    /// Reserve `seats` for the user with the given email, creating the user
    /// record on first contact.
    pub async fn book_event(
        &self,
        user_email: &str,
        event_id: Uuid,
        seats: i32,
    ) -> Result<Booking, AppError> {
        if seats < 1 {
            return Err(AppError::ValidationError(
                "seats must be at least 1".to_string(),
            ));
        }

        let user = match self.users.by_email(user_email).await? {
            Some(user) => user,
            None => {
                self.users
                    .create(NewUser {
                        email: user_email.to_string(),
                        name: None,
                    })
                    .await?
            }
        };

        for attempt in 0..MAX_ATTEMPTS {
            let event = self.read_event(event_id).await?;
            if seats > event.available_seats {
                return Err(AppError::CapacityError(format!(
                    "Requested {} seats but only {} are available",
                    seats, event.available_seats
                )));
            }

            let reserved = self
                .ledger
                .reserve(
                    NewBooking {
                        user_id: user.id,
                        event_id,
                        seats_booked: seats,
                    },
                    event.available_seats,
                )
                .await?;

            match reserved {
                Some(booking) => {
                    info!(
                        booking_id = %booking.id,
                        event_id = %event_id,
                        seats,
                        "Booking created"
                    );
                    return Ok(booking);
                }
                None => self.backoff(attempt, event_id, "reserve").await,
            }
        }

        Err(self.exhausted(event_id, "reserve"))
    }

    /// Change a booking to `new_seats`, adjusting the event counter by the
    /// difference. Growing a booking needs only the *additional* seats to be
    /// available; shrinking always passes the capacity check.
    pub async fn update_booking(
        &self,
        booking_id: Uuid,
        new_seats: i32,
    ) -> Result<Booking, AppError> {
        if new_seats < 1 {
            return Err(AppError::ValidationError(
                "seats must be at least 1; cancel the booking to release all seats".to_string(),
            ));
        }

        for attempt in 0..MAX_ATTEMPTS {
            let booking = self.read_booking(booking_id).await?;
            let event = self.read_event(booking.event_id).await?;

            let delta = new_seats - booking.seats_booked;
            if delta > event.available_seats {
                return Err(AppError::CapacityError(format!(
                    "Requested {} additional seats but only {} are available",
                    delta, event.available_seats
                )));
            }

            let resized = self
                .ledger
                .resize(
                    booking_id,
                    event.id,
                    new_seats,
                    booking.seats_booked,
                    event.available_seats,
                )
                .await?;

            match resized {
                Some(booking) => {
                    info!(booking_id = %booking.id, new_seats, delta, "Booking updated");
                    return Ok(booking);
                }
                None => self.backoff(attempt, event.id, "resize").await,
            }
        }

        Err(self.exhausted(booking_id, "resize"))
    }

    /// Delete a booking and return its seats to the event. A second cancel of
    /// the same id fails with `NotFound`.
    pub async fn cancel_booking(&self, booking_id: Uuid) -> Result<bool, AppError> {
        for attempt in 0..MAX_ATTEMPTS {
            let booking = self.read_booking(booking_id).await?;
            let event = self.read_event(booking.event_id).await?;

            let released = self
                .ledger
                .release(
                    booking_id,
                    event.id,
                    booking.seats_booked,
                    event.available_seats,
                )
                .await?;

            match released {
                Some(()) => {
                    info!(
                        booking_id = %booking_id,
                        seats = booking.seats_booked,
                        "Booking cancelled"
                    );
                    return Ok(true);
                }
                None => self.backoff(attempt, event.id, "release").await,
            }
        }

        Err(self.exhausted(booking_id, "release"))
    }

    async fn read_event(&self, event_id: Uuid) -> Result<Event, AppError> {
        self.catalog
            .by_id(event_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {event_id} not found")))
    }

    async fn read_booking(&self, booking_id: Uuid) -> Result<Booking, AppError> {
        self.ledger
            .by_id(booking_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Booking {booking_id} not found")))
    }

    async fn backoff(&self, attempt: u32, id: Uuid, op: &str) {
        debug!(%id, op, attempt, "Availability guard rejected write, retrying");
        tokio::time::sleep(RETRY_BASE_DELAY * 2u32.saturating_pow(attempt)).await;
    }

    fn exhausted(&self, id: Uuid, op: &str) -> AppError {
        warn!(%id, op, attempts = MAX_ATTEMPTS, "Retry budget exhausted");
        AppError::ConflictError(
            "The event was modified concurrently too many times; please retry".to_string(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::{MemoryStore, StoreResult};
    use async_trait::async_trait;
    use chrono::{TimeZone, Utc};

    fn service() -> (InventoryService, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        let service = InventoryService::new(store.clone(), store.clone(), store.clone());
        (service, store)
    }

    fn new_event(total_seats: i32) -> NewEvent {
        NewEvent {
            name: "Warehouse gig".to_string(),
            description: Some("Doors at eight".to_string()),
            date: Utc.with_ymd_and_hms(2026, 10, 2, 20, 0, 0).unwrap(),
            total_seats,
        }
    }

    #[tokio::test]
    async fn create_event_rejects_non_positive_capacity() {
        let (service, _) = service();

        for bad in [0, -3] {
            let err = service.create_event(new_event(bad)).await.unwrap_err();
            assert!(matches!(err, AppError::ValidationError(_)));
        }
    }

    #[tokio::test]
    async fn create_event_primes_availability() {
        let (service, _) = service();
        let event = service.create_event(new_event(25)).await.unwrap();
        assert_eq!(event.available_seats, 25);
        assert_eq!(event.total_seats, 25);
    }

    #[tokio::test]
    async fn booking_unknown_event_is_not_found() {
        let (service, _) = service();
        let err = service
            .book_event("ada@example.com", Uuid::new_v4(), 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn booking_zero_seats_is_rejected() {
        let (service, _) = service();
        let event = service.create_event(new_event(5)).await.unwrap();
        let err = service
            .book_event("ada@example.com", event.id, 0)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn booking_the_exact_remainder_drains_availability() {
        let (service, _) = service();
        let event = service.create_event(new_event(5)).await.unwrap();

        service
            .book_event("ada@example.com", event.id, 5)
            .await
            .unwrap();

        let event = service.read_event(event.id).await.unwrap();
        assert_eq!(event.available_seats, 0);

        // One more seat than remains must fail and leave the counter alone.
        let err = service
            .book_event("grace@example.com", event.id, 1)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::CapacityError(_)));
        let event = service.read_event(event.id).await.unwrap();
        assert_eq!(event.available_seats, 0);
    }

    #[tokio::test]
    async fn booking_reuses_the_user_record() {
        let (service, store) = service();
        let event = service.create_event(new_event(10)).await.unwrap();

        let first = service
            .book_event("ada@example.com", event.id, 2)
            .await
            .unwrap();
        let second = service
            .book_event("ada@example.com", event.id, 3)
            .await
            .unwrap();

        assert_eq!(first.user_id, second.user_id);
        let bookings = store.for_user(first.user_id).await.unwrap();
        assert_eq!(bookings.len(), 2);
    }

    #[tokio::test]
    async fn update_checks_only_the_delta() {
        // total 10, a booking of 7 leaves 3 available.
        let (service, _) = service();
        let event = service.create_event(new_event(10)).await.unwrap();
        let booking = service
            .book_event("ada@example.com", event.id, 7)
            .await
            .unwrap();

        // 7 -> 8 consumes one of the 3 remaining seats.
        let booking = service.update_booking(booking.id, 8).await.unwrap();
        assert_eq!(booking.seats_booked, 8);
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 2);

        // 8 -> 11 would need 3 more seats than remain.
        let err = service.update_booking(booking.id, 11).await.unwrap_err();
        assert!(matches!(err, AppError::CapacityError(_)));
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 2);
    }

    #[tokio::test]
    async fn shrinking_a_booking_returns_seats() {
        let (service, _) = service();
        let event = service.create_event(new_event(10)).await.unwrap();
        let booking = service
            .book_event("ada@example.com", event.id, 7)
            .await
            .unwrap();

        let booking = service.update_booking(booking.id, 2).await.unwrap();
        assert_eq!(booking.seats_booked, 2);
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 8);
    }

    #[tokio::test]
    async fn update_to_zero_directs_to_cancellation() {
        let (service, _) = service();
        let event = service.create_event(new_event(10)).await.unwrap();
        let booking = service
            .book_event("ada@example.com", event.id, 4)
            .await
            .unwrap();

        let err = service.update_booking(booking.id, 0).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 6);
    }

    #[tokio::test]
    async fn second_cancel_fails_not_found() {
        let (service, _) = service();
        let event = service.create_event(new_event(10)).await.unwrap();
        let booking = service
            .book_event("ada@example.com", event.id, 4)
            .await
            .unwrap();

        assert!(service.cancel_booking(booking.id).await.unwrap());
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 10);

        let err = service.cancel_booking(booking.id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
        assert_eq!(service.read_event(event.id).await.unwrap().available_seats, 10);
    }

    /// Ledger that rejects every guarded write, as if another writer always
    /// got there first.
    struct ContestedLedger {
        inner: Arc<MemoryStore>,
    }

    #[async_trait]
    impl BookingLedger for ContestedLedger {
        async fn by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
            BookingLedger::by_id(&*self.inner, id).await
        }

        async fn for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
            self.inner.for_user(user_id).await
        }

        async fn reserve(
            &self,
            _booking: NewBooking,
            _expected_available: i32,
        ) -> StoreResult<Option<Booking>> {
            Ok(None)
        }

        async fn resize(
            &self,
            _id: Uuid,
            _event_id: Uuid,
            _new_seats: i32,
            _prior_seats: i32,
            _expected_available: i32,
        ) -> StoreResult<Option<Booking>> {
            Ok(None)
        }

        async fn release(
            &self,
            _id: Uuid,
            _event_id: Uuid,
            _seats: i32,
            _expected_available: i32,
        ) -> StoreResult<Option<()>> {
            Ok(None)
        }
    }

    #[tokio::test]
    async fn retry_budget_exhaustion_surfaces_conflict() {
        let store = Arc::new(MemoryStore::new());
        let contested = Arc::new(ContestedLedger {
            inner: store.clone(),
        });
        let service = InventoryService::new(store.clone(), contested, store.clone());

        let event = service.create_event(new_event(10)).await.unwrap();
        let err = service
            .book_event("ada@example.com", event.id, 1)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::ConflictError(_)));
    }
}
