//! In-memory backend.
//!
//! Hash maps behind a single mutex, with the same guard semantics as the
//! Postgres backend: a guarded write checks the availability token and
//! applies both halves of the change under one lock acquisition. Used by the
//! test suite and for running the server without a database.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::models::{Booking, Event, NewBooking, NewEvent, NewUser, User};
use crate::repository::{BookingLedger, EventCatalog, StoreResult, UserDirectory};

#[derive(Default)]
struct Tables {
    events: HashMap<Uuid, Event>,
    bookings: HashMap<Uuid, Booking>,
    users: HashMap<Uuid, User>,
}

#[derive(Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seats currently held by live bookings for one event. Test hook for the
    /// conservation invariant.
    pub fn seats_booked_for(&self, event_id: Uuid) -> i32 {
        let tables = self.tables.lock().unwrap();
        tables
            .bookings
            .values()
            .filter(|b| b.event_id == event_id)
            .map(|b| b.seats_booked)
            .sum()
    }
}

#[async_trait]
impl EventCatalog for MemoryStore {
    async fn create(&self, event: NewEvent) -> StoreResult<Event> {
        let now = Utc::now();
        let row = Event {
            id: Uuid::new_v4(),
            name: event.name,
            description: event.description,
            date: event.date,
            total_seats: event.total_seats,
            available_seats: event.total_seats,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.lock().unwrap();
        tables.events.insert(row.id, row.clone());
        Ok(row)
    }

    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.events.get(&id).cloned())
    }

    async fn all(&self) -> StoreResult<Vec<Event>> {
        let tables = self.tables.lock().unwrap();
        let mut events: Vec<Event> = tables.events.values().cloned().collect();
        events.sort_by_key(|e| e.date);
        Ok(events)
    }
}

#[async_trait]
impl BookingLedger for MemoryStore {
    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.bookings.get(&id).cloned())
    }

    async fn for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let tables = self.tables.lock().unwrap();
        let mut bookings: Vec<Booking> = tables
            .bookings
            .values()
            .filter(|b| b.user_id == user_id)
            .cloned()
            .collect();
        bookings.sort_by_key(|b| b.created_at);
        Ok(bookings)
    }

    async fn reserve(
        &self,
        booking: NewBooking,
        expected_available: i32,
    ) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().unwrap();

        let Some(event) = tables.events.get_mut(&booking.event_id) else {
            return Ok(None);
        };
        if event.available_seats != expected_available {
            return Ok(None);
        }

        event.available_seats -= booking.seats_booked;
        event.updated_at = Utc::now();

        let now = Utc::now();
        let row = Booking {
            id: Uuid::new_v4(),
            user_id: booking.user_id,
            event_id: booking.event_id,
            seats_booked: booking.seats_booked,
            created_at: now,
            updated_at: now,
        };
        tables.bookings.insert(row.id, row.clone());
        Ok(Some(row))
    }

    async fn resize(
        &self,
        id: Uuid,
        event_id: Uuid,
        new_seats: i32,
        prior_seats: i32,
        expected_available: i32,
    ) -> StoreResult<Option<Booking>> {
        let mut tables = self.tables.lock().unwrap();

        let guard_ok = tables
            .events
            .get(&event_id)
            .is_some_and(|e| e.available_seats == expected_available);
        let booking_ok = tables
            .bookings
            .get(&id)
            .is_some_and(|b| b.seats_booked == prior_seats);
        if !guard_ok || !booking_ok {
            return Ok(None);
        }

        let event = tables.events.get_mut(&event_id).unwrap();
        event.available_seats -= new_seats - prior_seats;
        event.updated_at = Utc::now();

        let booking = tables.bookings.get_mut(&id).unwrap();
        booking.seats_booked = new_seats;
        booking.updated_at = Utc::now();
        Ok(Some(booking.clone()))
    }

    async fn release(
        &self,
        id: Uuid,
        event_id: Uuid,
        seats: i32,
        expected_available: i32,
    ) -> StoreResult<Option<()>> {
        let mut tables = self.tables.lock().unwrap();

        let guard_ok = tables
            .events
            .get(&event_id)
            .is_some_and(|e| e.available_seats == expected_available);
        let booking_ok = tables
            .bookings
            .get(&id)
            .is_some_and(|b| b.seats_booked == seats);
        if !guard_ok || !booking_ok {
            return Ok(None);
        }

        let event = tables.events.get_mut(&event_id).unwrap();
        event.available_seats += seats;
        event.updated_at = Utc::now();
        tables.bookings.remove(&id);
        Ok(Some(()))
    }
}

#[async_trait]
impl UserDirectory for MemoryStore {
    async fn by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let tables = self.tables.lock().unwrap();
        Ok(tables.users.values().find(|u| u.email == email).cloned())
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let now = Utc::now();
        let row = User {
            id: Uuid::new_v4(),
            email: user.email,
            name: user.name,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.lock().unwrap();
        tables.users.insert(row.id, row.clone());
        Ok(row)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event_fixture(total_seats: i32) -> NewEvent {
        NewEvent {
            name: "Rustconf".to_string(),
            description: None,
            date: Utc.with_ymd_and_hms(2026, 11, 5, 19, 0, 0).unwrap(),
            total_seats,
        }
    }

    #[tokio::test]
    async fn reserve_applies_both_halves() {
        let store = MemoryStore::new();
        let event = EventCatalog::create(&store, event_fixture(10)).await.unwrap();

        let booking = store
            .reserve(
                NewBooking {
                    user_id: Uuid::new_v4(),
                    event_id: event.id,
                    seats_booked: 4,
                },
                10,
            )
            .await
            .unwrap()
            .expect("guard should pass");

        assert_eq!(booking.seats_booked, 4);
        let event = EventCatalog::by_id(&store, event.id).await.unwrap().unwrap();
        assert_eq!(event.available_seats, 6);
        assert_eq!(store.seats_booked_for(event.id), 4);
    }

    #[tokio::test]
    async fn stale_token_is_rejected_without_side_effects() {
        let store = MemoryStore::new();
        let event = EventCatalog::create(&store, event_fixture(10)).await.unwrap();

        let rejected = store
            .reserve(
                NewBooking {
                    user_id: Uuid::new_v4(),
                    event_id: event.id,
                    seats_booked: 2,
                },
                7, // stale: counter is actually 10
            )
            .await
            .unwrap();

        assert!(rejected.is_none());
        let event = EventCatalog::by_id(&store, event.id).await.unwrap().unwrap();
        assert_eq!(event.available_seats, 10);
        assert_eq!(store.seats_booked_for(event.id), 0);
    }
}
