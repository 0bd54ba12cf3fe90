//! Postgres backend.
//!
//! Guarded ledger writes run inside a transaction: first the conditional
//! `UPDATE events ... AND available_seats = $expected`, then the booking-row
//! change. A zero `rows_affected` on either statement rolls the whole unit
//! back and reports a guard rejection, so the counter and the booking row can
//! never drift apart.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use crate::models::{Booking, Event, NewBooking, NewEvent, NewUser, User};
use crate::repository::{BookingLedger, EventCatalog, StoreResult, UserDirectory};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl EventCatalog for PgStore {
    async fn create(&self, event: NewEvent) -> StoreResult<Event> {
        let row = sqlx::query_as::<_, Event>(
            r#"
            INSERT INTO events (id, name, description, date, total_seats, available_seats)
            VALUES ($1, $2, $3, $4, $5, $5)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&event.name)
        .bind(&event.description)
        .bind(event.date)
        .bind(event.total_seats)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }

    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Event>> {
        let row = sqlx::query_as::<_, Event>("SELECT * FROM events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn all(&self) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query_as::<_, Event>("SELECT * FROM events ORDER BY date")
            .fetch_all(&self.pool)
            .await?;

        Ok(rows)
    }
}

#[async_trait]
impl BookingLedger for PgStore {
    async fn by_id(&self, id: Uuid) -> StoreResult<Option<Booking>> {
        let row = sqlx::query_as::<_, Booking>("SELECT * FROM bookings WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn for_user(&self, user_id: Uuid) -> StoreResult<Vec<Booking>> {
        let rows = sqlx::query_as::<_, Booking>(
            "SELECT * FROM bookings WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows)
    }

    async fn reserve(
        &self,
        booking: NewBooking,
        expected_available: i32,
    ) -> StoreResult<Option<Booking>> {
        let mut tx = self.pool.begin().await?;

        let guard = sqlx::query(
            r#"
            UPDATE events
            SET available_seats = available_seats - $1, updated_at = NOW()
            WHERE id = $2 AND available_seats = $3
            "#,
        )
        .bind(booking.seats_booked)
        .bind(booking.event_id)
        .bind(expected_available)
        .execute(&mut *tx)
        .await?;

        if guard.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, Booking>(
            r#"
            INSERT INTO bookings (id, user_id, event_id, seats_booked)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(booking.user_id)
        .bind(booking.event_id)
        .bind(booking.seats_booked)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
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
        let mut tx = self.pool.begin().await?;

        let guard = sqlx::query(
            r#"
            UPDATE events
            SET available_seats = available_seats - $1, updated_at = NOW()
            WHERE id = $2 AND available_seats = $3
            "#,
        )
        .bind(new_seats - prior_seats)
        .bind(event_id)
        .bind(expected_available)
        .execute(&mut *tx)
        .await?;

        if guard.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let row = sqlx::query_as::<_, Booking>(
            r#"
            UPDATE bookings
            SET seats_booked = $1, updated_at = NOW()
            WHERE id = $2 AND seats_booked = $3
            RETURNING *
            "#,
        )
        .bind(new_seats)
        .bind(id)
        .bind(prior_seats)
        .fetch_optional(&mut *tx)
        .await?;

        match row {
            Some(booking) => {
                tx.commit().await?;
                Ok(Some(booking))
            }
            // Booking changed or vanished since the caller read it.
            None => {
                tx.rollback().await?;
                Ok(None)
            }
        }
    }

    async fn release(
        &self,
        id: Uuid,
        event_id: Uuid,
        seats: i32,
        expected_available: i32,
    ) -> StoreResult<Option<()>> {
        let mut tx = self.pool.begin().await?;

        let guard = sqlx::query(
            r#"
            UPDATE events
            SET available_seats = available_seats + $1, updated_at = NOW()
            WHERE id = $2 AND available_seats = $3
            "#,
        )
        .bind(seats)
        .bind(event_id)
        .bind(expected_available)
        .execute(&mut *tx)
        .await?;

        if guard.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        let deleted = sqlx::query("DELETE FROM bookings WHERE id = $1 AND seats_booked = $2")
            .bind(id)
            .bind(seats)
            .execute(&mut *tx)
            .await?;

        if deleted.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(None);
        }

        tx.commit().await?;
        Ok(Some(()))
    }
}

#[async_trait]
impl UserDirectory for PgStore {
    async fn by_email(&self, email: &str) -> StoreResult<Option<User>> {
        let row = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = $1")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row)
    }

    async fn create(&self, user: NewUser) -> StoreResult<User> {
        let row = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, email, name)
            VALUES ($1, $2, $3)
            RETURNING *
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&user.email)
        .bind(&user.name)
        .fetch_one(&self.pool)
        .await?;

        Ok(row)
    }
}
