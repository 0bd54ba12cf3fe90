//! Read-only lookups.
//!
//! Listings and point reads for the API layer. The inventory coordinator
//! never uses these for its capacity checks; it reads event state inside its
//! own read-then-guarded-write step.

use std::sync::Arc;

use uuid::Uuid;

use crate::models::{Booking, Event};
use crate::repository::{BookingLedger, EventCatalog};
use crate::utils::error::AppError;

#[derive(Clone)]
pub struct QueryService {
    catalog: Arc<dyn EventCatalog>,
    ledger: Arc<dyn BookingLedger>,
}

impl QueryService {
    pub fn new(catalog: Arc<dyn EventCatalog>, ledger: Arc<dyn BookingLedger>) -> Self {
        Self { catalog, ledger }
    }

    pub async fn events(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.catalog.all().await?)
    }

    pub async fn event(&self, id: Uuid) -> Result<Event, AppError> {
        self.catalog
            .by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Event {id} not found")))
    }

    pub async fn bookings_for_user(&self, user_id: Uuid) -> Result<Vec<Booking>, AppError> {
        Ok(self.ledger.for_user(user_id).await?)
    }
}
