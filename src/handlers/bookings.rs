use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, success};

#[derive(Deserialize)]
pub struct BookEventRequest {
    pub user_email: String,
    pub event_id: Uuid,
    pub seats: i32,
}

#[derive(Deserialize)]
pub struct UpdateBookingRequest {
    pub seats: i32,
}

#[derive(Serialize)]
pub struct CancelledPayload {
    pub cancelled: bool,
}

pub async fn book_event(
    State(state): State<AppState>,
    Json(payload): Json<BookEventRequest>,
) -> Result<Response, AppError> {
    let booking = state
        .inventory
        .book_event(&payload.user_email, payload.event_id, payload.seats)
        .await?;
    Ok(created(booking, "Booking created").into_response())
}

pub async fn update_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateBookingRequest>,
) -> Result<Response, AppError> {
    let booking = state.inventory.update_booking(id, payload.seats).await?;
    Ok(success(booking, "Booking updated").into_response())
}

pub async fn cancel_booking(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Response, AppError> {
    let cancelled = state.inventory.cancel_booking(id).await?;
    Ok(success(CancelledPayload { cancelled }, "Booking cancelled").into_response())
}

pub async fn list_user_bookings(
    State(state): State<AppState>,
    Path(user_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let bookings = state.queries.bookings_for_user(user_id).await?;
    Ok(success(bookings, "Bookings retrieved").into_response())
}
