use axum::routing::{get, patch, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{apply_security_headers, create_cors_layer};
use crate::handlers::{bookings, events, health_check};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let router = Router::new()
        .route("/health", get(health_check))
        .route("/events", get(events::list_events).post(events::create_event))
        .route("/events/:id", get(events::get_event))
        .route("/bookings", post(bookings::book_event))
        .route(
            "/bookings/:id",
            patch(bookings::update_booking).delete(bookings::cancel_booking),
        )
        .route("/users/:user_id/bookings", get(bookings::list_user_bookings));

    apply_security_headers(router)
        .layer(create_cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
