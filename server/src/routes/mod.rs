use axum::{
    routing::{get, post},
    Router,
};
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer};
use crate::handlers::{checkin, checkout, events, forms, health_check, organizations, registrations};
use crate::state::AppState;

pub fn create_routes(state: AppState) -> Router {
    let cors = create_cors_layer(&state.config);
    let security_headers = create_security_headers_layer(&state.config);

    Router::new()
        .route("/health", get(health_check))
        .route(
            "/organizations",
            get(organizations::list_organizations).post(organizations::create_organization),
        )
        .route(
            "/organizations/:id",
            get(organizations::get_organization)
                .put(organizations::update_organization)
                .delete(organizations::delete_organization),
        )
        .route("/events", get(events::list_events).post(events::create_event))
        .route(
            "/events/:event_id",
            get(events::get_event)
                .put(events::update_event)
                .delete(events::delete_event),
        )
        .route(
            "/events/:event_id/form-fields",
            get(forms::list_fields).put(forms::replace_fields),
        )
        .route("/events/:event_id/form", get(forms::get_form))
        .route(
            "/events/:event_id/registrations",
            get(registrations::list_registrations).post(registrations::register),
        )
        .route(
            "/events/:event_id/registrations/me",
            get(registrations::my_registration),
        )
        .route("/events/:event_id/checkout", post(checkout::start_checkout))
        .route(
            "/events/:event_id/checkout/confirm",
            post(checkout::confirm_checkout),
        )
        .route("/events/:event_id/check-in", post(checkin::check_in))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(security_headers)
        .layer(cors)
}
