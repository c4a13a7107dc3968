use axum::response::Response;
use serde::Serialize;

use crate::utils::response::success;

pub mod checkin;
pub mod checkout;
pub mod events;
pub mod forms;
pub mod organizations;
pub mod registrations;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    let payload = HealthPayload {
        status: "ok",
        service: "campus-events-api",
    };

    success(payload, "Health check successful")
}
